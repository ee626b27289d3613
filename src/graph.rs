//! Graphs of operator nodes.
//!
//! A [`Graph`] is defined by its results and parameters. It holds every node
//! reachable backwards from the results, in topological order. Graphs are
//! used both as complete models and as the bodies of control-flow operators
//! such as [`Loop`](crate::ops::Loop).

use std::borrow::Borrow;
use std::fmt;

// Keys are `NodeId`s which we allocate ourselves, so the DOS resistance of
// the std hasher is not needed.
use rustc_hash::{FxHashMap, FxHashSet};
use tracing::debug;

use opgraph_shape_inference::TensorInfo;

use crate::operator::InferContext;
use crate::ops::{Parameter, ResultOp};
use crate::options::BuildOptions;

mod build_error;
mod node;
mod node_id;

pub use build_error::{BuildError, ErrorKind};
pub use node::{Node, NodeRef, Output};
pub use node_id::NodeId;

/// A graph of operator nodes with declared parameters and results.
pub struct Graph {
    name: String,
    parameters: Vec<NodeRef>,

    /// `Result` nodes, one per result passed to [`Graph::new`].
    results: Vec<NodeRef>,

    /// All nodes reachable from the results, in topological order.
    nodes: Vec<NodeRef>,
}

impl Graph {
    /// Create a graph from its results and parameters.
    ///
    /// Each result that is not already the output of a `Result` node is
    /// wrapped in one. Fails if a result depends on a parameter which is
    /// not listed in `parameters`.
    pub fn new<R, P>(
        results: impl IntoIterator<Item = R>,
        parameters: impl IntoIterator<Item = P>,
        name: &str,
    ) -> Result<Graph, BuildError>
    where
        R: Into<Output>,
        P: Borrow<NodeRef>,
    {
        Self::with_options(results, parameters, name, BuildOptions::global())
    }

    /// Variant of [`Graph::new`] which takes explicit options.
    ///
    /// If [`BuildOptions::strict_parameters`] is set, declaring a parameter
    /// which no result uses is an error.
    pub fn with_options<R, P>(
        results: impl IntoIterator<Item = R>,
        parameters: impl IntoIterator<Item = P>,
        name: &str,
        options: &BuildOptions,
    ) -> Result<Graph, BuildError>
    where
        R: Into<Output>,
        P: Borrow<NodeRef>,
    {
        let ctx = InferContext::new(options);

        let mut parameter_ids = FxHashSet::default();
        let mut param_nodes = Vec::new();
        for param in parameters {
            let param = param.borrow();
            if param.op().downcast_ref::<Parameter>().is_none() {
                return Err(BuildError::invalid_argument(
                    param.type_name(),
                    "graph parameters must be Parameter nodes",
                ));
            }
            if !parameter_ids.insert(param.id()) {
                return Err(BuildError::invalid_argument(
                    "Parameter",
                    "graph parameter is declared more than once",
                ));
            }
            param_nodes.push(param.clone());
        }

        let mut result_nodes = Vec::new();
        for result in results {
            let output: Output = result.into();
            let node = if output.node().op().downcast_ref::<ResultOp>().is_some() {
                output.node().clone()
            } else {
                NodeRef::new(Box::new(ResultOp {}), vec![output], None, &ctx)?
            };
            result_nodes.push(node);
        }

        let nodes = topological_order(&result_nodes);
        let mut used_params = FxHashSet::default();
        for node in &nodes {
            if node.op().downcast_ref::<Parameter>().is_none() {
                continue;
            }
            if !parameter_ids.contains(&node.id()) {
                return Err(BuildError::dangling_parameter(name, node.friendly_name()));
            }
            used_params.insert(node.id());
        }

        let unused_params: Vec<NodeRef> = param_nodes
            .iter()
            .filter(|p| !used_params.contains(&p.id()))
            .cloned()
            .collect();
        if let (true, Some(param)) = (options.strict_parameters, unused_params.first()) {
            return Err(BuildError::unused_parameter(name, param.friendly_name()));
        }

        // Unused parameters still belong to the graph, ahead of the nodes
        // reachable from the results.
        let nodes = unused_params.into_iter().chain(nodes).collect();

        debug!(
            graph = name,
            parameters = param_nodes.len(),
            results = result_nodes.len(),
            "created graph"
        );

        Ok(Graph {
            name: name.to_string(),
            parameters: param_nodes,
            results: result_nodes,
            nodes,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parameters(&self) -> &[NodeRef] {
        &self.parameters
    }

    /// Return the `Result` nodes of the graph.
    pub fn results(&self) -> &[NodeRef] {
        &self.results
    }

    /// Return all nodes of the graph in topological order.
    pub fn nodes(&self) -> &[NodeRef] {
        &self.nodes
    }

    /// Return the position of `param` in the graph's parameter list.
    pub fn parameter_index(&self, param: &NodeRef) -> Option<usize> {
        self.parameters.iter().position(|p| p.id() == param.id())
    }

    /// Return the position of a result in the graph's result list.
    ///
    /// `output` may be either the output of a `Result` node or the value
    /// that the `Result` node consumes.
    pub fn result_index(&self, output: &Output) -> Option<usize> {
        self.results.iter().position(|result| {
            result.id() == output.node().id() || result.inputs().first() == Some(output)
        })
    }

    /// Return the type and shape of each result, as computed when the graph
    /// was created.
    pub fn result_infos(&self) -> Vec<TensorInfo> {
        self.results
            .iter()
            .filter_map(|r| r.output_info(0).cloned())
            .collect()
    }

    /// Re-run inference for every node with the parameters replaced by
    /// `seeds`, and return the type and shape of each result.
    ///
    /// `seeds` has one entry per parameter.
    pub(crate) fn infer_with(
        &self,
        seeds: &[TensorInfo],
        ctx: &InferContext,
    ) -> Result<Vec<TensorInfo>, BuildError> {
        let mut values: FxHashMap<NodeId, Vec<TensorInfo>> = FxHashMap::default();
        for (param, seed) in self.parameters.iter().zip(seeds) {
            values.insert(param.id(), vec![seed.clone()]);
        }

        for node in &self.nodes {
            if values.contains_key(&node.id()) {
                continue;
            }
            let inputs: Vec<TensorInfo> = node
                .inputs()
                .iter()
                .map(|input| {
                    values
                        .get(&input.node().id())
                        .and_then(|infos| infos.get(input.index()))
                        .cloned()
                        .unwrap_or_else(|| input.info().clone())
                })
                .collect();
            let outputs = node
                .op()
                .infer(&inputs, ctx)
                .map_err(|err| err.with_inputs(&inputs))?;
            values.insert(node.id(), outputs);
        }

        let results = self
            .results
            .iter()
            .map(|result| {
                values
                    .get(&result.id())
                    .and_then(|infos| infos.first())
                    .cloned()
                    .unwrap_or_else(TensorInfo::unknown)
            })
            .collect();
        Ok(results)
    }
}

impl fmt::Debug for Graph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Graph")
            .field("name", &self.name)
            .field("parameters", &self.parameters.len())
            .field("results", &self.results.len())
            .field("nodes", &self.nodes.len())
            .finish()
    }
}

/// Return the nodes reachable from `roots`, with each node ordered after
/// its inputs.
fn topological_order(roots: &[NodeRef]) -> Vec<NodeRef> {
    let mut order = Vec::new();
    let mut visited = FxHashSet::default();

    // Iterative post-order traversal, so deep graphs do not overflow the
    // stack. Each entry is a node and whether its inputs have been pushed.
    let mut stack: Vec<(NodeRef, bool)> = roots.iter().rev().map(|n| (n.clone(), false)).collect();
    while let Some((node, inputs_pushed)) = stack.pop() {
        if inputs_pushed {
            order.push(node);
            continue;
        }
        if !visited.insert(node.id()) {
            continue;
        }
        stack.push((node.clone(), true));
        for input in node.inputs().iter().rev() {
            if !visited.contains(&input.node().id()) {
                stack.push((input.node().clone(), false));
            }
        }
    }
    order
}

#[cfg(test)]
mod tests;
