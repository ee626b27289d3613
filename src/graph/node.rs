use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use opgraph_shape_inference::{ElementType, PartialShape, TensorInfo};
use tracing::trace;

use super::{BuildError, NodeId};
use crate::attrs::Attributes;
use crate::operator::{InferContext, Operator};

/// A node applies an operator to the outputs of other nodes.
///
/// The types and shapes of the outputs are computed when the node is created
/// and do not change afterwards.
pub struct Node {
    id: NodeId,
    name: Option<String>,
    op: Box<dyn Operator + Send + Sync>,
    inputs: Vec<Output>,
    outputs: Vec<TensorInfo>,
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("op", &self.op.name())
            .field("outputs", &self.outputs)
            .finish()
    }
}

/// Shared handle to a [`Node`].
///
/// Nodes are immutable once created, so handles can be cloned freely and
/// shared across threads.
#[derive(Clone)]
pub struct NodeRef(Arc<Node>);

impl NodeRef {
    /// Create a node which applies `op` to `inputs`.
    ///
    /// This runs shape inference. If it fails, the error includes the types
    /// and shapes of the inputs.
    pub fn new(
        op: Box<dyn Operator + Send + Sync>,
        inputs: Vec<Output>,
        name: Option<String>,
        ctx: &InferContext,
    ) -> Result<NodeRef, BuildError> {
        let infos: Vec<TensorInfo> = inputs.iter().map(|input| input.info().clone()).collect();
        let outputs = op.infer(&infos, ctx).map_err(|err| err.with_inputs(&infos))?;

        let node = Node {
            id: NodeId::next(),
            name,
            op,
            inputs,
            outputs,
        };
        trace!(
            id = %node.id,
            op = node.op.name(),
            outputs = node.outputs.len(),
            "created node"
        );
        Ok(NodeRef(Arc::new(node)))
    }

    pub fn id(&self) -> NodeId {
        self.0.id
    }

    /// Return the name given to this node, if any.
    pub fn name(&self) -> Option<&str> {
        self.0.name.as_deref()
    }

    /// Return a node's name, or a generated name based on its operator type
    /// and ID.
    pub fn friendly_name(&self) -> String {
        match &self.0.name {
            Some(name) => name.clone(),
            None => format!("{}_{}", self.type_name(), self.0.id),
        }
    }

    /// Return the operator type name, eg. "Convolution".
    pub fn type_name(&self) -> &str {
        self.0.op.name()
    }

    /// Return the operator set version, eg. "opset1".
    pub fn version(&self) -> &str {
        self.0.op.version()
    }

    pub fn op(&self) -> &(dyn Operator + Send + Sync) {
        self.0.op.as_ref()
    }

    /// Return the resolved attributes of the operator.
    pub fn attributes(&self) -> Attributes {
        self.0.op.attributes()
    }

    pub fn inputs(&self) -> &[Output] {
        &self.0.inputs
    }

    pub fn output_size(&self) -> usize {
        self.0.outputs.len()
    }

    /// Return a handle to the output at `index`.
    pub fn output(&self, index: usize) -> Option<Output> {
        (index < self.output_size()).then(|| Output {
            node: self.clone(),
            index,
        })
    }

    /// Iterate over handles to all outputs.
    pub fn outputs(&self) -> impl Iterator<Item = Output> + '_ {
        (0..self.output_size()).map(|index| Output {
            node: self.clone(),
            index,
        })
    }

    /// Return the element type, shape and known contents of an output.
    pub fn output_info(&self, index: usize) -> Option<&TensorInfo> {
        self.0.outputs.get(index)
    }

    pub fn output_partial_shape(&self, index: usize) -> Option<&PartialShape> {
        self.output_info(index).map(|info| info.shape())
    }

    /// Return the shape of an output if it is fully static.
    pub fn output_shape(&self, index: usize) -> Option<Vec<usize>> {
        self.output_partial_shape(index)?.to_shape()
    }

    pub fn output_element_type(&self, index: usize) -> Option<ElementType> {
        self.output_info(index).map(|info| info.dtype())
    }

    /// Return true if `self` and `other` refer to the same node.
    pub fn ptr_eq(&self, other: &NodeRef) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for NodeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Handle to one output of a node.
#[derive(Clone)]
pub struct Output {
    node: NodeRef,
    index: usize,
}

impl Output {
    pub fn node(&self) -> &NodeRef {
        &self.node
    }

    pub fn index(&self) -> usize {
        self.index
    }

    /// Return the element type, shape and known contents of this output.
    pub fn info(&self) -> &TensorInfo {
        // Outputs are only created with an index that is in range.
        &self.node.0.outputs[self.index]
    }

    pub fn shape(&self) -> &PartialShape {
        self.info().shape()
    }

    pub fn element_type(&self) -> ElementType {
        self.info().dtype()
    }
}

/// Convert a node into a handle to its first output.
impl From<NodeRef> for Output {
    fn from(node: NodeRef) -> Output {
        Output { node, index: 0 }
    }
}

impl From<&NodeRef> for Output {
    fn from(node: &NodeRef) -> Output {
        node.clone().into()
    }
}

impl From<&Output> for Output {
    fn from(output: &Output) -> Output {
        output.clone()
    }
}

impl PartialEq for Output {
    fn eq(&self, other: &Output) -> bool {
        self.node.id() == other.node.id() && self.index == other.index
    }
}

impl Eq for Output {}

impl Hash for Output {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.node.id().hash(state);
        self.index.hash(state);
    }
}

impl fmt::Debug for Output {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{} ({} {})",
            self.node.friendly_name(),
            self.index,
            self.element_type(),
            self.shape()
        )
    }
}
