use opgraph_shape_inference::{Dimension, ElementType, PartialShape, TensorInfo};
use smallvec::SmallVec;
use tracing::{debug, trace};

use crate::attrs::Attributes;
use crate::graph::{BuildError, Graph, NodeRef, Output};
use crate::operator::{InferContext, Operator, SubgraphOperator};
use crate::options::BuildOptions;

/// Number of passes over a body made to find stable shapes for merged
/// inputs, before the dimensions which are still changing are widened.
const MAX_MERGE_ROUNDS: usize = 8;

/// Parameters for slicing a value along an axis, one part per iteration.
///
/// Negative `start` and `end` values count from the end of the axis, with
/// `-1` referring to the position after the last element.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct SliceParams {
    pub start: i64,
    pub stride: i64,
    pub part_size: i64,
    pub end: i64,
    pub axis: i64,
}

impl SliceParams {
    fn validate(&self, op: &str) -> Result<(), BuildError> {
        if self.stride == 0 {
            return Err(BuildError::invalid_slicing_params(op, "stride must not be zero"));
        }
        if self.part_size <= 0 {
            return Err(BuildError::invalid_slicing_params(
                op,
                "part size must be positive",
            ));
        }
        Ok(())
    }

    fn resolve_axis(&self, op: &str, rank: usize) -> Result<usize, BuildError> {
        let rank = rank as i64;
        let axis = if self.axis < 0 {
            self.axis + rank
        } else {
            self.axis
        };
        if axis < 0 || axis >= rank {
            return Err(BuildError::invalid_slicing_params(op, "axis is out of range"));
        }
        Ok(axis as usize)
    }

    fn part_size(&self) -> usize {
        self.part_size.max(1) as usize
    }

    /// Return the number of parts taken from an axis of size `dim`.
    fn num_parts(&self, dim: Dimension) -> Dimension {
        let count = |size: usize| {
            let resolve = |x: i64| if x < 0 { size as i64 + 1 + x } else { x };
            let len = (resolve(self.end) - resolve(self.start)).unsigned_abs() as usize;
            len.div_ceil(self.part_size())
        };

        // The distance between start and end only depends on the axis size
        // if exactly one of them counts from the end.
        if (self.start < 0) == (self.end < 0) {
            Dimension::fixed(count(0))
        } else {
            match dim.get_length() {
                Some(size) => Dimension::fixed(count(size)),
                None => Dimension::dynamic(),
            }
        }
    }
}

/// Index of the iteration whose body result becomes an output.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Iteration {
    First,
    Last,
    /// Zero-based index from the first iteration.
    At(usize),
    /// Zero-based index back from the last iteration. `FromEnd(0)` is the
    /// last iteration.
    FromEnd(usize),
}

impl Iteration {
    /// Return true if this iteration can be selected from a loop that runs
    /// `count` times.
    ///
    /// The first and last iterations are accepted for any count, since the
    /// output only describes the body result.
    fn in_range(self, count: usize) -> bool {
        match self {
            Self::First | Self::Last => true,
            Self::At(i) | Self::FromEnd(i) => i < count,
        }
    }
}

/// Convert an iteration index where negative values count back from the
/// end, so that `-1` is the last iteration.
impl From<i64> for Iteration {
    fn from(index: i64) -> Iteration {
        match index {
            -1 => Iteration::Last,
            0 => Iteration::First,
            i if i > 0 => Iteration::At(i as usize),
            i => Iteration::FromEnd((-i - 1) as usize),
        }
    }
}

/// Binding of an outer value to a body parameter.
///
/// `parameter` is an index into the body's parameters and `input` an index
/// into the inputs of the control-flow node.
#[derive(Clone, Debug, PartialEq)]
pub enum InputBinding {
    /// Each iteration receives the next part of the input.
    Sliced {
        parameter: usize,
        input: usize,
        slice: SliceParams,
    },
    /// The first iteration receives the input and later iterations the
    /// value of a body result from the previous iteration.
    Merged {
        parameter: usize,
        input: usize,
        body_result: usize,
    },
    /// Every iteration receives the same input.
    Invariant { parameter: usize, input: usize },
}

impl InputBinding {
    pub fn parameter(&self) -> usize {
        match self {
            Self::Sliced { parameter, .. }
            | Self::Merged { parameter, .. }
            | Self::Invariant { parameter, .. } => *parameter,
        }
    }

    pub fn input(&self) -> usize {
        match self {
            Self::Sliced { input, .. }
            | Self::Merged { input, .. }
            | Self::Invariant { input, .. } => *input,
        }
    }
}

/// Source of an output of a control-flow node.
#[derive(Clone, Debug, PartialEq)]
pub enum OutputBinding {
    /// The value of a body result in one iteration.
    IterValue {
        body_result: usize,
        iteration: Iteration,
    },
    /// The values of a body result in all iterations, concatenated along an
    /// axis.
    ConcatSlices {
        body_result: usize,
        slice: SliceParams,
    },
}

/// Body ports of a `Loop` with a special meaning.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct SpecialBodyPorts {
    /// Body parameter which receives the zero-based iteration index.
    pub current_iteration_input: Option<usize>,

    /// Body result which decides whether another iteration runs.
    pub condition_output: Option<usize>,
}

impl SpecialBodyPorts {
    /// Return the ports as indices, with `-1` for an unused port.
    pub fn to_indices(self) -> [i64; 2] {
        let index = |port: Option<usize>| port.map(|i| i as i64).unwrap_or(-1);
        [
            index(self.current_iteration_input),
            index(self.condition_output),
        ]
    }
}

/// Type of control-flow node created by a [`LoopBuilder`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum LoopKind {
    /// Runs once for each part of its sliced inputs.
    TensorIterator,
    /// Runs until a trip count is reached or a condition becomes false.
    Loop,
}

impl LoopKind {
    pub fn name(self) -> &'static str {
        match self {
            Self::TensorIterator => "TensorIterator",
            Self::Loop => "Loop",
        }
    }
}

/// Shape inference shared by [`TensorIterator`] and [`Loop`].
struct BodyInference<'a> {
    op: &'static str,
    body: &'a Graph,
    input_bindings: &'a [InputBinding],
    output_bindings: &'a [OutputBinding],
}

impl BodyInference<'_> {
    /// Infer the body with parameters seeded from the bindings, then derive
    /// the outputs.
    ///
    /// `iterations` computes the number of iterations from the inferred body
    /// results and the number of parts in the sliced inputs, if any.
    fn run(
        &self,
        inputs: &[TensorInfo],
        ctx: &InferContext,
        iterations: impl Fn(&[TensorInfo], Option<Dimension>) -> Result<Dimension, BuildError>,
    ) -> Result<Vec<TensorInfo>, BuildError> {
        let limit = ctx.options().max_nesting_depth;
        if ctx.depth() >= limit {
            return Err(BuildError::nesting_too_deep(self.op, limit));
        }

        let mut seeds: Vec<TensorInfo> = self
            .body
            .parameters()
            .iter()
            .map(|param| param.output_info(0).cloned().unwrap_or_else(TensorInfo::unknown))
            .collect();
        let mut num_parts: Option<Dimension> = None;
        let mut merged = Vec::new();

        for binding in self.input_bindings {
            let value = inputs
                .get(binding.input())
                .ok_or_else(|| BuildError::invalid_argument(self.op, "binding input is missing"))?;
            let seed = match binding {
                InputBinding::Invariant { .. } => value.clone(),
                InputBinding::Merged { body_result, .. } => {
                    merged.push((binding.parameter(), *body_result));
                    value.without_value()
                }
                InputBinding::Sliced { slice, .. } => {
                    let Some(dims) = value.shape().dims() else {
                        seeds[binding.parameter()] = value.without_value();
                        continue;
                    };
                    let axis = slice.resolve_axis(self.op, dims.len())?;
                    let parts = slice.num_parts(dims[axis]);
                    num_parts = Some(match num_parts {
                        Some(prev) => prev.merge(&parts).map_err(|_| {
                            BuildError::invalid_slicing_params(
                                self.op,
                                "sliced inputs have different numbers of parts",
                            )
                        })?,
                        None => parts,
                    });
                    let shape = value
                        .shape()
                        .clone()
                        .with_dim(axis, Dimension::fixed(slice.part_size()));
                    TensorInfo::new(value.dtype(), shape)
                }
            };
            seeds[binding.parameter()] = seed;
        }

        let nested = ctx.nested();
        let infer_body = |seeds: &[TensorInfo]| {
            self.body
                .infer_with(seeds, &nested)
                .map_err(|err| BuildError::subgraph_error(self.op, err))
        };
        let mut results = infer_body(&seeds)?;

        // Merged parameters take the union of the initial value and the body
        // result, until neither changes.
        let mut round = 0;
        loop {
            let mut changed = false;
            for &(param, result) in &merged {
                let seed = &seeds[param];
                let value = &results[result];
                let dtype = seed
                    .dtype()
                    .merge(value.dtype())
                    .map_err(|err| BuildError::op_error(self.op, err))?;
                let mut shape = seed.shape().union(value.shape());
                if round >= MAX_MERGE_ROUNDS {
                    shape = widen(seed.shape(), &shape);
                }
                if dtype != seed.dtype() || shape != *seed.shape() {
                    seeds[param] = TensorInfo::new(dtype, shape);
                    changed = true;
                }
            }
            if !changed {
                break;
            }
            round += 1;
            trace!(op = self.op, round, "re-inferring body with widened inputs");
            results = infer_body(&seeds)?;
        }

        let iterations = iterations(&results, num_parts)?;
        debug!(op = self.op, iterations = %iterations, "inferred iteration count");

        self.output_bindings
            .iter()
            .map(|binding| match binding {
                OutputBinding::IterValue {
                    body_result,
                    iteration,
                } => {
                    if iterations
                        .get_length()
                        .is_some_and(|count| !iteration.in_range(count))
                    {
                        return Err(BuildError::invalid_argument(
                            self.op,
                            "iteration index is out of range",
                        ));
                    }
                    Ok(results[*body_result].without_value())
                }
                OutputBinding::ConcatSlices { body_result, slice } => {
                    let value = &results[*body_result];
                    let Some(dims) = value.shape().dims() else {
                        return Ok(value.without_value());
                    };
                    let axis = slice.resolve_axis(self.op, dims.len())?;
                    let part_size = slice.part_size();
                    if !dims[axis].contains(part_size) {
                        return Err(BuildError::invalid_slicing_params(
                            self.op,
                            "body result does not match the part size",
                        ));
                    }
                    let shape = value
                        .shape()
                        .clone()
                        .with_dim(axis, iterations * part_size);
                    Ok(TensorInfo::new(value.dtype(), shape))
                }
            })
            .collect()
    }
}

/// Replace dimensions of `next` which differ from `prev` with open-ended
/// ones.
fn widen(prev: &PartialShape, next: &PartialShape) -> PartialShape {
    match (prev.dims(), next.dims()) {
        (Some(prev), Some(next)) if prev.len() == next.len() => prev
            .iter()
            .zip(next)
            .map(|(prev, next)| {
                if prev == next {
                    *prev
                } else if next.min_length() < prev.min_length() {
                    Dimension::dynamic()
                } else {
                    Dimension::at_least(prev.min_length())
                }
            })
            .collect(),
        _ => PartialShape::dynamic(),
    }
}

/// Limit the number of iterations to the number of parts in the sliced
/// inputs.
fn bound_by(count: Dimension, limit: Dimension) -> Dimension {
    let max = match (count.max_length(), limit.max_length()) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (a, b) => a.or(b),
    };
    let min = count.min_length().min(limit.min_length());
    match max {
        Some(max) => Dimension::bounded(min.min(max), max),
        None => Dimension::at_least(min),
    }
}

/// Runs a body once for each part of its sliced inputs.
///
/// Created with [`LoopBuilder::tensor_iterator`].
#[derive(Debug)]
pub struct TensorIterator {
    body: Graph,
    input_bindings: Vec<InputBinding>,
    output_bindings: Vec<OutputBinding>,
}

impl TensorIterator {
    pub fn body(&self) -> &Graph {
        &self.body
    }

    pub fn input_bindings(&self) -> &[InputBinding] {
        &self.input_bindings
    }

    pub fn output_bindings(&self) -> &[OutputBinding] {
        &self.output_bindings
    }
}

impl Operator for TensorIterator {
    fn name(&self) -> &str {
        LoopKind::TensorIterator.name()
    }

    fn version(&self) -> &str {
        "opset1"
    }

    fn attributes(&self) -> Attributes {
        Attributes::new()
    }

    fn infer(
        &self,
        inputs: &[TensorInfo],
        ctx: &InferContext,
    ) -> Result<Vec<TensorInfo>, BuildError> {
        BodyInference {
            op: LoopKind::TensorIterator.name(),
            body: &self.body,
            input_bindings: &self.input_bindings,
            output_bindings: &self.output_bindings,
        }
        .run(inputs, ctx, |_results, num_parts| {
            Ok(num_parts.unwrap_or_else(Dimension::dynamic))
        })
    }

    fn as_subgraph_op(&self) -> Option<&dyn SubgraphOperator> {
        Some(self as &dyn SubgraphOperator)
    }
}

impl SubgraphOperator for TensorIterator {
    fn subgraphs(&self) -> SmallVec<[&Graph; 2]> {
        SmallVec::from_slice(&[&self.body])
    }
}

/// Runs a body until a trip count is reached or the body's condition output
/// becomes false.
///
/// The first two inputs are the trip count and the initial condition. A
/// negative trip count means there is no limit. Created with
/// [`LoopBuilder::new_loop`].
#[derive(Debug)]
pub struct Loop {
    body: Graph,
    input_bindings: Vec<InputBinding>,
    output_bindings: Vec<OutputBinding>,
    special_ports: SpecialBodyPorts,
}

impl Loop {
    pub fn body(&self) -> &Graph {
        &self.body
    }

    pub fn input_bindings(&self) -> &[InputBinding] {
        &self.input_bindings
    }

    pub fn output_bindings(&self) -> &[OutputBinding] {
        &self.output_bindings
    }

    pub fn special_body_ports(&self) -> SpecialBodyPorts {
        self.special_ports
    }

    fn check_control_inputs(&self, inputs: &[TensorInfo]) -> Result<(), BuildError> {
        let [trip_count, condition, ..] = inputs else {
            return Err(BuildError::invalid_argument(
                "Loop",
                "trip count and condition inputs are required",
            ));
        };
        if trip_count.dtype().is_static() && !trip_count.dtype().is_integral_number() {
            return Err(BuildError::invalid_argument(
                "Loop",
                "trip count must be an integer",
            ));
        }
        if condition.dtype().is_static() && condition.dtype() != ElementType::Boolean {
            return Err(BuildError::invalid_argument(
                "Loop",
                "condition must be a boolean",
            ));
        }
        for input in [trip_count, condition] {
            if !input.shape().num_elements().contains(1) {
                return Err(BuildError::invalid_argument(
                    "Loop",
                    "trip count and condition must have one element",
                ));
            }
        }
        Ok(())
    }

    /// Return the number of iterations implied by the trip count, the
    /// conditions and the sliced inputs.
    fn iterations(
        &self,
        inputs: &[TensorInfo],
        results: &[TensorInfo],
        num_parts: Option<Dimension>,
    ) -> Result<Dimension, BuildError> {
        let trip_count = inputs[0]
            .int_scalar_value()
            .filter(|&n| n >= 0)
            .map(|n| n as usize);
        let initial_condition = inputs[1].bool_scalar_value();

        let body_condition = match self.special_ports.condition_output {
            Some(index) => {
                let result = &results[index];
                if result.dtype().is_static() && result.dtype() != ElementType::Boolean {
                    return Err(BuildError::invalid_argument(
                        "Loop",
                        "condition output must be a boolean",
                    ));
                }
                result.bool_scalar_value()
            }
            None => Some(true),
        };

        let count = match (initial_condition, body_condition, trip_count) {
            (Some(false), _, _) => Dimension::fixed(0),
            (_, Some(true), Some(n)) => Dimension::fixed(n),
            (_, Some(true), None) => Dimension::dynamic(),
            (_, Some(false), Some(n)) => Dimension::fixed(n.min(1)),
            (_, Some(false), None) => Dimension::bounded(0, 1),
            (_, None, Some(n)) => Dimension::bounded(0, n),
            (_, None, None) => Dimension::dynamic(),
        };

        // Without a known initial condition, the body may not run at all.
        let count = match (initial_condition, count.max_length()) {
            (Some(true), _) => count,
            (_, Some(max)) => Dimension::bounded(0, max),
            (_, None) => Dimension::dynamic(),
        };

        Ok(match num_parts {
            Some(parts) => bound_by(count, parts),
            None => count,
        })
    }
}

impl Operator for Loop {
    fn name(&self) -> &str {
        LoopKind::Loop.name()
    }

    fn version(&self) -> &str {
        "opset5"
    }

    fn attributes(&self) -> Attributes {
        Attributes::new().with(
            "special_body_ports",
            self.special_ports.to_indices().to_vec(),
        )
    }

    fn infer(
        &self,
        inputs: &[TensorInfo],
        ctx: &InferContext,
    ) -> Result<Vec<TensorInfo>, BuildError> {
        self.check_control_inputs(inputs)?;
        BodyInference {
            op: LoopKind::Loop.name(),
            body: &self.body,
            input_bindings: &self.input_bindings,
            output_bindings: &self.output_bindings,
        }
        .run(inputs, ctx, |results, num_parts| {
            self.iterations(inputs, results, num_parts)
        })
    }

    fn as_subgraph_op(&self) -> Option<&dyn SubgraphOperator> {
        Some(self as &dyn SubgraphOperator)
    }
}

impl SubgraphOperator for Loop {
    fn subgraphs(&self) -> SmallVec<[&Graph; 2]> {
        SmallVec::from_slice(&[&self.body])
    }
}

/// Assembles a [`TensorIterator`] or [`Loop`] node.
///
/// Attach a body with [`set_function`](LoopBuilder::set_function), bind
/// each body parameter to an outer value, register the outputs and then
/// call [`build`](LoopBuilder::build), which infers the body and the output
/// shapes.
pub struct LoopBuilder {
    kind: LoopKind,
    name: Option<String>,
    body: Option<Graph>,

    /// Trip count and condition for a `Loop`. Empty for a `TensorIterator`.
    control_inputs: Vec<Output>,

    inputs: Vec<Output>,
    input_bindings: Vec<InputBinding>,
    output_bindings: Vec<OutputBinding>,
    special_ports: SpecialBodyPorts,
}

impl LoopBuilder {
    fn new(kind: LoopKind, control_inputs: Vec<Output>) -> LoopBuilder {
        LoopBuilder {
            kind,
            name: None,
            body: None,
            inputs: control_inputs.clone(),
            control_inputs,
            input_bindings: Vec::new(),
            output_bindings: Vec::new(),
            special_ports: SpecialBodyPorts::default(),
        }
    }

    /// Start building a `TensorIterator`.
    pub fn tensor_iterator() -> LoopBuilder {
        Self::new(LoopKind::TensorIterator, Vec::new())
    }

    /// Start building a `Loop` with a trip count and an initial condition.
    pub fn new_loop(trip_count: impl Into<Output>, condition: impl Into<Output>) -> LoopBuilder {
        Self::new(LoopKind::Loop, vec![trip_count.into(), condition.into()])
    }

    pub fn kind(&self) -> LoopKind {
        self.kind
    }

    /// Set the name of the node that will be created.
    pub fn set_name(&mut self, name: &str) {
        self.name = Some(name.to_string());
    }

    /// Attach the body.
    ///
    /// This replaces any previous body and removes existing bindings,
    /// outputs and special ports, since they refer to the old body.
    pub fn set_function(&mut self, body: Graph) {
        self.body = Some(body);
        self.inputs = self.control_inputs.clone();
        self.input_bindings.clear();
        self.output_bindings.clear();
        self.special_ports = SpecialBodyPorts::default();
    }

    pub fn body(&self) -> Option<&Graph> {
        self.body.as_ref()
    }

    fn op_name(&self) -> &'static str {
        self.kind.name()
    }

    fn require_body(&self) -> Result<&Graph, BuildError> {
        self.body
            .as_ref()
            .ok_or_else(|| BuildError::uninitialized_body(self.op_name()))
    }

    /// Return the index of an unbound body parameter.
    fn unbound_parameter(&self, param: &NodeRef) -> Result<usize, BuildError> {
        let index = self.require_body()?.parameter_index(param).ok_or_else(|| {
            BuildError::invalid_argument(self.op_name(), "node is not a parameter of the body")
        })?;
        if self.input_bindings.iter().any(|b| b.parameter() == index)
            || self.special_ports.current_iteration_input == Some(index)
        {
            return Err(BuildError::invalid_argument(
                self.op_name(),
                "body parameter is already bound",
            ));
        }
        Ok(index)
    }

    fn body_result(&self, output: &Output) -> Result<usize, BuildError> {
        self.require_body()?.result_index(output).ok_or_else(|| {
            BuildError::invalid_argument(self.op_name(), "value is not a result of the body")
        })
    }

    fn push_input(&mut self, value: Output) -> usize {
        self.inputs.push(value);
        self.inputs.len() - 1
    }

    /// Feed consecutive parts of `value` along `axis` to a body parameter.
    ///
    /// Each part has `part_size` elements along the axis.
    pub fn set_sliced_input(
        &mut self,
        parameter: &NodeRef,
        value: impl Into<Output>,
        start: i64,
        stride: i64,
        part_size: i64,
        end: i64,
        axis: i64,
    ) -> Result<(), BuildError> {
        let value = value.into();
        let slice = SliceParams {
            start,
            stride,
            part_size,
            end,
            axis,
        };
        let parameter = self.unbound_parameter(parameter)?;
        slice.validate(self.op_name())?;
        if let Some(rank) = value.shape().rank() {
            slice.resolve_axis(self.op_name(), rank)?;
        }
        let input = self.push_input(value);
        self.input_bindings.push(InputBinding::Sliced {
            parameter,
            input,
            slice,
        });
        Ok(())
    }

    /// Feed `initial` to a body parameter in the first iteration and the
    /// previous value of `body_result` in later iterations.
    pub fn set_merged_input(
        &mut self,
        parameter: &NodeRef,
        initial: impl Into<Output>,
        body_result: impl Into<Output>,
    ) -> Result<(), BuildError> {
        let parameter = self.unbound_parameter(parameter)?;
        let body_result = self.body_result(&body_result.into())?;
        let input = self.push_input(initial.into());
        self.input_bindings.push(InputBinding::Merged {
            parameter,
            input,
            body_result,
        });
        Ok(())
    }

    /// Feed the same value to a body parameter in every iteration.
    pub fn set_invariant_input(
        &mut self,
        parameter: &NodeRef,
        value: impl Into<Output>,
    ) -> Result<(), BuildError> {
        let parameter = self.unbound_parameter(parameter)?;
        let input = self.push_input(value.into());
        self.input_bindings
            .push(InputBinding::Invariant { parameter, input });
        Ok(())
    }

    /// Set the body parameter which receives the iteration index and the
    /// body result which decides whether the loop continues.
    ///
    /// `ports` is `[current_iteration_input, condition_output]`, with `-1`
    /// for an unused port. Only a `Loop` has special ports.
    pub fn set_special_body_ports(&mut self, ports: [i64; 2]) -> Result<(), BuildError> {
        let op = self.op_name();
        if self.kind != LoopKind::Loop {
            return Err(BuildError::invalid_argument(
                op,
                "only Loop has special body ports",
            ));
        }
        let body = self.require_body()?;
        let port = |index: i64, len: usize| match index {
            -1 => Ok(None),
            i if i >= 0 && (i as usize) < len => Ok(Some(i as usize)),
            _ => Err(BuildError::invalid_argument(op, "special body port is out of range")),
        };
        let current_iteration_input = port(ports[0], body.parameters().len())?;
        let condition_output = port(ports[1], body.results().len())?;

        if let Some(index) = current_iteration_input {
            if self.input_bindings.iter().any(|b| b.parameter() == index) {
                return Err(BuildError::invalid_argument(
                    op,
                    "body parameter is already bound",
                ));
            }
        }

        self.special_ports = SpecialBodyPorts {
            current_iteration_input,
            condition_output,
        };
        Ok(())
    }

    /// Add an output with the value of `body_result` in one iteration.
    ///
    /// Negative iterations count back from the last, so `-1` selects the
    /// last iteration. Returns the index of the new output.
    pub fn get_iter_value(
        &mut self,
        body_result: impl Into<Output>,
        iteration: i64,
    ) -> Result<usize, BuildError> {
        let body_result = self.body_result(&body_result.into())?;
        self.output_bindings.push(OutputBinding::IterValue {
            body_result,
            iteration: iteration.into(),
        });
        Ok(self.output_bindings.len() - 1)
    }

    /// Add an output which concatenates the values of `body_result` from
    /// every iteration along `axis`.
    ///
    /// Returns the index of the new output.
    pub fn get_concatenated_slices(
        &mut self,
        body_result: impl Into<Output>,
        start: i64,
        stride: i64,
        part_size: i64,
        end: i64,
        axis: i64,
    ) -> Result<usize, BuildError> {
        let body_result = body_result.into();
        let slice = SliceParams {
            start,
            stride,
            part_size,
            end,
            axis,
        };
        let index = self.body_result(&body_result)?;
        slice.validate(self.op_name())?;
        if let Some(rank) = body_result.shape().rank() {
            slice.resolve_axis(self.op_name(), rank)?;
        }
        self.output_bindings.push(OutputBinding::ConcatSlices {
            body_result: index,
            slice,
        });
        Ok(self.output_bindings.len() - 1)
    }

    /// Create the node, using the global [`BuildOptions`].
    pub fn build(self) -> Result<NodeRef, BuildError> {
        self.build_with_options(BuildOptions::global())
    }

    /// Create the node.
    ///
    /// Fails if no body was attached, if a body parameter is not bound or if
    /// inference of the body fails.
    pub fn build_with_options(self, options: &BuildOptions) -> Result<NodeRef, BuildError> {
        let op_name = self.op_name();
        let body = self
            .body
            .ok_or_else(|| BuildError::uninitialized_body(op_name))?;

        for index in 0..body.parameters().len() {
            let bound = self.input_bindings.iter().any(|b| b.parameter() == index)
                || self.special_ports.current_iteration_input == Some(index);
            if !bound {
                return Err(BuildError::invalid_argument(
                    op_name,
                    "body parameter is not bound to an input",
                ));
            }
        }

        let op: Box<dyn Operator + Send + Sync> = match self.kind {
            LoopKind::TensorIterator => Box::new(TensorIterator {
                body,
                input_bindings: self.input_bindings,
                output_bindings: self.output_bindings,
            }),
            LoopKind::Loop => Box::new(Loop {
                body,
                input_bindings: self.input_bindings,
                output_bindings: self.output_bindings,
                special_ports: self.special_ports,
            }),
        };
        NodeRef::new(op, self.inputs, self.name, &InferContext::new(options))
    }
}
