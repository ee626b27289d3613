use std::str::FromStr;

use crate::dimension::Dimension;
use crate::infer_shapes::{check_input_count, check_rank, merge_dtypes, InferShapes, InferShapesError};
use crate::partial_shape::PartialShape;
use crate::tensor_info::TensorInfo;

/// The recurrent unit computed at each step.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum CellKind {
    Lstm,
    Gru,
    Rnn,
}

impl CellKind {
    /// Number of gates whose weights are stacked in `W` and `R`.
    pub fn gates(self) -> usize {
        match self {
            Self::Lstm => 4,
            Self::Gru => 3,
            Self::Rnn => 1,
        }
    }

    /// Number of state tensors (hidden, plus cell state for LSTM).
    pub fn states(self) -> usize {
        match self {
            Self::Lstm => 2,
            Self::Gru | Self::Rnn => 1,
        }
    }

    /// Number of activation functions the cell uses.
    pub fn activations(self) -> usize {
        match self {
            Self::Lstm => 3,
            Self::Gru => 2,
            Self::Rnn => 1,
        }
    }
}

/// Direction in which a sequence is processed.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum Direction {
    #[default]
    Forward,
    Reverse,
    Bidirectional,
}

impl Direction {
    pub fn name(self) -> &'static str {
        match self {
            Self::Forward => "forward",
            Self::Reverse => "reverse",
            Self::Bidirectional => "bidirectional",
        }
    }

    pub fn num_directions(self) -> usize {
        match self {
            Self::Forward | Self::Reverse => 1,
            Self::Bidirectional => 2,
        }
    }
}

impl FromStr for Direction {
    type Err = InferShapesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "forward" => Ok(Self::Forward),
            "reverse" => Ok(Self::Reverse),
            "bidirectional" => Ok(Self::Bidirectional),
            _ => Err(InferShapesError::InvalidArgument("unsupported direction")),
        }
    }
}

/// Merge `other` into `dim`, reporting a mismatch as an invalid argument.
fn merge_into(dim: &mut Dimension, other: Dimension, msg: &'static str) -> Result<(), InferShapesError> {
    *dim = dim
        .merge(&other)
        .map_err(|_| InferShapesError::InvalidArgument(msg))?;
    Ok(())
}

/// Number of bias rows per hidden unit.
fn bias_gates(kind: CellKind, linear_before_reset: bool) -> usize {
    if kind == CellKind::Gru && linear_before_reset {
        4
    } else {
        kind.gates()
    }
}

/// Dimensions shared by the inputs of a recurrent operator, refined as each
/// input is checked.
struct RecurrentDims {
    batch: Dimension,
    input_size: Dimension,
    hidden: Dimension,
    gate_rows: Dimension,
    bias_rows: Dimension,
}

impl RecurrentDims {
    fn new(
        kind: CellKind,
        hidden_size: usize,
        linear_before_reset: bool,
    ) -> Result<RecurrentDims, InferShapesError> {
        if hidden_size == 0 {
            return Err(InferShapesError::InvalidArgument(
                "hidden_size must be positive",
            ));
        }
        Ok(RecurrentDims {
            batch: Dimension::dynamic(),
            input_size: Dimension::dynamic(),
            hidden: Dimension::fixed(hidden_size),
            gate_rows: Dimension::fixed(kind.gates() * hidden_size),
            bias_rows: Dimension::fixed(bias_gates(kind, linear_before_reset) * hidden_size),
        })
    }

    /// Check the trailing `[gates * hidden, input_size]` and
    /// `[gates * hidden, hidden]` dimensions of the weights.
    fn check_weights(&mut self, w: &[Dimension], r: &[Dimension]) -> Result<(), InferShapesError> {
        let msg = "W and R must have gates × hidden_size rows";
        merge_into(&mut self.gate_rows, w[0], msg)?;
        merge_into(&mut self.gate_rows, r[0], msg)?;
        merge_into(
            &mut self.input_size,
            w[1],
            "W columns must match the input size",
        )?;
        merge_into(
            &mut self.hidden,
            r[1],
            "R columns must match hidden_size",
        )
    }

    fn check_bias(&mut self, bias_rows: Dimension) -> Result<(), InferShapesError> {
        merge_into(
            &mut self.bias_rows,
            bias_rows,
            "B must have gates × hidden_size elements",
        )
    }
}

/// Return the dims of `input`, which must have rank `rank`. Inputs with
/// dynamic rank are treated as having all dims dynamic.
fn ranked_dims(input: &TensorInfo, rank: usize) -> Result<Vec<Dimension>, InferShapesError> {
    check_rank(input, rank)?;
    Ok((0..rank).map(|i| input.dim(i)).collect())
}

/// A single step of a recurrent network.
///
/// Inputs are `X`, the initial states (`H`, plus `C` for LSTM), `W`, `R` and
/// optionally `B`. Each state output has shape `[batch, hidden_size]`.
pub struct RecurrentCell {
    pub kind: CellKind,
    pub hidden_size: usize,
    pub linear_before_reset: bool,
}

impl InferShapes for RecurrentCell {
    fn infer_shapes(&self, inputs: &[TensorInfo]) -> Result<Vec<TensorInfo>, InferShapesError> {
        let n_states = self.kind.states();
        check_input_count(inputs, 3 + n_states, 4 + n_states)?;
        let mut dims = RecurrentDims::new(self.kind, self.hidden_size, self.linear_before_reset)?;

        let x = ranked_dims(&inputs[0], 2)?;
        merge_into(&mut dims.batch, x[0], "batch size mismatch")?;
        merge_into(&mut dims.input_size, x[1], "input size mismatch")?;

        for state in &inputs[1..1 + n_states] {
            let state = ranked_dims(state, 2)?;
            merge_into(&mut dims.batch, state[0], "batch size mismatch")?;
            merge_into(
                &mut dims.hidden,
                state[1],
                "state size does not match hidden_size",
            )?;
        }

        let w = ranked_dims(&inputs[1 + n_states], 2)?;
        let r = ranked_dims(&inputs[2 + n_states], 2)?;
        dims.check_weights(&w, &r)?;

        if let Some(bias) = inputs.get(3 + n_states) {
            let bias = ranked_dims(bias, 1)?;
            dims.check_bias(bias[0])?;
        }

        let dtype = merge_dtypes(inputs)?;
        let shape = PartialShape::from_dims([dims.batch, dims.hidden]);
        Ok(vec![TensorInfo::new(dtype, shape); n_states])
    }
}

/// A recurrent network applied over a whole sequence.
///
/// Inputs are `X` (`[batch, seq_len, input_size]`), the initial states
/// (`[batch, num_directions, hidden_size]`), `sequence_lengths`, `W`, `R` and
/// `B`, where the weights have a leading `num_directions` dimension.
///
/// Outputs are `Y` (`[batch, num_directions, seq_len, hidden_size]`)
/// followed by the final states.
pub struct RecurrentSequence {
    pub kind: CellKind,
    pub hidden_size: usize,
    pub direction: Direction,
    pub linear_before_reset: bool,
}

impl InferShapes for RecurrentSequence {
    fn infer_shapes(&self, inputs: &[TensorInfo]) -> Result<Vec<TensorInfo>, InferShapesError> {
        let n_states = self.kind.states();
        let n_inputs = 5 + n_states;
        check_input_count(inputs, n_inputs, n_inputs)?;
        let mut dims = RecurrentDims::new(self.kind, self.hidden_size, self.linear_before_reset)?;
        let mut num_directions = Dimension::fixed(self.direction.num_directions());
        let dirs_msg = "num_directions does not match direction";

        let x = ranked_dims(&inputs[0], 3)?;
        merge_into(&mut dims.batch, x[0], "batch size mismatch")?;
        merge_into(&mut dims.input_size, x[2], "input size mismatch")?;
        let seq_len = x[1];

        for state in &inputs[1..1 + n_states] {
            let state = ranked_dims(state, 3)?;
            merge_into(&mut dims.batch, state[0], "batch size mismatch")?;
            merge_into(&mut num_directions, state[1], dirs_msg)?;
            merge_into(
                &mut dims.hidden,
                state[2],
                "state size does not match hidden_size",
            )?;
        }

        let seq_lengths = &inputs[1 + n_states];
        let lengths = ranked_dims(seq_lengths, 1)?;
        merge_into(&mut dims.batch, lengths[0], "batch size mismatch")?;
        if seq_lengths.dtype().is_static() && !seq_lengths.dtype().is_integral_number() {
            return Err(InferShapesError::InvalidArgument(
                "sequence lengths must be integers",
            ));
        }

        let w = ranked_dims(&inputs[2 + n_states], 3)?;
        let r = ranked_dims(&inputs[3 + n_states], 3)?;
        let b = ranked_dims(&inputs[4 + n_states], 2)?;
        for dirs in [w[0], r[0], b[0]] {
            merge_into(&mut num_directions, dirs, dirs_msg)?;
        }
        dims.check_weights(&w[1..], &r[1..])?;
        dims.check_bias(b[1])?;

        let dtype = merge_dtypes(
            inputs
                .iter()
                .enumerate()
                .filter(|(i, _)| *i != 1 + n_states)
                .map(|(_, input)| input),
        )?;

        let y = PartialShape::from_dims([dims.batch, num_directions, seq_len, dims.hidden]);
        let state = PartialShape::from_dims([dims.batch, num_directions, dims.hidden]);
        let mut outputs = vec![TensorInfo::new(dtype, y)];
        outputs.extend((0..n_states).map(|_| TensorInfo::new(dtype, state.clone())));
        Ok(outputs)
    }
}
