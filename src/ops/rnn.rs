use opgraph_shape_inference::ops::{self as rules, CellKind, Direction};
use opgraph_shape_inference::{InferShapes, InferShapesError};

use crate::ops::check_choice;

/// Activation functions applied by a cell when none are specified.
fn default_activations(kind: CellKind) -> Vec<String> {
    let names: &[&str] = match kind {
        CellKind::Lstm => &["sigmoid", "tanh", "tanh"],
        CellKind::Gru => &["sigmoid", "tanh"],
        CellKind::Rnn => &["tanh"],
    };
    names.iter().map(|name| name.to_string()).collect()
}

/// Check the `activations`, `activations_alpha` and `activations_beta`
/// attributes of a recurrent operator.
fn check_activations(
    kind: CellKind,
    activations: &[String],
    alpha: &[f32],
    beta: &[f32],
    clip: f32,
) -> Result<(), InferShapesError> {
    if activations.len() != kind.activations() {
        return Err(InferShapesError::InvalidArgument(
            "wrong number of activation functions",
        ));
    }
    for name in activations {
        check_choice(
            name,
            &["relu", "sigmoid", "tanh"],
            "unsupported activation function",
        )?;
    }
    if alpha.len() > activations.len() || beta.len() > activations.len() {
        return Err(InferShapesError::InvalidArgument(
            "too many activation parameters",
        ));
    }
    if clip < 0. || clip.is_nan() {
        return Err(InferShapesError::InvalidArgument("clip must not be negative"));
    }
    Ok(())
}

define_op!(
    /// One step of an LSTM. Outputs the new hidden and cell states.
    LstmCell("LSTMCell", "opset4") {
        hidden_size: usize,
        activations: Vec<String> = default_activations(CellKind::Lstm),
        activations_alpha: Vec<f32> = Vec::new(),
        activations_beta: Vec<f32> = Vec::new(),
        clip: f32 = 0.,
    }
    |op, inputs| {
        check_activations(
            CellKind::Lstm,
            &op.activations,
            &op.activations_alpha,
            &op.activations_beta,
            op.clip,
        )?;
        rules::RecurrentCell {
            kind: CellKind::Lstm,
            hidden_size: op.hidden_size,
            linear_before_reset: false,
        }
        .infer_shapes(inputs)
    }
);

define_op!(
    /// One step of a GRU.
    GruCell("GRUCell", "opset3") {
        hidden_size: usize,
        activations: Vec<String> = default_activations(CellKind::Gru),
        activations_alpha: Vec<f32> = Vec::new(),
        activations_beta: Vec<f32> = Vec::new(),
        clip: f32 = 0.,
        linear_before_reset: bool = false,
    }
    |op, inputs| {
        check_activations(
            CellKind::Gru,
            &op.activations,
            &op.activations_alpha,
            &op.activations_beta,
            op.clip,
        )?;
        rules::RecurrentCell {
            kind: CellKind::Gru,
            hidden_size: op.hidden_size,
            linear_before_reset: op.linear_before_reset,
        }
        .infer_shapes(inputs)
    }
);

define_op!(
    /// One step of a vanilla recurrent network.
    RnnCell("RNNCell", "opset1") {
        hidden_size: usize,
        activations: Vec<String> = default_activations(CellKind::Rnn),
        activations_alpha: Vec<f32> = Vec::new(),
        activations_beta: Vec<f32> = Vec::new(),
        clip: f32 = 0.,
    }
    |op, inputs| {
        check_activations(
            CellKind::Rnn,
            &op.activations,
            &op.activations_alpha,
            &op.activations_beta,
            op.clip,
        )?;
        rules::RecurrentCell {
            kind: CellKind::Rnn,
            hidden_size: op.hidden_size,
            linear_before_reset: false,
        }
        .infer_shapes(inputs)
    }
);

define_op!(
    /// LSTM over a batch of sequences. Outputs `Y`, `Ho` and `Co`.
    LstmSequence("LSTMSequence", "opset5") {
        hidden_size: usize,
        direction: Direction,
        activations: Vec<String> = default_activations(CellKind::Lstm),
        activations_alpha: Vec<f32> = Vec::new(),
        activations_beta: Vec<f32> = Vec::new(),
        clip: f32 = 0.,
    }
    |op, inputs| {
        check_activations(
            CellKind::Lstm,
            &op.activations,
            &op.activations_alpha,
            &op.activations_beta,
            op.clip,
        )?;
        rules::RecurrentSequence {
            kind: CellKind::Lstm,
            hidden_size: op.hidden_size,
            direction: op.direction,
            linear_before_reset: false,
        }
        .infer_shapes(inputs)
    }
);

define_op!(
    /// GRU over a batch of sequences. Outputs `Y` and `Ho`.
    GruSequence("GRUSequence", "opset5") {
        hidden_size: usize,
        direction: Direction,
        activations: Vec<String> = default_activations(CellKind::Gru),
        activations_alpha: Vec<f32> = Vec::new(),
        activations_beta: Vec<f32> = Vec::new(),
        clip: f32 = 0.,
        linear_before_reset: bool = false,
    }
    |op, inputs| {
        check_activations(
            CellKind::Gru,
            &op.activations,
            &op.activations_alpha,
            &op.activations_beta,
            op.clip,
        )?;
        rules::RecurrentSequence {
            kind: CellKind::Gru,
            hidden_size: op.hidden_size,
            direction: op.direction,
            linear_before_reset: op.linear_before_reset,
        }
        .infer_shapes(inputs)
    }
);

define_op!(
    /// Vanilla recurrent network over a batch of sequences.
    RnnSequence("RNNSequence", "opset5") {
        hidden_size: usize,
        direction: Direction,
        activations: Vec<String> = default_activations(CellKind::Rnn),
        activations_alpha: Vec<f32> = Vec::new(),
        activations_beta: Vec<f32> = Vec::new(),
        clip: f32 = 0.,
    }
    |op, inputs| {
        check_activations(
            CellKind::Rnn,
            &op.activations,
            &op.activations_alpha,
            &op.activations_beta,
            op.clip,
        )?;
        rules::RecurrentSequence {
            kind: CellKind::Rnn,
            hidden_size: op.hidden_size,
            direction: op.direction,
            linear_before_reset: false,
        }
        .infer_shapes(inputs)
    }
);
