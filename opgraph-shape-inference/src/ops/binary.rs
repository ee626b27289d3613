use crate::infer_shapes::{AutoBroadcast, BinaryOp, InferShapes, InferShapesError};
use crate::tensor_info::{ConstData, TensorInfo};

/// Evaluate an integer binary operation on the known contents of two tensors.
///
/// Returns `None` if either value is unknown, not an integer, or if the
/// inputs are not scalars or vectors that can be combined elementwise.
fn eval_int_binary(
    lhs: &TensorInfo,
    rhs: &TensorInfo,
    output: &TensorInfo,
    op: impl Fn(i64, i64) -> Option<i64>,
) -> Option<TensorInfo> {
    if lhs.dtype().is_real() || rhs.dtype().is_real() {
        return None;
    }
    let x = lhs.ints()?;
    let y = rhs.ints()?;
    let values: Option<Vec<i64>> = match (x.len(), y.len()) {
        (1, _) => y.iter().map(|&y| op(x[0], y)).collect(),
        (_, 1) => x.iter().map(|&x| op(x, y[0])).collect(),
        (a, b) if a == b => x.iter().zip(&y).map(|(&x, &y)| op(x, y)).collect(),
        _ => None,
    };
    let values = values?;
    let shape = output.shape();
    if shape.to_shape()?.iter().product::<usize>() != values.len() {
        return None;
    }
    Some(TensorInfo::constant(
        output.dtype(),
        shape.clone(),
        ConstData::Int(values),
    ))
}

/// Integer division rounding towards negative infinity.
fn floor_div(x: i64, y: i64) -> Option<i64> {
    let q = x.checked_div(y)?;
    if x % y != 0 && ((x < 0) != (y < 0)) {
        Some(q - 1)
    } else {
        Some(q)
    }
}

fn floor_mod(x: i64, y: i64) -> Option<i64> {
    Some(x - floor_div(x, y)? * y)
}

macro_rules! binary_op {
    ($(#[$meta:meta])* $name:ident, $eval:expr) => {
        $(#[$meta])*
        #[derive(Clone, Debug, Default, PartialEq)]
        pub struct $name {
            pub auto_broadcast: AutoBroadcast,
        }

        impl InferShapes for $name {
            fn infer_shapes(
                &self,
                inputs: &[TensorInfo],
            ) -> Result<Vec<TensorInfo>, InferShapesError> {
                let op = BinaryOp {
                    auto_broadcast: self.auto_broadcast,
                };
                let mut outputs = op.infer_shapes(inputs)?;
                if let Some(value) = eval_int_binary(&inputs[0], &inputs[1], &outputs[0], $eval) {
                    outputs[0] = value;
                }
                Ok(outputs)
            }
        }
    };
}

binary_op!(
    /// Elementwise addition.
    Add,
    |x: i64, y: i64| x.checked_add(y)
);
binary_op!(
    /// Elementwise subtraction.
    Subtract,
    |x: i64, y: i64| x.checked_sub(y)
);
binary_op!(
    /// Elementwise multiplication.
    Multiply,
    |x: i64, y: i64| x.checked_mul(y)
);
binary_op!(
    /// Elementwise division. Integer division rounds towards negative
    /// infinity.
    Divide,
    floor_div
);
binary_op!(
    /// Elementwise remainder of floor division. The result has the sign of
    /// the divisor.
    FloorMod,
    floor_mod
);
binary_op!(
    /// Elementwise maximum.
    Maximum,
    |x: i64, y: i64| Some(x.max(y))
);
binary_op!(
    /// Elementwise minimum.
    Minimum,
    |x: i64, y: i64| Some(x.min(y))
);
binary_op!(
    /// Elementwise power.
    Power,
    |x: i64, y: i64| u32::try_from(y).ok().and_then(|y| x.checked_pow(y))
);
