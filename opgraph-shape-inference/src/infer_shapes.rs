//! Traits for shape inference and common implementations.

use std::error::Error;
use std::fmt;
use std::str::FromStr;

use smallvec::SmallVec;

use crate::dimension::Dimension;
use crate::element_type::ElementType;
use crate::tensor_info::TensorInfo;

/// Errors produced when an operator's inputs or attributes violate its
/// preconditions.
#[derive(Clone, Debug, PartialEq)]
pub enum InferShapesError {
    /// Two element types that must agree are both known and different.
    TypeMismatch(ElementType, ElementType),

    /// A shape has a different rank than expected.
    RankMismatch { expected: usize, actual: usize },

    /// Two dimensions that must agree have no size in common.
    DimensionMismatch(Dimension, Dimension),

    /// Two dimensions cannot be broadcast together.
    BroadcastError(Dimension, Dimension),

    /// Too many or too few inputs were provided for this operator.
    InvalidArgumentCount {
        min: usize,
        max: usize,
        actual: usize,
    },

    /// An operator input or attribute has an invalid value.
    InvalidArgument(&'static str),

    /// A windowed operator would produce an output with no elements.
    InvalidKernel(&'static str),

    /// Slicing parameters for an axis are invalid.
    InvalidSlicingParams(&'static str),
}

impl fmt::Display for InferShapesError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TypeMismatch(a, b) => write!(f, "element types {} and {} do not match", a, b),
            Self::RankMismatch { expected, actual } => {
                write!(f, "expected rank {} but got {}", expected, actual)
            }
            Self::DimensionMismatch(a, b) => write!(f, "dimensions {} and {} do not match", a, b),
            Self::BroadcastError(a, b) => {
                write!(f, "dimensions {} and {} cannot be broadcast", a, b)
            }
            Self::InvalidArgumentCount { min, max, actual } if min == max => {
                write!(f, "expected {} inputs but got {}", min, actual)
            }
            Self::InvalidArgumentCount { min, max, actual } => {
                write!(f, "expected {}..={} inputs but got {}", min, max, actual)
            }
            Self::InvalidArgument(msg) => write!(f, "invalid argument: {}", msg),
            Self::InvalidKernel(msg) => write!(f, "invalid kernel: {}", msg),
            Self::InvalidSlicingParams(msg) => write!(f, "invalid slicing parameters: {}", msg),
        }
    }
}

impl Error for InferShapesError {}

/// Infer the types and shapes of an operator's outputs given its inputs.
pub trait InferShapes {
    /// Compute the outputs of an operator from descriptions of its inputs.
    ///
    /// Implementations must not assume more about the inputs than they
    /// describe. If an input has a dynamic rank for example, outputs whose
    /// shapes depend on it should also be dynamic.
    fn infer_shapes(&self, inputs: &[TensorInfo]) -> Result<Vec<TensorInfo>, InferShapesError>;
}

/// Broadcasting rule applied by elementwise operators.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum AutoBroadcast {
    /// Inputs must have the same shape.
    None,
    /// NumPy-style broadcasting.
    #[default]
    Numpy,
}

impl AutoBroadcast {
    pub fn name(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Numpy => "numpy",
        }
    }
}

impl FromStr for AutoBroadcast {
    type Err = InferShapesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "none" | "explicit" => Ok(Self::None),
            "numpy" => Ok(Self::Numpy),
            _ => Err(InferShapesError::InvalidArgument(
                "unsupported broadcast type",
            )),
        }
    }
}

/// Shape inference for unary operators.
///
/// These operators return a single output with the same type and shape as
/// their first input.
pub struct UnaryOp;

impl InferShapes for UnaryOp {
    fn infer_shapes(&self, inputs: &[TensorInfo]) -> Result<Vec<TensorInfo>, InferShapesError> {
        check_input_count(inputs, 1, 1)?;
        Ok([inputs[0].without_value()].into())
    }
}

/// Shape inference for unary operators which require a floating point input
/// and produce a fixed output type, such as `IsNaN`.
pub struct PredicateOp {
    pub output_type: ElementType,
}

impl InferShapes for PredicateOp {
    fn infer_shapes(&self, inputs: &[TensorInfo]) -> Result<Vec<TensorInfo>, InferShapesError> {
        check_input_count(inputs, 1, 1)?;
        let data = &inputs[0];
        if data.dtype().is_static() && !data.dtype().is_real() {
            return Err(InferShapesError::InvalidArgument(
                "input must be a floating point tensor",
            ));
        }
        Ok([TensorInfo::new(self.output_type, data.shape().clone())].into())
    }
}

/// Shape inference for elementwise binary operators.
///
/// The output shape is the broadcast of the two input shapes and the output
/// type is the merge of the input types.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct BinaryOp {
    pub auto_broadcast: AutoBroadcast,
}

impl InferShapes for BinaryOp {
    fn infer_shapes(&self, inputs: &[TensorInfo]) -> Result<Vec<TensorInfo>, InferShapesError> {
        let [a, b] = inputs else {
            return Err(input_count_error(inputs, 2, 2));
        };
        let dtype = a.dtype().merge(b.dtype())?;
        let shape = match self.auto_broadcast {
            AutoBroadcast::Numpy => a.shape().broadcast(b.shape())?,
            AutoBroadcast::None => a.shape().merge(b.shape())?,
        };
        Ok([TensorInfo::new(dtype, shape)].into())
    }
}

/// Check that the number of inputs is in `[min, max]`.
pub(crate) fn check_input_count(
    inputs: &[TensorInfo],
    min: usize,
    max: usize,
) -> Result<(), InferShapesError> {
    if inputs.len() < min || inputs.len() > max {
        return Err(input_count_error(inputs, min, max));
    }
    Ok(())
}

pub(crate) fn input_count_error(inputs: &[TensorInfo], min: usize, max: usize) -> InferShapesError {
    InferShapesError::InvalidArgumentCount {
        min,
        max,
        actual: inputs.len(),
    }
}

/// Check that `input` has rank `rank`, if its rank is known.
pub(crate) fn check_rank(input: &TensorInfo, rank: usize) -> Result<(), InferShapesError> {
    match input.rank() {
        Some(actual) if actual != rank => Err(InferShapesError::RankMismatch {
            expected: rank,
            actual,
        }),
        _ => Ok(()),
    }
}

/// Merge the element types of several inputs.
pub(crate) fn merge_dtypes<'a>(
    inputs: impl IntoIterator<Item = &'a TensorInfo>,
) -> Result<ElementType, InferShapesError> {
    inputs
        .into_iter()
        .try_fold(ElementType::Dynamic, |acc, info| acc.merge(info.dtype()))
}

/// Merge a sequence of dimensions which must all refer to the same size.
pub(crate) fn merge_dims(
    dims: impl IntoIterator<Item = Dimension>,
) -> Result<Dimension, InferShapesError> {
    dims.into_iter()
        .try_fold(Dimension::dynamic(), |acc, dim| acc.merge(&dim))
}

/// Resolve an axis given as a value in `[-ndim, ndim-1]` to the zero-based
/// dimension of a tensor with `ndim` dimensions.
///
/// Negative axis values count backwards from the last dimension.
pub(crate) fn resolve_axis(ndim: usize, axis: i64) -> Result<usize, InferShapesError> {
    let len = ndim as i64;
    if axis < -len || axis >= len {
        return Err(InferShapesError::InvalidArgument("axis is out of range"));
    }
    Ok(if axis >= 0 { axis } else { len + axis } as usize)
}

/// Resolve a sequence of axes values in `[-ndim, ndim-1]` to zero-based
/// dimension indexes.
pub(crate) fn resolve_axes(
    ndim: usize,
    axes: &[i64],
) -> Result<SmallVec<[usize; 4]>, InferShapesError> {
    axes.iter().map(|&axis| resolve_axis(ndim, axis)).collect()
}

#[cfg(test)]
mod tests {
    use opgraph_testing::TestCases;

    use super::{AutoBroadcast, BinaryOp, InferShapes, InferShapesError, PredicateOp, UnaryOp};
    use crate::{shape, Dimension, ElementType, PartialShape, TensorInfo};

    fn f32_tensor(shape: PartialShape) -> TensorInfo {
        TensorInfo::new(ElementType::F32, shape)
    }

    #[test]
    fn test_binary_op() {
        #[derive(Debug)]
        struct Case {
            lhs: TensorInfo,
            rhs: TensorInfo,
            auto_broadcast: AutoBroadcast,
            expected: Result<TensorInfo, InferShapesError>,
        }

        let cases = [
            Case {
                lhs: f32_tensor(shape![8, 1, 6, 1]),
                rhs: f32_tensor(shape![7, 1, 5]),
                auto_broadcast: AutoBroadcast::Numpy,
                expected: Ok(f32_tensor(shape![8, 7, 6, 5])),
            },
            Case {
                lhs: f32_tensor(shape![2, 2]),
                rhs: TensorInfo::new(ElementType::Dynamic, shape![2, 2]),
                auto_broadcast: AutoBroadcast::None,
                expected: Ok(f32_tensor(shape![2, 2])),
            },
            Case {
                lhs: f32_tensor(shape![2, 2]),
                rhs: f32_tensor(shape![2]),
                auto_broadcast: AutoBroadcast::None,
                expected: Err(InferShapesError::RankMismatch {
                    expected: 2,
                    actual: 1,
                }),
            },
            Case {
                lhs: f32_tensor(shape![3]),
                rhs: TensorInfo::new(ElementType::I32, shape![3]),
                auto_broadcast: AutoBroadcast::Numpy,
                expected: Err(InferShapesError::TypeMismatch(
                    ElementType::F32,
                    ElementType::I32,
                )),
            },
            Case {
                lhs: f32_tensor(shape![3]),
                rhs: f32_tensor(shape![4]),
                auto_broadcast: AutoBroadcast::Numpy,
                expected: Err(InferShapesError::BroadcastError(
                    Dimension::fixed(3),
                    Dimension::fixed(4),
                )),
            },
        ];

        cases.test_each(|case| {
            let op = BinaryOp {
                auto_broadcast: case.auto_broadcast,
            };
            let result = op
                .infer_shapes(&[case.lhs.clone(), case.rhs.clone()])
                .map(|mut outputs| outputs.remove(0));
            assert_eq!(result, case.expected);
        })
    }

    #[test]
    fn test_unary_op() {
        let input = TensorInfo::from_ints(&[1, 2, 3]);
        let result = UnaryOp.infer_shapes(&[input]).unwrap();
        assert_eq!(result[0], TensorInfo::new(ElementType::I64, shape![3]));

        let err = UnaryOp.infer_shapes(&[]).err().unwrap();
        assert_eq!(
            err,
            InferShapesError::InvalidArgumentCount {
                min: 1,
                max: 1,
                actual: 0
            }
        );
    }

    #[test]
    fn test_predicate_op() {
        let op = PredicateOp {
            output_type: ElementType::Boolean,
        };
        let result = op.infer_shapes(&[f32_tensor(shape![2, 3])]).unwrap();
        assert_eq!(result[0].dtype(), ElementType::Boolean);
        assert_eq!(result[0].shape(), &shape![2, 3]);

        let ints = TensorInfo::new(ElementType::I32, shape![2]);
        assert!(op.infer_shapes(&[ints]).is_err());
    }

    #[test]
    fn test_resolve_axis() {
        assert_eq!(super::resolve_axis(4, -1), Ok(3));
        assert_eq!(super::resolve_axis(4, 0), Ok(0));
        assert!(super::resolve_axis(4, 4).is_err());
        assert!(super::resolve_axis(4, -5).is_err());
    }
}
