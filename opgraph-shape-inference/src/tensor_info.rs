//! Type, shape and optionally contents of a value in the graph.

use crate::dimension::Dimension;
use crate::element_type::ElementType;
use crate::partial_shape::PartialShape;

/// Known contents of a tensor, stored in row-major order.
///
/// Integer element types of any width are stored as `Int`, floating point
/// types as `Float`.
#[derive(Clone, Debug, PartialEq)]
pub enum ConstData {
    Bool(Vec<bool>),
    Int(Vec<i64>),
    Float(Vec<f64>),
}

impl ConstData {
    pub fn len(&self) -> usize {
        match self {
            Self::Bool(v) => v.len(),
            Self::Int(v) => v.len(),
            Self::Float(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Return the values as integers.
    ///
    /// Booleans convert to 0 or 1. Floats are not converted.
    pub fn to_ints(&self) -> Option<Vec<i64>> {
        match self {
            Self::Bool(v) => Some(v.iter().map(|&b| b as i64).collect()),
            Self::Int(v) => Some(v.clone()),
            Self::Float(_) => None,
        }
    }

    /// Return the values as floats.
    pub fn to_floats(&self) -> Option<Vec<f64>> {
        match self {
            Self::Bool(_) => None,
            Self::Int(v) => Some(v.iter().map(|&x| x as f64).collect()),
            Self::Float(v) => Some(v.clone()),
        }
    }

    /// Return the values as booleans, treating non-zero integers as true.
    pub fn to_bools(&self) -> Option<Vec<bool>> {
        match self {
            Self::Bool(v) => Some(v.clone()),
            Self::Int(v) => Some(v.iter().map(|&x| x != 0).collect()),
            Self::Float(_) => None,
        }
    }
}

/// Description of a value flowing along a graph edge.
///
/// This is the unit shape inference operates on. Each operator input and
/// output is described by an element type and a partial shape. If the value
/// is computed only from constants, its contents may also be known, which
/// lets operators such as `Range` or `Slice` compute exact output shapes.
#[derive(Clone, Debug, PartialEq)]
pub struct TensorInfo {
    dtype: ElementType,
    shape: PartialShape,
    value: Option<ConstData>,
}

impl TensorInfo {
    pub fn new(dtype: ElementType, shape: PartialShape) -> TensorInfo {
        TensorInfo {
            dtype,
            shape,
            value: None,
        }
    }

    /// Create a description of a value with unknown type and shape.
    pub fn unknown() -> TensorInfo {
        Self::new(ElementType::Dynamic, PartialShape::dynamic())
    }

    /// Create a description of a constant.
    pub fn constant(dtype: ElementType, shape: PartialShape, value: ConstData) -> TensorInfo {
        TensorInfo {
            dtype,
            shape,
            value: Some(value),
        }
    }

    /// Create a 1D `i64` constant.
    pub fn from_ints(values: &[i64]) -> TensorInfo {
        Self::constant(
            ElementType::I64,
            PartialShape::from_static(&[values.len()]),
            ConstData::Int(values.to_vec()),
        )
    }

    /// Create a scalar `i64` constant.
    pub fn int_scalar(value: i64) -> TensorInfo {
        Self::constant(
            ElementType::I64,
            PartialShape::scalar(),
            ConstData::Int(vec![value]),
        )
    }

    pub fn dtype(&self) -> ElementType {
        self.dtype
    }

    pub fn shape(&self) -> &PartialShape {
        &self.shape
    }

    pub fn rank(&self) -> Option<usize> {
        self.shape.rank()
    }

    /// Return the size of dimension `index`, or a dynamic dimension if the
    /// rank is unknown.
    pub fn dim(&self, index: usize) -> Dimension {
        self.shape.dim(index).unwrap_or_default()
    }

    pub fn value(&self) -> Option<&ConstData> {
        self.value.as_ref()
    }

    /// Return the contents as integers, if known.
    pub fn ints(&self) -> Option<Vec<i64>> {
        self.value.as_ref().and_then(|v| v.to_ints())
    }

    /// Return the contents as floats, if known.
    pub fn floats(&self) -> Option<Vec<f64>> {
        self.value.as_ref().and_then(|v| v.to_floats())
    }

    /// Return the single integer value of a scalar or one-element tensor.
    pub fn int_scalar_value(&self) -> Option<i64> {
        match self.ints()?.as_slice() {
            [x] => Some(*x),
            _ => None,
        }
    }

    /// Return the single boolean value of a scalar or one-element tensor.
    pub fn bool_scalar_value(&self) -> Option<bool> {
        match self.value.as_ref()?.to_bools()?.as_slice() {
            [x] => Some(*x),
            _ => None,
        }
    }

    /// Return a copy of this description with the contents discarded.
    pub fn without_value(&self) -> TensorInfo {
        Self::new(self.dtype, self.shape.clone())
    }

    pub fn with_dtype(mut self, dtype: ElementType) -> TensorInfo {
        self.dtype = dtype;
        self
    }

    pub fn with_shape(mut self, shape: PartialShape) -> TensorInfo {
        self.shape = shape;
        self.value = None;
        self
    }
}
