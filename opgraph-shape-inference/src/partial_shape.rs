//! Tensor shapes with possibly unknown rank and dimensions.

use std::fmt;
use std::ops::Index;

use smallvec::SmallVec;

use crate::dimension::Dimension;
use crate::infer_shapes::InferShapesError;

type DimVec = SmallVec<[Dimension; 4]>;

/// Shape of a tensor whose rank or dimension sizes may not be fully known.
///
/// A shape either has a dynamic rank, in which case nothing is known about
/// it, or is a sequence of [`Dimension`]s.
#[derive(Clone, Debug, Default, Eq, Hash, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PartialShape {
    dims: Option<DimVec>,
}

/// Construct a [`PartialShape`] from a list of dimensions.
///
/// Each item can be anything convertible into a [`Dimension`]: a `usize`,
/// a `(min, max)` tuple or a `Dimension`.
///
/// ```
/// use opgraph_shape_inference::{shape, Dimension};
///
/// let s = shape![1, (1, 24), Dimension::dynamic(), 4];
/// assert_eq!(s.to_string(), "[1,1..24,?,4]");
/// ```
#[macro_export]
macro_rules! shape {
    ($($dim:expr),* $(,)?) => {
        $crate::PartialShape::from_dims([$($crate::Dimension::from($dim)),*])
    };
}

impl PartialShape {
    /// Create a shape with dynamic rank.
    pub fn dynamic() -> PartialShape {
        PartialShape { dims: None }
    }

    /// Create a shape with the given rank where every dimension is dynamic.
    pub fn with_rank(rank: usize) -> PartialShape {
        Self::from_dims(std::iter::repeat_n(Dimension::dynamic(), rank))
    }

    /// Create a shape with rank 0.
    pub fn scalar() -> PartialShape {
        Self::from_dims([])
    }

    pub fn from_dims<I: IntoIterator<Item = Dimension>>(dims: I) -> PartialShape {
        PartialShape {
            dims: Some(dims.into_iter().collect()),
        }
    }

    /// Create a fully static shape.
    pub fn from_static(dims: &[usize]) -> PartialShape {
        Self::from_dims(dims.iter().copied().map(Dimension::fixed))
    }

    /// Create a shape from sizes where negative values denote dynamic
    /// dimensions.
    pub fn from_i64(dims: &[i64]) -> PartialShape {
        Self::from_dims(dims.iter().copied().map(Dimension::from_i64))
    }

    /// Return the rank, or `None` if the rank is dynamic.
    pub fn rank(&self) -> Option<usize> {
        self.dims.as_ref().map(|d| d.len())
    }

    /// Return the rank as a dimension, which is dynamic if unknown.
    pub fn rank_dim(&self) -> Dimension {
        self.rank().map(Dimension::fixed).unwrap_or_default()
    }

    pub fn is_dynamic_rank(&self) -> bool {
        self.dims.is_none()
    }

    /// Return true if the rank and all dimensions are known.
    pub fn is_static(&self) -> bool {
        self.dims
            .as_ref()
            .is_some_and(|dims| dims.iter().all(|d| d.is_static()))
    }

    pub fn is_dynamic(&self) -> bool {
        !self.is_static()
    }

    /// Return the dimensions, or `None` if the rank is dynamic.
    pub fn dims(&self) -> Option<&[Dimension]> {
        self.dims.as_deref()
    }

    pub fn dims_mut(&mut self) -> Option<&mut [Dimension]> {
        self.dims.as_deref_mut()
    }

    /// Return the dimension at `index`, or `None` if the rank is dynamic or
    /// `index` is out of bounds.
    pub fn dim(&self, index: usize) -> Option<Dimension> {
        self.dims().and_then(|d| d.get(index)).copied()
    }

    /// Return the concrete sizes if the shape is static.
    pub fn to_shape(&self) -> Option<Vec<usize>> {
        self.dims()?.iter().map(|d| d.get_length()).collect()
    }

    /// Return the number of elements as a dimension.
    pub fn num_elements(&self) -> Dimension {
        match self.dims() {
            Some(dims) => dims
                .iter()
                .fold(Dimension::fixed(1), |prod, dim| prod * *dim),
            None => Dimension::dynamic(),
        }
    }

    /// Return true if the two shapes could describe the same tensor.
    pub fn compatible(&self, other: &PartialShape) -> bool {
        self.merge(other).is_ok()
    }

    /// Return true if both shapes have dynamic rank, or have the same rank
    /// and each pair of dimensions is the same or both are dynamic.
    pub fn same_scheme(&self, other: &PartialShape) -> bool {
        match (self.dims(), other.dims()) {
            (None, None) => true,
            (Some(a), Some(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(a, b)| a.same_scheme(b))
            }
            _ => false,
        }
    }

    /// Combine two shapes which are expected to describe the same tensor.
    pub fn merge(&self, other: &PartialShape) -> Result<PartialShape, InferShapesError> {
        let (a, b) = match (self.dims(), other.dims()) {
            (None, _) => return Ok(other.clone()),
            (_, None) => return Ok(self.clone()),
            (Some(a), Some(b)) => (a, b),
        };
        if a.len() != b.len() {
            return Err(InferShapesError::RankMismatch {
                expected: a.len(),
                actual: b.len(),
            });
        }
        a.iter()
            .zip(b)
            .map(|(a, b)| a.merge(b))
            .collect::<Result<DimVec, _>>()
            .map(|dims| PartialShape { dims: Some(dims) })
    }

    /// Return the smallest shape that contains both `self` and `other`.
    ///
    /// Dimensions that differ are widened to cover both. If the ranks differ
    /// the result has dynamic rank.
    pub fn union(&self, other: &PartialShape) -> PartialShape {
        match (self.dims(), other.dims()) {
            (Some(a), Some(b)) if a.len() == b.len() => {
                Self::from_dims(a.iter().zip(b).map(|(a, b)| a.union(b)))
            }
            _ => Self::dynamic(),
        }
    }

    /// Broadcast two shapes together following NumPy rules.
    ///
    /// The shapes are right-aligned and the shorter one is padded with 1s.
    pub fn broadcast(&self, other: &PartialShape) -> Result<PartialShape, InferShapesError> {
        let (Some(a), Some(b)) = (self.dims(), other.dims()) else {
            return Ok(PartialShape::dynamic());
        };
        let ndim = a.len().max(b.len());
        let a_pad = ndim - a.len();
        let b_pad = ndim - b.len();
        let one = Dimension::fixed(1);
        let a_iter = std::iter::repeat_n(one, a_pad).chain(a.iter().copied());
        let b_iter = std::iter::repeat_n(one, b_pad).chain(b.iter().copied());

        a_iter
            .zip(b_iter)
            .map(|(a, b)| a.broadcast(&b))
            .collect::<Result<DimVec, _>>()
            .map(|dims| PartialShape { dims: Some(dims) })
    }

    /// Return a copy of this shape with the dimension at `index` replaced.
    ///
    /// Shapes with dynamic rank are returned unchanged.
    pub fn with_dim(mut self, index: usize, dim: Dimension) -> PartialShape {
        if let Some(dims) = self.dims.as_mut() {
            dims[index] = dim;
        }
        self
    }

    /// Append a dimension. Shapes with dynamic rank are returned unchanged.
    pub fn push(&mut self, dim: Dimension) {
        if let Some(dims) = self.dims.as_mut() {
            dims.push(dim);
        }
    }
}

impl Index<usize> for PartialShape {
    type Output = Dimension;

    /// Return the dimension at `index`.
    ///
    /// Panics if the rank is dynamic or `index` is out of bounds.
    fn index(&self, index: usize) -> &Dimension {
        match &self.dims {
            Some(dims) => &dims[index],
            None => panic!("cannot index a shape with dynamic rank"),
        }
    }
}

impl FromIterator<Dimension> for PartialShape {
    fn from_iter<I: IntoIterator<Item = Dimension>>(iter: I) -> Self {
        Self::from_dims(iter)
    }
}

impl From<&[usize]> for PartialShape {
    fn from(dims: &[usize]) -> Self {
        Self::from_static(dims)
    }
}

impl<const N: usize> From<[usize; N]> for PartialShape {
    fn from(dims: [usize; N]) -> Self {
        Self::from_static(&dims)
    }
}

impl From<Vec<Dimension>> for PartialShape {
    fn from(dims: Vec<Dimension>) -> Self {
        Self::from_dims(dims)
    }
}

impl fmt::Display for PartialShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Some(dims) = self.dims() else {
            return write!(f, "[...]");
        };
        write!(f, "[")?;
        for (i, dim) in dims.iter().enumerate() {
            if i > 0 {
                write!(f, ",")?;
            }
            write!(f, "{}", dim)?;
        }
        write!(f, "]")
    }
}

#[cfg(test)]
mod tests {
    use opgraph_testing::TestCases;

    use super::PartialShape;
    use crate::{Dimension, InferShapesError};

    #[test]
    fn test_broadcast() {
        #[derive(Debug)]
        struct Case {
            a: PartialShape,
            b: PartialShape,
            expected: Result<PartialShape, InferShapesError>,
        }

        let cases = [
            Case {
                a: shape![8, 1, 6, 1],
                b: shape![7, 1, 5],
                expected: Ok(shape![8, 7, 6, 5]),
            },
            Case {
                a: shape![2, 3],
                b: PartialShape::scalar(),
                expected: Ok(shape![2, 3]),
            },
            Case {
                a: shape![Dimension::dynamic(), 3],
                b: shape![4, 1],
                expected: Ok(shape![4, 3]),
            },
            Case {
                a: PartialShape::dynamic(),
                b: shape![4, 1],
                expected: Ok(PartialShape::dynamic()),
            },
            Case {
                a: shape![2, 3],
                b: shape![4, 3],
                expected: Err(InferShapesError::BroadcastError(
                    Dimension::fixed(2),
                    Dimension::fixed(4),
                )),
            },
        ];

        cases.test_each(|case| {
            assert_eq!(case.a.broadcast(&case.b), case.expected);
        })
    }

    #[test]
    fn test_merge() {
        let a = shape![Dimension::dynamic(), 3];
        let b = shape![2, (1, 4)];
        assert_eq!(a.merge(&b), Ok(shape![2, 3]));
        assert_eq!(PartialShape::dynamic().merge(&b), Ok(b.clone()));
        assert_eq!(
            a.merge(&shape![1, 2, 3]),
            Err(InferShapesError::RankMismatch {
                expected: 2,
                actual: 3
            })
        );
        assert_eq!(
            shape![1, 2].merge(&shape![1, 5]),
            Err(InferShapesError::DimensionMismatch(
                Dimension::fixed(2),
                Dimension::fixed(5)
            ))
        );
    }

    #[test]
    fn test_same_scheme() {
        assert!(shape![Dimension::dynamic(), 4].same_scheme(&shape![(0, 10), 4]));
        assert!(!shape![2, 4].same_scheme(&shape![Dimension::dynamic(), 4]));
        assert!(PartialShape::dynamic().same_scheme(&PartialShape::dynamic()));
        assert!(!PartialShape::dynamic().same_scheme(&shape![1]));
    }

    #[test]
    fn test_static_queries() {
        let s = shape![2, 3, 4];
        assert!(s.is_static());
        assert_eq!(s.to_shape(), Some(vec![2, 3, 4]));
        assert_eq!(s.num_elements(), Dimension::fixed(24));
        assert_eq!(s.rank(), Some(3));

        let d = shape![2, Dimension::dynamic()];
        assert!(d.is_dynamic());
        assert_eq!(d.to_shape(), None);
        assert_eq!(PartialShape::dynamic().rank_dim(), Dimension::dynamic());
        assert_eq!(PartialShape::from_i64(&[-1, 2]), d);
    }

    #[test]
    fn test_display() {
        assert_eq!(shape![1, (0, 6), 6].to_string(), "[1,0..6,6]");
        assert_eq!(PartialShape::scalar().to_string(), "[]");
        assert_eq!(PartialShape::dynamic().to_string(), "[...]");
    }
}
