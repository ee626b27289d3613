//! Tensor dimension sizes which may be unknown or bounded.

use std::fmt;
use std::ops::{Add, Mul, Sub};

use crate::infer_shapes::InferShapesError;

/// Size of a single tensor dimension.
///
/// A dimension is an interval `[min, max]` of the sizes it may take, where
/// `max` may be unbounded. A dimension is _static_ if the interval contains a
/// single value, _dynamic_ otherwise. Dynamic dimensions with a finite upper
/// bound are referred to as _bounded_.
///
/// ```
/// use opgraph_shape_inference::Dimension;
///
/// let batch = Dimension::dynamic();
/// let rows = Dimension::bounded(0, 64);
/// let cols = Dimension::fixed(3);
///
/// assert_eq!(batch.to_string(), "?");
/// assert_eq!(rows.to_string(), "0..64");
/// assert_eq!((rows * cols).max_length(), Some(192));
/// ```
#[derive(Copy, Clone, Debug, Eq, Hash, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Dimension {
    min: usize,
    max: Option<usize>,
}

impl Dimension {
    /// Create a static dimension.
    pub const fn fixed(size: usize) -> Dimension {
        Dimension {
            min: size,
            max: Some(size),
        }
    }

    /// Create a dimension with no known bounds.
    pub const fn dynamic() -> Dimension {
        Dimension { min: 0, max: None }
    }

    /// Create a dimension whose size lies in `[min, max]`.
    ///
    /// Panics if `min > max`.
    pub fn bounded(min: usize, max: usize) -> Dimension {
        assert!(min <= max, "dimension bounds {}..{} are empty", min, max);
        Dimension {
            min,
            max: Some(max),
        }
    }

    /// Create a dimension with a lower bound and no upper bound.
    pub const fn at_least(min: usize) -> Dimension {
        Dimension { min, max: None }
    }

    /// Convert a size where negative values denote a dynamic dimension.
    pub fn from_i64(size: i64) -> Dimension {
        if size < 0 {
            Dimension::dynamic()
        } else {
            Dimension::fixed(size as usize)
        }
    }

    pub fn is_static(&self) -> bool {
        self.max == Some(self.min)
    }

    pub fn is_dynamic(&self) -> bool {
        !self.is_static()
    }

    /// Return the size if this dimension is static.
    pub fn get_length(&self) -> Option<usize> {
        self.is_static().then_some(self.min)
    }

    pub fn min_length(&self) -> usize {
        self.min
    }

    /// Upper bound of the size, or `None` if unbounded.
    pub fn max_length(&self) -> Option<usize> {
        self.max
    }

    /// Return true if `size` is a possible value of this dimension.
    pub fn contains(&self, size: usize) -> bool {
        size >= self.min && self.max.is_none_or(|max| size <= max)
    }

    /// Return true if `self` and `other` have at least one size in common.
    pub fn compatible(&self, other: &Dimension) -> bool {
        self.intersect(other).is_some()
    }

    /// Return true if the dimensions are equal, or are both dynamic.
    pub fn same_scheme(&self, other: &Dimension) -> bool {
        self == other || (self.is_dynamic() && other.is_dynamic())
    }

    fn intersect(&self, other: &Dimension) -> Option<Dimension> {
        let min = self.min.max(other.min);
        let max = match (self.max, other.max) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        };
        match max {
            Some(max) if max < min => None,
            _ => Some(Dimension { min, max }),
        }
    }

    /// Combine two dimensions which are expected to refer to the same size.
    ///
    /// The result is the intersection of the two intervals. Fails if they do
    /// not overlap.
    pub fn merge(&self, other: &Dimension) -> Result<Dimension, InferShapesError> {
        self.intersect(other)
            .ok_or(InferShapesError::DimensionMismatch(*self, *other))
    }

    /// Return the smallest dimension that contains both `self` and `other`.
    pub fn union(&self, other: &Dimension) -> Dimension {
        let max = match (self.max, other.max) {
            (Some(a), Some(b)) => Some(a.max(b)),
            _ => None,
        };
        Dimension {
            min: self.min.min(other.min),
            max,
        }
    }

    /// Combine two dimensions using NumPy broadcasting rules.
    pub fn broadcast(&self, other: &Dimension) -> Result<Dimension, InferShapesError> {
        let err = || InferShapesError::BroadcastError(*self, *other);

        if *self == Dimension::fixed(1) {
            return Ok(*other);
        } else if *other == Dimension::fixed(1) {
            return Ok(*self);
        }

        match (self.get_length(), other.get_length()) {
            (Some(a), Some(b)) => (a == b).then_some(*self).ok_or_else(err),

            // A fixed size other than 1 determines the result, provided the
            // other dim can be either 1 or that size.
            (Some(size), None) | (None, Some(size)) => {
                let dynamic = if self.is_static() { other } else { self };
                if dynamic.contains(size) || dynamic.contains(1) {
                    Ok(Dimension::fixed(size))
                } else {
                    Err(err())
                }
            }

            (None, None) => match (self.contains(1), other.contains(1)) {
                (false, false) => self.intersect(other).ok_or_else(err),
                (true, false) => Ok(*other),
                (false, true) => Ok(*self),
                (true, true) => Ok(self.union(other)),
            },
        }
    }

    /// Apply a non-decreasing function to both bounds of the dimension.
    pub fn map_bounds(&self, f: impl Fn(usize) -> usize) -> Dimension {
        Dimension {
            min: f(self.min),
            max: self.max.map(f),
        }
    }

    /// Divide the dimension by `divisor`, rounding down.
    pub fn div_floor(&self, divisor: usize) -> Dimension {
        self.map_bounds(|x| x / divisor)
    }

    /// Divide the dimension by `divisor`, rounding up.
    pub fn div_ceil(&self, divisor: usize) -> Dimension {
        self.map_bounds(|x| x.div_ceil(divisor))
    }
}

impl Default for Dimension {
    fn default() -> Self {
        Self::dynamic()
    }
}

impl From<usize> for Dimension {
    fn from(size: usize) -> Self {
        Dimension::fixed(size)
    }
}

impl From<(usize, usize)> for Dimension {
    fn from((min, max): (usize, usize)) -> Self {
        Dimension::bounded(min, max)
    }
}

impl Add for Dimension {
    type Output = Dimension;

    /// Add dimensions. Bounds which overflow become unknown.
    fn add(self, rhs: Dimension) -> Dimension {
        let Some(min) = self.min.checked_add(rhs.min) else {
            return Dimension::dynamic();
        };
        Dimension {
            min,
            max: self.max.zip(rhs.max).and_then(|(a, b)| a.checked_add(b)),
        }
    }
}

impl Sub for Dimension {
    type Output = Dimension;

    /// Subtract dimensions, saturating at zero.
    fn sub(self, rhs: Dimension) -> Dimension {
        let min = rhs.max.map(|r| self.min.saturating_sub(r)).unwrap_or(0);
        let max = self.max.map(|a| a.saturating_sub(rhs.min));
        Dimension { min, max }
    }
}

impl Mul for Dimension {
    type Output = Dimension;

    /// Multiply dimensions. Bounds which overflow become unknown.
    fn mul(self, rhs: Dimension) -> Dimension {
        let max = match (self.max, rhs.max) {
            (Some(a), Some(b)) => a.checked_mul(b),
            // Anything times zero is zero, even if the other side is unbounded.
            (Some(0), None) | (None, Some(0)) => Some(0),
            _ => None,
        };
        let Some(min) = self.min.checked_mul(rhs.min) else {
            return Dimension::dynamic();
        };
        Dimension { min, max }
    }
}

impl Mul<usize> for Dimension {
    type Output = Dimension;

    fn mul(self, rhs: usize) -> Dimension {
        self * Dimension::fixed(rhs)
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.min, self.max) {
            (min, Some(max)) if min == max => write!(f, "{}", min),
            (0, None) => write!(f, "?"),
            (min, None) => write!(f, "{}..", min),
            (min, Some(max)) => write!(f, "{}..{}", min, max),
        }
    }
}
