//! Scalar element types of tensors.

use std::error::Error;
use std::fmt;
use std::str::FromStr;

use crate::infer_shapes::InferShapesError;

/// Element type of a tensor.
///
/// `Dynamic` is a placeholder for a type that is not known during graph
/// construction. It is compatible with every other type.
#[derive(Copy, Clone, Debug, Default, Eq, Hash, PartialEq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "lowercase")
)]
pub enum ElementType {
    #[default]
    Dynamic,
    Boolean,
    BF16,
    F16,
    F32,
    F64,
    I4,
    I8,
    I16,
    I32,
    I64,
    U1,
    U4,
    U8,
    U16,
    U32,
    U64,
}

impl ElementType {
    /// All element types, in declaration order.
    pub const ALL: [ElementType; 17] = [
        ElementType::Dynamic,
        ElementType::Boolean,
        ElementType::BF16,
        ElementType::F16,
        ElementType::F32,
        ElementType::F64,
        ElementType::I4,
        ElementType::I8,
        ElementType::I16,
        ElementType::I32,
        ElementType::I64,
        ElementType::U1,
        ElementType::U4,
        ElementType::U8,
        ElementType::U16,
        ElementType::U32,
        ElementType::U64,
    ];

    /// Return the canonical lower-case name of this type, eg. "f32".
    pub fn name(self) -> &'static str {
        match self {
            Self::Dynamic => "dynamic",
            Self::Boolean => "boolean",
            Self::BF16 => "bf16",
            Self::F16 => "f16",
            Self::F32 => "f32",
            Self::F64 => "f64",
            Self::I4 => "i4",
            Self::I8 => "i8",
            Self::I16 => "i16",
            Self::I32 => "i32",
            Self::I64 => "i64",
            Self::U1 => "u1",
            Self::U4 => "u4",
            Self::U8 => "u8",
            Self::U16 => "u16",
            Self::U32 => "u32",
            Self::U64 => "u64",
        }
    }

    pub fn is_dynamic(self) -> bool {
        self == Self::Dynamic
    }

    pub fn is_static(self) -> bool {
        !self.is_dynamic()
    }

    /// Return true if this is a floating point type.
    pub fn is_real(self) -> bool {
        matches!(self, Self::BF16 | Self::F16 | Self::F32 | Self::F64)
    }

    /// Return true if this is a signed or unsigned integer type.
    ///
    /// Unlike [`is_integral`](Self::is_integral) this excludes booleans.
    pub fn is_integral_number(self) -> bool {
        self.is_integral() && self != Self::Boolean
    }

    /// Return true if this is an integer or boolean type.
    pub fn is_integral(self) -> bool {
        !self.is_dynamic() && !self.is_real()
    }

    pub fn is_signed(self) -> bool {
        matches!(
            self,
            Self::BF16
                | Self::F16
                | Self::F32
                | Self::F64
                | Self::I4
                | Self::I8
                | Self::I16
                | Self::I32
                | Self::I64
        )
    }

    /// Size of one element in bits, or zero for `Dynamic`.
    pub fn bitwidth(self) -> usize {
        match self {
            Self::Dynamic => 0,
            Self::U1 => 1,
            Self::I4 | Self::U4 => 4,
            Self::Boolean | Self::I8 | Self::U8 => 8,
            Self::BF16 | Self::F16 | Self::I16 | Self::U16 => 16,
            Self::F32 | Self::I32 | Self::U32 => 32,
            Self::F64 | Self::I64 | Self::U64 => 64,
        }
    }

    /// Return true if `self` and `other` are equal or either is dynamic.
    pub fn compatible(self, other: ElementType) -> bool {
        self.is_dynamic() || other.is_dynamic() || self == other
    }

    /// Combine two types, keeping the more specific one.
    pub fn merge(self, other: ElementType) -> Result<ElementType, InferShapesError> {
        match (self, other) {
            (Self::Dynamic, ty) | (ty, Self::Dynamic) => Ok(ty),
            (a, b) if a == b => Ok(a),
            (a, b) => Err(InferShapesError::TypeMismatch(a, b)),
        }
    }
}

impl fmt::Display for ElementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Error returned when parsing an unrecognized element type name.
#[derive(Clone, Debug, PartialEq)]
pub struct ParseElementTypeError(pub String);

impl fmt::Display for ParseElementTypeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown element type \"{}\"", self.0)
    }
}

impl Error for ParseElementTypeError {}

impl FromStr for ElementType {
    type Err = ParseElementTypeError;

    /// Parse a type name. Matching is case-insensitive and accepts a few
    /// common aliases such as "bool" and "float32".
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let ty = match s.to_ascii_lowercase().as_str() {
            "dynamic" | "undefined" => Self::Dynamic,
            "boolean" | "bool" => Self::Boolean,
            "bf16" | "bfloat16" => Self::BF16,
            "f16" | "float16" => Self::F16,
            "f32" | "float32" => Self::F32,
            "f64" | "float64" => Self::F64,
            "i4" | "int4" => Self::I4,
            "i8" | "int8" => Self::I8,
            "i16" | "int16" => Self::I16,
            "i32" | "int32" => Self::I32,
            "i64" | "int64" => Self::I64,
            "u1" => Self::U1,
            "u4" | "uint4" => Self::U4,
            "u8" | "uint8" => Self::U8,
            "u16" | "uint16" => Self::U16,
            "u32" | "uint32" => Self::U32,
            "u64" | "uint64" => Self::U64,
            _ => return Err(ParseElementTypeError(s.to_string())),
        };
        Ok(ty)
    }
}

#[cfg(test)]
mod tests {
    use opgraph_testing::TestCases;

    use super::ElementType;
    use crate::InferShapesError;

    #[test]
    fn test_merge() {
        #[derive(Debug)]
        struct Case {
            a: ElementType,
            b: ElementType,
            expected: Result<ElementType, InferShapesError>,
        }

        let cases = [
            Case {
                a: ElementType::F32,
                b: ElementType::F32,
                expected: Ok(ElementType::F32),
            },
            Case {
                a: ElementType::Dynamic,
                b: ElementType::I64,
                expected: Ok(ElementType::I64),
            },
            Case {
                a: ElementType::U8,
                b: ElementType::Dynamic,
                expected: Ok(ElementType::U8),
            },
            Case {
                a: ElementType::F32,
                b: ElementType::F16,
                expected: Err(InferShapesError::TypeMismatch(
                    ElementType::F32,
                    ElementType::F16,
                )),
            },
        ];

        cases.test_each(|case| {
            assert_eq!(case.a.merge(case.b), case.expected);
            assert_eq!(case.a.compatible(case.b), case.expected.is_ok());
        })
    }

    #[test]
    fn test_parse_and_display() {
        for ty in ElementType::ALL {
            let parsed: ElementType = ty.to_string().parse().unwrap();
            assert_eq!(parsed, ty);
        }
        assert_eq!("bool".parse::<ElementType>(), Ok(ElementType::Boolean));
        assert_eq!("I32".parse::<ElementType>(), Ok(ElementType::I32));
        assert!("complex64".parse::<ElementType>().is_err());
    }

    #[test]
    fn test_classification() {
        assert!(ElementType::F16.is_real());
        assert!(!ElementType::I32.is_real());
        assert!(ElementType::Boolean.is_integral());
        assert!(!ElementType::Boolean.is_integral_number());
        assert!(ElementType::U8.is_integral_number());
        assert!(!ElementType::Dynamic.is_integral());
        assert_eq!(ElementType::BF16.bitwidth(), 16);
        assert_eq!(ElementType::U1.bitwidth(), 1);
    }
}
