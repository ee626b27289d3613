//! Operator attributes.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;

use opgraph_shape_inference::ops::{AutoPad, Direction, ShapeCalculation};
use opgraph_shape_inference::{AutoBroadcast, ElementType, PartialShape};
use smallvec::SmallVec;

use crate::op_registry::ReadOpError;

/// Value of an operator attribute.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum AttrValue {
    Bool(bool),
    Int(i64),
    Float(f32),
    String(String),
    Bools(Vec<bool>),
    Ints(Vec<i64>),
    Floats(Vec<f32>),
    Strings(Vec<String>),
    Shape(PartialShape),
    Type(ElementType),
}

impl AttrValue {
    /// Return a short name for the kind of value, for use in error messages.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::String(_) => "string",
            Self::Bools(_) => "bool list",
            Self::Ints(_) => "int list",
            Self::Floats(_) => "float list",
            Self::Strings(_) => "string list",
            Self::Shape(_) => "shape",
            Self::Type(_) => "element type",
        }
    }
}

impl fmt::Display for AttrValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn list<T: fmt::Display>(f: &mut fmt::Formatter<'_>, items: &[T]) -> fmt::Result {
            write!(f, "[")?;
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{}", item)?;
            }
            write!(f, "]")
        }

        match self {
            Self::Bool(x) => write!(f, "{}", x),
            Self::Int(x) => write!(f, "{}", x),
            Self::Float(x) => write!(f, "{}", x),
            Self::String(x) => write!(f, "\"{}\"", x),
            Self::Bools(xs) => list(f, xs),
            Self::Ints(xs) => list(f, xs),
            Self::Floats(xs) => list(f, xs),
            Self::Strings(xs) => list(f, xs),
            Self::Shape(shape) => write!(f, "{}", shape),
            Self::Type(ty) => write!(f, "{}", ty),
        }
    }
}

macro_rules! impl_attr_value_from {
    ($type:ty, $variant:ident) => {
        impl From<$type> for AttrValue {
            fn from(val: $type) -> AttrValue {
                AttrValue::$variant(val)
            }
        }
    };

    ($type:ty, $variant:ident, $convert:expr) => {
        impl From<$type> for AttrValue {
            fn from(val: $type) -> AttrValue {
                AttrValue::$variant($convert(val))
            }
        }
    };
}

impl_attr_value_from!(bool, Bool);
impl_attr_value_from!(i64, Int);
impl_attr_value_from!(i32, Int, i64::from);
impl_attr_value_from!(usize, Int, |x: usize| x as i64);
impl_attr_value_from!(f32, Float);
impl_attr_value_from!(f64, Float, |x: f64| x as f32);
impl_attr_value_from!(String, String);
impl_attr_value_from!(&str, String, str::to_string);
impl_attr_value_from!(Vec<bool>, Bools);
impl_attr_value_from!(Vec<i64>, Ints);
impl_attr_value_from!(Vec<f32>, Floats);
impl_attr_value_from!(Vec<String>, Strings);
impl_attr_value_from!(PartialShape, Shape);
impl_attr_value_from!(ElementType, Type);

impl From<Vec<usize>> for AttrValue {
    fn from(val: Vec<usize>) -> AttrValue {
        AttrValue::Ints(val.into_iter().map(|x| x as i64).collect())
    }
}

impl From<&[i64]> for AttrValue {
    fn from(val: &[i64]) -> AttrValue {
        AttrValue::Ints(val.to_vec())
    }
}

impl From<&[f32]> for AttrValue {
    fn from(val: &[f32]) -> AttrValue {
        AttrValue::Floats(val.to_vec())
    }
}

impl From<&[&str]> for AttrValue {
    fn from(val: &[&str]) -> AttrValue {
        AttrValue::Strings(val.iter().map(|s| s.to_string()).collect())
    }
}

/// Conversion from an attribute value to the type of an operator field.
///
/// Conversions accept a few lossless coercions, such as an integer where a
/// float is expected or a string where an element type is expected.
pub trait FromAttr: Sized {
    fn from_attr(value: &AttrValue) -> Result<Self, String>;
}

fn type_error<T>(expected: &str, value: &AttrValue) -> Result<T, String> {
    Err(format!("expected {} but got {}", expected, value.kind_name()))
}

impl FromAttr for AttrValue {
    fn from_attr(value: &AttrValue) -> Result<Self, String> {
        Ok(value.clone())
    }
}

impl FromAttr for bool {
    fn from_attr(value: &AttrValue) -> Result<Self, String> {
        match value {
            AttrValue::Bool(x) => Ok(*x),
            AttrValue::Int(x @ (0 | 1)) => Ok(*x == 1),
            AttrValue::String(s) => {
                crate::env::str_as_bool(s).ok_or_else(|| format!("\"{}\" is not a boolean", s))
            }
            _ => type_error("bool", value),
        }
    }
}

impl FromAttr for i64 {
    fn from_attr(value: &AttrValue) -> Result<Self, String> {
        match value {
            AttrValue::Int(x) => Ok(*x),
            _ => type_error("int", value),
        }
    }
}

impl FromAttr for usize {
    fn from_attr(value: &AttrValue) -> Result<Self, String> {
        let x = i64::from_attr(value)?;
        usize::try_from(x).map_err(|_| format!("{} is negative", x))
    }
}

impl FromAttr for f32 {
    fn from_attr(value: &AttrValue) -> Result<Self, String> {
        match value {
            AttrValue::Float(x) => Ok(*x),
            AttrValue::Int(x) => Ok(*x as f32),
            _ => type_error("float", value),
        }
    }
}

impl FromAttr for String {
    fn from_attr(value: &AttrValue) -> Result<Self, String> {
        match value {
            AttrValue::String(x) => Ok(x.clone()),
            _ => type_error("string", value),
        }
    }
}

impl FromAttr for Vec<bool> {
    fn from_attr(value: &AttrValue) -> Result<Self, String> {
        match value {
            AttrValue::Bools(xs) => Ok(xs.clone()),
            _ => type_error("bool list", value),
        }
    }
}

impl FromAttr for Vec<i64> {
    fn from_attr(value: &AttrValue) -> Result<Self, String> {
        match value {
            AttrValue::Ints(xs) => Ok(xs.clone()),
            AttrValue::Int(x) => Ok(vec![*x]),
            _ => type_error("int list", value),
        }
    }
}

impl FromAttr for Vec<usize> {
    fn from_attr(value: &AttrValue) -> Result<Self, String> {
        Vec::<i64>::from_attr(value)?
            .into_iter()
            .map(|x| usize::try_from(x).map_err(|_| format!("{} is negative", x)))
            .collect()
    }
}

impl FromAttr for Vec<f32> {
    fn from_attr(value: &AttrValue) -> Result<Self, String> {
        match value {
            AttrValue::Floats(xs) => Ok(xs.clone()),
            AttrValue::Float(x) => Ok(vec![*x]),
            AttrValue::Ints(xs) => Ok(xs.iter().map(|&x| x as f32).collect()),
            _ => type_error("float list", value),
        }
    }
}

impl FromAttr for Vec<String> {
    fn from_attr(value: &AttrValue) -> Result<Self, String> {
        match value {
            AttrValue::Strings(xs) => Ok(xs.clone()),
            _ => type_error("string list", value),
        }
    }
}

impl FromAttr for PartialShape {
    fn from_attr(value: &AttrValue) -> Result<Self, String> {
        match value {
            AttrValue::Shape(shape) => Ok(shape.clone()),
            AttrValue::Ints(dims) => Ok(PartialShape::from_i64(dims)),
            _ => type_error("shape", value),
        }
    }
}

impl FromAttr for ElementType {
    fn from_attr(value: &AttrValue) -> Result<Self, String> {
        match value {
            AttrValue::Type(ty) => Ok(*ty),
            AttrValue::String(name) => name.parse().map_err(|err| format!("{}", err)),
            _ => type_error("element type", value),
        }
    }
}

/// Implement attribute conversions for enums that are stored as their
/// lower-case name.
macro_rules! impl_string_enum_attr {
    ($type:ty) => {
        impl FromAttr for $type {
            fn from_attr(value: &AttrValue) -> Result<Self, String> {
                match value {
                    AttrValue::String(name) => name
                        .parse()
                        .map_err(|_| format!("unsupported value \"{}\"", name)),
                    _ => type_error("string", value),
                }
            }
        }

        impl From<$type> for AttrValue {
            fn from(val: $type) -> AttrValue {
                AttrValue::String(val.name().to_string())
            }
        }
    };
}

impl_string_enum_attr!(AutoBroadcast);
impl_string_enum_attr!(AutoPad);
impl_string_enum_attr!(Direction);
impl_string_enum_attr!(ShapeCalculation);

/// Named attributes of an operator, ordered by name.
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Attributes(BTreeMap<String, AttrValue>);

impl Attributes {
    pub fn new() -> Attributes {
        Attributes(BTreeMap::new())
    }

    /// Add or replace an attribute and return the updated set.
    pub fn with(mut self, name: &str, value: impl Into<AttrValue>) -> Attributes {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: &str, value: impl Into<AttrValue>) {
        self.0.insert(name.to_string(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&AttrValue> {
        self.0.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &AttrValue)> {
        self.0.iter().map(|(name, value)| (name.as_str(), value))
    }
}

impl<K: AsRef<str>, V: Into<AttrValue>> FromIterator<(K, V)> for Attributes {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Attributes(
            iter.into_iter()
                .map(|(name, value)| (name.as_ref().to_string(), value.into()))
                .collect(),
        )
    }
}

/// Reads attributes against an operator's schema.
///
/// This records which attributes have been read, so that unrecognized
/// attributes can be reported by [`AttrReader::finish`].
pub struct AttrReader<'a> {
    attrs: &'a Attributes,
    used_attrs: RefCell<SmallVec<[&'static str; 8]>>,
}

impl<'a> AttrReader<'a> {
    pub fn new(attrs: &'a Attributes) -> Self {
        AttrReader {
            attrs,
            used_attrs: RefCell::new(SmallVec::new()),
        }
    }

    /// Get an optional attribute and convert it to a given type.
    pub fn get<T: FromAttr>(&self, name: &'static str) -> Result<Option<T>, ReadOpError> {
        self.used_attrs.borrow_mut().push(name);
        self.attrs
            .get(name)
            .map(|value| T::from_attr(value).map_err(|err| ReadOpError::attr_error(name, err)))
            .transpose()
    }

    /// Get an optional attribute, or `default` if it is not set.
    pub fn get_or<T: FromAttr>(&self, name: &'static str, default: T) -> Result<T, ReadOpError> {
        Ok(self.get(name)?.unwrap_or(default))
    }

    /// Get a required attribute.
    pub fn require<T: FromAttr>(&self, name: &'static str) -> Result<T, ReadOpError> {
        self.get(name)?
            .ok_or_else(|| ReadOpError::MissingAttribute(name.to_string()))
    }

    /// Check that every attribute has been read.
    pub fn finish(self) -> Result<(), ReadOpError> {
        let used = self.used_attrs.into_inner();
        match self
            .attrs
            .iter()
            .find(|(name, _)| !used.iter().any(|used| *used == *name))
        {
            Some((name, _)) => Err(ReadOpError::UnknownAttribute(name.to_string())),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use opgraph_shape_inference::ops::AutoPad;
    use opgraph_shape_inference::{shape, Dimension, ElementType, PartialShape};

    use super::{AttrReader, AttrValue, Attributes, FromAttr};
    use crate::op_registry::ReadOpError;

    #[test]
    fn test_attr_reader() {
        let attrs = Attributes::new()
            .with("strides", vec![2i64, 2])
            .with("auto_pad", "same_upper")
            .with("clip", 1i64);
        let reader = AttrReader::new(&attrs);

        let strides: Vec<usize> = reader.require("strides").unwrap();
        assert_eq!(strides, [2, 2]);
        let auto_pad: AutoPad = reader.get_or("auto_pad", AutoPad::Explicit).unwrap();
        assert_eq!(auto_pad, AutoPad::SameUpper);
        let dilations: Vec<usize> = reader.get_or("dilations", vec![1, 1]).unwrap();
        assert_eq!(dilations, [1, 1]);
        let clip: f32 = reader.get_or("clip", 0.).unwrap();
        assert_eq!(clip, 1.);

        assert!(reader.finish().is_ok());
    }

    #[test]
    fn test_attr_reader_errors() {
        let attrs = Attributes::new()
            .with("strides", vec![-1i64])
            .with("unused", true);
        let reader = AttrReader::new(&attrs);

        let err = reader.require::<Vec<usize>>("strides").err();
        assert!(matches!(err, Some(ReadOpError::AttrError { .. })));

        let err = reader.require::<String>("mode").err();
        assert_eq!(err, Some(ReadOpError::MissingAttribute("mode".to_string())));

        assert_eq!(
            reader.finish().err(),
            Some(ReadOpError::UnknownAttribute("unused".to_string()))
        );
    }

    #[test]
    fn test_coercions() {
        assert_eq!(bool::from_attr(&AttrValue::Int(1)), Ok(true));
        assert!(bool::from_attr(&AttrValue::Int(2)).is_err());
        assert_eq!(
            ElementType::from_attr(&AttrValue::String("f32".into())),
            Ok(ElementType::F32)
        );
        assert_eq!(
            PartialShape::from_attr(&AttrValue::Ints(vec![-1, 3])),
            Ok(shape![Dimension::dynamic(), 3])
        );
        assert_eq!(
            AttrValue::from(AutoPad::SameLower),
            AttrValue::String("same_lower".into())
        );
        assert_eq!(AttrValue::Floats(vec![0.5, 2.]).to_string(), "[0.5, 2]");
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_serde_round_trip() {
        let attrs = Attributes::new()
            .with("kernel", vec![3usize, 3])
            .with("rounding_type", "ceil")
            .with("output_shape", shape![Dimension::dynamic(), 4])
            .with("index_element_type", ElementType::I32);
        let json = serde_json::to_string(&attrs).unwrap();
        let parsed: Attributes = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, attrs);
    }
}
