use opgraph_shape_inference::{ConstData, ElementType, InferShapesError, PartialShape, TensorInfo};

use crate::attrs::{AttrReader, AttrValue, Attributes};
use crate::graph::BuildError;
use crate::op_registry::{ReadOp, ReadOpError};
use crate::operator::{InferContext, Operator};
use crate::ops::check_input_count;

define_op!(
    /// A graph input with a declared type and shape.
    Parameter("Parameter", "opset1") {
        element_type: ElementType = ElementType::Dynamic,
        shape: PartialShape = PartialShape::dynamic(),
    }
    |op, inputs| {
        check_input_count(inputs, 0, 0)?;
        Ok([TensorInfo::new(op.element_type, op.shape.clone())].into())
    }
);

define_op!(
    /// Marks a value as an output of a graph.
    ResultOp("Result", "opset1") {}
    |_op, inputs| {
        check_input_count(inputs, 1, 1)?;
        Ok([inputs[0].clone()].into())
    }
);

/// A tensor with known contents.
#[derive(Clone, Debug, PartialEq)]
pub struct Constant {
    element_type: ElementType,
    shape: Vec<usize>,
    value: ConstData,
}

impl Constant {
    /// Create a constant.
    ///
    /// `value` must have one entry per element of `shape`, or a single entry
    /// which is repeated. Booleans are accepted for integer types and
    /// integers for floating point types.
    pub fn new(
        element_type: ElementType,
        shape: &[usize],
        value: ConstData,
    ) -> Result<Constant, InferShapesError> {
        let value = match element_type {
            ElementType::Dynamic => {
                return Err(InferShapesError::InvalidArgument(
                    "constant must have a static element type",
                ))
            }
            ElementType::Boolean => value.to_bools().map(ConstData::Bool),
            t if t.is_real() => value.to_floats().map(ConstData::Float),
            _ => value.to_ints().map(ConstData::Int),
        }
        .ok_or(InferShapesError::InvalidArgument(
            "constant value does not match its element type",
        ))?;

        let len: usize = shape.iter().product();
        let value = if value.len() == len {
            value
        } else if value.len() == 1 {
            match value {
                ConstData::Bool(v) => ConstData::Bool(vec![v[0]; len]),
                ConstData::Int(v) => ConstData::Int(vec![v[0]; len]),
                ConstData::Float(v) => ConstData::Float(vec![v[0]; len]),
            }
        } else {
            return Err(InferShapesError::InvalidArgument(
                "constant value length does not match its shape",
            ));
        };

        Ok(Constant {
            element_type,
            shape: shape.to_vec(),
            value,
        })
    }

    pub fn element_type(&self) -> ElementType {
        self.element_type
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn value(&self) -> &ConstData {
        &self.value
    }

    /// Return the description of the constant's output.
    pub fn info(&self) -> TensorInfo {
        TensorInfo::constant(
            self.element_type,
            PartialShape::from_static(&self.shape),
            self.value.clone(),
        )
    }
}

impl Operator for Constant {
    fn name(&self) -> &str {
        "Constant"
    }

    fn version(&self) -> &str {
        "opset1"
    }

    fn attributes(&self) -> Attributes {
        let value = match &self.value {
            ConstData::Bool(v) => AttrValue::Bools(v.clone()),
            ConstData::Int(v) => AttrValue::Ints(v.clone()),
            ConstData::Float(v) => AttrValue::Floats(v.iter().map(|&x| x as f32).collect()),
        };
        Attributes::new()
            .with("element_type", self.element_type)
            .with("shape", PartialShape::from_static(&self.shape))
            .with("value", value)
    }

    fn infer(
        &self,
        inputs: &[TensorInfo],
        _ctx: &InferContext,
    ) -> Result<Vec<TensorInfo>, BuildError> {
        check_input_count(inputs, 0, 0).map_err(|err| BuildError::op_error("Constant", err))?;
        Ok([self.info()].into())
    }
}

impl ReadOp for Constant {
    fn op_type() -> &'static str {
        "Constant"
    }

    fn op_version() -> &'static str {
        "opset1"
    }

    fn read(attrs: &AttrReader) -> Result<Self, ReadOpError> {
        let element_type = attrs.require::<ElementType>("element_type")?;
        let shape = attrs
            .require::<PartialShape>("shape")?
            .to_shape()
            .ok_or_else(|| ReadOpError::attr_error("shape", "shape must be static"))?;
        let value = match attrs.require::<AttrValue>("value")? {
            AttrValue::Bool(x) => ConstData::Bool(vec![x]),
            AttrValue::Bools(v) => ConstData::Bool(v),
            AttrValue::Int(x) => ConstData::Int(vec![x]),
            AttrValue::Ints(v) => ConstData::Int(v),
            AttrValue::Float(x) => ConstData::Float(vec![x as f64]),
            AttrValue::Floats(v) => ConstData::Float(v.into_iter().map(|x| x as f64).collect()),
            other => {
                return Err(ReadOpError::attr_error(
                    "value",
                    format!("expected numbers but got {}", other.kind_name()),
                ))
            }
        };
        Constant::new(element_type, &shape, value)
            .map_err(|err| ReadOpError::attr_error("value", err.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use opgraph_shape_inference::{shape, ConstData, ElementType, InferShapesError, TensorInfo};

    use super::{Constant, Parameter, ResultOp};
    use crate::op_registry::ReadOp;
    use crate::attrs::AttrReader;
    use crate::operator::{InferContext, Operator};
    use crate::options::BuildOptions;

    #[test]
    fn test_constant() {
        let options = BuildOptions::default();
        let ctx = InferContext::new(&options);

        let zeros = Constant::new(ElementType::F32, &[2, 2], ConstData::Int(vec![0])).unwrap();
        assert_eq!(zeros.value(), &ConstData::Float(vec![0.; 4]));
        let outputs = zeros.infer(&[], &ctx).unwrap();
        assert_eq!(outputs[0].shape(), &shape![2, 2]);
        assert_eq!(outputs[0].floats(), Some(vec![0.; 4]));

        let flag = Constant::new(ElementType::Boolean, &[1], ConstData::Bool(vec![true])).unwrap();
        assert_eq!(flag.info().bool_scalar_value(), Some(true));

        let err = Constant::new(ElementType::I32, &[3], ConstData::Int(vec![1, 2])).err();
        assert_eq!(
            err,
            Some(InferShapesError::InvalidArgument(
                "constant value length does not match its shape"
            ))
        );
        let err = Constant::new(ElementType::I64, &[], ConstData::Float(vec![0.5])).err();
        assert!(err.is_some());
    }

    #[test]
    fn test_constant_attributes() {
        let op = Constant::new(ElementType::I64, &[3], ConstData::Int(vec![1, 2, 3])).unwrap();
        let attrs = op.attributes();
        let reader = AttrReader::new(&attrs);
        let copy = Constant::read(&reader).unwrap();
        reader.finish().unwrap();
        assert_eq!(copy, op);
    }

    #[test]
    fn test_parameter_and_result() {
        let options = BuildOptions::default();
        let ctx = InferContext::new(&options);

        let param = Parameter {
            element_type: ElementType::F32,
            shape: shape![1, (1, 24), 4],
        };
        let outputs = param.infer(&[], &ctx).unwrap();
        assert_eq!(outputs[0], TensorInfo::new(ElementType::F32, shape![1, (1, 24), 4]));

        let result = ResultOp {}.infer(&outputs, &ctx).unwrap();
        assert_eq!(result, outputs);
        assert!(ResultOp {}.infer(&[], &ctx).is_err());
    }
}
