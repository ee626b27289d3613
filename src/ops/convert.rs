use opgraph_shape_inference::ops as rules;
use opgraph_shape_inference::{ElementType, InferShapes};

define_op!(
    /// Convert elements to `destination_type`.
    Convert("Convert", "opset1") {
        destination_type: ElementType,
    }
    |op, inputs| {
        rules::Convert {
            destination_type: op.destination_type,
        }
        .infer_shapes(inputs)
    }
);

define_op!(
    /// Convert elements to the type of the second input.
    ConvertLike("ConvertLike", "opset1") {}
    |_op, inputs| {
        rules::ConvertLike.infer_shapes(inputs)
    }
);

#[cfg(test)]
mod tests {
    use opgraph_shape_inference::{shape, ElementType, TensorInfo};

    use super::{Convert, ConvertLike};
    use crate::operator::{InferContext, Operator};
    use crate::options::BuildOptions;

    #[test]
    fn test_convert() {
        let options = BuildOptions::default();
        let ctx = InferContext::new(&options);
        let data = TensorInfo::new(ElementType::I32, shape![4, 2]);

        let op = Convert {
            destination_type: ElementType::F32,
        };
        let outputs = op.infer(&[data.clone()], &ctx).unwrap();
        assert_eq!(outputs[0], TensorInfo::new(ElementType::F32, shape![4, 2]));

        let like = TensorInfo::new(ElementType::F16, shape![1]);
        let outputs = ConvertLike {}.infer(&[data, like], &ctx).unwrap();
        assert_eq!(outputs[0], TensorInfo::new(ElementType::F16, shape![4, 2]));
    }
}
