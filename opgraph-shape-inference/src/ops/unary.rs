use crate::element_type::ElementType;
use crate::infer_shapes::{check_input_count, InferShapes, InferShapesError};
use crate::tensor_info::{ConstData, TensorInfo};

/// Convert a tensor to a different element type.
pub struct Convert {
    pub destination_type: ElementType,
}

impl InferShapes for Convert {
    fn infer_shapes(&self, inputs: &[TensorInfo]) -> Result<Vec<TensorInfo>, InferShapesError> {
        check_input_count(inputs, 1, 1)?;
        let data = &inputs[0];

        // Integer contents survive integer to integer conversions, which
        // keeps shape values computed in one integer type usable after a cast.
        let value = match data.value() {
            Some(ConstData::Int(values)) if self.destination_type.is_integral_number() => {
                Some(ConstData::Int(values.clone()))
            }
            _ => None,
        };
        let output = match value {
            Some(value) => {
                TensorInfo::constant(self.destination_type, data.shape().clone(), value)
            }
            None => TensorInfo::new(self.destination_type, data.shape().clone()),
        };
        Ok([output].into())
    }
}

/// Convert a tensor to the element type of a second "like" tensor.
pub struct ConvertLike;

impl InferShapes for ConvertLike {
    fn infer_shapes(&self, inputs: &[TensorInfo]) -> Result<Vec<TensorInfo>, InferShapesError> {
        check_input_count(inputs, 2, 2)?;
        Convert {
            destination_type: inputs[1].dtype(),
        }
        .infer_shapes(&inputs[..1])
    }
}
