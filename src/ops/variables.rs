use opgraph_shape_inference::{InferShapes, InferShapesError, UnaryOp};

/// Fail if a variable has no identifier.
fn check_variable_id(id: &str) -> Result<(), InferShapesError> {
    if id.is_empty() {
        return Err(InferShapesError::InvalidArgument(
            "variable_id must not be empty",
        ));
    }
    Ok(())
}

define_op!(
    /// Read a state variable, initialized from the input.
    ReadValue("ReadValue", "opset6") {
        variable_id: String,
    }
    |op, inputs| {
        check_variable_id(&op.variable_id)?;
        UnaryOp.infer_shapes(inputs)
    }
);

define_op!(
    /// Write the input to a state variable.
    Assign("Assign", "opset6") {
        variable_id: String,
    }
    |op, inputs| {
        check_variable_id(&op.variable_id)?;
        UnaryOp.infer_shapes(inputs)
    }
);

#[cfg(test)]
mod tests {
    use opgraph_shape_inference::{shape, ElementType, TensorInfo};

    use super::{Assign, ReadValue};
    use crate::attrs::{AttrReader, Attributes};
    use crate::graph::ErrorKind;
    use crate::op_registry::{ReadOp, ReadOpError};
    use crate::operator::{InferContext, Operator};
    use crate::options::BuildOptions;

    #[test]
    fn test_variables() {
        let options = BuildOptions::default();
        let ctx = InferContext::new(&options);
        let init = TensorInfo::new(ElementType::I32, shape![2, 2]);

        let read = ReadValue {
            variable_id: "var_id".into(),
        };
        let outputs = read.infer(&[init.clone()], &ctx).unwrap();
        assert_eq!(outputs, [init]);

        let value = TensorInfo::new(ElementType::I32, shape![5, 7]);
        let assign = Assign {
            variable_id: "var_id".into(),
        };
        let outputs = assign.infer(&[value.clone()], &ctx).unwrap();
        assert_eq!(outputs, [value.clone()]);

        let unnamed = Assign {
            variable_id: String::new(),
        };
        let err = unnamed.infer(&[value], &ctx).err().unwrap();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }

    #[test]
    fn test_variable_id_required() {
        let attrs = Attributes::new();
        let reader = AttrReader::new(&attrs);
        assert_eq!(
            ReadValue::read(&reader).err(),
            Some(ReadOpError::MissingAttribute("variable_id".into()))
        );
    }
}
