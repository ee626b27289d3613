use opgraph_shape_inference::{ElementType, InferShapes, PredicateOp, UnaryOp};

define_op!(
    /// Computes `x / (1 + |x|)` elementwise.
    SoftSign("SoftSign", "opset9") {}
    |_op, inputs| {
        UnaryOp.infer_shapes(inputs)
    }
);

define_op!(
    /// Test whether each element is neither infinite nor NaN.
    IsFinite("IsFinite", "opset10") {}
    |_op, inputs| {
        PredicateOp {
            output_type: ElementType::Boolean,
        }
        .infer_shapes(inputs)
    }
);

define_op!(
    /// Test whether each element is NaN.
    IsNaN("IsNaN", "opset10") {}
    |_op, inputs| {
        PredicateOp {
            output_type: ElementType::Boolean,
        }
        .infer_shapes(inputs)
    }
);

define_op!(
    /// Test whether each element is infinite.
    ///
    /// `detect_positive` and `detect_negative` select which infinities are
    /// reported.
    IsInf("IsInf", "opset10") {
        detect_positive: bool = true,
        detect_negative: bool = true,
    }
    |_op, inputs| {
        PredicateOp {
            output_type: ElementType::Boolean,
        }
        .infer_shapes(inputs)
    }
);
