use opgraph_shape_inference::ops as rules;
use opgraph_shape_inference::{ElementType, InferShapes};

define_op!(
    /// Remove dimensions of size 1, optionally restricted to the axes given
    /// by the second input.
    Squeeze("Squeeze", "opset1") {}
    |_op, inputs| {
        rules::Squeeze.infer_shapes(inputs)
    }
);

define_op!(
    /// Insert dimensions of size 1.
    Unsqueeze("Unsqueeze", "opset1") {}
    |_op, inputs| {
        rules::Unsqueeze.infer_shapes(inputs)
    }
);

define_op!(
    /// Sequence of numbers from scalar `start`, `stop` and `step` inputs.
    Range("Range", "opset4") {
        output_type: ElementType,
    }
    |op, inputs| {
        rules::Range {
            output_type: op.output_type,
        }
        .infer_shapes(inputs)
    }
);
