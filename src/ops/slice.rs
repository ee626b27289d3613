use opgraph_shape_inference::ops as rules;
use opgraph_shape_inference::InferShapes;

define_op!(
    /// Strided slice with inputs `data`, `start`, `stop`, `step` and
    /// optionally `axes`.
    Slice("Slice", "opset8") {}
    |_op, inputs| {
        rules::Slice.infer_shapes(inputs)
    }
);
