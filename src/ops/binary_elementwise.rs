use opgraph_shape_inference::ops as rules;
use opgraph_shape_inference::{AutoBroadcast, InferShapes};

/// Declare an elementwise binary operator with an `auto_broadcast`
/// attribute.
macro_rules! binary_op {
    ($(#[$meta:meta])* $name:ident, $type_name:literal) => {
        define_op!(
            $(#[$meta])*
            $name($type_name, "opset1") {
                auto_broadcast: AutoBroadcast = AutoBroadcast::Numpy,
            }
            |op, inputs| {
                rules::$name {
                    auto_broadcast: op.auto_broadcast,
                }
                .infer_shapes(inputs)
            }
        );
    };
}

binary_op!(
    /// Elementwise addition.
    Add,
    "Add"
);
binary_op!(
    /// Elementwise division. Integer division rounds towards negative
    /// infinity.
    Divide,
    "Divide"
);
binary_op!(
    /// Remainder of floor division.
    FloorMod,
    "FloorMod"
);
binary_op!(Maximum, "Maximum");
binary_op!(Minimum, "Minimum");
binary_op!(Multiply, "Multiply");
binary_op!(Power, "Power");
binary_op!(Subtract, "Subtract");
