use opgraph_shape_inference::ops::{self as rules, ShapeCalculation};
use opgraph_shape_inference::InferShapes;

use crate::ops::check_choice;

define_op!(
    /// Resize the dimensions listed in `axes` to the sizes given by the
    /// second input.
    InterpolateV0("Interpolate", "opset1") {
        axes: Vec<i64>,
        mode: String,
        align_corners: bool = false,
        antialias: bool = false,
        pads_begin: Vec<usize> = Vec::new(),
        pads_end: Vec<usize> = Vec::new(),
    }
    |op, inputs| {
        check_choice(
            &op.mode,
            &["nearest", "linear", "cubic", "area"],
            "unsupported interpolation mode",
        )?;
        rules::InterpolateV0 { axes: &op.axes }.infer_shapes(inputs)
    }
);

define_op!(
    /// Resize a padded tensor, with output sizes computed from either the
    /// `sizes` or `scales` input.
    Interpolate("Interpolate", "opset4") {
        mode: String,
        shape_calculation_mode: ShapeCalculation,
        coordinate_transformation_mode: String = "half_pixel".to_string(),
        nearest_mode: String = "round_prefer_floor".to_string(),
        antialias: bool = false,
        pads_begin: Vec<usize> = Vec::new(),
        pads_end: Vec<usize> = Vec::new(),
        cube_coeff: f32 = -0.75,
    }
    |op, inputs| {
        check_choice(
            &op.mode,
            &["nearest", "linear", "linear_onnx", "cubic"],
            "unsupported interpolation mode",
        )?;
        check_choice(
            &op.coordinate_transformation_mode,
            &[
                "half_pixel",
                "pytorch_half_pixel",
                "asymmetric",
                "tf_half_pixel_for_nn",
                "align_corners",
            ],
            "unsupported coordinate transformation mode",
        )?;
        check_choice(
            &op.nearest_mode,
            &["round_prefer_floor", "round_prefer_ceil", "floor", "ceil", "simple"],
            "unsupported nearest mode",
        )?;
        rules::Interpolate {
            shape_calculation: op.shape_calculation_mode,
            pads_begin: &op.pads_begin,
            pads_end: &op.pads_end,
        }
        .infer_shapes(inputs)
    }
);
