use opgraph_shape_inference::ops::{self as rules, YuvFormat};
use opgraph_shape_inference::InferShapes;

use crate::ops::check_choice;

/// Declare a YUV to RGB or BGR conversion. Channel order does not affect
/// the output shape.
macro_rules! color_convert_op {
    ($(#[$meta:meta])* $name:ident, $type_name:literal, $format:ident) => {
        define_op!(
            $(#[$meta])*
            $name($type_name, "opset8") {}
            |_op, inputs| {
                rules::YuvToRgb {
                    format: YuvFormat::$format,
                }
                .infer_shapes(inputs)
            }
        );
    };
}

color_convert_op!(
    /// Convert an I420 image, given as one input or as separate Y, U and V
    /// planes, to BGR.
    I420ToBgr,
    "I420toBGR",
    I420
);
color_convert_op!(
    /// Convert an I420 image to RGB.
    I420ToRgb,
    "I420toRGB",
    I420
);
color_convert_op!(
    /// Convert an NV12 image, given as one input or as separate Y and UV
    /// planes, to BGR.
    Nv12ToBgr,
    "NV12toBGR",
    Nv12
);
color_convert_op!(
    /// Convert an NV12 image to RGB.
    Nv12ToRgb,
    "NV12toRGB",
    Nv12
);

define_op!(
    /// Sample an image at the locations given by a grid.
    GridSample("GridSample", "opset9") {
        align_corners: bool = false,
        mode: String = "bilinear".to_string(),
        padding_mode: String = "zeros".to_string(),
    }
    |op, inputs| {
        check_choice(
            &op.mode,
            &["bilinear", "bicubic", "nearest"],
            "unsupported interpolation mode",
        )?;
        check_choice(
            &op.padding_mode,
            &["zeros", "border", "reflection"],
            "unsupported padding mode",
        )?;
        rules::GridSample.infer_shapes(inputs)
    }
);
