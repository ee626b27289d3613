use opgraph_shape_inference::ops as rules;
use opgraph_shape_inference::{InferShapes, InferShapesError};

use crate::ops::check_choice;

/// Check the `variance` attribute of the prior box generators.
fn check_variance(variance: &[f32]) -> Result<(), InferShapesError> {
    if ![0, 1, 4].contains(&variance.len()) {
        return Err(InferShapesError::InvalidArgument(
            "variance must have 0, 1 or 4 values",
        ));
    }
    Ok(())
}

define_op!(
    /// Prior boxes for SSD-style detectors, generated at every position of
    /// a feature map.
    PriorBox("PriorBox", "opset8") {
        min_size: Vec<f32>,
        max_size: Vec<f32> = Vec::new(),
        aspect_ratio: Vec<f32> = Vec::new(),
        flip: bool = false,
        clip: bool = false,
        step: f32 = 0.,
        offset: f32,
        variance: Vec<f32> = Vec::new(),
        scale_all_sizes: bool = true,
        density: Vec<f32> = Vec::new(),
        fixed_ratio: Vec<f32> = Vec::new(),
        fixed_size: Vec<f32> = Vec::new(),
        min_max_aspect_ratios_order: bool = true,
    }
    |op, inputs| {
        check_variance(&op.variance)?;
        rules::PriorBox {
            min_size: &op.min_size,
            max_size: &op.max_size,
            aspect_ratio: &op.aspect_ratio,
            density: &op.density,
            fixed_ratio: &op.fixed_ratio,
            fixed_size: &op.fixed_size,
            flip: op.flip,
            scale_all_sizes: op.scale_all_sizes,
        }
        .infer_shapes(inputs)
    }
);

define_op!(
    /// Prior boxes with explicitly listed widths and heights.
    PriorBoxClustered("PriorBoxClustered", "opset1") {
        width: Vec<f32>,
        height: Vec<f32>,
        clip: bool = true,
        step_widths: f32 = 0.,
        step_heights: f32 = 0.,
        step: f32 = 0.,
        offset: f32,
        variance: Vec<f32> = Vec::new(),
    }
    |op, inputs| {
        if op.width.len() != op.height.len() {
            return Err(InferShapesError::InvalidArgument(
                "width and height must have the same length",
            ));
        }
        check_variance(&op.variance)?;
        rules::PriorBoxClustered {
            num_priors: op.width.len(),
        }
        .infer_shapes(inputs)
    }
);

define_op!(
    /// Region proposals for Faster R-CNN style detectors. Outputs the boxes
    /// and their probabilities.
    Proposal("Proposal", "opset4") {
        base_size: usize,
        pre_nms_topn: usize,
        post_nms_topn: usize,
        nms_thresh: f32,
        feat_stride: usize,
        min_size: usize,
        ratio: Vec<f32>,
        scale: Vec<f32>,
        clip_before_nms: bool = true,
        clip_after_nms: bool = false,
        normalize: bool = false,
        box_size_scale: f32 = 1.,
        box_coordinate_scale: f32 = 1.,
        framework: String = String::new(),
    }
    |op, inputs| {
        check_choice(&op.framework, &["", "tensorflow"], "unsupported framework")?;
        if op.ratio.is_empty() || op.scale.is_empty() {
            return Err(InferShapesError::InvalidArgument(
                "ratio and scale must not be empty",
            ));
        }
        rules::Proposal {
            post_nms_topn: op.post_nms_topn,
        }
        .infer_shapes(inputs)
    }
);

define_op!(
    /// Region layer of YOLO detectors.
    RegionYolo("RegionYolo", "opset1") {
        coords: usize,
        classes: usize,
        num: usize,
        do_softmax: bool,
        mask: Vec<i64> = Vec::new(),
        axis: i64 = 1,
        end_axis: i64 = 3,
        anchors: Vec<f32> = Vec::new(),
    }
    |op, inputs| {
        rules::RegionYolo {
            coords: op.coords,
            classes: op.classes,
            num: op.num,
            do_softmax: op.do_softmax,
            mask: &op.mask,
            axis: op.axis,
            end_axis: op.end_axis,
        }
        .infer_shapes(inputs)
    }
);

define_op!(
    /// Reorganization layer of YOLO detectors.
    ///
    /// `stride` holds one value per spatial axis, which must all be equal.
    ReorgYolo("ReorgYolo", "opset2") {
        stride: Vec<usize>,
    }
    |op, inputs| {
        let Some((&stride, rest)) = op.stride.split_first() else {
            return Err(InferShapesError::InvalidArgument("stride must not be empty"));
        };
        if rest.iter().any(|&s| s != stride) {
            return Err(InferShapesError::InvalidArgument(
                "stride must be the same for each axis",
            ));
        }
        rules::ReorgYolo { stride }.infer_shapes(inputs)
    }
);
