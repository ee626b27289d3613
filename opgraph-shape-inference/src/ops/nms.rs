use crate::dimension::Dimension;
use crate::element_type::ElementType;
use crate::infer_shapes::{check_input_count, check_rank, InferShapes, InferShapesError};
use crate::partial_shape::PartialShape;
use crate::tensor_info::TensorInfo;

/// Return a dimension that may hold anywhere between zero and `max` items.
fn up_to(max: Dimension) -> Dimension {
    match max.max_length() {
        Some(max) => Dimension::bounded(0, max),
        None => Dimension::dynamic(),
    }
}

/// Cap the bounds of `dim` at `limit`, where a negative limit means no cap.
fn cap(dim: Dimension, limit: i64) -> Dimension {
    if limit < 0 {
        dim
    } else {
        dim.map_bounds(|n| n.min(limit as usize))
    }
}

fn check_output_type(dtype: ElementType) -> Result<(), InferShapesError> {
    match dtype {
        ElementType::I32 | ElementType::I64 => Ok(()),
        _ => Err(InferShapesError::InvalidArgument(
            "output type must be i32 or i64",
        )),
    }
}

/// Return the element type of the output scores, given the input scores.
fn score_type(scores: &TensorInfo) -> ElementType {
    if scores.dtype().is_dynamic() {
        ElementType::F32
    } else {
        scores.dtype()
    }
}

/// Check that `boxes` has shape `[.., .., 4]`.
fn check_boxes(boxes: &TensorInfo) -> Result<(), InferShapesError> {
    check_rank(boxes, 3)?;
    if !boxes.dim(2).contains(4) {
        return Err(InferShapesError::InvalidArgument(
            "boxes must have four coordinates",
        ));
    }
    Ok(())
}

/// Check that an optional threshold input is a scalar or single element.
fn check_scalar_input(input: Option<&TensorInfo>, msg: &'static str) -> Result<(), InferShapesError> {
    match input {
        Some(input) if input.rank().is_some_and(|r| r > 1) => {
            Err(InferShapesError::InvalidArgument(msg))
        }
        Some(input) if input.shape().num_elements().min_length() > 1 => {
            Err(InferShapesError::InvalidArgument(msg))
        }
        _ => Ok(()),
    }
}

/// Non-maximum suppression applied separately to each batch and class.
///
/// Inputs are boxes (`[batch, num_boxes, 4]`), scores
/// (`[batch, num_classes, num_boxes]`) and optionally
/// `max_output_boxes_per_class`, `iou_threshold`, `score_threshold` and
/// `soft_nms_sigma`. An omitted `max_output_boxes_per_class` means zero.
///
/// The first two outputs have shape `[selected, 3]`, where the number of
/// selected boxes is at most `batch * num_classes * min(num_boxes, max_output_boxes_per_class)`.
pub struct NonMaxSuppression {
    pub output_type: ElementType,
}

impl InferShapes for NonMaxSuppression {
    fn infer_shapes(&self, inputs: &[TensorInfo]) -> Result<Vec<TensorInfo>, InferShapesError> {
        check_input_count(inputs, 2, 6)?;
        check_output_type(self.output_type)?;
        let (boxes, scores) = (&inputs[0], &inputs[1]);
        check_boxes(boxes)?;
        check_rank(scores, 3)?;

        let batch = boxes.dim(0).merge(&scores.dim(0))?;
        let num_boxes = boxes.dim(1).merge(&scores.dim(2))?;
        let num_classes = scores.dim(1);

        let max_per_class = match inputs.get(2) {
            Some(max) => {
                check_scalar_input(
                    Some(max),
                    "max_output_boxes_per_class must be a scalar",
                )?;
                if max.dtype().is_static() && !max.dtype().is_integral_number() {
                    return Err(InferShapesError::InvalidArgument(
                        "max_output_boxes_per_class must be an integer",
                    ));
                }
                match max.int_scalar_value() {
                    Some(max) => cap(num_boxes, max.max(0)),
                    None => num_boxes,
                }
            }
            None => Dimension::fixed(0),
        };
        for (i, msg) in [
            (3, "iou_threshold must be a scalar"),
            (4, "score_threshold must be a scalar"),
            (5, "soft_nms_sigma must be a scalar"),
        ] {
            check_scalar_input(inputs.get(i), msg)?;
        }

        let selected = up_to(max_per_class * num_classes * batch);
        let shape = PartialShape::from_dims([selected, Dimension::fixed(3)]);
        Ok([
            TensorInfo::new(self.output_type, shape.clone()),
            TensorInfo::new(score_type(scores), shape),
            TensorInfo::new(self.output_type, PartialShape::from_static(&[1])),
        ]
        .into())
    }
}

/// Multi-class non-maximum suppression producing a flat list of
/// detections. Shared by `MulticlassNms` and `MatrixNms`.
///
/// Without the optional `roisnum` input, boxes are `[batch, num_boxes, 4]`
/// and scores `[batch, num_classes, num_boxes]`. With `roisnum` (`[batch]`),
/// boxes are `[num_classes, num_boxes, 4]` and scores
/// `[num_classes, num_boxes]`.
///
/// Outputs are the selected detections `[selected, 6]` (class, score and
/// box), their indices `[selected, 1]` and the number selected per batch
/// item `[batch]`.
pub struct MulticlassNms {
    /// Maximum boxes kept per class before suppression. Negative for no limit.
    pub nms_top_k: i64,
    /// Maximum boxes kept per batch item after suppression. Negative for no
    /// limit.
    pub keep_top_k: i64,
    pub output_type: ElementType,
}

impl InferShapes for MulticlassNms {
    fn infer_shapes(&self, inputs: &[TensorInfo]) -> Result<Vec<TensorInfo>, InferShapesError> {
        check_input_count(inputs, 2, 3)?;
        check_output_type(self.output_type)?;
        let (boxes, scores) = (&inputs[0], &inputs[1]);
        check_boxes(boxes)?;

        let (batch, num_classes, num_boxes) = match inputs.get(2) {
            Some(rois_num) => {
                check_rank(scores, 2)?;
                check_rank(rois_num, 1)?;
                let num_classes = boxes.dim(0).merge(&scores.dim(0))?;
                let num_boxes = boxes.dim(1).merge(&scores.dim(1))?;
                (rois_num.dim(0), num_classes, num_boxes)
            }
            None => {
                check_rank(scores, 3)?;
                let batch = boxes.dim(0).merge(&scores.dim(0))?;
                let num_boxes = boxes.dim(1).merge(&scores.dim(2))?;
                (batch, scores.dim(1), num_boxes)
            }
        };

        let per_batch = cap(cap(num_boxes, self.nms_top_k) * num_classes, self.keep_top_k);
        let selected = up_to(per_batch * batch);

        Ok([
            TensorInfo::new(
                score_type(boxes),
                PartialShape::from_dims([selected, Dimension::fixed(6)]),
            ),
            TensorInfo::new(
                self.output_type,
                PartialShape::from_dims([selected, Dimension::fixed(1)]),
            ),
            TensorInfo::new(self.output_type, PartialShape::from_dims([batch])),
        ]
        .into())
    }
}

/// Generate region proposals from anchors, box deltas and objectness scores.
///
/// Inputs are `im_info` (`[N, 3]` or `[N, 4]`), `anchors` (`[H, W, A, 4]`),
/// `deltas` (`[N, A * 4, H, W]`) and `scores` (`[N, A, H, W]`).
pub struct GenerateProposals {
    pub post_nms_count: usize,
    pub roi_num_type: ElementType,
}

impl InferShapes for GenerateProposals {
    fn infer_shapes(&self, inputs: &[TensorInfo]) -> Result<Vec<TensorInfo>, InferShapesError> {
        check_input_count(inputs, 4, 4)?;
        check_output_type(self.roi_num_type)?;
        if self.post_nms_count == 0 {
            return Err(InferShapesError::InvalidArgument(
                "post_nms_count must be positive",
            ));
        }
        let (im_info, anchors, deltas, scores) = (&inputs[0], &inputs[1], &inputs[2], &inputs[3]);
        check_rank(im_info, 2)?;
        check_rank(anchors, 4)?;
        check_rank(deltas, 4)?;
        check_rank(scores, 4)?;

        let info_len = im_info.dim(1);
        if !info_len.contains(3) && !info_len.contains(4) {
            return Err(InferShapesError::InvalidArgument(
                "image info must have 3 or 4 values",
            ));
        }

        let batch = im_info
            .dim(0)
            .merge(&deltas.dim(0))?
            .merge(&scores.dim(0))?;
        let num_anchors = anchors.dim(2).merge(&scores.dim(1))?;
        (num_anchors * 4).merge(&deltas.dim(1))?;
        for axis in 2..4 {
            anchors
                .dim(axis - 2)
                .merge(&deltas.dim(axis))?
                .merge(&scores.dim(axis))?;
        }

        let dtype = im_info.dtype().merge(anchors.dtype())?;
        let selected = up_to(batch * self.post_nms_count);
        Ok([
            TensorInfo::new(dtype, PartialShape::from_dims([selected, Dimension::fixed(4)])),
            TensorInfo::new(dtype, PartialShape::from_dims([selected])),
            TensorInfo::new(self.roi_num_type, PartialShape::from_dims([batch])),
        ]
        .into())
    }
}
