use opgraph_shape_inference::ops as rules;
use opgraph_shape_inference::{ElementType, InferShapes, InferShapesError};

use crate::ops::{check_choice, check_input_count};

define_op!(
    /// Per-class non-maximum suppression.
    ///
    /// Outputs the selected indices as `[selected, 3]` triples of batch,
    /// class and box index, their scores and the number of valid entries.
    NonMaxSuppression("NonMaxSuppression", "opset9") {
        box_encoding: String = "corner".to_string(),
        sort_result_descending: bool = true,
        output_type: ElementType = ElementType::I64,
    }
    |op, inputs| {
        check_choice(&op.box_encoding, &["corner", "center"], "unsupported box encoding")?;
        rules::NonMaxSuppression {
            output_type: op.output_type,
        }
        .infer_shapes(inputs)
    }
);

/// Check the `sort_result_type` attribute shared by the multi-class NMS
/// operators.
fn check_sort_result_type(sort_result_type: &str) -> Result<(), InferShapesError> {
    check_choice(
        sort_result_type,
        &["none", "score", "classid"],
        "unsupported sort_result_type",
    )
}

define_op!(
    /// Multi-class non-maximum suppression returning a flat list of
    /// detections.
    MulticlassNms("MulticlassNms", "opset9") {
        sort_result_type: String = "none".to_string(),
        sort_result_across_batch: bool = false,
        output_type: ElementType = ElementType::I64,
        iou_threshold: f32 = 0.,
        score_threshold: f32 = 0.,
        nms_top_k: i64 = -1,
        keep_top_k: i64 = -1,
        background_class: i64 = -1,
        nms_eta: f32 = 1.,
        normalized: bool = true,
    }
    |op, inputs| {
        check_sort_result_type(&op.sort_result_type)?;
        if !(0. ..=1.).contains(&op.nms_eta) {
            return Err(InferShapesError::InvalidArgument(
                "nms_eta must be in [0, 1]",
            ));
        }
        rules::MulticlassNms {
            nms_top_k: op.nms_top_k,
            keep_top_k: op.keep_top_k,
            output_type: op.output_type,
        }
        .infer_shapes(inputs)
    }
);

define_op!(
    /// Non-maximum suppression which decays the scores of overlapping boxes
    /// instead of discarding them.
    MatrixNms("MatrixNms", "opset8") {
        sort_result_type: String = "none".to_string(),
        sort_result_across_batch: bool = false,
        output_type: ElementType = ElementType::I64,
        score_threshold: f32 = 0.,
        nms_top_k: i64 = -1,
        keep_top_k: i64 = -1,
        background_class: i64 = -1,
        decay_function: String = "linear".to_string(),
        gaussian_sigma: f32 = 2.,
        post_threshold: f32 = 0.,
        normalized: bool = true,
    }
    |op, inputs| {
        check_input_count(inputs, 2, 2)?;
        check_sort_result_type(&op.sort_result_type)?;
        check_choice(
            &op.decay_function,
            &["gaussian", "linear"],
            "unsupported decay function",
        )?;
        rules::MulticlassNms {
            nms_top_k: op.nms_top_k,
            keep_top_k: op.keep_top_k,
            output_type: op.output_type,
        }
        .infer_shapes(inputs)
    }
);

define_op!(
    /// Generate region proposals from anchors, box deltas and scores.
    GenerateProposals("GenerateProposals", "opset9") {
        min_size: f32,
        nms_threshold: f32,
        pre_nms_count: usize,
        post_nms_count: usize,
        normalized: bool = true,
        nms_eta: f32 = 1.,
        roi_num_type: ElementType = ElementType::I64,
    }
    |op, inputs| {
        rules::GenerateProposals {
            post_nms_count: op.post_nms_count,
            roi_num_type: op.roi_num_type,
        }
        .infer_shapes(inputs)
    }
);

#[cfg(test)]
mod tests {
    use opgraph_shape_inference::{shape, Dimension, ElementType, PartialShape, TensorInfo};

    use super::{GenerateProposals, MatrixNms, MulticlassNms, NonMaxSuppression};
    use crate::attrs::{AttrReader, Attributes};
    use crate::graph::ErrorKind;
    use crate::op_registry::ReadOp;
    use crate::operator::{InferContext, Operator};
    use crate::options::BuildOptions;

    fn f32_tensor(shape: PartialShape) -> TensorInfo {
        TensorInfo::new(ElementType::F32, shape)
    }

    #[test]
    fn test_non_max_suppression() {
        let options = BuildOptions::default();
        let ctx = InferContext::new(&options);
        let op = NonMaxSuppression {
            box_encoding: "corner".into(),
            sort_result_descending: true,
            output_type: ElementType::I32,
        };
        let outputs = op
            .infer(
                &[
                    f32_tensor(shape![1, 1000, 4]),
                    f32_tensor(shape![1, 1, 1000]),
                    TensorInfo::int_scalar(5),
                ],
                &ctx,
            )
            .unwrap();
        assert_eq!(outputs.len(), 3);
        assert_eq!(outputs[0].dtype(), ElementType::I32);
        assert_eq!(outputs[0].shape(), &shape![(0, 5), 3]);
        assert_eq!(outputs[1].dtype(), ElementType::F32);
        assert_eq!(outputs[2].shape(), &shape![1]);

        let center = NonMaxSuppression {
            box_encoding: "diagonal".into(),
            ..op
        };
        let err = center
            .infer(
                &[f32_tensor(shape![1, 1000, 4]), f32_tensor(shape![1, 1, 1000])],
                &ctx,
            )
            .err()
            .unwrap();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }

    #[test]
    fn test_multiclass_nms() {
        let attrs = Attributes::new()
            .with("nms_top_k", 10i64)
            .with("keep_top_k", 15i64)
            .with("output_type", ElementType::I32);
        let reader = AttrReader::new(&attrs);
        let op = MulticlassNms::read(&reader).unwrap();
        reader.finish().unwrap();

        let options = BuildOptions::default();
        let ctx = InferContext::new(&options);
        let outputs = op
            .infer(
                &[f32_tensor(shape![2, 100, 4]), f32_tensor(shape![2, 3, 100])],
                &ctx,
            )
            .unwrap();
        assert_eq!(outputs[0].shape(), &shape![(0, 30), 6]);
        assert_eq!(outputs[1], TensorInfo::new(ElementType::I32, shape![(0, 30), 1]));
        assert_eq!(outputs[2], TensorInfo::new(ElementType::I32, shape![2]));
    }

    #[test]
    fn test_matrix_nms() {
        let options = BuildOptions::default();
        let ctx = InferContext::new(&options);
        let op = MatrixNms {
            sort_result_type: "score".into(),
            sort_result_across_batch: false,
            output_type: ElementType::I64,
            score_threshold: 0.,
            nms_top_k: -1,
            keep_top_k: -1,
            background_class: -1,
            decay_function: "gaussian".into(),
            gaussian_sigma: 2.,
            post_threshold: 0.,
            normalized: true,
        };
        let outputs = op
            .infer(
                &[f32_tensor(shape![1, 10, 4]), f32_tensor(shape![1, 2, 10])],
                &ctx,
            )
            .unwrap();
        assert_eq!(outputs[0].shape(), &shape![(0, 20), 6]);

        let err = op
            .infer(
                &[
                    f32_tensor(shape![2, 10, 4]),
                    f32_tensor(shape![2, 10]),
                    TensorInfo::new(ElementType::I32, shape![1]),
                ],
                &ctx,
            )
            .err()
            .unwrap();
        assert_eq!(err.kind(), ErrorKind::InvalidArgumentCount);
    }

    #[test]
    fn test_generate_proposals() {
        let options = BuildOptions::default();
        let ctx = InferContext::new(&options);
        let op = GenerateProposals {
            min_size: 1.,
            nms_threshold: 0.7,
            pre_nms_count: 1000,
            post_nms_count: 100,
            normalized: true,
            nms_eta: 1.,
            roi_num_type: ElementType::I32,
        };
        let outputs = op
            .infer(
                &[
                    f32_tensor(shape![2, 3]),
                    f32_tensor(shape![50, 60, 3, 4]),
                    f32_tensor(shape![2, 12, 50, 60]),
                    f32_tensor(shape![2, 3, 50, 60]),
                ],
                &ctx,
            )
            .unwrap();
        assert_eq!(outputs[0].shape(), &shape![(0, 200), 4]);
        assert_eq!(outputs[1].shape(), &shape![(0, 200)]);
        assert_eq!(outputs[2], TensorInfo::new(ElementType::I32, shape![2]));

        let dynamic = Dimension::dynamic();
        let outputs = op
            .infer(
                &[
                    f32_tensor(shape![dynamic, 3]),
                    f32_tensor(shape![50, 60, 3, 4]),
                    f32_tensor(shape![dynamic, 12, 50, 60]),
                    f32_tensor(shape![dynamic, 3, 50, 60]),
                ],
                &ctx,
            )
            .unwrap();
        assert_eq!(outputs[0].shape(), &shape![dynamic, 4]);
    }
}
