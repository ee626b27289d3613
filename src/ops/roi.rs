use opgraph_shape_inference::ops as rules;
use opgraph_shape_inference::{InferShapes, InferShapesError};

use crate::ops::check_choice;

define_op!(
    /// Max or bilinear pooling of regions of interest to `output_size`.
    RoiPooling("ROIPooling", "opset2") {
        output_size: Vec<usize>,
        spatial_scale: f32,
        method: String = "max".to_string(),
    }
    |op, inputs| {
        check_choice(&op.method, &["max", "bilinear"], "unsupported pooling method")?;
        let [pooled_h, pooled_w] = op.output_size[..] else {
            return Err(InferShapesError::InvalidArgument(
                "output_size must have two values",
            ));
        };
        rules::RoiPool { pooled_h, pooled_w }.infer_shapes(inputs)
    }
);

define_op!(
    /// Pool regions of interest using bilinear sampling.
    ///
    /// `aligned_mode` selects how pixel coordinates are mapped to sample
    /// positions: `asymmetric`, `half_pixel_for_nn` or `half_pixel`.
    RoiAlign("ROIAlign", "opset9") {
        pooled_h: usize,
        pooled_w: usize,
        sampling_ratio: usize,
        spatial_scale: f32,
        mode: String = "avg".to_string(),
        aligned_mode: String = "asymmetric".to_string(),
    }
    |op, inputs| {
        check_choice(&op.mode, &["avg", "max"], "unsupported pooling mode")?;
        check_choice(
            &op.aligned_mode,
            &["asymmetric", "half_pixel_for_nn", "half_pixel"],
            "unsupported aligned mode",
        )?;
        rules::RoiAlign {
            pooled_h: op.pooled_h,
            pooled_w: op.pooled_w,
        }
        .infer_shapes(inputs)
    }
);

define_op!(
    /// Position-sensitive ROI pooling in `average` or `bilinear` mode.
    PsRoiPooling("PSROIPooling", "opset1") {
        output_dim: usize,
        group_size: usize = 1,
        spatial_scale: f32,
        spatial_bins_x: usize = 1,
        spatial_bins_y: usize = 1,
        mode: String = "average".to_string(),
    }
    |op, inputs| {
        check_choice(&op.mode, &["average", "bilinear"], "unsupported pooling mode")?;
        let spatial_bins = if op.mode.eq_ignore_ascii_case("bilinear") {
            Some((op.spatial_bins_x, op.spatial_bins_y))
        } else {
            None
        };
        rules::PsRoiPool {
            output_dim: op.output_dim,
            group_size: op.group_size,
            spatial_bins,
        }
        .infer_shapes(inputs)
    }
);

define_op!(
    /// Position-sensitive ROI pooling with optional learned offsets.
    DeformablePsRoiPooling("DeformablePSROIPooling", "opset1") {
        output_dim: usize,
        spatial_scale: f32,
        group_size: usize = 1,
        mode: String = "bilinear_deformable".to_string(),
        spatial_bins_x: usize = 1,
        spatial_bins_y: usize = 1,
        trans_std: f32 = 1.,
        part_size: usize = 1,
    }
    |op, inputs| {
        check_choice(
            &op.mode,
            &["bilinear", "bilinear_deformable"],
            "unsupported pooling mode",
        )?;
        rules::DeformablePsRoiPool {
            output_dim: op.output_dim,
            group_size: op.group_size,
        }
        .infer_shapes(inputs)
    }
);

#[cfg(test)]
mod tests {
    use opgraph_shape_inference::{shape, ElementType, PartialShape, TensorInfo};

    use super::{DeformablePsRoiPooling, PsRoiPooling, RoiAlign, RoiPooling};
    use crate::attrs::{AttrReader, Attributes};
    use crate::graph::ErrorKind;
    use crate::op_registry::ReadOp;
    use crate::operator::{InferContext, Operator};
    use crate::options::BuildOptions;

    fn f32_tensor(shape: PartialShape) -> TensorInfo {
        TensorInfo::new(ElementType::F32, shape)
    }

    #[test]
    fn test_roi_pooling() {
        let options = BuildOptions::default();
        let ctx = InferContext::new(&options);
        let mut op = RoiPooling {
            output_size: vec![6, 6],
            spatial_scale: 0.0625,
            method: "max".into(),
        };
        let inputs = [f32_tensor(shape![2, 3, 4, 5]), f32_tensor(shape![150, 5])];
        let outputs = op.infer(&inputs, &ctx).unwrap();
        assert_eq!(outputs[0], f32_tensor(shape![150, 3, 6, 6]));

        op.output_size = vec![6];
        let err = op.infer(&inputs, &ctx).err().unwrap();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }

    #[test]
    fn test_roi_align() {
        let attrs = Attributes::new()
            .with("pooled_h", 2usize)
            .with("pooled_w", 3usize)
            .with("sampling_ratio", 2usize)
            .with("spatial_scale", 1.0f32)
            .with("aligned_mode", "half_pixel");
        let reader = AttrReader::new(&attrs);
        let op = RoiAlign::read(&reader).unwrap();
        assert_eq!(op.mode, "avg");

        let options = BuildOptions::default();
        let ctx = InferContext::new(&options);
        let outputs = op
            .infer(
                &[
                    f32_tensor(shape![2, 3, 5, 5]),
                    f32_tensor(shape![7, 4]),
                    TensorInfo::new(ElementType::I32, shape![7]),
                ],
                &ctx,
            )
            .unwrap();
        assert_eq!(outputs[0], f32_tensor(shape![7, 3, 2, 3]));

        let bad = RoiAlign {
            aligned_mode: "centered".into(),
            ..op
        };
        let err = bad
            .infer(
                &[
                    f32_tensor(shape![2, 3, 5, 5]),
                    f32_tensor(shape![7, 4]),
                    TensorInfo::new(ElementType::I32, shape![7]),
                ],
                &ctx,
            )
            .err()
            .unwrap();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }

    #[test]
    fn test_ps_roi_pooling() {
        let options = BuildOptions::default();
        let ctx = InferContext::new(&options);
        let rois = f32_tensor(shape![10, 5]);

        let average = PsRoiPooling {
            output_dim: 2,
            group_size: 3,
            spatial_scale: 1.,
            spatial_bins_x: 1,
            spatial_bins_y: 1,
            mode: "average".into(),
        };
        let outputs = average
            .infer(&[f32_tensor(shape![1, 18, 8, 8]), rois.clone()], &ctx)
            .unwrap();
        assert_eq!(outputs[0], f32_tensor(shape![10, 2, 3, 3]));

        let bilinear = PsRoiPooling {
            spatial_bins_x: 2,
            spatial_bins_y: 2,
            mode: "bilinear".into(),
            ..average
        };
        let outputs = bilinear
            .infer(&[f32_tensor(shape![1, 8, 8, 8]), rois.clone()], &ctx)
            .unwrap();
        assert_eq!(outputs[0], f32_tensor(shape![10, 2, 3, 3]));

        let err = bilinear
            .infer(&[f32_tensor(shape![1, 18, 8, 8]), rois], &ctx)
            .err()
            .unwrap();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }

    #[test]
    fn test_deformable_ps_roi_pooling() {
        let options = BuildOptions::default();
        let ctx = InferContext::new(&options);
        let op = DeformablePsRoiPooling {
            output_dim: 4,
            spatial_scale: 0.5,
            group_size: 2,
            mode: "bilinear_deformable".into(),
            spatial_bins_x: 1,
            spatial_bins_y: 1,
            trans_std: 1.,
            part_size: 2,
        };
        let outputs = op
            .infer(
                &[
                    f32_tensor(shape![1, 16, 10, 10]),
                    f32_tensor(shape![30, 5]),
                    f32_tensor(shape![30, 2, 2, 2]),
                ],
                &ctx,
            )
            .unwrap();
        assert_eq!(outputs[0], f32_tensor(shape![30, 4, 2, 2]));
    }
}
