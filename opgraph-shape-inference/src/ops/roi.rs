use crate::dimension::Dimension;
use crate::infer_shapes::{check_input_count, check_rank, merge_dtypes, InferShapes, InferShapesError};
use crate::partial_shape::PartialShape;
use crate::tensor_info::TensorInfo;

/// Check that `rois` has shape `[num_rois, box_size]` and return `num_rois`.
fn roi_count(rois: &TensorInfo, box_size: usize) -> Result<Dimension, InferShapesError> {
    check_rank(rois, 2)?;
    if !rois.dim(1).contains(box_size) {
        return Err(InferShapesError::InvalidArgument(
            "regions of interest have the wrong number of coordinates",
        ));
    }
    Ok(rois.dim(0))
}

/// Pool each region of interest of a `[N, C, H, W]` feature map to a fixed
/// size.
///
/// Regions are given as `[num_rois, 5]` (batch index plus corners).
pub struct RoiPool {
    pub pooled_h: usize,
    pub pooled_w: usize,
}

impl InferShapes for RoiPool {
    fn infer_shapes(&self, inputs: &[TensorInfo]) -> Result<Vec<TensorInfo>, InferShapesError> {
        check_input_count(inputs, 2, 2)?;
        let (data, rois) = (&inputs[0], &inputs[1]);
        check_rank(data, 4)?;
        if self.pooled_h == 0 || self.pooled_w == 0 {
            return Err(InferShapesError::InvalidArgument(
                "output size must be positive",
            ));
        }
        let num_rois = roi_count(rois, 5)?;
        let dtype = merge_dtypes(inputs)?;
        let shape = PartialShape::from_dims([
            num_rois,
            data.dim(1),
            Dimension::fixed(self.pooled_h),
            Dimension::fixed(self.pooled_w),
        ]);
        Ok([TensorInfo::new(dtype, shape)].into())
    }
}

/// Pool regions of interest using bilinear sampling.
///
/// Inputs are the feature map, regions as `[num_rois, 4]` and the batch
/// index of each region as `[num_rois]`.
pub struct RoiAlign {
    pub pooled_h: usize,
    pub pooled_w: usize,
}

impl InferShapes for RoiAlign {
    fn infer_shapes(&self, inputs: &[TensorInfo]) -> Result<Vec<TensorInfo>, InferShapesError> {
        check_input_count(inputs, 3, 3)?;
        let (data, rois, batch_indices) = (&inputs[0], &inputs[1], &inputs[2]);
        check_rank(data, 4)?;
        check_rank(batch_indices, 1)?;
        if self.pooled_h == 0 || self.pooled_w == 0 {
            return Err(InferShapesError::InvalidArgument(
                "pooled size must be positive",
            ));
        }
        if batch_indices.dtype().is_static() && !batch_indices.dtype().is_integral_number() {
            return Err(InferShapesError::InvalidArgument(
                "batch indices must be integers",
            ));
        }
        let num_rois = roi_count(rois, 4)?.merge(&batch_indices.dim(0))?;
        let dtype = data.dtype().merge(rois.dtype())?;
        let shape = PartialShape::from_dims([
            num_rois,
            data.dim(1),
            Dimension::fixed(self.pooled_h),
            Dimension::fixed(self.pooled_w),
        ]);
        Ok([TensorInfo::new(dtype, shape)].into())
    }
}

/// Position-sensitive region of interest pooling.
pub struct PsRoiPool {
    pub output_dim: usize,
    pub group_size: usize,
    /// Spatial bins for bilinear mode. `None` selects average mode, where
    /// each output channel reads `group_size²` input channels.
    pub spatial_bins: Option<(usize, usize)>,
}

impl InferShapes for PsRoiPool {
    fn infer_shapes(&self, inputs: &[TensorInfo]) -> Result<Vec<TensorInfo>, InferShapesError> {
        check_input_count(inputs, 2, 2)?;
        let (data, rois) = (&inputs[0], &inputs[1]);
        check_rank(data, 4)?;
        if self.output_dim == 0 || self.group_size == 0 {
            return Err(InferShapesError::InvalidArgument(
                "output_dim and group_size must be positive",
            ));
        }

        let channels_per_output = match self.spatial_bins {
            None => self.group_size * self.group_size,
            Some((0, _)) | Some((_, 0)) => {
                return Err(InferShapesError::InvalidArgument(
                    "spatial bins must be positive",
                ));
            }
            Some((x, y)) => x * y,
        };
        if !data.dim(1).contains(self.output_dim * channels_per_output) {
            return Err(InferShapesError::InvalidArgument(
                "input channel count does not match output_dim and group size",
            ));
        }

        let num_rois = roi_count(rois, 5)?;
        let dtype = merge_dtypes(inputs)?;
        let group = Dimension::fixed(self.group_size);
        let shape =
            PartialShape::from_dims([num_rois, Dimension::fixed(self.output_dim), group, group]);
        Ok([TensorInfo::new(dtype, shape)].into())
    }
}

/// Deformable position-sensitive region of interest pooling.
///
/// Inputs are the feature map, regions and optional offsets of shape
/// `[num_rois, 2, group, group]`.
pub struct DeformablePsRoiPool {
    pub output_dim: usize,
    pub group_size: usize,
}

impl InferShapes for DeformablePsRoiPool {
    fn infer_shapes(&self, inputs: &[TensorInfo]) -> Result<Vec<TensorInfo>, InferShapesError> {
        check_input_count(inputs, 2, 3)?;
        let (data, rois) = (&inputs[0], &inputs[1]);
        check_rank(data, 4)?;
        if self.output_dim == 0 || self.group_size == 0 {
            return Err(InferShapesError::InvalidArgument(
                "output_dim and group_size must be positive",
            ));
        }
        let mut num_rois = roi_count(rois, 5)?;
        if let Some(offsets) = inputs.get(2) {
            check_rank(offsets, 4)?;
            num_rois = num_rois.merge(&offsets.dim(0))?;
        }
        let dtype = merge_dtypes(inputs)?;
        let group = Dimension::fixed(self.group_size);
        let shape =
            PartialShape::from_dims([num_rois, Dimension::fixed(self.output_dim), group, group]);
        Ok([TensorInfo::new(dtype, shape)].into())
    }
}
