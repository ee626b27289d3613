use crate::dimension::Dimension;
use crate::element_type::ElementType;
use crate::infer_shapes::{
    check_input_count, check_rank, merge_dtypes, resolve_axis, InferShapes, InferShapesError,
};
use crate::partial_shape::PartialShape;
use crate::tensor_info::TensorInfo;

/// Output of the prior box generators, `[2, 4 * H * W * num_priors]`.
///
/// `layer_shape` is the constant `[H, W]` input. If it is not a known
/// constant the second dimension is dynamic.
fn prior_boxes(
    inputs: &[TensorInfo],
    num_priors: usize,
) -> Result<Vec<TensorInfo>, InferShapesError> {
    check_input_count(inputs, 2, 2)?;
    let (layer_shape, image_shape) = (&inputs[0], &inputs[1]);
    check_rank(layer_shape, 1)?;
    check_rank(image_shape, 1)?;
    for input in inputs {
        if input.dtype().is_static() && !input.dtype().is_integral_number() {
            return Err(InferShapesError::InvalidArgument(
                "layer and image shapes must be integers",
            ));
        }
    }
    if !layer_shape.dim(0).contains(2) || !image_shape.dim(0).contains(2) {
        return Err(InferShapesError::InvalidArgument(
            "layer and image shapes must have two elements",
        ));
    }

    let boxes = match layer_shape.ints() {
        Some(hw) if hw.iter().any(|&x| x < 0) => {
            return Err(InferShapesError::InvalidArgument(
                "layer shape must not be negative",
            ));
        }
        Some(hw) => Dimension::fixed(4 * hw.iter().product::<i64>() as usize * num_priors),
        None => Dimension::dynamic(),
    };
    let shape = PartialShape::from_dims([Dimension::fixed(2), boxes]);
    Ok([TensorInfo::new(ElementType::F32, shape)].into())
}

/// Generate prior boxes for SSD-style detectors.
pub struct PriorBox<'a> {
    pub min_size: &'a [f32],
    pub max_size: &'a [f32],
    pub aspect_ratio: &'a [f32],
    pub density: &'a [f32],
    pub fixed_ratio: &'a [f32],
    pub fixed_size: &'a [f32],
    pub flip: bool,
    pub scale_all_sizes: bool,
}

impl PriorBox<'_> {
    /// Return the distinct aspect ratios, including 1 and, if `flip` is
    /// set, the reciprocal of each given ratio.
    pub fn normalized_aspect_ratios(&self) -> Vec<f32> {
        let round = |x: f32| (x * 1e6).round() / 1e6;
        let mut ratios = vec![1.0];
        for &ratio in self.aspect_ratio {
            ratios.push(round(ratio));
            if self.flip {
                ratios.push(round(1. / ratio));
            }
        }
        ratios.sort_by(f32::total_cmp);
        ratios.dedup();
        ratios
    }

    /// Number of boxes generated at each position of the layer.
    pub fn num_priors(&self) -> usize {
        let total_ratios = self.normalized_aspect_ratios().len();
        let mut num_priors = if self.scale_all_sizes {
            total_ratios * self.min_size.len() + self.max_size.len()
        } else {
            (total_ratios + self.min_size.len()).saturating_sub(1)
        };
        if !self.fixed_size.is_empty() {
            num_priors = total_ratios * self.fixed_size.len();
        }
        for &density in self.density {
            let density = density as usize;
            let extra = (density * density).saturating_sub(1);
            num_priors += if self.fixed_ratio.is_empty() {
                total_ratios * extra
            } else {
                self.fixed_ratio.len() * extra
            };
        }
        num_priors
    }
}

impl InferShapes for PriorBox<'_> {
    fn infer_shapes(&self, inputs: &[TensorInfo]) -> Result<Vec<TensorInfo>, InferShapesError> {
        prior_boxes(inputs, self.num_priors())
    }
}

/// Generate prior boxes with explicitly listed sizes.
pub struct PriorBoxClustered {
    pub num_priors: usize,
}

impl InferShapes for PriorBoxClustered {
    fn infer_shapes(&self, inputs: &[TensorInfo]) -> Result<Vec<TensorInfo>, InferShapesError> {
        prior_boxes(inputs, self.num_priors)
    }
}

/// Generate region proposals from class probabilities and box deltas.
///
/// Produces `[N * post_nms_topn, 5]` boxes and `[N * post_nms_topn]`
/// probabilities.
pub struct Proposal {
    pub post_nms_topn: usize,
}

impl InferShapes for Proposal {
    fn infer_shapes(&self, inputs: &[TensorInfo]) -> Result<Vec<TensorInfo>, InferShapesError> {
        check_input_count(inputs, 3, 3)?;
        let (probs, deltas, image_shape) = (&inputs[0], &inputs[1], &inputs[2]);
        check_rank(probs, 4)?;
        check_rank(deltas, 4)?;
        check_rank(image_shape, 1)?;
        let image_len = image_shape.dim(0);
        if !image_len.contains(3) && !image_len.contains(4) {
            return Err(InferShapesError::InvalidArgument(
                "image shape must have 3 or 4 elements",
            ));
        }

        let dtype = merge_dtypes([probs, deltas])?;
        let batch = probs.dim(0).merge(&deltas.dim(0))?;
        probs.dim(2).merge(&deltas.dim(2))?;
        probs.dim(3).merge(&deltas.dim(3))?;

        let rois = batch * self.post_nms_topn;
        Ok([
            TensorInfo::new(dtype, PartialShape::from_dims([rois, Dimension::fixed(5)])),
            TensorInfo::new(dtype, PartialShape::from_dims([rois])),
        ]
        .into())
    }
}

/// Region layer of YOLO detectors.
pub struct RegionYolo<'a> {
    pub coords: usize,
    pub classes: usize,
    pub num: usize,
    pub do_softmax: bool,
    pub mask: &'a [i64],
    pub axis: i64,
    pub end_axis: i64,
}

impl InferShapes for RegionYolo<'_> {
    fn infer_shapes(&self, inputs: &[TensorInfo]) -> Result<Vec<TensorInfo>, InferShapesError> {
        check_input_count(inputs, 1, 1)?;
        let data = &inputs[0];
        if data.dtype().is_static() && !data.dtype().is_real() {
            return Err(InferShapesError::InvalidArgument(
                "input must be a floating point tensor",
            ));
        }
        let Some(dims) = data.shape().dims() else {
            return Ok([TensorInfo::new(data.dtype(), PartialShape::dynamic())].into());
        };

        if self.do_softmax {
            let axis = resolve_axis(dims.len(), self.axis)?;
            let end_axis = resolve_axis(dims.len(), self.end_axis)?;
            if end_axis < axis {
                return Err(InferShapesError::InvalidArgument(
                    "end_axis must not precede axis",
                ));
            }
            let flattened = dims[axis..=end_axis]
                .iter()
                .fold(Dimension::fixed(1), |acc, dim| acc * *dim);
            let shape: PartialShape = dims[..axis]
                .iter()
                .copied()
                .chain([flattened])
                .chain(dims[end_axis + 1..].iter().copied())
                .collect();
            return Ok([TensorInfo::new(data.dtype(), shape)].into());
        }

        check_rank(data, 4)?;
        let channels = Dimension::fixed((self.classes + self.coords + 1) * self.mask.len());
        let shape = PartialShape::from_dims([dims[0], channels, dims[2], dims[3]]);
        Ok([TensorInfo::new(data.dtype(), shape)].into())
    }
}

/// Move `stride x stride` blocks of spatial positions into channels.
pub struct ReorgYolo {
    pub stride: usize,
}

impl InferShapes for ReorgYolo {
    fn infer_shapes(&self, inputs: &[TensorInfo]) -> Result<Vec<TensorInfo>, InferShapesError> {
        check_input_count(inputs, 1, 1)?;
        let data = &inputs[0];
        check_rank(data, 4)?;
        if self.stride == 0 {
            return Err(InferShapesError::InvalidArgument("stride must be positive"));
        }
        let stride = self.stride;
        for axis in [2, 3] {
            if data.dim(axis).get_length().is_some_and(|size| size % stride != 0) {
                return Err(InferShapesError::InvalidArgument(
                    "spatial dimensions must be divisible by stride",
                ));
            }
        }
        let shape = PartialShape::from_dims([
            data.dim(0),
            data.dim(1) * (stride * stride),
            data.dim(2).div_floor(stride),
            data.dim(3).div_floor(stride),
        ]);
        Ok([TensorInfo::new(data.dtype(), shape)].into())
    }
}
