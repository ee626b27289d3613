use std::str::FromStr;

use crate::dimension::Dimension;
use crate::infer_shapes::{
    check_input_count, check_rank, input_count_error, merge_dtypes, resolve_axes, InferShapes,
    InferShapesError,
};
use crate::partial_shape::PartialShape;
use crate::tensor_info::TensorInfo;

/// Layout of a YUV image.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum YuvFormat {
    /// Y plane followed by separate U and V planes at half resolution.
    I420,
    /// Y plane followed by an interleaved UV plane at half resolution.
    Nv12,
}

impl YuvFormat {
    /// Number of inputs when each plane is passed separately.
    pub fn planes(self) -> usize {
        match self {
            Self::I420 => 3,
            Self::Nv12 => 2,
        }
    }
}

/// Convert YUV images in NHWC layout to three channel RGB or BGR.
///
/// The image can be given as a single input with all planes stacked along
/// the height axis (`[N, H * 3 / 2, W, 1]`), or as one input per plane.
/// The output is `[N, H, W, 3]`.
pub struct YuvToRgb {
    pub format: YuvFormat,
}

impl YuvToRgb {
    fn check_plane(
        plane: &TensorInfo,
        channels: usize,
        msg: &'static str,
    ) -> Result<[Dimension; 3], InferShapesError> {
        check_rank(plane, 4)?;
        if !plane.dim(3).contains(channels) {
            return Err(InferShapesError::InvalidArgument(msg));
        }
        Ok([plane.dim(0), plane.dim(1), plane.dim(2)])
    }
}

impl InferShapes for YuvToRgb {
    fn infer_shapes(&self, inputs: &[TensorInfo]) -> Result<Vec<TensorInfo>, InferShapesError> {
        let planes = self.format.planes();
        if inputs.len() != 1 && inputs.len() != planes {
            return Err(input_count_error(inputs, 1, planes));
        }
        let dtype = merge_dtypes(inputs)?;

        let [batch, height, width] = if let [packed] = inputs {
            let [batch, packed_height, width] =
                Self::check_plane(packed, 1, "packed image must have one channel")?;
            let height = match packed_height.get_length() {
                Some(h) if h % 3 != 0 => {
                    return Err(InferShapesError::InvalidArgument(
                        "packed image height must be divisible by 3",
                    ));
                }
                _ => packed_height.map_bounds(|h| h * 2 / 3),
            };
            [batch, height, width]
        } else {
            let [mut batch, mut height, mut width] =
                Self::check_plane(&inputs[0], 1, "Y plane must have one channel")?;
            let chroma_channels = match self.format {
                YuvFormat::I420 => 1,
                YuvFormat::Nv12 => 2,
            };
            for plane in &inputs[1..] {
                let [n, h, w] = Self::check_plane(
                    plane,
                    chroma_channels,
                    "chroma plane has the wrong number of channels",
                )?;
                batch = batch.merge(&n)?;
                height = height.merge(&(h * 2))?;
                width = width.merge(&(w * 2))?;
            }
            [batch, height, width]
        };

        if width.get_length().is_some_and(|w| w % 2 != 0) {
            return Err(InferShapesError::InvalidArgument(
                "image width must be even",
            ));
        }

        let shape = PartialShape::from_dims([batch, height, width, Dimension::fixed(3)]);
        Ok([TensorInfo::new(dtype, shape)].into())
    }
}

/// Sample an `[N, C, H, W]` image at the locations given by a
/// `[N, H_out, W_out, 2]` grid.
pub struct GridSample;

impl InferShapes for GridSample {
    fn infer_shapes(&self, inputs: &[TensorInfo]) -> Result<Vec<TensorInfo>, InferShapesError> {
        check_input_count(inputs, 2, 2)?;
        let (data, grid) = (&inputs[0], &inputs[1]);
        check_rank(data, 4)?;
        check_rank(grid, 4)?;
        if !grid.dim(3).contains(2) {
            return Err(InferShapesError::InvalidArgument(
                "grid must have two coordinates per point",
            ));
        }
        if grid.dtype().is_static() && !grid.dtype().is_real() {
            return Err(InferShapesError::InvalidArgument(
                "grid must be a floating point tensor",
            ));
        }
        let batch = data.dim(0).merge(&grid.dim(0))?;
        let shape = PartialShape::from_dims([batch, data.dim(1), grid.dim(1), grid.dim(2)]);
        Ok([TensorInfo::new(data.dtype(), shape)].into())
    }
}

/// Resize the given axes of a tensor to the sizes in the second input.
pub struct InterpolateV0<'a> {
    pub axes: &'a [i64],
}

impl InferShapes for InterpolateV0<'_> {
    fn infer_shapes(&self, inputs: &[TensorInfo]) -> Result<Vec<TensorInfo>, InferShapesError> {
        check_input_count(inputs, 2, 2)?;
        let (data, target) = (&inputs[0], &inputs[1]);
        check_rank(target, 1)?;
        let Some(dims) = data.shape().dims() else {
            return Ok([data.without_value()].into());
        };
        let axes = resolve_axes(dims.len(), self.axes)?;
        let sizes = target.ints();
        if sizes.as_ref().is_some_and(|s| s.len() != axes.len()) {
            return Err(InferShapesError::InvalidArgument(
                "target shape must have one size per axis",
            ));
        }

        let mut out_dims = dims.to_vec();
        for (i, &axis) in axes.iter().enumerate() {
            out_dims[axis] = match &sizes {
                Some(sizes) => Dimension::from_i64(sizes[i]),
                None => Dimension::dynamic(),
            };
        }
        Ok([TensorInfo::new(data.dtype(), out_dims.into())].into())
    }
}

/// How `Interpolate` determines output sizes.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum ShapeCalculation {
    /// Use the `sizes` input.
    #[default]
    Sizes,
    /// Multiply the padded input sizes by the `scales` input.
    Scales,
}

impl ShapeCalculation {
    pub fn name(self) -> &'static str {
        match self {
            Self::Sizes => "sizes",
            Self::Scales => "scales",
        }
    }
}

impl FromStr for ShapeCalculation {
    type Err = InferShapesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "sizes" => Ok(Self::Sizes),
            "scales" => Ok(Self::Scales),
            _ => Err(InferShapesError::InvalidArgument(
                "unsupported shape calculation mode",
            )),
        }
    }
}

/// Resize a padded tensor.
///
/// Inputs are `data`, `sizes`, `scales` and optionally `axes`, which
/// defaults to all axes. Pads apply to every dimension of the input.
pub struct Interpolate<'a> {
    pub shape_calculation: ShapeCalculation,
    pub pads_begin: &'a [usize],
    pub pads_end: &'a [usize],
}

impl InferShapes for Interpolate<'_> {
    fn infer_shapes(&self, inputs: &[TensorInfo]) -> Result<Vec<TensorInfo>, InferShapesError> {
        check_input_count(inputs, 3, 4)?;
        let (data, sizes, scales) = (&inputs[0], &inputs[1], &inputs[2]);
        check_rank(sizes, 1)?;
        check_rank(scales, 1)?;

        let Some(dims) = data.shape().dims() else {
            return Ok([data.without_value()].into());
        };
        let axes = match inputs.get(3) {
            Some(axes) => match axes.ints() {
                Some(axes) => resolve_axes(dims.len(), &axes)?,
                None => {
                    let shape = PartialShape::with_rank(dims.len());
                    return Ok([TensorInfo::new(data.dtype(), shape)].into());
                }
            },
            None => (0..dims.len()).collect(),
        };

        let padded: Vec<Dimension> = dims
            .iter()
            .enumerate()
            .map(|(i, dim)| {
                let pad = self.pads_begin.get(i).copied().unwrap_or(0)
                    + self.pads_end.get(i).copied().unwrap_or(0);
                *dim + Dimension::fixed(pad)
            })
            .collect();
        let mut out_dims = padded.clone();

        match self.shape_calculation {
            ShapeCalculation::Sizes => {
                let sizes = sizes.ints();
                if sizes.as_ref().is_some_and(|s| s.len() != axes.len()) {
                    return Err(InferShapesError::InvalidArgument(
                        "sizes must have one value per axis",
                    ));
                }
                for (i, &axis) in axes.iter().enumerate() {
                    out_dims[axis] = sizes
                        .as_ref()
                        .map(|s| Dimension::from_i64(s[i]))
                        .unwrap_or_default();
                }
            }
            ShapeCalculation::Scales => {
                let scales = scales.floats();
                if scales.as_ref().is_some_and(|s| s.len() != axes.len()) {
                    return Err(InferShapesError::InvalidArgument(
                        "scales must have one value per axis",
                    ));
                }
                for (i, &axis) in axes.iter().enumerate() {
                    out_dims[axis] = match &scales {
                        Some(scales) if scales[i] <= 0.0 => {
                            return Err(InferShapesError::InvalidArgument(
                                "scales must be positive",
                            ));
                        }
                        Some(scales) => {
                            let scale = scales[i];
                            padded[axis]
                                .map_bounds(|size| (size as f64 * scale + 1e-5).floor() as usize)
                        }
                        None => Dimension::dynamic(),
                    };
                }
            }
        }

        Ok([TensorInfo::new(data.dtype(), out_dims.into())].into())
    }
}

#[cfg(test)]
mod tests {
    use opgraph_testing::TestCases;

    use super::{GridSample, Interpolate, InterpolateV0, ShapeCalculation, YuvFormat, YuvToRgb};
    use crate::infer_shapes::InferShapes;
    use crate::tensor_info::ConstData;
    use crate::{shape, Dimension, ElementType, InferShapesError, PartialShape, TensorInfo};

    fn f32_tensor(shape: PartialShape) -> TensorInfo {
        TensorInfo::new(ElementType::F32, shape)
    }

    #[test]
    fn test_yuv_to_rgb() {
        #[derive(Debug)]
        struct Case {
            format: YuvFormat,
            inputs: Vec<PartialShape>,
            expected: Result<PartialShape, InferShapesError>,
        }

        let cases = [
            Case {
                format: YuvFormat::I420,
                inputs: vec![shape![1, 720, 640, 1]],
                expected: Ok(shape![1, 480, 640, 3]),
            },
            Case {
                format: YuvFormat::I420,
                inputs: vec![
                    shape![1, 480, 640, 1],
                    shape![1, 240, 320, 1],
                    shape![1, 240, 320, 1],
                ],
                expected: Ok(shape![1, 480, 640, 3]),
            },
            Case {
                format: YuvFormat::I420,
                inputs: vec![shape![1, 480, 640, 1], shape![1, 240, 320, 1]],
                expected: Err(InferShapesError::InvalidArgumentCount {
                    min: 1,
                    max: 3,
                    actual: 2,
                }),
            },
            Case {
                format: YuvFormat::Nv12,
                inputs: vec![shape![1, 720, 640, 1]],
                expected: Ok(shape![1, 480, 640, 3]),
            },
            Case {
                format: YuvFormat::Nv12,
                inputs: vec![shape![1, 480, 640, 1], shape![1, 240, 320, 2]],
                expected: Ok(shape![1, 480, 640, 3]),
            },
            Case {
                format: YuvFormat::Nv12,
                inputs: vec![shape![1, 480, 640, 1], shape![1, 240, 320, 1]],
                expected: Err(InferShapesError::InvalidArgument(
                    "chroma plane has the wrong number of channels",
                )),
            },
            Case {
                format: YuvFormat::Nv12,
                inputs: vec![shape![Dimension::dynamic(), (6, 12), 8, 1]],
                expected: Ok(shape![Dimension::dynamic(), (4, 8), 8, 3]),
            },
        ];

        cases.test_each_value(|case| {
            let op = YuvToRgb {
                format: case.format,
            };
            let inputs: Vec<_> = case.inputs.into_iter().map(f32_tensor).collect();
            let result = op
                .infer_shapes(&inputs)
                .map(|outputs| outputs[0].shape().clone());
            assert_eq!(result, case.expected);
        })
    }

    #[test]
    fn test_grid_sample() {
        let data = TensorInfo::new(ElementType::I32, shape![1, 3, 100, 100]);
        let grid = f32_tensor(shape![1, 10, 10, 2]);
        let result = GridSample.infer_shapes(&[data, grid]).unwrap();
        assert_eq!(result[0], TensorInfo::new(ElementType::I32, shape![1, 3, 10, 10]));
    }

    #[test]
    fn test_interpolate_v0() {
        let op = InterpolateV0 { axes: &[2, 3] };
        let data = TensorInfo::new(ElementType::I32, shape![1, 3, 1024, 1024]);
        let result = op
            .infer_shapes(&[data.clone(), TensorInfo::from_ints(&[64, 64])])
            .unwrap();
        assert_eq!(result[0].shape(), &shape![1, 3, 64, 64]);

        let unknown = TensorInfo::new(ElementType::I64, shape![2]);
        let result = op.infer_shapes(&[data, unknown]).unwrap();
        assert_eq!(
            result[0].shape(),
            &shape![1, 3, Dimension::dynamic(), Dimension::dynamic()]
        );
    }

    #[test]
    fn test_interpolate() {
        #[derive(Debug)]
        struct Case {
            mode: ShapeCalculation,
            pads: Vec<usize>,
            expected: PartialShape,
        }

        let cases = [
            Case {
                mode: ShapeCalculation::Scales,
                pads: vec![],
                expected: shape![1, 3, 64, 64],
            },
            Case {
                mode: ShapeCalculation::Sizes,
                pads: vec![],
                expected: shape![1, 3, 256, 256],
            },
            Case {
                mode: ShapeCalculation::Scales,
                pads: vec![0, 0, 8, 8],
                expected: shape![1, 3, 65, 65],
            },
        ];

        cases.test_each(|case| {
            let op = Interpolate {
                shape_calculation: case.mode,
                pads_begin: &case.pads,
                pads_end: &case.pads,
            };
            let data = f32_tensor(shape![1, 3, 1024, 1024]);
            let sizes = TensorInfo::from_ints(&[256, 256]);
            let scales =
                TensorInfo::constant(ElementType::F32, shape![2], ConstData::Float(vec![0.0625; 2]));
            let axes = TensorInfo::from_ints(&[2, 3]);
            let result = op.infer_shapes(&[data, sizes, scales, axes]).unwrap();
            assert_eq!(result[0].shape(), &case.expected);
        })
    }
}
