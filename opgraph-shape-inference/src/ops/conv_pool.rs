use std::str::FromStr;

use smallvec::SmallVec;

use crate::dimension::Dimension;
use crate::element_type::ElementType;
use crate::infer_shapes::{check_input_count, check_rank, InferShapes, InferShapesError};
use crate::partial_shape::PartialShape;
use crate::tensor_info::TensorInfo;

/// Automatic padding mode of a windowed operator.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum AutoPad {
    /// Use the `pads_begin` and `pads_end` attributes.
    #[default]
    Explicit,
    /// No padding.
    Valid,
    /// Pad so that the output size is `ceil(input_size / stride)`, with any
    /// odd padding at the end.
    SameUpper,
    /// As `SameUpper`, but with any odd padding at the start.
    SameLower,
}

impl AutoPad {
    pub fn name(self) -> &'static str {
        match self {
            Self::Explicit => "explicit",
            Self::Valid => "valid",
            Self::SameUpper => "same_upper",
            Self::SameLower => "same_lower",
        }
    }
}

impl FromStr for AutoPad {
    type Err = InferShapesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "explicit" | "notset" => Ok(Self::Explicit),
            "valid" => Ok(Self::Valid),
            "same_upper" => Ok(Self::SameUpper),
            "same_lower" => Ok(Self::SameLower),
            _ => Err(InferShapesError::InvalidArgument("unsupported auto_pad mode")),
        }
    }
}

/// Specifies the padding used by a convolution or pooling operator.
///
/// This is derived from the `pads_begin`, `pads_end` and `auto_pad`
/// attributes.
#[derive(Clone, Debug, PartialEq)]
pub enum Padding<'a> {
    /// Pad the input so that the size of each output spatial dimension is
    /// `ceil(input_size / stride)`.
    ///
    /// The upper and lower variants only differ in where the padding goes,
    /// which doesn't affect the output shape.
    Same,

    /// Fixed padding at the start and end of each spatial dimension.
    Fixed {
        begin: &'a [usize],
        end: &'a [usize],
    },
}

impl<'a> Padding<'a> {
    pub fn new(auto_pad: AutoPad, begin: &'a [usize], end: &'a [usize]) -> Padding<'a> {
        match auto_pad {
            AutoPad::Explicit => Padding::Fixed { begin, end },
            AutoPad::Valid => Padding::Fixed { begin: &[], end: &[] },
            AutoPad::SameUpper | AutoPad::SameLower => Padding::Same,
        }
    }

    fn dim(&self, dim: usize) -> DimPadding {
        match self {
            Padding::Same => DimPadding::Same,
            Padding::Fixed { begin, end } => DimPadding::Fixed {
                begin: begin.get(dim).copied().unwrap_or(0),
                end: end.get(dim).copied().unwrap_or(0),
            },
        }
    }

    fn check_len(&self, spatial_dims: usize) -> Result<(), InferShapesError> {
        if let Padding::Fixed { begin, end } = self {
            if (!begin.is_empty() && begin.len() != spatial_dims)
                || (!end.is_empty() && end.len() != spatial_dims)
            {
                return Err(InferShapesError::InvalidArgument(
                    "pads must have one value per spatial dimension",
                ));
            }
        }
        Ok(())
    }
}

/// Padding for a single spatial dimension.
#[derive(Copy, Clone)]
enum DimPadding {
    Same,
    Fixed { begin: usize, end: usize },
}

/// Strides, dilations and padding of a sliding window.
struct Window<'a> {
    strides: &'a [usize],
    dilations: &'a [usize],
    padding: &'a Padding<'a>,
    ceil_mode: bool,
}

/// Return the per-dimension value of a window parameter, defaulting to 1 if
/// the parameter is empty.
fn window_param(values: &[usize], dim: usize) -> usize {
    values.get(dim).copied().unwrap_or(1)
}

impl Window<'_> {
    fn check(&self, spatial_dims: usize) -> Result<(), InferShapesError> {
        for (values, msg) in [
            (self.strides, "strides must have one value per spatial dimension"),
            (
                self.dilations,
                "dilations must have one value per spatial dimension",
            ),
        ] {
            if !values.is_empty() && values.len() != spatial_dims {
                return Err(InferShapesError::InvalidArgument(msg));
            }
            if values.contains(&0) {
                return Err(InferShapesError::InvalidArgument(
                    "strides and dilations must be positive",
                ));
            }
        }
        self.padding.check_len(spatial_dims)
    }

    /// Compute output spatial dimensions given input spatial dimensions and
    /// kernel sizes.
    fn output_dims(
        &self,
        in_dims: &[Dimension],
        kernel: &[Dimension],
    ) -> Result<SmallVec<[Dimension; 4]>, InferShapesError> {
        self.check(in_dims.len())?;
        in_dims
            .iter()
            .zip(kernel)
            .enumerate()
            .map(|(i, (in_size, kernel_size))| {
                output_size(
                    *in_size,
                    *kernel_size,
                    window_param(self.strides, i),
                    window_param(self.dilations, i),
                    self.padding.dim(i),
                    self.ceil_mode,
                )
            })
            .collect()
    }
}

/// Return the output size for a spatial dimension in a convolution or pooling
/// operation.
///
/// This is `floor((in + pad_begin + pad_end - dilation * (kernel - 1) - 1) / stride) + 1`,
/// or `ceil(in / stride)` for "same" padding. `ceil_mode` rounds the division
/// up instead of down.
fn output_size(
    in_size: Dimension,
    kernel_size: Dimension,
    stride: usize,
    dilation: usize,
    padding: DimPadding,
    ceil_mode: bool,
) -> Result<Dimension, InferShapesError> {
    let (pad_begin, pad_end) = match padding {
        DimPadding::Same => return Ok(in_size.div_ceil(stride)),
        DimPadding::Fixed { begin, end } => (begin, end),
    };
    let Some(kernel_size) = kernel_size.get_length() else {
        return Ok(Dimension::dynamic());
    };
    let dilated_kernel = dilation * kernel_size.saturating_sub(1) + 1;

    let window_count = |size: usize| -> Option<usize> {
        let span = (size + pad_begin + pad_end).checked_sub(dilated_kernel)?;
        let steps = if ceil_mode {
            span.div_ceil(stride)
        } else {
            span / stride
        };
        Some(steps + 1)
    };

    match in_size.get_length() {
        Some(size) => window_count(size)
            .map(Dimension::fixed)
            .ok_or(InferShapesError::InvalidKernel(
                "kernel is larger than the padded input",
            )),
        None => Ok(in_size.map_bounds(|size| window_count(size).unwrap_or(0))),
    }
}

/// Split a shape of the form `[N, C, spatial...]` into its parts.
fn split_nc(dims: &[Dimension]) -> Result<(Dimension, Dimension, &[Dimension]), InferShapesError> {
    match dims {
        [n, c, spatial @ ..] if !spatial.is_empty() => Ok((*n, *c, spatial)),
        _ => Err(InferShapesError::InvalidArgument(
            "input must have a batch, channel and at least one spatial dimension",
        )),
    }
}

/// Convolution with filters of shape `[C_out, C_in, kernel...]`.
///
/// Used for both regular and binary convolutions. Binary filters (`u1`) may
/// be combined with any data type.
pub struct Conv<'a> {
    pub strides: &'a [usize],
    pub dilations: &'a [usize],
    pub padding: Padding<'a>,
}

impl Conv<'_> {
    fn output(&self, data: &TensorInfo, filters: &TensorInfo) -> Result<TensorInfo, InferShapesError> {
        let dtype = if filters.dtype() == ElementType::U1 {
            data.dtype()
        } else {
            data.dtype().merge(filters.dtype())?
        };

        let (data_dims, filter_dims) = match (data.shape().dims(), filters.shape().dims()) {
            (Some(d), Some(f)) => (d, f),
            (None, Some(f)) => {
                let shape = PartialShape::with_rank(f.len()).with_dim(1, f[0]);
                return Ok(TensorInfo::new(dtype, shape));
            }
            _ => return Ok(TensorInfo::new(dtype, PartialShape::dynamic())),
        };

        check_rank(filters, data_dims.len())?;
        let (batch, in_channels, in_spatial) = split_nc(data_dims)?;
        let (out_channels, filter_channels, kernel) = split_nc(filter_dims)?;
        in_channels.merge(&filter_channels)?;

        let window = Window {
            strides: self.strides,
            dilations: self.dilations,
            padding: &self.padding,
            ceil_mode: false,
        };
        let out_spatial = window.output_dims(in_spatial, kernel)?;

        let shape = [batch, out_channels]
            .into_iter()
            .chain(out_spatial)
            .collect();
        Ok(TensorInfo::new(dtype, shape))
    }
}

impl InferShapes for Conv<'_> {
    fn infer_shapes(&self, inputs: &[TensorInfo]) -> Result<Vec<TensorInfo>, InferShapesError> {
        check_input_count(inputs, 2, 2)?;
        Ok([self.output(&inputs[0], &inputs[1])?].into())
    }
}

/// Convolution where the sampling positions are shifted by learned offsets.
///
/// Inputs are `data`, `offsets`, `filters` and optionally `mask`. Offsets
/// have shape `[N, 2 * deformable_group * kh * kw, out_h, out_w]` and the
/// mask `[N, deformable_group * kh * kw, out_h, out_w]`.
pub struct DeformableConv<'a> {
    pub conv: Conv<'a>,
    pub group: usize,
    pub deformable_group: usize,
}

impl InferShapes for DeformableConv<'_> {
    fn infer_shapes(&self, inputs: &[TensorInfo]) -> Result<Vec<TensorInfo>, InferShapesError> {
        check_input_count(inputs, 3, 4)?;
        let (data, offsets, filters) = (&inputs[0], &inputs[1], &inputs[2]);
        let mask = inputs.get(3);

        if self.group == 0 || self.deformable_group == 0 {
            return Err(InferShapesError::InvalidArgument(
                "group and deformable_group must be positive",
            ));
        }

        // Filters see `C_in / group` channels.
        let grouped_data = match data.shape().dims() {
            Some(dims) if dims.len() >= 2 => {
                let channels = dims[1];
                let grouped = match channels.get_length() {
                    Some(c) if c % self.group != 0 => {
                        return Err(InferShapesError::InvalidArgument(
                            "input channels must be divisible by group",
                        ));
                    }
                    _ => channels.div_floor(self.group),
                };
                data.clone().with_shape(data.shape().clone().with_dim(1, grouped))
            }
            _ => data.clone(),
        };
        let output = self.conv.output(&grouped_data, filters)?;

        let kernel_area = filters
            .shape()
            .dims()
            .filter(|dims| dims.len() > 2)
            .map(|dims| dims[2..].iter().fold(Dimension::fixed(1), |acc, d| acc * *d));

        for (input, per_group, what) in [
            (Some(offsets), 2, "offsets channel count does not match kernel size"),
            (mask, 1, "mask channel count does not match kernel size"),
        ] {
            let Some(input) = input else {
                continue;
            };
            check_rank(input, output.rank().unwrap_or(4))?;
            if let Some(area) = kernel_area {
                let expected = area * (per_group * self.deformable_group);
                if !input.dim(1).compatible(&expected) {
                    return Err(InferShapesError::InvalidArgument(what));
                }
            }
            if let (Some(out_dims), Some(in_dims)) = (output.shape().dims(), input.shape().dims()) {
                for (out_dim, in_dim) in out_dims.iter().zip(in_dims).skip(2) {
                    out_dim.merge(in_dim)?;
                }
            }
        }

        Ok([output].into())
    }
}

/// Local pooling operators (MaxPool, AvgPool).
pub struct Pool<'a> {
    pub kernel_size: &'a [usize],
    pub strides: &'a [usize],
    pub dilations: &'a [usize],
    pub padding: Padding<'a>,
    /// Round the output size up instead of down.
    pub ceil_mode: bool,
}

impl InferShapes for Pool<'_> {
    fn infer_shapes(&self, inputs: &[TensorInfo]) -> Result<Vec<TensorInfo>, InferShapesError> {
        check_input_count(inputs, 1, 1)?;
        let data = &inputs[0];
        let Some(dims) = data.shape().dims() else {
            return Ok([data.without_value()].into());
        };
        let (batch, channels, in_spatial) = split_nc(dims)?;
        if self.kernel_size.len() != in_spatial.len() {
            return Err(InferShapesError::InvalidArgument(
                "kernel must have one size per spatial dimension",
            ));
        }
        let kernel: SmallVec<[Dimension; 4]> =
            self.kernel_size.iter().copied().map(Dimension::fixed).collect();
        let window = Window {
            strides: self.strides,
            dilations: self.dilations,
            padding: &self.padding,
            ceil_mode: self.ceil_mode,
        };
        let out_spatial = window.output_dims(in_spatial, &kernel)?;
        let shape = [batch, channels].into_iter().chain(out_spatial).collect();
        Ok([TensorInfo::new(data.dtype(), shape)].into())
    }
}

/// Adaptive pooling, where the second input gives the output spatial size.
pub struct AdaptivePool {
    /// Element type of the indices output. If `None` the operator has a
    /// single output.
    pub index_type: Option<ElementType>,
}

impl InferShapes for AdaptivePool {
    fn infer_shapes(&self, inputs: &[TensorInfo]) -> Result<Vec<TensorInfo>, InferShapesError> {
        check_input_count(inputs, 2, 2)?;
        let (data, output_shape) = (&inputs[0], &inputs[1]);
        check_rank(output_shape, 1)?;

        let shape = match data.shape().dims() {
            Some(dims) => {
                let (batch, channels, in_spatial) = split_nc(dims)?;
                let out_spatial: SmallVec<[Dimension; 4]> = match output_shape.ints() {
                    Some(sizes) if sizes.len() != in_spatial.len() => {
                        return Err(InferShapesError::InvalidArgument(
                            "output shape must have one size per spatial dimension",
                        ));
                    }
                    Some(sizes) => sizes.into_iter().map(Dimension::from_i64).collect(),
                    None => in_spatial.iter().map(|_| Dimension::dynamic()).collect(),
                };
                [batch, channels].into_iter().chain(out_spatial).collect()
            }
            None => PartialShape::dynamic(),
        };

        let mut outputs = vec![TensorInfo::new(data.dtype(), shape.clone())];
        if let Some(index_type) = self.index_type {
            if index_type != ElementType::I32 && index_type != ElementType::I64 {
                return Err(InferShapesError::InvalidArgument(
                    "index element type must be i32 or i64",
                ));
            }
            outputs.push(TensorInfo::new(index_type, shape));
        }
        Ok(outputs)
    }
}

/// Extract patches from images and stack them in the channel dimension.
///
/// Given input `[N, C, H, W]` the output is `[N, C * size_r * size_c, out_r, out_c]`.
pub struct ExtractImagePatches<'a> {
    pub sizes: &'a [usize],
    pub strides: &'a [usize],
    pub rates: &'a [usize],
    pub auto_pad: AutoPad,
}

impl InferShapes for ExtractImagePatches<'_> {
    fn infer_shapes(&self, inputs: &[TensorInfo]) -> Result<Vec<TensorInfo>, InferShapesError> {
        check_input_count(inputs, 1, 1)?;
        let data = &inputs[0];
        check_rank(data, 4)?;
        for values in [self.sizes, self.strides, self.rates] {
            if values.len() != 2 {
                return Err(InferShapesError::InvalidArgument(
                    "sizes, strides and rates must have two values",
                ));
            }
        }

        let Some(dims) = data.shape().dims() else {
            return Ok([TensorInfo::new(data.dtype(), PartialShape::with_rank(4))].into());
        };
        let padding = match self.auto_pad {
            AutoPad::SameUpper | AutoPad::SameLower => Padding::Same,
            AutoPad::Valid | AutoPad::Explicit => Padding::Fixed { begin: &[], end: &[] },
        };
        let window = Window {
            strides: self.strides,
            dilations: self.rates,
            padding: &padding,
            ceil_mode: false,
        };
        let kernel = [Dimension::fixed(self.sizes[0]), Dimension::fixed(self.sizes[1])];
        let out_spatial = window.output_dims(&dims[2..], &kernel)?;
        let channels = dims[1] * (self.sizes[0] * self.sizes[1]);
        let shape = [dims[0], channels].into_iter().chain(out_spatial).collect();
        Ok([TensorInfo::new(data.dtype(), shape)].into())
    }
}

#[cfg(test)]
mod tests {
    use opgraph_testing::TestCases;

    use super::{
        AdaptivePool, AutoPad, Conv, DeformableConv, ExtractImagePatches, Padding, Pool,
    };
    use crate::infer_shapes::InferShapes;
    use crate::{shape, Dimension, ElementType, InferShapesError, PartialShape, TensorInfo};

    fn f32_tensor(shape: PartialShape) -> TensorInfo {
        TensorInfo::new(ElementType::F32, shape)
    }

    #[test]
    fn test_conv() {
        #[derive(Debug)]
        struct Case {
            data: PartialShape,
            filters: PartialShape,
            strides: Vec<usize>,
            pads: Vec<usize>,
            dilations: Vec<usize>,
            auto_pad: AutoPad,
            expected: Result<PartialShape, InferShapesError>,
        }

        let cases = [
            Case {
                data: shape![1, 1, 9, 9],
                filters: shape![1, 1, 3, 3],
                strides: vec![1, 1],
                pads: vec![0, 0],
                dilations: vec![1, 1],
                auto_pad: AutoPad::Explicit,
                expected: Ok(shape![1, 1, 7, 7]),
            },
            Case {
                data: shape![2, 3, 32, 20],
                filters: shape![8, 3, 5, 5],
                strides: vec![2, 2],
                pads: vec![2, 2],
                dilations: vec![1, 1],
                auto_pad: AutoPad::Explicit,
                expected: Ok(shape![2, 8, 16, 10]),
            },
            Case {
                data: shape![1, 3, 15],
                filters: shape![4, 3, 3],
                strides: vec![4],
                pads: vec![],
                dilations: vec![1],
                auto_pad: AutoPad::SameUpper,
                expected: Ok(shape![1, 4, 4]),
            },
            Case {
                data: shape![1, 3, 10],
                filters: shape![4, 3, 3],
                strides: vec![1],
                pads: vec![0],
                dilations: vec![2],
                auto_pad: AutoPad::Valid,
                expected: Ok(shape![1, 4, 6]),
            },
            Case {
                data: shape![Dimension::dynamic(), 3, (8, 16)],
                filters: shape![4, 3, 3],
                strides: vec![1],
                pads: vec![0],
                dilations: vec![1],
                auto_pad: AutoPad::Explicit,
                expected: Ok(shape![Dimension::dynamic(), 4, (6, 14)]),
            },
            Case {
                data: shape![1, 1, 2, 2],
                filters: shape![1, 1, 3, 3],
                strides: vec![1, 1],
                pads: vec![0, 0],
                dilations: vec![1, 1],
                auto_pad: AutoPad::Explicit,
                expected: Err(InferShapesError::InvalidKernel(
                    "kernel is larger than the padded input",
                )),
            },
            Case {
                data: shape![1, 2, 9, 9],
                filters: shape![1, 3, 3, 3],
                strides: vec![1, 1],
                pads: vec![0, 0],
                dilations: vec![1, 1],
                auto_pad: AutoPad::Explicit,
                expected: Err(InferShapesError::DimensionMismatch(
                    Dimension::fixed(2),
                    Dimension::fixed(3),
                )),
            },
        ];

        cases.test_each(|case| {
            let op = Conv {
                strides: &case.strides,
                dilations: &case.dilations,
                padding: Padding::new(case.auto_pad, &case.pads, &case.pads),
            };
            let result = op
                .infer_shapes(&[f32_tensor(case.data.clone()), f32_tensor(case.filters.clone())])
                .map(|outputs| outputs[0].shape().clone());
            assert_eq!(result, case.expected);
        })
    }

    #[test]
    fn test_binary_filters() {
        let op = Conv {
            strides: &[1, 1],
            dilations: &[1, 1],
            padding: Padding::new(AutoPad::Explicit, &[0, 0], &[0, 0]),
        };
        let data = f32_tensor(shape![1, 1, 9, 9]);
        let filters = TensorInfo::new(ElementType::U1, shape![1, 1, 3, 3]);
        let result = op.infer_shapes(&[data, filters]).unwrap();
        assert_eq!(result[0], f32_tensor(shape![1, 1, 7, 7]));
    }

    #[test]
    fn test_deformable_conv() {
        let op = DeformableConv {
            conv: Conv {
                strides: &[1, 1],
                dilations: &[1, 1],
                padding: Padding::new(AutoPad::Explicit, &[0, 0], &[0, 0]),
            },
            group: 1,
            deformable_group: 1,
        };
        let data = f32_tensor(shape![1, 1, 9, 9]);
        let offsets = f32_tensor(shape![1, 18, 7, 7]);
        let filters = f32_tensor(shape![1, 1, 3, 3]);
        let mask = f32_tensor(shape![1, 9, 7, 7]);

        let result = op
            .infer_shapes(&[data.clone(), offsets.clone(), filters.clone()])
            .unwrap();
        assert_eq!(result[0].shape(), &shape![1, 1, 7, 7]);

        let result = op
            .infer_shapes(&[data.clone(), offsets, filters.clone(), mask])
            .unwrap();
        assert_eq!(result[0].shape(), &shape![1, 1, 7, 7]);

        let bad_offsets = f32_tensor(shape![1, 9, 7, 7]);
        let err = op.infer_shapes(&[data, bad_offsets, filters]).err();
        assert_eq!(
            err,
            Some(InferShapesError::InvalidArgument(
                "offsets channel count does not match kernel size"
            ))
        );
    }

    #[test]
    fn test_pool() {
        #[derive(Debug)]
        struct Case {
            data: PartialShape,
            kernel: Vec<usize>,
            strides: Vec<usize>,
            pads: Vec<usize>,
            ceil_mode: bool,
            expected: PartialShape,
        }

        let cases = [
            Case {
                data: shape![1, 3, 32, 32],
                kernel: vec![2, 2],
                strides: vec![2, 2],
                pads: vec![0, 0],
                ceil_mode: false,
                expected: shape![1, 3, 16, 16],
            },
            Case {
                data: shape![1, 3, 7, 7],
                kernel: vec![2, 2],
                strides: vec![2, 2],
                pads: vec![0, 0],
                ceil_mode: false,
                expected: shape![1, 3, 3, 3],
            },
            Case {
                data: shape![1, 3, 7, 7],
                kernel: vec![2, 2],
                strides: vec![2, 2],
                pads: vec![0, 0],
                ceil_mode: true,
                expected: shape![1, 3, 4, 4],
            },
        ];

        cases.test_each(|case| {
            let op = Pool {
                kernel_size: &case.kernel,
                strides: &case.strides,
                dilations: &[],
                padding: Padding::new(AutoPad::Explicit, &case.pads, &case.pads),
                ceil_mode: case.ceil_mode,
            };
            let result = op.infer_shapes(&[f32_tensor(case.data.clone())]).unwrap();
            assert_eq!(result[0].shape(), &case.expected);
        })
    }

    #[test]
    fn test_adaptive_pool() {
        let data = f32_tensor(shape![2, 24, 34, 62]);
        let output_shape = TensorInfo::from_ints(&[16, 16]);

        let avg = AdaptivePool { index_type: None };
        let result = avg
            .infer_shapes(&[data.clone(), output_shape.clone()])
            .unwrap();
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].shape(), &shape![2, 24, 16, 16]);

        let max = AdaptivePool {
            index_type: Some(ElementType::I32),
        };
        let result = max.infer_shapes(&[data.clone(), output_shape]).unwrap();
        assert_eq!(result.len(), 2);
        assert_eq!(result[1], TensorInfo::new(ElementType::I32, shape![2, 24, 16, 16]));

        let unknown = TensorInfo::new(ElementType::I64, shape![2]);
        let result = avg.infer_shapes(&[data, unknown]).unwrap();
        assert_eq!(
            result[0].shape(),
            &shape![2, 24, Dimension::dynamic(), Dimension::dynamic()]
        );
    }

    #[test]
    fn test_extract_image_patches() {
        let op = ExtractImagePatches {
            sizes: &[3, 3],
            strides: &[5, 5],
            rates: &[1, 1],
            auto_pad: AutoPad::Valid,
        };
        let data = f32_tensor(shape![64, 3, 10, 10]);
        let result = op.infer_shapes(&[data.clone()]).unwrap();
        assert_eq!(result[0].shape(), &shape![64, 27, 2, 2]);

        let op = ExtractImagePatches {
            auto_pad: AutoPad::SameUpper,
            ..op
        };
        let result = op.infer_shapes(&[data]).unwrap();
        assert_eq!(result[0].shape(), &shape![64, 27, 2, 2]);
    }
}
