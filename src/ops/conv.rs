use opgraph_shape_inference::ops::{self as rules, AutoPad, Padding};
use opgraph_shape_inference::InferShapes;

use crate::ops::check_choice;

define_op!(
    /// N-dimensional convolution of `[N, C, ...]` data with
    /// `[C_out, C, ...]` filters.
    Convolution("Convolution", "opset1") {
        strides: Vec<usize>,
        pads_begin: Vec<usize>,
        pads_end: Vec<usize>,
        dilations: Vec<usize>,
        auto_pad: AutoPad = AutoPad::Explicit,
    }
    |op, inputs| {
        rules::Conv {
            strides: &op.strides,
            dilations: &op.dilations,
            padding: Padding::new(op.auto_pad, &op.pads_begin, &op.pads_end),
        }
        .infer_shapes(inputs)
    }
);

define_op!(
    /// Convolution with binarized filters.
    BinaryConvolution("BinaryConvolution", "opset1") {
        strides: Vec<usize>,
        pads_begin: Vec<usize>,
        pads_end: Vec<usize>,
        dilations: Vec<usize>,
        mode: String = "xnor-popcount".to_string(),
        pad_value: f32 = 0.,
        auto_pad: AutoPad = AutoPad::Explicit,
    }
    |op, inputs| {
        check_choice(&op.mode, &["xnor-popcount"], "unsupported binary convolution mode")?;
        rules::Conv {
            strides: &op.strides,
            dilations: &op.dilations,
            padding: Padding::new(op.auto_pad, &op.pads_begin, &op.pads_end),
        }
        .infer_shapes(inputs)
    }
);

define_op!(
    /// Convolution sampled at positions shifted by learned offsets, with an
    /// optional modulation mask.
    DeformableConvolution("DeformableConvolution", "opset8") {
        strides: Vec<usize>,
        pads_begin: Vec<usize>,
        pads_end: Vec<usize>,
        dilations: Vec<usize>,
        auto_pad: AutoPad = AutoPad::Explicit,
        group: usize = 1,
        deformable_group: usize = 1,
        bilinear_interpolation_pad: bool = false,
    }
    |op, inputs| {
        rules::DeformableConv {
            conv: rules::Conv {
                strides: &op.strides,
                dilations: &op.dilations,
                padding: Padding::new(op.auto_pad, &op.pads_begin, &op.pads_end),
            },
            group: op.group,
            deformable_group: op.deformable_group,
        }
        .infer_shapes(inputs)
    }
);

#[cfg(test)]
mod tests {
    use opgraph_shape_inference::ops::AutoPad;
    use opgraph_shape_inference::{shape, ElementType, PartialShape, TensorInfo};
    use opgraph_testing::TestCases;

    use super::{BinaryConvolution, Convolution, DeformableConvolution};
    use crate::graph::ErrorKind;
    use crate::operator::{InferContext, Operator};
    use crate::options::BuildOptions;

    fn f32_tensor(shape: PartialShape) -> TensorInfo {
        TensorInfo::new(ElementType::F32, shape)
    }

    #[test]
    fn test_convolution() {
        #[derive(Debug)]
        struct Case {
            auto_pad: AutoPad,
            strides: Vec<usize>,
            pads: Vec<usize>,
            expected: PartialShape,
        }

        let cases = [
            Case {
                auto_pad: AutoPad::Explicit,
                strides: vec![1, 1],
                pads: vec![0, 0],
                expected: shape![1, 8, 30, 30],
            },
            Case {
                auto_pad: AutoPad::Explicit,
                strides: vec![2, 2],
                pads: vec![1, 1],
                expected: shape![1, 8, 16, 16],
            },
            Case {
                auto_pad: AutoPad::SameUpper,
                strides: vec![2, 2],
                pads: vec![0, 0],
                expected: shape![1, 8, 16, 16],
            },
            Case {
                auto_pad: AutoPad::Valid,
                strides: vec![1, 1],
                pads: vec![5, 5],
                expected: shape![1, 8, 30, 30],
            },
        ];

        let options = BuildOptions::default();
        let ctx = InferContext::new(&options);
        cases.test_each(|case| {
            let op = Convolution {
                strides: case.strides.clone(),
                pads_begin: case.pads.clone(),
                pads_end: case.pads.clone(),
                dilations: vec![1, 1],
                auto_pad: case.auto_pad,
            };
            let outputs = op
                .infer(
                    &[
                        f32_tensor(shape![1, 3, 32, 32]),
                        f32_tensor(shape![8, 3, 3, 3]),
                    ],
                    &ctx,
                )
                .unwrap();
            assert_eq!(outputs[0].shape(), &case.expected);
        })
    }

    #[test]
    fn test_convolution_channel_mismatch() {
        let options = BuildOptions::default();
        let ctx = InferContext::new(&options);
        let op = Convolution {
            strides: vec![1, 1],
            pads_begin: vec![0, 0],
            pads_end: vec![0, 0],
            dilations: vec![1, 1],
            auto_pad: AutoPad::Explicit,
        };
        let err = op
            .infer(
                &[
                    f32_tensor(shape![1, 4, 32, 32]),
                    f32_tensor(shape![8, 3, 3, 3]),
                ],
                &ctx,
            )
            .err()
            .unwrap();
        assert_eq!(err.kind(), ErrorKind::DimensionMismatch);
    }

    #[test]
    fn test_binary_convolution() {
        let options = BuildOptions::default();
        let ctx = InferContext::new(&options);
        let mut op = BinaryConvolution {
            strides: vec![1, 1],
            pads_begin: vec![0, 0],
            pads_end: vec![0, 0],
            dilations: vec![1, 1],
            mode: "xnor-popcount".into(),
            pad_value: 0.,
            auto_pad: AutoPad::Explicit,
        };
        let inputs = [
            f32_tensor(shape![1, 1, 5, 5]),
            TensorInfo::new(ElementType::U1, shape![1, 1, 3, 3]),
        ];
        let outputs = op.infer(&inputs, &ctx).unwrap();
        assert_eq!(outputs[0], f32_tensor(shape![1, 1, 3, 3]));

        op.mode = "popcount".into();
        let err = op.infer(&inputs, &ctx).err().unwrap();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }

    #[test]
    fn test_deformable_convolution() {
        let options = BuildOptions::default();
        let ctx = InferContext::new(&options);
        let op = DeformableConvolution {
            strides: vec![1, 1],
            pads_begin: vec![0, 0],
            pads_end: vec![0, 0],
            dilations: vec![1, 1],
            auto_pad: AutoPad::Explicit,
            group: 1,
            deformable_group: 1,
            bilinear_interpolation_pad: false,
        };
        let data = f32_tensor(shape![1, 4, 5, 5]);
        let offsets = f32_tensor(shape![1, 18, 3, 3]);
        let filters = f32_tensor(shape![4, 4, 3, 3]);
        let mask = f32_tensor(shape![1, 9, 3, 3]);

        let outputs = op
            .infer(&[data.clone(), offsets.clone(), filters.clone()], &ctx)
            .unwrap();
        assert_eq!(outputs[0].shape(), &shape![1, 4, 3, 3]);

        let outputs = op
            .infer(&[data.clone(), offsets, filters.clone(), mask], &ctx)
            .unwrap();
        assert_eq!(outputs[0].shape(), &shape![1, 4, 3, 3]);

        let err = op
            .infer(&[data, f32_tensor(shape![1, 10, 3, 3]), filters], &ctx)
            .err()
            .unwrap();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }
}
