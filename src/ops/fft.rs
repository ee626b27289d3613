use opgraph_shape_inference::ops as rules;
use opgraph_shape_inference::InferShapes;

define_op!(
    /// Fourier transform of a real signal over the axes given by the second
    /// input.
    Rdft("RDFT", "opset9") {}
    |_op, inputs| {
        rules::Rdft.infer_shapes(inputs)
    }
);

define_op!(
    /// Inverse of [`Rdft`], producing a real signal.
    Irdft("IRDFT", "opset9") {}
    |_op, inputs| {
        rules::Irdft.infer_shapes(inputs)
    }
);

#[cfg(test)]
mod tests {
    use opgraph_shape_inference::{shape, Dimension, ElementType, PartialShape, TensorInfo};
    use opgraph_testing::TestCases;

    use super::{Irdft, Rdft};
    use crate::operator::{InferContext, Operator};
    use crate::options::BuildOptions;

    #[test]
    fn test_rdft_irdft() {
        #[derive(Debug)]
        struct Case {
            inverse: bool,
            input: PartialShape,
            axes: TensorInfo,
            signal_size: Option<TensorInfo>,
            expected: PartialShape,
        }

        let cases = [
            Case {
                inverse: false,
                input: shape![5, 3, 4],
                axes: TensorInfo::from_ints(&[0, 1]),
                signal_size: Some(TensorInfo::from_ints(&[1, 2])),
                expected: shape![1, 2, 4, 2],
            },
            Case {
                inverse: false,
                input: shape![5, 6, 4],
                axes: TensorInfo::from_ints(&[-1]),
                signal_size: None,
                expected: shape![5, 6, 3, 2],
            },
            Case {
                inverse: false,
                input: shape![5, 6, 4],
                axes: TensorInfo::new(ElementType::I64, shape![1]),
                signal_size: None,
                expected: shape![
                    Dimension::dynamic(),
                    Dimension::dynamic(),
                    Dimension::dynamic(),
                    2
                ],
            },
            Case {
                inverse: true,
                input: shape![5, 3, 4, 2],
                axes: TensorInfo::from_ints(&[0, 1]),
                signal_size: Some(TensorInfo::from_ints(&[1, 2])),
                expected: shape![1, 2, 4],
            },
            Case {
                inverse: true,
                input: shape![5, 3, 4, 2],
                axes: TensorInfo::from_ints(&[2]),
                signal_size: None,
                expected: shape![5, 3, 6],
            },
        ];

        cases.test_each(|case| {
            let options = BuildOptions::default();
            let ctx = InferContext::new(&options);
            let mut inputs = vec![
                TensorInfo::new(ElementType::F32, case.input.clone()),
                case.axes.clone(),
            ];
            inputs.extend(case.signal_size.clone());
            let outputs = if case.inverse {
                Irdft {}.infer(&inputs, &ctx)
            } else {
                Rdft {}.infer(&inputs, &ctx)
            }
            .unwrap();
            assert_eq!(
                outputs,
                [TensorInfo::new(ElementType::F32, case.expected.clone())]
            );
        })
    }
}
