use crate::dimension::Dimension;
use crate::element_type::ElementType;
use crate::infer_shapes::{
    check_input_count, input_count_error, merge_dtypes, resolve_axes, InferShapes,
    InferShapesError,
};
use crate::partial_shape::PartialShape;
use crate::tensor_info::{ConstData, TensorInfo};

/// Return `data` with a new shape, keeping its contents if known.
fn reshaped(data: &TensorInfo, shape: PartialShape) -> TensorInfo {
    match data.value() {
        Some(value) => TensorInfo::constant(data.dtype(), shape, value.clone()),
        None => TensorInfo::new(data.dtype(), shape),
    }
}

/// Remove dimensions of size 1.
///
/// The optional second input lists the axes to remove. If omitted, all
/// dimensions of size 1 are removed.
pub struct Squeeze;

impl InferShapes for Squeeze {
    fn infer_shapes(&self, inputs: &[TensorInfo]) -> Result<Vec<TensorInfo>, InferShapesError> {
        check_input_count(inputs, 1, 2)?;
        let data = &inputs[0];
        let axes = inputs.get(1);

        let Some(dims) = data.shape().dims() else {
            return Ok([TensorInfo::new(data.dtype(), PartialShape::dynamic())].into());
        };

        let out_shape = match axes {
            Some(axes) => match axes.ints() {
                Some(axes) => {
                    let mut axes = resolve_axes(dims.len(), &axes)?;
                    axes.sort();
                    axes.dedup();
                    for &axis in &axes {
                        if !dims[axis].contains(1) {
                            return Err(InferShapesError::InvalidArgument(
                                "squeezed dimension is not 1",
                            ));
                        }
                    }
                    dims.iter()
                        .enumerate()
                        .filter(|(i, _)| !axes.contains(i))
                        .map(|(_, d)| *d)
                        .collect()
                }
                None => PartialShape::dynamic(),
            },
            None => {
                // Whether a dynamic dim is removed depends on its runtime
                // size, so the rank is unknown.
                if dims.iter().any(|d| d.is_dynamic() && d.contains(1)) {
                    PartialShape::dynamic()
                } else {
                    dims.iter()
                        .filter(|d| **d != Dimension::fixed(1))
                        .copied()
                        .collect()
                }
            }
        };

        Ok([reshaped(data, out_shape)].into())
    }
}

/// Insert dimensions of size 1 at the positions given by the second input.
pub struct Unsqueeze;

impl InferShapes for Unsqueeze {
    fn infer_shapes(&self, inputs: &[TensorInfo]) -> Result<Vec<TensorInfo>, InferShapesError> {
        let [data, axes] = inputs else {
            return Err(input_count_error(inputs, 2, 2));
        };

        let (Some(dims), Some(axes)) = (data.shape().dims(), axes.ints()) else {
            return Ok([TensorInfo::new(data.dtype(), PartialShape::dynamic())].into());
        };

        let out_ndim = dims.len() + axes.len();
        let mut axes = resolve_axes(out_ndim, &axes)?;
        axes.sort();
        if axes.windows(2).any(|w| w[0] == w[1]) {
            return Err(InferShapesError::InvalidArgument("axes contain duplicates"));
        }

        let mut src = dims.iter();
        let out_shape: PartialShape = (0..out_ndim)
            .map(|i| {
                if axes.contains(&i) {
                    Dimension::fixed(1)
                } else {
                    src.next().copied().unwrap_or_default()
                }
            })
            .collect();

        Ok([reshaped(data, out_shape)].into())
    }
}

/// Generate a sequence of numbers from scalar `start`, `stop` and `step`
/// inputs.
pub struct Range {
    /// Type of the output. If dynamic, the merged type of the inputs is used.
    pub output_type: ElementType,
}

impl InferShapes for Range {
    fn infer_shapes(&self, inputs: &[TensorInfo]) -> Result<Vec<TensorInfo>, InferShapesError> {
        check_input_count(inputs, 3, 3)?;
        for input in inputs {
            if input.rank().is_some_and(|r| r > 1) {
                return Err(InferShapesError::InvalidArgument(
                    "start, stop and step must be scalars",
                ));
            }
        }

        let dtype = if self.output_type.is_dynamic() {
            merge_dtypes(inputs)?
        } else {
            self.output_type
        };

        let scalars: Option<Vec<f64>> = inputs
            .iter()
            .map(|x| match x.floats()?.as_slice() {
                [v] => Some(*v),
                _ => None,
            })
            .collect();

        let Some([start, stop, step]) = scalars.as_deref().map(|s| [s[0], s[1], s[2]]) else {
            return Ok([TensorInfo::new(dtype, PartialShape::from_dims([Dimension::dynamic()]))].into());
        };

        if step == 0.0 {
            return Err(InferShapesError::InvalidArgument("step must be non-zero"));
        }

        let len = ((stop - start) / step).ceil().max(0.0) as usize;
        let shape = PartialShape::from_static(&[len]);

        let all_ints = inputs.iter().all(|x| x.ints().is_some());
        let output = if all_ints && dtype.is_integral_number() {
            let values = (0..len)
                .map(|i| start as i64 + i as i64 * step as i64)
                .collect();
            TensorInfo::constant(dtype, shape, ConstData::Int(values))
        } else {
            TensorInfo::new(dtype, shape)
        };

        Ok([output].into())
    }
}

#[cfg(test)]
mod tests {
    use opgraph_testing::TestCases;

    use super::{Range, Squeeze, Unsqueeze};
    use crate::infer_shapes::InferShapes;
    use crate::{shape, Dimension, ElementType, InferShapesError, PartialShape, TensorInfo};

    #[test]
    fn test_squeeze() {
        #[derive(Debug)]
        struct Case {
            data: PartialShape,
            axes: Option<Vec<i64>>,
            expected: Result<PartialShape, InferShapesError>,
        }

        let cases = [
            Case {
                data: shape![1, 3, 1, 4],
                axes: None,
                expected: Ok(shape![3, 4]),
            },
            Case {
                data: shape![1, 3, 1, 4],
                axes: Some(vec![-2]),
                expected: Ok(shape![1, 3, 4]),
            },
            Case {
                data: shape![Dimension::dynamic(), 3],
                axes: Some(vec![0]),
                expected: Ok(shape![3]),
            },
            Case {
                data: shape![Dimension::dynamic(), 3],
                axes: None,
                expected: Ok(PartialShape::dynamic()),
            },
            Case {
                data: shape![2, 3],
                axes: Some(vec![0]),
                expected: Err(InferShapesError::InvalidArgument(
                    "squeezed dimension is not 1",
                )),
            },
        ];

        cases.test_each(|case| {
            let mut inputs = vec![TensorInfo::new(ElementType::F32, case.data.clone())];
            if let Some(axes) = &case.axes {
                inputs.push(TensorInfo::from_ints(axes));
            }
            let result = Squeeze
                .infer_shapes(&inputs)
                .map(|outputs| outputs[0].shape().clone());
            assert_eq!(result, case.expected);
        })
    }

    #[test]
    fn test_unsqueeze() {
        let data = TensorInfo::new(ElementType::F32, shape![2, 2]);
        let result = Unsqueeze
            .infer_shapes(&[data.clone(), TensorInfo::from_ints(&[0])])
            .unwrap();
        assert_eq!(result[0].shape(), &shape![1, 2, 2]);

        let result = Unsqueeze
            .infer_shapes(&[data.clone(), TensorInfo::from_ints(&[-1, 1])])
            .unwrap();
        assert_eq!(result[0].shape(), &shape![2, 1, 2, 1]);

        let err = Unsqueeze
            .infer_shapes(&[data, TensorInfo::from_ints(&[0, 0])])
            .err();
        assert!(err.is_some());

        // Scalar to vector keeps the contents.
        let scalar = TensorInfo::int_scalar(5);
        let result = Unsqueeze
            .infer_shapes(&[scalar, TensorInfo::from_ints(&[0])])
            .unwrap();
        assert_eq!(result[0].shape(), &shape![1]);
        assert_eq!(result[0].ints(), Some(vec![5]));
    }

    #[test]
    fn test_range() {
        let op = Range {
            output_type: ElementType::Dynamic,
        };
        let scalar = |v| TensorInfo::int_scalar(v).with_dtype(ElementType::I32);
        let result = op
            .infer_shapes(&[scalar(0), scalar(16), scalar(1)])
            .unwrap();
        assert_eq!(result[0].shape(), &shape![16]);
        assert_eq!(result[0].dtype(), ElementType::I32);
        assert_eq!(result[0].ints().map(|v| v.len()), Some(16));

        let result = op
            .infer_shapes(&[scalar(10), scalar(0), scalar(-3)])
            .unwrap();
        assert_eq!(result[0].ints(), Some(vec![10, 7, 4, 1]));

        let unknown = TensorInfo::new(ElementType::I32, PartialShape::scalar());
        let result = op
            .infer_shapes(&[scalar(0), unknown, scalar(1)])
            .unwrap();
        assert_eq!(result[0].shape(), &shape![Dimension::dynamic()]);

        let err = op.infer_shapes(&[scalar(0), scalar(4), scalar(0)]).err();
        assert_eq!(
            err,
            Some(InferShapesError::InvalidArgument("step must be non-zero"))
        );
    }
}
