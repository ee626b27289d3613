use smallvec::SmallVec;

use crate::dimension::Dimension;
use crate::infer_shapes::{check_input_count, check_rank, resolve_axes, InferShapes, InferShapesError};
use crate::partial_shape::PartialShape;
use crate::tensor_info::TensorInfo;

/// Axes and signal sizes of a Fourier transform.
///
/// Returns `None` if the axes are not constant. Signal sizes of `-1` keep
/// the size of the input.
#[allow(clippy::type_complexity)]
fn transform_axes(
    inputs: &[TensorInfo],
    ndim: usize,
) -> Result<Option<(SmallVec<[usize; 4]>, Option<Vec<i64>>)>, InferShapesError> {
    let axes = &inputs[1];
    check_rank(axes, 1)?;
    if axes.dtype().is_static() && !axes.dtype().is_integral_number() {
        return Err(InferShapesError::InvalidArgument("axes must be integers"));
    }
    let Some(axes) = axes.ints() else {
        return Ok(None);
    };
    let axes = resolve_axes(ndim, &axes)?;
    if axes.is_empty() {
        return Err(InferShapesError::InvalidArgument("axes must not be empty"));
    }
    for (i, axis) in axes.iter().enumerate() {
        if axes[..i].contains(axis) {
            return Err(InferShapesError::InvalidArgument("axes must be unique"));
        }
    }

    let signal_sizes = match inputs.get(2) {
        Some(sizes) => {
            check_rank(sizes, 1)?;
            if !sizes.dim(0).compatible(&axes.len().into()) {
                return Err(InferShapesError::InvalidArgument(
                    "signal_size must have one entry per axis",
                ));
            }
            sizes.ints()
        }
        None => None,
    };
    Ok(Some((axes, signal_sizes)))
}

fn check_real(input: &TensorInfo) -> Result<(), InferShapesError> {
    if input.dtype().is_static() && !input.dtype().is_real() {
        return Err(InferShapesError::InvalidArgument(
            "input must be a floating point tensor",
        ));
    }
    Ok(())
}

/// Discrete Fourier transform of a real signal.
///
/// Inputs are `data`, `axes` and optionally `signal_size`. The last
/// transformed axis keeps `size / 2 + 1` frequencies and a trailing
/// dimension of size 2 holds the real and imaginary parts.
pub struct Rdft;

impl InferShapes for Rdft {
    fn infer_shapes(&self, inputs: &[TensorInfo]) -> Result<Vec<TensorInfo>, InferShapesError> {
        check_input_count(inputs, 2, 3)?;
        let data = &inputs[0];
        check_real(data)?;

        let Some(dims) = data.shape().dims() else {
            return Ok([TensorInfo::new(data.dtype(), PartialShape::dynamic())].into());
        };
        let mut out_dims = dims.to_vec();
        match transform_axes(inputs, dims.len())? {
            Some((axes, signal_sizes)) => {
                if let Some(sizes) = signal_sizes {
                    for (&axis, &size) in axes.iter().zip(&sizes) {
                        if size != -1 {
                            out_dims[axis] = Dimension::from_i64(size);
                        }
                    }
                }
                let last = axes[axes.len() - 1];
                out_dims[last] = out_dims[last].map_bounds(|n| n / 2 + 1);
            }
            None => out_dims.fill(Dimension::dynamic()),
        }
        out_dims.push(Dimension::fixed(2));
        Ok([TensorInfo::new(data.dtype(), out_dims.into())].into())
    }
}

/// Inverse of [`Rdft`].
///
/// The input has a trailing dimension of size 2. Without a signal size the
/// last transformed axis grows to `2 * (size - 1)`.
pub struct Irdft;

impl InferShapes for Irdft {
    fn infer_shapes(&self, inputs: &[TensorInfo]) -> Result<Vec<TensorInfo>, InferShapesError> {
        check_input_count(inputs, 2, 3)?;
        let data = &inputs[0];
        check_real(data)?;

        let Some(dims) = data.shape().dims() else {
            return Ok([TensorInfo::new(data.dtype(), PartialShape::dynamic())].into());
        };
        let Some((last_dim, dims)) = dims.split_last() else {
            return Err(InferShapesError::InvalidArgument(
                "input must have a trailing complex dimension",
            ));
        };
        if !last_dim.contains(2) {
            return Err(InferShapesError::InvalidArgument(
                "last input dimension must have size 2",
            ));
        }

        let mut out_dims = dims.to_vec();
        match transform_axes(inputs, dims.len())? {
            Some((axes, signal_sizes)) => {
                let last = axes[axes.len() - 1];
                let mut last_sized = false;
                if let Some(sizes) = signal_sizes {
                    for (&axis, &size) in axes.iter().zip(&sizes) {
                        if size != -1 {
                            out_dims[axis] = Dimension::from_i64(size);
                            last_sized |= axis == last;
                        }
                    }
                }
                if !last_sized {
                    out_dims[last] = out_dims[last].map_bounds(|n| 2 * n.saturating_sub(1));
                }
            }
            None => out_dims.fill(Dimension::dynamic()),
        }
        Ok([TensorInfo::new(data.dtype(), out_dims.into())].into())
    }
}
