use crate::dimension::Dimension;
use crate::infer_shapes::{check_input_count, resolve_axes, InferShapes, InferShapesError};
use crate::tensor_info::{ConstData, TensorInfo};

/// Resolved range of indices selected by a slice along one axis.
struct SliceRange {
    start: i64,
    step: i64,
    len: usize,
}

impl SliceRange {
    /// Resolve `start`, `stop` and `step` against a dimension of size `dim`
    /// using Python slicing rules. Negative indices count from the end and
    /// out of range indices are clamped.
    fn new(dim: usize, start: i64, stop: i64, step: i64) -> SliceRange {
        let dim = dim as i64;
        let resolve = |idx: i64| if idx < 0 { idx.saturating_add(dim) } else { idx };
        let (start, len) = if step > 0 {
            let start = resolve(start).clamp(0, dim);
            let stop = resolve(stop).clamp(0, dim);
            let len = (stop - start).max(0) as u64;
            (start, len.div_ceil(step as u64))
        } else {
            let start = resolve(start).clamp(-1, dim - 1);
            let stop = resolve(stop).clamp(-1, dim - 1);
            let len = (start - stop).max(0) as u64;
            (start, len.div_ceil(step.unsigned_abs()))
        };
        SliceRange {
            start,
            step,
            len: len as usize,
        }
    }

    fn indices(&self) -> impl Iterator<Item = usize> + '_ {
        (0..self.len).map(|i| (self.start + i as i64 * self.step) as usize)
    }
}

/// Extract a strided slice of a tensor.
///
/// Inputs are `data`, `start`, `stop`, `step` and optionally `axes`. The
/// last four are 1D tensors of equal length. If `axes` is omitted, the
/// slice applies to the leading dimensions.
pub struct Slice;

impl InferShapes for Slice {
    fn infer_shapes(&self, inputs: &[TensorInfo]) -> Result<Vec<TensorInfo>, InferShapesError> {
        check_input_count(inputs, 4, 5)?;
        let data = &inputs[0];
        let (start, stop, step) = (&inputs[1], &inputs[2], &inputs[3]);
        let axes = inputs.get(4);

        let Some(dims) = data.shape().dims() else {
            return Ok([data.without_value()].into());
        };
        let mut out_dims = dims.to_vec();

        let upper_bound = |dim: Dimension| match dim.max_length() {
            Some(max) => Dimension::bounded(0, max),
            None => Dimension::dynamic(),
        };

        let axes: Option<Vec<i64>> = match axes {
            Some(axes) => axes.ints(),
            None => start
                .dim(0)
                .get_length()
                .map(|len| (0..len as i64).collect()),
        };

        let (Some(axes), Some(starts), Some(stops), Some(steps)) =
            (axes, start.ints(), stop.ints(), step.ints())
        else {
            // Any dimension may be sliced, but the rank is preserved.
            let out_shape = out_dims.into_iter().map(upper_bound).collect();
            return Ok([TensorInfo::new(data.dtype(), out_shape)].into());
        };

        if starts.len() != stops.len() || starts.len() != steps.len() || starts.len() != axes.len()
        {
            return Err(InferShapesError::InvalidArgument(
                "start, stop, step and axes must have the same length",
            ));
        }
        if steps.contains(&0) {
            return Err(InferShapesError::InvalidArgument("step must be non-zero"));
        }

        let axes = resolve_axes(dims.len(), &axes)?;
        let mut ranges = Vec::with_capacity(axes.len());
        for (i, &axis) in axes.iter().enumerate() {
            let dim = dims[axis];
            out_dims[axis] = match dim.get_length() {
                Some(size) => {
                    let range = SliceRange::new(size, starts[i], stops[i], steps[i]);
                    let len = Dimension::fixed(range.len);
                    ranges.push(range);
                    len
                }
                None => upper_bound(dim),
            };
        }

        // Slicing a known vector produces a known vector.
        if let (Some(ConstData::Int(values)), [range]) = (data.value(), ranges.as_slice()) {
            if dims.len() == 1 {
                let sliced = range.indices().map(|i| values[i]).collect();
                return Ok([TensorInfo::constant(
                    data.dtype(),
                    out_dims.into_iter().collect(),
                    ConstData::Int(sliced),
                )]
                .into());
            }
        }

        Ok([TensorInfo::new(data.dtype(), out_dims.into_iter().collect())].into())
    }
}
