use crate::dimension::Dimension;
use crate::element_type::ElementType;
use crate::infer_shapes::{
    check_input_count, check_rank, resolve_axis, InferShapes, InferShapesError,
};
use crate::partial_shape::PartialShape;
use crate::tensor_info::TensorInfo;

/// Fail if `input` has a known element type which is not an integer type.
fn check_integral(input: &TensorInfo, msg: &'static str) -> Result<(), InferShapesError> {
    let dtype = input.dtype();
    if dtype.is_static() && !dtype.is_integral_number() {
        return Err(InferShapesError::InvalidArgument(msg));
    }
    Ok(())
}

/// Fail unless `dtype` is `i32` or `i64`.
fn check_index_type(dtype: ElementType) -> Result<(), InferShapesError> {
    match dtype {
        ElementType::I32 | ElementType::I64 => Ok(()),
        _ => Err(InferShapesError::InvalidArgument(
            "output index type must be i32 or i64",
        )),
    }
}

/// Replace each element of `data` with the index of the bucket it falls in.
pub struct Bucketize {
    pub output_type: ElementType,
}

impl InferShapes for Bucketize {
    fn infer_shapes(&self, inputs: &[TensorInfo]) -> Result<Vec<TensorInfo>, InferShapesError> {
        check_input_count(inputs, 2, 2)?;
        check_index_type(self.output_type)?;
        check_rank(&inputs[1], 1)?;
        Ok([TensorInfo::new(self.output_type, inputs[0].shape().clone())].into())
    }
}

/// Reorder beam search token ids by following parent pointers.
///
/// Inputs are `step_ids` and `parent_ids` of shape `[max_time, batch, beam]`,
/// `max_seq_len` of shape `[batch]` and a scalar `end_token`.
pub struct GatherTree;

impl InferShapes for GatherTree {
    fn infer_shapes(&self, inputs: &[TensorInfo]) -> Result<Vec<TensorInfo>, InferShapesError> {
        check_input_count(inputs, 4, 4)?;
        let (step_ids, parent_ids, max_seq_len, end_token) =
            (&inputs[0], &inputs[1], &inputs[2], &inputs[3]);
        check_rank(step_ids, 3)?;
        check_rank(max_seq_len, 1)?;
        check_rank(end_token, 0)?;

        let shape = step_ids.shape().merge(parent_ids.shape())?;
        if let Some(dims) = shape.dims() {
            dims[1].merge(&max_seq_len.dim(0))?;
        }
        let dtype = step_ids.dtype().merge(parent_ids.dtype())?;
        Ok([TensorInfo::new(dtype, shape)].into())
    }
}

/// Return the output of an embedding lookup with `rows` bags, given the
/// embedding table.
fn embedding_output(table: &TensorInfo, rows: Dimension) -> TensorInfo {
    let shape = match table.shape().dims() {
        Some(dims) if !dims.is_empty() => {
            std::iter::once(rows).chain(dims[1..].iter().copied()).collect()
        }
        _ => PartialShape::dynamic(),
    };
    TensorInfo::new(table.dtype(), shape)
}

/// Check the optional `default_index` and `per_sample_weights` inputs of an
/// embedding operator.
fn check_embedding_options(
    table: &TensorInfo,
    indices: &TensorInfo,
    default_index: Option<&TensorInfo>,
    weights: Option<&TensorInfo>,
) -> Result<(), InferShapesError> {
    check_integral(indices, "indices must be integers")?;
    if let Some(default_index) = default_index {
        check_rank(default_index, 0)?;
        check_integral(default_index, "default index must be an integer")?;
    }
    if let Some(weights) = weights {
        weights.shape().merge(indices.shape())?;
        table.dtype().merge(weights.dtype())?;
    }
    Ok(())
}

/// Sum embeddings of bags given as flat indices plus the offset of each bag.
///
/// Inputs: `emb_table`, `indices` (`[n]`), `offsets` (`[batch]`), then
/// optionally `default_index` and `per_sample_weights` (`[n]`).
pub struct EmbeddingBagOffsets;

impl InferShapes for EmbeddingBagOffsets {
    fn infer_shapes(&self, inputs: &[TensorInfo]) -> Result<Vec<TensorInfo>, InferShapesError> {
        check_input_count(inputs, 3, 5)?;
        let (table, indices, offsets) = (&inputs[0], &inputs[1], &inputs[2]);
        check_rank(indices, 1)?;
        check_rank(offsets, 1)?;
        check_integral(offsets, "offsets must be integers")?;
        check_embedding_options(table, indices, inputs.get(3), inputs.get(4))?;
        Ok([embedding_output(table, offsets.dim(0))].into())
    }
}

/// Sum embeddings of equally sized bags given as `[batch, bag_size]` indices.
///
/// Inputs: `emb_table`, `indices` and optionally `per_sample_weights`.
pub struct EmbeddingBagPacked;

impl InferShapes for EmbeddingBagPacked {
    fn infer_shapes(&self, inputs: &[TensorInfo]) -> Result<Vec<TensorInfo>, InferShapesError> {
        check_input_count(inputs, 2, 3)?;
        let (table, indices) = (&inputs[0], &inputs[1]);
        check_rank(indices, 2)?;
        check_embedding_options(table, indices, None, inputs.get(2))?;
        Ok([embedding_output(table, indices.dim(0))].into())
    }
}

/// Sum embeddings into segments.
///
/// Inputs: `emb_table`, `indices` (`[n]`), `segment_ids` (`[n]`), scalar
/// `num_segments`, then optionally `default_index` and `per_sample_weights`.
/// The number of output rows is known only if `num_segments` is.
pub struct EmbeddingSegments;

impl InferShapes for EmbeddingSegments {
    fn infer_shapes(&self, inputs: &[TensorInfo]) -> Result<Vec<TensorInfo>, InferShapesError> {
        check_input_count(inputs, 4, 6)?;
        let (table, indices, segment_ids, num_segments) =
            (&inputs[0], &inputs[1], &inputs[2], &inputs[3]);
        check_rank(indices, 1)?;
        check_rank(segment_ids, 1)?;
        check_rank(num_segments, 0)?;
        indices.shape().merge(segment_ids.shape())?;
        check_integral(segment_ids, "segment ids must be integers")?;
        check_integral(num_segments, "num_segments must be an integer")?;
        check_embedding_options(table, indices, inputs.get(4), inputs.get(5))?;

        let rows = num_segments
            .int_scalar_value()
            .map(Dimension::from_i64)
            .unwrap_or_default();
        Ok([embedding_output(table, rows)].into())
    }
}

/// Greedy CTC decoding of time-major logits.
///
/// Inputs are logits of shape `[T, N, C]` and a sequence mask of shape
/// `[T, N]`. The output is `[N, T, 1, 1]`.
pub struct CtcGreedyDecoder;

impl InferShapes for CtcGreedyDecoder {
    fn infer_shapes(&self, inputs: &[TensorInfo]) -> Result<Vec<TensorInfo>, InferShapesError> {
        check_input_count(inputs, 2, 2)?;
        let (logits, mask) = (&inputs[0], &inputs[1]);
        check_rank(logits, 3)?;
        check_rank(mask, 2)?;
        let time = logits.dim(0).merge(&mask.dim(0))?;
        let batch = logits.dim(1).merge(&mask.dim(1))?;
        let shape = PartialShape::from_dims([batch, time, Dimension::fixed(1), Dimension::fixed(1)]);
        Ok([TensorInfo::new(logits.dtype(), shape)].into())
    }
}

/// Greedy CTC decoding of batch-major logits with explicit sequence lengths.
///
/// Inputs are logits of shape `[N, T, C]`, sequence lengths of shape `[N]`
/// and an optional blank index. Outputs are the decoded classes `[N, T]` and
/// decoded lengths `[N]`.
pub struct CtcGreedyDecoderSeqLen {
    pub classes_index_type: ElementType,
    pub sequence_length_type: ElementType,
}

impl InferShapes for CtcGreedyDecoderSeqLen {
    fn infer_shapes(&self, inputs: &[TensorInfo]) -> Result<Vec<TensorInfo>, InferShapesError> {
        check_input_count(inputs, 2, 3)?;
        check_index_type(self.classes_index_type)?;
        check_index_type(self.sequence_length_type)?;
        let (logits, seq_len) = (&inputs[0], &inputs[1]);
        check_rank(logits, 3)?;
        check_rank(seq_len, 1)?;
        check_integral(seq_len, "sequence lengths must be integers")?;
        if let Some(blank_index) = inputs.get(2) {
            if blank_index.rank().is_some_and(|r| r > 1) {
                return Err(InferShapesError::InvalidArgument(
                    "blank index must be a scalar or 1D tensor",
                ));
            }
            check_integral(blank_index, "blank index must be an integer")?;
        }

        let batch = logits.dim(0).merge(&seq_len.dim(0))?;
        let time = logits.dim(1);
        Ok([
            TensorInfo::new(
                self.classes_index_type,
                PartialShape::from_dims([batch, time]),
            ),
            TensorInfo::new(self.sequence_length_type, PartialShape::from_dims([batch])),
        ]
        .into())
    }
}

/// Find unique elements, or unique slices along an axis.
///
/// Inputs are `data` and an optional scalar or single element `axis`. Outputs
/// are the unique values, the index of the first occurrence of each, the
/// index of each input element's unique value and the count of each unique
/// value.
pub struct Unique {
    pub index_type: ElementType,
    pub count_type: ElementType,
}

impl InferShapes for Unique {
    fn infer_shapes(&self, inputs: &[TensorInfo]) -> Result<Vec<TensorInfo>, InferShapesError> {
        check_input_count(inputs, 1, 2)?;
        check_index_type(self.index_type)?;
        check_index_type(self.count_type)?;
        let data = &inputs[0];

        // A non-empty input has between 1 and `n` unique values.
        let unique_count = |n: Dimension| match n.max_length() {
            Some(max) => Dimension::bounded(n.min_length().min(1), max),
            None => Dimension::at_least(n.min_length().min(1)),
        };
        let numel = data.shape().num_elements();

        let (values, rev_idx_len) = match inputs.get(1) {
            Some(axis) => {
                check_integral(axis, "axis must be an integer")?;
                match (data.shape().dims(), axis.int_scalar_value()) {
                    (Some(dims), Some(axis)) => {
                        let axis = resolve_axis(dims.len(), axis)?;
                        let shape = data
                            .shape()
                            .clone()
                            .with_dim(axis, unique_count(dims[axis]));
                        (shape, dims[axis])
                    }
                    (Some(dims), None) => (PartialShape::with_rank(dims.len()), Dimension::dynamic()),
                    (None, _) => (PartialShape::dynamic(), Dimension::dynamic()),
                }
            }
            None => (PartialShape::from_dims([unique_count(numel)]), numel),
        };

        let unique_1d = PartialShape::from_dims([unique_count(numel)]);
        Ok([
            TensorInfo::new(data.dtype(), values),
            TensorInfo::new(self.index_type, unique_1d.clone()),
            TensorInfo::new(self.index_type, PartialShape::from_dims([rev_idx_len])),
            TensorInfo::new(self.count_type, unique_1d),
        ]
        .into())
    }
}
