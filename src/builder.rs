//! Construction API.
//!
//! Each function creates one node and runs shape inference for it, so a
//! node's output types and shapes are available as soon as it exists:
//!
//! ```
//! use opgraph::builder;
//! use opgraph::{AutoBroadcast, ElementType};
//!
//! # fn main() -> Result<(), opgraph::BuildError> {
//! let a = builder::parameter("a", [8, 1, 6, 1], ElementType::F32)?;
//! let b = builder::parameter("b", [7, 1, 5], ElementType::F32)?;
//! let sum = builder::add(&a, &b, AutoBroadcast::Numpy)?;
//! assert_eq!(sum.output_shape(0), Some(vec![8, 7, 6, 5]));
//! # Ok(())
//! # }
//! ```
//!
//! Operators with only a few attributes take them as arguments. Operators
//! with many attributes take an [`Attributes`] set, which is validated
//! against the operator's schema by the global [`OpRegistry`]. Attributes
//! which are omitted take their default values.
//!
//! Options such as strict parameter checking are read from the environment,
//! see [`BuildOptions::from_env`].

use opgraph_shape_inference::{AutoBroadcast, ConstData, ElementType, PartialShape};

use crate::attrs::Attributes;
use crate::graph::{BuildError, NodeRef, Output};
use crate::op_registry::{OpRegistry, ReadOp};
use crate::operator::{InferContext, Operator};
use crate::ops;
use crate::options::BuildOptions;

pub use crate::ops::LoopBuilder;

/// Create a node which applies `op` to `inputs`.
pub fn node<Op: Operator + Send + Sync>(op: Op, inputs: &[Output]) -> Result<NodeRef, BuildError> {
    NodeRef::new(
        Box::new(op),
        inputs.to_vec(),
        None,
        &InferContext::new(BuildOptions::global()),
    )
}

/// Create a node for an operator whose attributes are read from `attrs`.
fn from_attrs<Op: ReadOp>(inputs: &[Output], attrs: &Attributes) -> Result<NodeRef, BuildError> {
    OpRegistry::global().create_node(Op::op_type(), Op::op_version(), inputs, attrs)
}

/// Collect required inputs followed by the optional inputs that are present.
///
/// Optional inputs are positional, so a missing input may only be followed
/// by other missing inputs.
fn with_optional<const N: usize>(
    op: &str,
    required: impl IntoIterator<Item = Output>,
    optional: [Option<Output>; N],
) -> Result<Vec<Output>, BuildError> {
    let mut inputs: Vec<Output> = required.into_iter().collect();
    let mut missing = false;
    for input in optional {
        match input {
            Some(_) if missing => {
                return Err(BuildError::invalid_argument(
                    op,
                    "optional input follows an omitted input",
                ));
            }
            Some(input) => inputs.push(input),
            None => missing = true,
        }
    }
    Ok(inputs)
}

/// Create a graph input.
pub fn parameter(
    name: &str,
    shape: impl Into<PartialShape>,
    element_type: ElementType,
) -> Result<NodeRef, BuildError> {
    let op = ops::Parameter {
        element_type,
        shape: shape.into(),
    };
    NodeRef::new(
        Box::new(op),
        Vec::new(),
        Some(name.to_string()),
        &InferContext::new(BuildOptions::global()),
    )
}

/// Create a constant.
///
/// `value` must contain one entry per element of `shape` or a single entry
/// which is repeated.
pub fn constant(
    element_type: ElementType,
    shape: &[usize],
    value: ConstData,
) -> Result<NodeRef, BuildError> {
    let op = ops::Constant::new(element_type, shape, value)
        .map_err(|err| BuildError::op_error("Constant", err))?;
    node(op, &[])
}

/// Mark a value as a graph output.
pub fn result(value: impl Into<Output>) -> Result<NodeRef, BuildError> {
    node(ops::ResultOp {}, &[value.into()])
}

macro_rules! binary_op_factory {
    ($(#[$meta:meta])* $fn_name:ident, $op:ident) => {
        $(#[$meta])*
        pub fn $fn_name(
            a: impl Into<Output>,
            b: impl Into<Output>,
            auto_broadcast: AutoBroadcast,
        ) -> Result<NodeRef, BuildError> {
            node(ops::$op { auto_broadcast }, &[a.into(), b.into()])
        }
    };
}

binary_op_factory!(
    /// Elementwise `a + b`.
    add,
    Add
);
binary_op_factory!(subtract, Subtract);
binary_op_factory!(multiply, Multiply);
binary_op_factory!(divide, Divide);
binary_op_factory!(
    /// Remainder of floor division, with the sign of the divisor.
    floor_mod,
    FloorMod
);
binary_op_factory!(maximum, Maximum);
binary_op_factory!(minimum, Minimum);
binary_op_factory!(power, Power);

pub fn soft_sign(data: impl Into<Output>) -> Result<NodeRef, BuildError> {
    node(ops::SoftSign {}, &[data.into()])
}

pub fn is_finite(data: impl Into<Output>) -> Result<NodeRef, BuildError> {
    node(ops::IsFinite {}, &[data.into()])
}

pub fn is_nan(data: impl Into<Output>) -> Result<NodeRef, BuildError> {
    node(ops::IsNaN {}, &[data.into()])
}

pub fn is_inf(
    data: impl Into<Output>,
    detect_positive: bool,
    detect_negative: bool,
) -> Result<NodeRef, BuildError> {
    let op = ops::IsInf {
        detect_positive,
        detect_negative,
    };
    node(op, &[data.into()])
}

pub fn convert(
    data: impl Into<Output>,
    destination_type: ElementType,
) -> Result<NodeRef, BuildError> {
    node(ops::Convert { destination_type }, &[data.into()])
}

/// Convert `data` to the element type of `like`.
pub fn convert_like(
    data: impl Into<Output>,
    like: impl Into<Output>,
) -> Result<NodeRef, BuildError> {
    node(ops::ConvertLike {}, &[data.into(), like.into()])
}

pub fn read_value(init: impl Into<Output>, variable_id: &str) -> Result<NodeRef, BuildError> {
    let op = ops::ReadValue {
        variable_id: variable_id.to_string(),
    };
    node(op, &[init.into()])
}

pub fn assign(value: impl Into<Output>, variable_id: &str) -> Result<NodeRef, BuildError> {
    let op = ops::Assign {
        variable_id: variable_id.to_string(),
    };
    node(op, &[value.into()])
}

/// Remove dimensions of size 1, or only those listed in `axes`.
pub fn squeeze(data: impl Into<Output>, axes: Option<Output>) -> Result<NodeRef, BuildError> {
    let inputs = with_optional("Squeeze", [data.into()], [axes])?;
    node(ops::Squeeze {}, &inputs)
}

pub fn unsqueeze(data: impl Into<Output>, axes: impl Into<Output>) -> Result<NodeRef, BuildError> {
    node(ops::Unsqueeze {}, &[data.into(), axes.into()])
}

pub fn range(
    start: impl Into<Output>,
    stop: impl Into<Output>,
    step: impl Into<Output>,
    output_type: ElementType,
) -> Result<NodeRef, BuildError> {
    node(
        ops::Range { output_type },
        &[start.into(), stop.into(), step.into()],
    )
}

pub fn slice(
    data: impl Into<Output>,
    start: impl Into<Output>,
    stop: impl Into<Output>,
    step: impl Into<Output>,
    axes: Option<Output>,
) -> Result<NodeRef, BuildError> {
    let inputs = with_optional(
        "Slice",
        [data.into(), start.into(), stop.into(), step.into()],
        [axes],
    )?;
    node(ops::Slice {}, &inputs)
}

/// Convolution with attributes `strides`, `pads_begin`, `pads_end`,
/// `dilations` and optionally `auto_pad`.
pub fn convolution(
    data: impl Into<Output>,
    filters: impl Into<Output>,
    attrs: &Attributes,
) -> Result<NodeRef, BuildError> {
    from_attrs::<ops::Convolution>(&[data.into(), filters.into()], attrs)
}

pub fn binary_convolution(
    data: impl Into<Output>,
    filters: impl Into<Output>,
    attrs: &Attributes,
) -> Result<NodeRef, BuildError> {
    from_attrs::<ops::BinaryConvolution>(&[data.into(), filters.into()], attrs)
}

pub fn deformable_convolution(
    data: impl Into<Output>,
    offsets: impl Into<Output>,
    filters: impl Into<Output>,
    mask: Option<Output>,
    attrs: &Attributes,
) -> Result<NodeRef, BuildError> {
    let inputs = with_optional(
        "DeformableConvolution",
        [data.into(), offsets.into(), filters.into()],
        [mask],
    )?;
    from_attrs::<ops::DeformableConvolution>(&inputs, attrs)
}

pub fn max_pool(data: impl Into<Output>, attrs: &Attributes) -> Result<NodeRef, BuildError> {
    from_attrs::<ops::MaxPool>(&[data.into()], attrs)
}

pub fn avg_pool(data: impl Into<Output>, attrs: &Attributes) -> Result<NodeRef, BuildError> {
    from_attrs::<ops::AvgPool>(&[data.into()], attrs)
}

pub fn adaptive_avg_pool(
    data: impl Into<Output>,
    output_shape: impl Into<Output>,
) -> Result<NodeRef, BuildError> {
    node(ops::AdaptiveAvgPool {}, &[data.into(), output_shape.into()])
}

/// Adaptive max pooling. The second output holds the indices of the
/// selected elements.
pub fn adaptive_max_pool(
    data: impl Into<Output>,
    output_shape: impl Into<Output>,
    index_element_type: ElementType,
) -> Result<NodeRef, BuildError> {
    node(
        ops::AdaptiveMaxPool { index_element_type },
        &[data.into(), output_shape.into()],
    )
}

pub fn extract_image_patches(
    data: impl Into<Output>,
    attrs: &Attributes,
) -> Result<NodeRef, BuildError> {
    from_attrs::<ops::ExtractImagePatches>(&[data.into()], attrs)
}

pub fn roi_pooling(
    data: impl Into<Output>,
    rois: impl Into<Output>,
    attrs: &Attributes,
) -> Result<NodeRef, BuildError> {
    from_attrs::<ops::RoiPooling>(&[data.into(), rois.into()], attrs)
}

pub fn roi_align(
    data: impl Into<Output>,
    rois: impl Into<Output>,
    batch_indices: impl Into<Output>,
    attrs: &Attributes,
) -> Result<NodeRef, BuildError> {
    from_attrs::<ops::RoiAlign>(&[data.into(), rois.into(), batch_indices.into()], attrs)
}

pub fn psroi_pooling(
    data: impl Into<Output>,
    rois: impl Into<Output>,
    attrs: &Attributes,
) -> Result<NodeRef, BuildError> {
    from_attrs::<ops::PsRoiPooling>(&[data.into(), rois.into()], attrs)
}

pub fn deformable_psroi_pooling(
    data: impl Into<Output>,
    rois: impl Into<Output>,
    offsets: Option<Output>,
    attrs: &Attributes,
) -> Result<NodeRef, BuildError> {
    let inputs = with_optional(
        "DeformablePSROIPooling",
        [data.into(), rois.into()],
        [offsets],
    )?;
    from_attrs::<ops::DeformablePsRoiPooling>(&inputs, attrs)
}

/// LSTM cell. Outputs are the new hidden and cell states.
pub fn lstm_cell(
    x: impl Into<Output>,
    initial_hidden: impl Into<Output>,
    initial_cell: impl Into<Output>,
    weights: impl Into<Output>,
    recurrence_weights: impl Into<Output>,
    bias: Option<Output>,
    attrs: &Attributes,
) -> Result<NodeRef, BuildError> {
    let inputs = with_optional(
        "LSTMCell",
        [
            x.into(),
            initial_hidden.into(),
            initial_cell.into(),
            weights.into(),
            recurrence_weights.into(),
        ],
        [bias],
    )?;
    from_attrs::<ops::LstmCell>(&inputs, attrs)
}

pub fn gru_cell(
    x: impl Into<Output>,
    initial_hidden: impl Into<Output>,
    weights: impl Into<Output>,
    recurrence_weights: impl Into<Output>,
    bias: Option<Output>,
    attrs: &Attributes,
) -> Result<NodeRef, BuildError> {
    let inputs = with_optional(
        "GRUCell",
        [
            x.into(),
            initial_hidden.into(),
            weights.into(),
            recurrence_weights.into(),
        ],
        [bias],
    )?;
    from_attrs::<ops::GruCell>(&inputs, attrs)
}

pub fn rnn_cell(
    x: impl Into<Output>,
    initial_hidden: impl Into<Output>,
    weights: impl Into<Output>,
    recurrence_weights: impl Into<Output>,
    bias: Option<Output>,
    attrs: &Attributes,
) -> Result<NodeRef, BuildError> {
    let inputs = with_optional(
        "RNNCell",
        [
            x.into(),
            initial_hidden.into(),
            weights.into(),
            recurrence_weights.into(),
        ],
        [bias],
    )?;
    from_attrs::<ops::RnnCell>(&inputs, attrs)
}

/// LSTM over a sequence. Outputs are the hidden states of every step and
/// the final hidden and cell states.
pub fn lstm_sequence(
    x: impl Into<Output>,
    initial_hidden: impl Into<Output>,
    initial_cell: impl Into<Output>,
    sequence_lengths: impl Into<Output>,
    weights: impl Into<Output>,
    recurrence_weights: impl Into<Output>,
    bias: impl Into<Output>,
    attrs: &Attributes,
) -> Result<NodeRef, BuildError> {
    from_attrs::<ops::LstmSequence>(
        &[
            x.into(),
            initial_hidden.into(),
            initial_cell.into(),
            sequence_lengths.into(),
            weights.into(),
            recurrence_weights.into(),
            bias.into(),
        ],
        attrs,
    )
}

pub fn gru_sequence(
    x: impl Into<Output>,
    initial_hidden: impl Into<Output>,
    sequence_lengths: impl Into<Output>,
    weights: impl Into<Output>,
    recurrence_weights: impl Into<Output>,
    bias: impl Into<Output>,
    attrs: &Attributes,
) -> Result<NodeRef, BuildError> {
    from_attrs::<ops::GruSequence>(
        &[
            x.into(),
            initial_hidden.into(),
            sequence_lengths.into(),
            weights.into(),
            recurrence_weights.into(),
            bias.into(),
        ],
        attrs,
    )
}

pub fn rnn_sequence(
    x: impl Into<Output>,
    initial_hidden: impl Into<Output>,
    sequence_lengths: impl Into<Output>,
    weights: impl Into<Output>,
    recurrence_weights: impl Into<Output>,
    bias: impl Into<Output>,
    attrs: &Attributes,
) -> Result<NodeRef, BuildError> {
    from_attrs::<ops::RnnSequence>(
        &[
            x.into(),
            initial_hidden.into(),
            sequence_lengths.into(),
            weights.into(),
            recurrence_weights.into(),
            bias.into(),
        ],
        attrs,
    )
}

pub fn bucketize(
    data: impl Into<Output>,
    buckets: impl Into<Output>,
    output_type: ElementType,
    with_right_bound: bool,
) -> Result<NodeRef, BuildError> {
    let op = ops::Bucketize {
        output_type,
        with_right_bound,
    };
    node(op, &[data.into(), buckets.into()])
}

pub fn gather_tree(
    step_ids: impl Into<Output>,
    parent_ids: impl Into<Output>,
    max_seq_len: impl Into<Output>,
    end_token: impl Into<Output>,
) -> Result<NodeRef, BuildError> {
    node(
        ops::GatherTree {},
        &[
            step_ids.into(),
            parent_ids.into(),
            max_seq_len.into(),
            end_token.into(),
        ],
    )
}

pub fn embedding_bag_offsets_sum(
    emb_table: impl Into<Output>,
    indices: impl Into<Output>,
    offsets: impl Into<Output>,
    default_index: Option<Output>,
    per_sample_weights: Option<Output>,
) -> Result<NodeRef, BuildError> {
    let inputs = with_optional(
        "EmbeddingBagOffsetsSum",
        [emb_table.into(), indices.into(), offsets.into()],
        [default_index, per_sample_weights],
    )?;
    node(ops::EmbeddingBagOffsetsSum {}, &inputs)
}

pub fn embedding_bag_packed_sum(
    emb_table: impl Into<Output>,
    indices: impl Into<Output>,
    per_sample_weights: Option<Output>,
) -> Result<NodeRef, BuildError> {
    let inputs = with_optional(
        "EmbeddingBagPackedSum",
        [emb_table.into(), indices.into()],
        [per_sample_weights],
    )?;
    node(ops::EmbeddingBagPackedSum {}, &inputs)
}

pub fn embedding_segments_sum(
    emb_table: impl Into<Output>,
    indices: impl Into<Output>,
    segment_ids: impl Into<Output>,
    num_segments: impl Into<Output>,
    default_index: Option<Output>,
    per_sample_weights: Option<Output>,
) -> Result<NodeRef, BuildError> {
    let inputs = with_optional(
        "EmbeddingSegmentsSum",
        [
            emb_table.into(),
            indices.into(),
            segment_ids.into(),
            num_segments.into(),
        ],
        [default_index, per_sample_weights],
    )?;
    node(ops::EmbeddingSegmentsSum {}, &inputs)
}

pub fn ctc_greedy_decoder(
    logits: impl Into<Output>,
    sequence_mask: impl Into<Output>,
    ctc_merge_repeated: bool,
) -> Result<NodeRef, BuildError> {
    node(
        ops::CtcGreedyDecoder { ctc_merge_repeated },
        &[logits.into(), sequence_mask.into()],
    )
}

pub fn ctc_greedy_decoder_seq_len(
    logits: impl Into<Output>,
    sequence_length: impl Into<Output>,
    blank_index: Option<Output>,
    attrs: &Attributes,
) -> Result<NodeRef, BuildError> {
    let inputs = with_optional(
        "CTCGreedyDecoderSeqLen",
        [logits.into(), sequence_length.into()],
        [blank_index],
    )?;
    from_attrs::<ops::CtcGreedyDecoderSeqLen>(&inputs, attrs)
}

/// Non-maximum suppression.
///
/// Omitted optional inputs behave as if they were zero.
pub fn non_max_suppression(
    boxes: impl Into<Output>,
    scores: impl Into<Output>,
    max_output_boxes_per_class: Option<Output>,
    iou_threshold: Option<Output>,
    score_threshold: Option<Output>,
    soft_nms_sigma: Option<Output>,
    attrs: &Attributes,
) -> Result<NodeRef, BuildError> {
    let inputs = with_optional(
        "NonMaxSuppression",
        [boxes.into(), scores.into()],
        [
            max_output_boxes_per_class,
            iou_threshold,
            score_threshold,
            soft_nms_sigma,
        ],
    )?;
    from_attrs::<ops::NonMaxSuppression>(&inputs, attrs)
}

pub fn multiclass_nms(
    boxes: impl Into<Output>,
    scores: impl Into<Output>,
    roisnum: Option<Output>,
    attrs: &Attributes,
) -> Result<NodeRef, BuildError> {
    let inputs = with_optional("MulticlassNms", [boxes.into(), scores.into()], [roisnum])?;
    from_attrs::<ops::MulticlassNms>(&inputs, attrs)
}

pub fn matrix_nms(
    boxes: impl Into<Output>,
    scores: impl Into<Output>,
    attrs: &Attributes,
) -> Result<NodeRef, BuildError> {
    from_attrs::<ops::MatrixNms>(&[boxes.into(), scores.into()], attrs)
}

pub fn unique(
    data: impl Into<Output>,
    axis: Option<Output>,
    attrs: &Attributes,
) -> Result<NodeRef, BuildError> {
    let inputs = with_optional("Unique", [data.into()], [axis])?;
    from_attrs::<ops::Unique>(&inputs, attrs)
}

pub fn generate_proposals(
    im_info: impl Into<Output>,
    anchors: impl Into<Output>,
    deltas: impl Into<Output>,
    scores: impl Into<Output>,
    attrs: &Attributes,
) -> Result<NodeRef, BuildError> {
    from_attrs::<ops::GenerateProposals>(
        &[im_info.into(), anchors.into(), deltas.into(), scores.into()],
        attrs,
    )
}

/// Convert an I420 image to BGR.
///
/// `planes` is either a single packed image or the separate Y, U and V
/// planes.
pub fn i420_to_bgr(planes: &[Output]) -> Result<NodeRef, BuildError> {
    node(ops::I420ToBgr {}, planes)
}

pub fn i420_to_rgb(planes: &[Output]) -> Result<NodeRef, BuildError> {
    node(ops::I420ToRgb {}, planes)
}

/// Convert an NV12 image to BGR.
///
/// `planes` is either a single packed image or the separate Y and UV planes.
pub fn nv12_to_bgr(planes: &[Output]) -> Result<NodeRef, BuildError> {
    node(ops::Nv12ToBgr {}, planes)
}

pub fn nv12_to_rgb(planes: &[Output]) -> Result<NodeRef, BuildError> {
    node(ops::Nv12ToRgb {}, planes)
}

pub fn grid_sample(
    data: impl Into<Output>,
    grid: impl Into<Output>,
    attrs: &Attributes,
) -> Result<NodeRef, BuildError> {
    from_attrs::<ops::GridSample>(&[data.into(), grid.into()], attrs)
}

/// Resize with the original `Interpolate` operator, where the output sizes
/// of the resized axes are given by `target_shape`.
pub fn interpolate_v0(
    data: impl Into<Output>,
    target_shape: impl Into<Output>,
    attrs: &Attributes,
) -> Result<NodeRef, BuildError> {
    from_attrs::<ops::InterpolateV0>(&[data.into(), target_shape.into()], attrs)
}

/// Resize to output sizes or by scales, depending on the
/// `shape_calculation_mode` attribute.
pub fn interpolate(
    data: impl Into<Output>,
    sizes: impl Into<Output>,
    scales: impl Into<Output>,
    axes: Option<Output>,
    attrs: &Attributes,
) -> Result<NodeRef, BuildError> {
    let inputs = with_optional(
        "Interpolate",
        [data.into(), sizes.into(), scales.into()],
        [axes],
    )?;
    from_attrs::<ops::Interpolate>(&inputs, attrs)
}

pub fn prior_box(
    layer_shape: impl Into<Output>,
    image_shape: impl Into<Output>,
    attrs: &Attributes,
) -> Result<NodeRef, BuildError> {
    from_attrs::<ops::PriorBox>(&[layer_shape.into(), image_shape.into()], attrs)
}

pub fn prior_box_clustered(
    layer_shape: impl Into<Output>,
    image_shape: impl Into<Output>,
    attrs: &Attributes,
) -> Result<NodeRef, BuildError> {
    from_attrs::<ops::PriorBoxClustered>(&[layer_shape.into(), image_shape.into()], attrs)
}

pub fn proposal(
    class_probs: impl Into<Output>,
    bbox_deltas: impl Into<Output>,
    image_shape: impl Into<Output>,
    attrs: &Attributes,
) -> Result<NodeRef, BuildError> {
    from_attrs::<ops::Proposal>(
        &[class_probs.into(), bbox_deltas.into(), image_shape.into()],
        attrs,
    )
}

pub fn region_yolo(data: impl Into<Output>, attrs: &Attributes) -> Result<NodeRef, BuildError> {
    from_attrs::<ops::RegionYolo>(&[data.into()], attrs)
}

pub fn reorg_yolo(data: impl Into<Output>, stride: usize) -> Result<NodeRef, BuildError> {
    let op = ops::ReorgYolo {
        stride: vec![stride, stride],
    };
    node(op, &[data.into()])
}

pub fn rdft(
    data: impl Into<Output>,
    axes: impl Into<Output>,
    signal_size: Option<Output>,
) -> Result<NodeRef, BuildError> {
    let inputs = with_optional("RDFT", [data.into(), axes.into()], [signal_size])?;
    node(ops::Rdft {}, &inputs)
}

pub fn irdft(
    data: impl Into<Output>,
    axes: impl Into<Output>,
    signal_size: Option<Output>,
) -> Result<NodeRef, BuildError> {
    let inputs = with_optional("IRDFT", [data.into(), axes.into()], [signal_size])?;
    node(ops::Irdft {}, &inputs)
}

/// Start building a `TensorIterator` node.
pub fn tensor_iterator() -> LoopBuilder {
    LoopBuilder::tensor_iterator()
}

/// Start building a `Loop` node which runs at most `trip_count` times,
/// provided that `condition` is initially true.
pub fn loop_op(trip_count: impl Into<Output>, condition: impl Into<Output>) -> LoopBuilder {
    LoopBuilder::new_loop(trip_count, condition)
}
