use opgraph_shape_inference::ops as rules;
use opgraph_shape_inference::{ElementType, InferShapes};

define_op!(
    /// Index of the bucket each element falls into, given sorted boundaries.
    Bucketize("Bucketize", "opset3") {
        output_type: ElementType = ElementType::I64,
        with_right_bound: bool = true,
    }
    |op, inputs| {
        rules::Bucketize {
            output_type: op.output_type,
        }
        .infer_shapes(inputs)
    }
);

define_op!(
    /// Backtrack beam search results through parent pointers.
    GatherTree("GatherTree", "opset1") {}
    |_op, inputs| {
        rules::GatherTree.infer_shapes(inputs)
    }
);

define_op!(
    /// Sum of embeddings in bags delimited by offsets.
    EmbeddingBagOffsetsSum("EmbeddingBagOffsetsSum", "opset3") {}
    |_op, inputs| {
        rules::EmbeddingBagOffsets.infer_shapes(inputs)
    }
);

define_op!(
    /// Sum of embeddings in equally sized bags.
    EmbeddingBagPackedSum("EmbeddingBagPackedSum", "opset3") {}
    |_op, inputs| {
        rules::EmbeddingBagPacked.infer_shapes(inputs)
    }
);

define_op!(
    /// Sum of embeddings grouped by segment id.
    EmbeddingSegmentsSum("EmbeddingSegmentsSum", "opset3") {}
    |_op, inputs| {
        rules::EmbeddingSegments.infer_shapes(inputs)
    }
);

define_op!(
    /// Greedy decoding of time-major CTC logits.
    CtcGreedyDecoder("CTCGreedyDecoder", "opset1") {
        ctc_merge_repeated: bool = true,
    }
    |_op, inputs| {
        rules::CtcGreedyDecoder.infer_shapes(inputs)
    }
);

define_op!(
    /// Greedy decoding of batch-major CTC logits with sequence lengths.
    CtcGreedyDecoderSeqLen("CTCGreedyDecoderSeqLen", "opset6") {
        merge_repeated: bool = true,
        classes_index_type: ElementType = ElementType::I32,
        sequence_length_type: ElementType = ElementType::I32,
    }
    |op, inputs| {
        rules::CtcGreedyDecoderSeqLen {
            classes_index_type: op.classes_index_type,
            sequence_length_type: op.sequence_length_type,
        }
        .infer_shapes(inputs)
    }
);

define_op!(
    /// Unique elements of a tensor, or unique slices along an axis.
    Unique("Unique", "opset10") {
        sorted: bool = true,
        index_element_type: ElementType = ElementType::I64,
        count_element_type: ElementType = ElementType::I64,
    }
    |op, inputs| {
        rules::Unique {
            index_type: op.index_element_type,
            count_type: op.count_element_type,
        }
        .infer_shapes(inputs)
    }
);
