//! Shape inference rules for individual operators.
//!
//! Each type here implements [`InferShapes`](crate::InferShapes). Several
//! graph operators can share one rule, in which case the rule is configured
//! through its fields.

mod binary;
mod conv_pool;
mod detection;
mod fft;
mod image;
mod layout;
mod nms;
mod rnn;
mod roi;
mod selection;
mod slice;
mod unary;

pub use binary::{Add, Divide, FloorMod, Maximum, Minimum, Multiply, Power, Subtract};
pub use conv_pool::{
    AdaptivePool, AutoPad, Conv, DeformableConv, ExtractImagePatches, Padding, Pool,
};
pub use detection::{PriorBox, PriorBoxClustered, Proposal, RegionYolo, ReorgYolo};
pub use fft::{Irdft, Rdft};
pub use image::{
    GridSample, Interpolate, InterpolateV0, ShapeCalculation, YuvFormat, YuvToRgb,
};
pub use layout::{Range, Squeeze, Unsqueeze};
pub use nms::{GenerateProposals, MulticlassNms, NonMaxSuppression};
pub use rnn::{CellKind, Direction, RecurrentCell, RecurrentSequence};
pub use roi::{DeformablePsRoiPool, PsRoiPool, RoiAlign, RoiPool};
pub use selection::{
    Bucketize, CtcGreedyDecoder, CtcGreedyDecoderSeqLen, EmbeddingBagOffsets,
    EmbeddingBagPacked, EmbeddingSegments, GatherTree, Unique,
};
pub use slice::Slice;
pub use unary::{Convert, ConvertLike};
