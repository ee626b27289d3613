//! Built-in operators.
//!
//! Each operator is a struct holding its attributes. Most delegate shape
//! inference to a rule in [`opgraph_shape_inference::ops`] and are declared
//! with `define_op`, which also generates the [`ReadOp`](crate::ReadOp)
//! implementation used by the registry.

use opgraph_shape_inference::{InferShapesError, TensorInfo};

/// Declare an operator struct with typed attributes.
///
/// Fields with a default value are optional attributes. The closure-like
/// block computes the outputs from the operator and its inputs.
macro_rules! define_op {
    (
        $(#[$meta:meta])*
        $name:ident ($type_name:literal, $version:literal) {
            $($field:ident : $ty:ty $(= $default:expr)?),* $(,)?
        }
        |$op:ident, $inputs:ident| $infer:block
    ) => {
        $(#[$meta])*
        #[derive(Clone, Debug, PartialEq)]
        pub struct $name {
            $(pub $field: $ty,)*
        }

        impl $crate::Operator for $name {
            fn name(&self) -> &str {
                $type_name
            }

            fn version(&self) -> &str {
                $version
            }

            fn attributes(&self) -> $crate::Attributes {
                #[allow(unused_mut)]
                let mut attrs = $crate::Attributes::new();
                $(attrs.insert(stringify!($field), self.$field.clone());)*
                attrs
            }

            fn infer(
                &self,
                inputs: &[$crate::TensorInfo],
                _ctx: &$crate::InferContext,
            ) -> ::std::result::Result<Vec<$crate::TensorInfo>, $crate::BuildError> {
                let infer = |$op: &Self,
                             $inputs: &[$crate::TensorInfo]|
                 -> ::std::result::Result<
                    Vec<$crate::TensorInfo>,
                    $crate::InferShapesError,
                > { $infer };
                infer(self, inputs).map_err(|err| $crate::BuildError::op_error($type_name, err))
            }
        }

        impl $crate::ReadOp for $name {
            fn op_type() -> &'static str {
                $type_name
            }

            fn op_version() -> &'static str {
                $version
            }

            #[allow(unused_variables)]
            fn read(
                attrs: &$crate::AttrReader,
            ) -> ::std::result::Result<Self, $crate::ReadOpError> {
                Ok($name {
                    $($field: read_attr!(attrs, $field: $ty $(= $default)?),)*
                })
            }
        }
    };
}

/// Read one attribute of an operator declared with `define_op`.
macro_rules! read_attr {
    ($attrs:ident, $field:ident : $ty:ty) => {
        $attrs.require::<$ty>(stringify!($field))?
    };
    ($attrs:ident, $field:ident : $ty:ty = $default:expr) => {
        $attrs.get_or::<$ty>(stringify!($field), $default)?
    };
}

mod binary_elementwise;
mod control_flow;
mod conv;
mod convert;
mod detection;
mod fft;
mod image;
mod leaves;
mod layout;
mod non_max_suppression;
mod pooling;
mod resize;
mod rnn;
mod roi;
mod selection;
mod slice;
mod unary_elementwise;
mod variables;

pub use binary_elementwise::{
    Add, Divide, FloorMod, Maximum, Minimum, Multiply, Power, Subtract,
};
pub use control_flow::{
    InputBinding, Iteration, Loop, LoopBuilder, LoopKind, OutputBinding, SliceParams,
    SpecialBodyPorts, TensorIterator,
};
pub use conv::{BinaryConvolution, Convolution, DeformableConvolution};
pub use convert::{Convert, ConvertLike};
pub use detection::{PriorBox, PriorBoxClustered, Proposal, RegionYolo, ReorgYolo};
pub use fft::{Irdft, Rdft};
pub use image::{GridSample, I420ToBgr, I420ToRgb, Nv12ToBgr, Nv12ToRgb};
pub use layout::{Range, Squeeze, Unsqueeze};
pub use leaves::{Constant, Parameter, ResultOp};
pub use non_max_suppression::{GenerateProposals, MatrixNms, MulticlassNms, NonMaxSuppression};
pub use pooling::{
    AdaptiveAvgPool, AdaptiveMaxPool, AvgPool, ExtractImagePatches, MaxPool,
};
pub use resize::{Interpolate, InterpolateV0};
pub use rnn::{GruCell, GruSequence, LstmCell, LstmSequence, RnnCell, RnnSequence};
pub use roi::{DeformablePsRoiPooling, PsRoiPooling, RoiAlign, RoiPooling};
pub use selection::{
    Bucketize, CtcGreedyDecoder, CtcGreedyDecoderSeqLen, EmbeddingBagOffsetsSum,
    EmbeddingBagPackedSum, EmbeddingSegmentsSum, GatherTree, Unique,
};
pub use slice::Slice;
pub use unary_elementwise::{IsFinite, IsInf, IsNaN, SoftSign};
pub use variables::{Assign, ReadValue};

/// Check that the number of inputs is in `[min, max]`.
fn check_input_count(
    inputs: &[TensorInfo],
    min: usize,
    max: usize,
) -> Result<(), InferShapesError> {
    if inputs.len() < min || inputs.len() > max {
        return Err(InferShapesError::InvalidArgumentCount {
            min,
            max,
            actual: inputs.len(),
        });
    }
    Ok(())
}

/// Check that a string attribute is one of `choices`, ignoring case.
fn check_choice(
    value: &str,
    choices: &[&str],
    error: &'static str,
) -> Result<(), InferShapesError> {
    if choices.iter().any(|choice| choice.eq_ignore_ascii_case(value)) {
        Ok(())
    } else {
        Err(InferShapesError::InvalidArgument(error))
    }
}
