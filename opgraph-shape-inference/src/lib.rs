//! Element types, partial shapes and shape inference rules for operator
//! graphs.
//!
//! # About shape inference
//!
//! A graph is built before the sizes of all of its inputs are known. A
//! language model for example takes inputs whose batch size and sequence
//! length change from one run to the next. Shape inference traces how each
//! operator transforms the types and shapes of its inputs, so that every
//! value in the graph carries the most precise description that can be
//! derived when the graph is built.
//!
//! Sizes are described by [`Dimension`], an interval whose upper bound may
//! be unknown, and shapes by [`PartialShape`], whose rank may be unknown.
//!
//! ```text
//! data:   [?, 3, 224, 224]  f32
//! filter: [64, 3, 7, 7]     f32
//! Convolution<strides=[2, 2], pads=[3, 3]>(data, filter) -> [?, 64, 112, 112] f32
//! ```
//!
//! # Crate overview
//!
//! The main export of this crate is the [`InferShapes`] trait, plus types
//! which implement it in [`ops`]. A rule takes a [`TensorInfo`] for each
//! input and returns one for each output.
//!
//! Many operators share the same rule, so there is an M:1 mapping between
//! operators and rules. Most rules only describe how shapes are transformed.
//! A few also propagate the contents of small integer tensors, which lets
//! shape computations such as `Range(0, 16, 1)` produce known sizes.

mod dimension;
mod element_type;
mod infer_shapes;
pub mod ops;
mod partial_shape;
mod tensor_info;

pub use dimension::Dimension;
pub use element_type::{ElementType, ParseElementTypeError};
pub use infer_shapes::{
    AutoBroadcast, BinaryOp, InferShapes, InferShapesError, PredicateOp, UnaryOp,
};
pub use partial_shape::PartialShape;
pub use tensor_info::{ConstData, TensorInfo};

#[cfg(all(test, feature = "serde"))]
mod tests {
    use crate::{shape, Dimension, ElementType, PartialShape};

    #[test]
    fn test_serde_round_trip() {
        let shape = shape![Dimension::dynamic(), 3, (2, 8)];
        let json = serde_json::to_string(&shape).unwrap();
        let parsed: PartialShape = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, shape);

        let json = serde_json::to_string(&ElementType::Boolean).unwrap();
        assert_eq!(json, "\"boolean\"");
        let parsed: ElementType = serde_json::from_str("\"f32\"").unwrap();
        assert_eq!(parsed, ElementType::F32);

        let json = serde_json::to_string(&PartialShape::dynamic()).unwrap();
        let parsed: PartialShape = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, PartialShape::dynamic());
    }
}
