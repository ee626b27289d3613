//! opgraph is a typed operator graph with shape and type inference.
//!
//! Graphs are built bottom-up. Each node is created from an operator, its
//! attributes and the outputs of earlier nodes, and its output element types
//! and shapes are inferred immediately. Errors in a graph, such as shapes
//! which cannot be broadcast or a kernel larger than its padded input, are
//! therefore reported when the offending node is created rather than when
//! the graph is executed.
//!
//! # Building graphs
//!
//! The [`builder`] module has a factory function for each operator:
//!
//! ```
//! use opgraph::builder;
//! use opgraph::{Attributes, ElementType, Graph};
//!
//! # fn main() -> Result<(), opgraph::BuildError> {
//! let data = builder::parameter("data", [1, 1, 9, 9], ElementType::F32)?;
//! let filter = builder::parameter("filter", [1, 1, 3, 3], ElementType::F32)?;
//! let attrs = Attributes::new()
//!     .with("strides", vec![1usize, 1])
//!     .with("pads_begin", vec![0usize, 0])
//!     .with("pads_end", vec![0usize, 0])
//!     .with("dilations", vec![1usize, 1]);
//! let conv = builder::convolution(&data, &filter, &attrs)?;
//! assert_eq!(conv.output_shape(0), Some(vec![1, 1, 7, 7]));
//!
//! let graph = Graph::new([&conv], [&data, &filter], "conv")?;
//! assert_eq!(graph.results().len(), 1);
//! # Ok(())
//! # }
//! ```
//!
//! Sizes which are not known when the graph is built are described by
//! [`Dimension`]s, which may be unknown or bounded, and shapes whose rank is
//! unknown by a dynamic [`PartialShape`].
//!
//! # Control flow
//!
//! `Loop` and `TensorIterator` nodes run a body [`Graph`] repeatedly. They
//! are assembled with a [`LoopBuilder`], which binds the body's parameters
//! to outer values and registers outputs taken from the body's results.
//! Building the node infers the body with the bound types and shapes.
//!
//! # Operators by name
//!
//! The [`OpRegistry`] creates operators from their type name, operator set
//! version and [`Attributes`]. Attributes are checked against the operator's
//! schema, and the attributes of an existing node, including defaults, can
//! be used to re-create it.

mod attrs;
mod env;
mod graph;
mod op_registry;
mod operator;
mod options;

pub mod builder;
pub mod ops;

pub use attrs::{AttrReader, AttrValue, Attributes, FromAttr};
pub use graph::{BuildError, ErrorKind, Graph, Node, NodeId, NodeRef, Output};
pub use op_registry::{OpRegistry, ReadOp, ReadOpError};
pub use operator::{InferContext, Operator, SubgraphOperator};
pub use ops::LoopBuilder;
pub use options::BuildOptions;

pub use opgraph_shape_inference::{
    shape, AutoBroadcast, ConstData, Dimension, ElementType, InferShapesError, PartialShape,
    TensorInfo,
};
