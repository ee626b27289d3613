use std::any::Any;
use std::fmt::Debug;

use opgraph_shape_inference::TensorInfo;
use smallvec::SmallVec;

use crate::attrs::Attributes;
use crate::graph::{BuildError, Graph};
use crate::options::BuildOptions;

/// Context passed to [`Operator::infer`].
#[derive(Clone, Copy, Debug)]
pub struct InferContext<'a> {
    options: &'a BuildOptions,
    depth: usize,
}

impl<'a> InferContext<'a> {
    pub fn new(options: &'a BuildOptions) -> Self {
        InferContext { options, depth: 0 }
    }

    pub fn options(&self) -> &'a BuildOptions {
        self.options
    }

    /// Number of control-flow bodies enclosing the node being inferred.
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Return the context for inferring the body of a control-flow operator.
    pub(crate) fn nested(&self) -> Self {
        InferContext {
            options: self.options,
            depth: self.depth + 1,
        }
    }
}

/// An Operator describes a computation step in a graph.
///
/// Operators take zero or more inputs, plus a set of static attributes, and
/// produce one or more outputs. Operators do not compute values. Instead
/// [`infer`](Operator::infer) derives the element type and shape of each
/// output from those of the inputs.
///
/// Operators are named after the operator set entry that they describe, and
/// the same name can be registered in several versions.
pub trait Operator: Any + Debug {
    /// Return the type name of the operator, eg. "Convolution".
    fn name(&self) -> &str;

    /// Return the operator set version, eg. "opset1".
    fn version(&self) -> &str;

    /// Return the attributes of this operator, including defaults for
    /// attributes that were not specified when it was created.
    fn attributes(&self) -> Attributes;

    /// Compute the type and shape of each output.
    fn infer(
        &self,
        inputs: &[TensorInfo],
        ctx: &InferContext,
    ) -> Result<Vec<TensorInfo>, BuildError>;

    /// Return the [`SubgraphOperator`] implementation for this operator, if
    /// this operator has subgraphs.
    fn as_subgraph_op(&self) -> Option<&dyn SubgraphOperator> {
        None
    }
}

impl dyn Operator + Send + Sync {
    /// Downcast this operator to a concrete type.
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        (self as &dyn Any).downcast_ref()
    }
}

/// Trait for operators which contain subgraphs, such as `Loop`.
pub trait SubgraphOperator: Operator {
    /// Return a list of subgraphs used by this operator.
    fn subgraphs(&self) -> SmallVec<[&Graph; 2]>;
}

#[cfg(test)]
mod tests {
    use opgraph_shape_inference::AutoBroadcast;

    use super::Operator;
    use crate::ops::{Add, Subtract};

    #[test]
    fn test_downcast_operator() {
        let add: Box<dyn Operator + Send + Sync> = Box::new(Add {
            auto_broadcast: AutoBroadcast::Numpy,
        });
        assert_eq!(
            add.downcast_ref::<Add>().map(|op| op.auto_broadcast),
            Some(AutoBroadcast::Numpy)
        );
        assert!(add.downcast_ref::<Subtract>().is_none());
    }
}
