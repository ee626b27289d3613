use std::error::Error;
use std::fmt::{Display, Formatter};

use opgraph_shape_inference::{InferShapesError, TensorInfo};

use crate::op_registry::ReadOpError;

/// Errors that occur when creating a node or graph.
#[derive(Clone, Debug, PartialEq)]
pub struct BuildError(BuildErrorImpl);

impl BuildError {
    /// Return the general category of error.
    pub fn kind(&self) -> ErrorKind {
        self.0.kind()
    }

    /// Names of the operators that this error relates to.
    ///
    /// When an error occurs while inferring the body of a control-flow
    /// operator, the first entry is the outer operator and the last entry
    /// the operator in the inner-most body which failed.
    pub fn op_path(&self) -> Vec<&str> {
        self.0.op_path()
    }

    pub(crate) fn op_error(op: &str, error: InferShapesError) -> Self {
        BuildErrorImpl::OperatorError {
            op: op.to_string(),
            error,
            inputs: Vec::new(),
        }
        .into()
    }

    pub(crate) fn invalid_argument(op: &str, reason: &'static str) -> Self {
        Self::op_error(op, InferShapesError::InvalidArgument(reason))
    }

    pub(crate) fn invalid_slicing_params(op: &str, reason: &'static str) -> Self {
        Self::op_error(op, InferShapesError::InvalidSlicingParams(reason))
    }

    pub(crate) fn read_op_error(op: &str, error: ReadOpError) -> Self {
        BuildErrorImpl::ReadOpError {
            op: op.to_string(),
            error,
        }
        .into()
    }

    pub(crate) fn unknown_operator(name: &str, version: &str) -> Self {
        BuildErrorImpl::UnknownOperator {
            name: name.to_string(),
            version: version.to_string(),
        }
        .into()
    }

    pub(crate) fn uninitialized_body(op: &str) -> Self {
        BuildErrorImpl::UninitializedBody { op: op.to_string() }.into()
    }

    pub(crate) fn dangling_parameter(graph: &str, parameter: String) -> Self {
        BuildErrorImpl::DanglingParameter {
            graph: graph.to_string(),
            parameter,
        }
        .into()
    }

    pub(crate) fn unused_parameter(graph: &str, parameter: String) -> Self {
        BuildErrorImpl::UnusedParameter {
            graph: graph.to_string(),
            parameter,
        }
        .into()
    }

    pub(crate) fn nesting_too_deep(op: &str, limit: usize) -> Self {
        BuildErrorImpl::NestingTooDeep {
            op: op.to_string(),
            limit,
        }
        .into()
    }

    pub(crate) fn subgraph_error(op: &str, error: Self) -> Self {
        BuildErrorImpl::SubgraphError {
            op: op.to_string(),
            error: Box::new(error),
        }
        .into()
    }

    /// Attach the descriptions of the operator's inputs to an operator
    /// error.
    pub(crate) fn with_inputs(mut self, infos: &[TensorInfo]) -> Self {
        if let BuildErrorImpl::OperatorError { inputs, .. } = &mut self.0 {
            *inputs = infos.iter().map(|info| info.without_value()).collect();
        }
        self
    }
}

impl Display for BuildError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl Error for BuildError {}

impl From<BuildErrorImpl> for BuildError {
    fn from(inner: BuildErrorImpl) -> Self {
        Self(inner)
    }
}

/// The category of construction error. See [`BuildError::kind`].
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[non_exhaustive]
pub enum ErrorKind {
    TypeMismatch,
    RankMismatch,
    DimensionMismatch,
    BroadcastError,
    InvalidArgumentCount,
    InvalidArgument,
    InvalidKernel,
    InvalidSlicingParams,
    UnknownAttribute,
    UninitializedBody,
    DanglingParameter,
    UnusedParameter,
    UnknownOperator,
    NestingTooDeep,
}

impl From<&InferShapesError> for ErrorKind {
    fn from(error: &InferShapesError) -> ErrorKind {
        match error {
            InferShapesError::TypeMismatch(..) => ErrorKind::TypeMismatch,
            InferShapesError::RankMismatch { .. } => ErrorKind::RankMismatch,
            InferShapesError::DimensionMismatch(..) => ErrorKind::DimensionMismatch,
            InferShapesError::BroadcastError(..) => ErrorKind::BroadcastError,
            InferShapesError::InvalidArgumentCount { .. } => ErrorKind::InvalidArgumentCount,
            InferShapesError::InvalidArgument(_) => ErrorKind::InvalidArgument,
            InferShapesError::InvalidKernel(_) => ErrorKind::InvalidKernel,
            InferShapesError::InvalidSlicingParams(_) => ErrorKind::InvalidSlicingParams,
        }
    }
}

/// Internal implementation of [`BuildError`].
#[derive(Clone, Debug, PartialEq)]
pub(crate) enum BuildErrorImpl {
    /// An operator rejected its inputs or attributes.
    OperatorError {
        op: String,
        error: InferShapesError,

        /// Type and shape of the operator inputs, if known.
        inputs: Vec<TensorInfo>,
    },

    /// The attributes of an operator do not match its schema.
    ReadOpError { op: String, error: ReadOpError },

    /// No operator with a given name and version is registered.
    UnknownOperator { name: String, version: String },

    /// A control-flow operator was used before its body was attached.
    UninitializedBody { op: String },

    /// A result depends on a parameter that the graph does not declare.
    DanglingParameter { graph: String, parameter: String },

    /// A declared parameter is not used by any result.
    UnusedParameter { graph: String, parameter: String },

    /// Control-flow bodies are nested deeper than the configured limit.
    NestingTooDeep { op: String, limit: usize },

    /// Inference of a control-flow body failed.
    SubgraphError { op: String, error: Box<BuildError> },
}

impl BuildErrorImpl {
    fn kind(&self) -> ErrorKind {
        type Kind = ErrorKind;

        match self {
            Self::OperatorError { error, .. } => error.into(),
            Self::ReadOpError { error, .. } => match error {
                ReadOpError::UnknownAttribute(_) => Kind::UnknownAttribute,
                ReadOpError::MissingAttribute(_) | ReadOpError::AttrError { .. } => {
                    Kind::InvalidArgument
                }
            },
            Self::UnknownOperator { .. } => Kind::UnknownOperator,
            Self::UninitializedBody { .. } => Kind::UninitializedBody,
            Self::DanglingParameter { .. } => Kind::DanglingParameter,
            Self::UnusedParameter { .. } => Kind::UnusedParameter,
            Self::NestingTooDeep { .. } => Kind::NestingTooDeep,
            Self::SubgraphError { error, .. } => error.kind(),
        }
    }

    fn op_path(&self) -> Vec<&str> {
        match self {
            Self::OperatorError { op, .. }
            | Self::ReadOpError { op, .. }
            | Self::UninitializedBody { op }
            | Self::NestingTooDeep { op, .. } => [op.as_str()].into(),
            Self::UnknownOperator { name, .. } => [name.as_str()].into(),
            Self::DanglingParameter { .. } | Self::UnusedParameter { .. } => Vec::new(),
            Self::SubgraphError { op, error } => {
                let mut path = vec![op.as_str()];
                path.extend(error.op_path());
                path
            }
        }
    }
}

impl Display for BuildErrorImpl {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::OperatorError { op, error, inputs } => {
                write!(f, "operator \"{}\" failed: {}", op, error)?;
                if !inputs.is_empty() {
                    write!(f, ". Inputs were (")?;
                    for (i, input) in inputs.iter().enumerate() {
                        if i > 0 {
                            write!(f, ", ")?;
                        }
                        write!(f, "{} {}", input.dtype(), input.shape())?;
                    }
                    write!(f, ")")?;
                }
                Ok(())
            }
            Self::ReadOpError { op, error } => {
                write!(f, "operator \"{}\" has invalid attributes: {}", op, error)
            }
            Self::UnknownOperator { name, version } => {
                write!(f, "operator {} ({}) is not registered", name, version)
            }
            Self::UninitializedBody { op } => {
                write!(f, "operator \"{}\" has no body", op)
            }
            Self::DanglingParameter { graph, parameter } => write!(
                f,
                "graph \"{}\" uses parameter {} which it does not declare",
                graph, parameter
            ),
            Self::UnusedParameter { graph, parameter } => write!(
                f,
                "graph \"{}\" declares parameter {} which no result uses",
                graph, parameter
            ),
            Self::NestingTooDeep { op, limit } => write!(
                f,
                "operator \"{}\" nests bodies more than {} levels deep",
                op, limit
            ),
            Self::SubgraphError { op, error } => {
                write!(f, "operator \"{}\" body error: {}", op, error)
            }
        }
    }
}
