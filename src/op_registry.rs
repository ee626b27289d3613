use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::OnceLock;

use rustc_hash::FxHashMap;
use tracing::trace;

use crate::attrs::{AttrReader, Attributes};
use crate::graph::{BuildError, NodeRef, Output};
use crate::operator::{InferContext, Operator};
use crate::ops;
use crate::options::BuildOptions;

type ReadOpResult = Result<Box<dyn Operator + Send + Sync>, ReadOpError>;

type ReadOpFunction = dyn Fn(&AttrReader) -> ReadOpResult + Send + Sync;

/// Trait for operators which can be created from a set of [`Attributes`].
pub trait ReadOp: Operator + Sized + Send + Sync {
    /// Return the type name the operator is registered under.
    fn op_type() -> &'static str;

    /// Return the operator set version the operator is registered under.
    fn op_version() -> &'static str;

    /// Create an operator from its attributes.
    fn read(attrs: &AttrReader) -> Result<Self, ReadOpError>;

    /// Create an operator into a boxed `dyn Operator`.
    fn read_boxed(attrs: &AttrReader) -> ReadOpResult {
        let op = Self::read(attrs)?;
        Ok(Box::new(op))
    }
}

/// Registry of operators which can be created by name.
///
/// New registries have no operators registered by default. To create a
/// registry with all built-in operators pre-registered, use
/// [`OpRegistry::with_all_ops`].
#[derive(Default)]
pub struct OpRegistry {
    /// Map from (type name, version) to the function which reads the
    /// operator's attributes.
    ops: FxHashMap<(&'static str, &'static str), Box<ReadOpFunction>>,
}

impl OpRegistry {
    /// Create a new empty registry.
    pub fn new() -> OpRegistry {
        OpRegistry {
            ops: FxHashMap::default(),
        }
    }

    /// Register the built-in implementation of an operator.
    pub fn register_op<Op: ReadOp + 'static>(&mut self) {
        self.ops.insert(
            (Op::op_type(), Op::op_version()),
            Box::new(|attrs: &AttrReader| Op::read_boxed(attrs)),
        );
    }

    /// Return true if an operator is registered with a given name and
    /// version.
    pub fn contains(&self, name: &str, version: &str) -> bool {
        self.ops.contains_key(&(name, version))
    }

    /// Return the versions registered for an operator name, in ascending
    /// order.
    pub fn versions(&self, name: &str) -> Vec<&'static str> {
        let mut versions: Vec<_> = self
            .ops
            .keys()
            .filter(|(op_name, _)| *op_name == name)
            .map(|(_, version)| *version)
            .collect();
        versions.sort_by_key(|v| opset_number(v));
        versions
    }

    /// Create an operator from its type name, version and attributes.
    ///
    /// Fails if the operator is not registered, if an attribute has the wrong
    /// type, if a required attribute is missing or if `attrs` contains an
    /// attribute which the operator does not recognize.
    pub fn read_op(
        &self,
        name: &str,
        version: &str,
        attrs: &Attributes,
    ) -> Result<Box<dyn Operator + Send + Sync>, BuildError> {
        let read_fn = self
            .ops
            .get(&(name, version))
            .ok_or_else(|| BuildError::unknown_operator(name, version))?;
        let reader = AttrReader::new(attrs);
        let op = read_fn(&reader).map_err(|err| BuildError::read_op_error(name, err))?;
        reader
            .finish()
            .map_err(|err| BuildError::read_op_error(name, err))?;
        Ok(op)
    }

    /// Create an operator and a node which applies it to `inputs`.
    ///
    /// This validates the attributes against the operator's schema and runs
    /// shape inference. Nothing is created if either step fails.
    pub fn create_node(
        &self,
        name: &str,
        version: &str,
        inputs: &[Output],
        attrs: &Attributes,
    ) -> Result<NodeRef, BuildError> {
        self.create_node_with_options(name, version, inputs, attrs, BuildOptions::global())
    }

    /// Variant of [`create_node`](OpRegistry::create_node) which takes
    /// explicit options.
    pub fn create_node_with_options(
        &self,
        name: &str,
        version: &str,
        inputs: &[Output],
        attrs: &Attributes,
        options: &BuildOptions,
    ) -> Result<NodeRef, BuildError> {
        trace!("creating {} ({}) node", name, version);
        let op = self.read_op(name, version, attrs)?;
        NodeRef::new(op, inputs.to_vec(), None, &InferContext::new(options))
    }

    /// Return the registry used by the construction API, which has all
    /// built-in operators registered.
    pub fn global() -> &'static OpRegistry {
        static REGISTRY: OnceLock<OpRegistry> = OnceLock::new();
        REGISTRY.get_or_init(OpRegistry::with_all_ops)
    }

    /// Create a new registry with all built-in operators registered.
    pub fn with_all_ops() -> OpRegistry {
        let mut reg = OpRegistry::new();

        macro_rules! register_op {
            ($op:ident) => {
                reg.register_op::<ops::$op>()
            };
        }

        register_op!(AdaptiveAvgPool);
        register_op!(AdaptiveMaxPool);
        register_op!(Add);
        register_op!(Assign);
        register_op!(AvgPool);
        register_op!(BinaryConvolution);
        register_op!(Bucketize);
        register_op!(Constant);
        register_op!(Convert);
        register_op!(ConvertLike);
        register_op!(Convolution);
        register_op!(CtcGreedyDecoder);
        register_op!(CtcGreedyDecoderSeqLen);
        register_op!(DeformableConvolution);
        register_op!(DeformablePsRoiPooling);
        register_op!(Divide);
        register_op!(EmbeddingBagOffsetsSum);
        register_op!(EmbeddingBagPackedSum);
        register_op!(EmbeddingSegmentsSum);
        register_op!(ExtractImagePatches);
        register_op!(FloorMod);
        register_op!(GatherTree);
        register_op!(GenerateProposals);
        register_op!(GridSample);
        register_op!(GruCell);
        register_op!(GruSequence);
        register_op!(I420ToBgr);
        register_op!(I420ToRgb);
        register_op!(Interpolate);
        register_op!(InterpolateV0);
        register_op!(Irdft);
        register_op!(IsFinite);
        register_op!(IsInf);
        register_op!(IsNaN);
        register_op!(LstmCell);
        register_op!(LstmSequence);
        register_op!(MatrixNms);
        register_op!(MaxPool);
        register_op!(Maximum);
        register_op!(Minimum);
        register_op!(MulticlassNms);
        register_op!(Multiply);
        register_op!(NonMaxSuppression);
        register_op!(Nv12ToBgr);
        register_op!(Nv12ToRgb);
        register_op!(Parameter);
        register_op!(Power);
        register_op!(PriorBox);
        register_op!(PriorBoxClustered);
        register_op!(Proposal);
        register_op!(PsRoiPooling);
        register_op!(Range);
        register_op!(Rdft);
        register_op!(ReadValue);
        register_op!(RegionYolo);
        register_op!(ReorgYolo);
        register_op!(ResultOp);
        register_op!(RnnCell);
        register_op!(RnnSequence);
        register_op!(RoiAlign);
        register_op!(RoiPooling);
        register_op!(Slice);
        register_op!(SoftSign);
        register_op!(Squeeze);
        register_op!(Subtract);
        register_op!(Unique);
        register_op!(Unsqueeze);

        reg
    }
}

/// Extract the number from an "opsetN" version string for sorting.
fn opset_number(version: &str) -> u32 {
    version
        .strip_prefix("opset")
        .and_then(|n| n.parse().ok())
        .unwrap_or(0)
}

/// Error type for errors that occur when reading an operator's attributes.
#[derive(Clone, Debug, PartialEq)]
pub enum ReadOpError {
    /// An attribute was given that the operator does not recognize.
    UnknownAttribute(String),
    /// A required attribute was not given.
    MissingAttribute(String),
    /// An attribute has an unsupported or invalid value.
    AttrError {
        /// Name of the attribute.
        attr: String,
        /// Description of the attribute error.
        error: String,
    },
}

impl ReadOpError {
    pub(crate) fn attr_error(attr: impl AsRef<str>, error: impl AsRef<str>) -> Self {
        Self::AttrError {
            attr: attr.as_ref().to_string(),
            error: error.as_ref().to_string(),
        }
    }
}

impl Display for ReadOpError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ReadOpError::UnknownAttribute(attr) => write!(f, "unknown attribute \"{}\"", attr),
            ReadOpError::MissingAttribute(attr) => {
                write!(f, "required attribute \"{}\" is missing", attr)
            }
            ReadOpError::AttrError { attr, error } => {
                write!(f, "error in attribute \"{}\": {}", attr, error)
            }
        }
    }
}

impl Error for ReadOpError {}
