use std::sync::OnceLock;

use crate::env::{env_flag, env_usize};

/// Options which control how graphs and control-flow nodes are built.
#[derive(Clone, Debug, PartialEq)]
pub struct BuildOptions {
    /// Reject graphs which declare parameters that no result depends on.
    pub strict_parameters: bool,

    /// Maximum depth of nested control-flow bodies during inference.
    pub max_nesting_depth: usize,
}

impl BuildOptions {
    pub const DEFAULT_MAX_NESTING_DEPTH: usize = 32;

    /// Read options from the environment.
    ///
    /// `OPGRAPH_STRICT_PARAMETERS` is a boolean flag and
    /// `OPGRAPH_MAX_NESTING_DEPTH` an integer. Unrecognized values are logged
    /// and replaced by the defaults.
    pub fn from_env() -> BuildOptions {
        BuildOptions {
            strict_parameters: env_flag("OPGRAPH_STRICT_PARAMETERS", false),
            max_nesting_depth: env_usize(
                "OPGRAPH_MAX_NESTING_DEPTH",
                Self::DEFAULT_MAX_NESTING_DEPTH,
            ),
        }
    }

    /// Return the options used by the construction API.
    ///
    /// These are read from the environment the first time they are needed.
    pub fn global() -> &'static BuildOptions {
        static OPTIONS: OnceLock<BuildOptions> = OnceLock::new();
        OPTIONS.get_or_init(BuildOptions::from_env)
    }

    pub fn with_strict_parameters(mut self, strict: bool) -> Self {
        self.strict_parameters = strict;
        self
    }

    pub fn with_max_nesting_depth(mut self, depth: usize) -> Self {
        self.max_nesting_depth = depth;
        self
    }
}

impl Default for BuildOptions {
    fn default() -> Self {
        BuildOptions {
            strict_parameters: false,
            max_nesting_depth: Self::DEFAULT_MAX_NESTING_DEPTH,
        }
    }
}
