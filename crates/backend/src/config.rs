use serde::{Deserialize, Serialize};

/// Knobs for a coverage build. Hosts usually embed this in their own configuration file.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct CoverageConfig {
    /// Do not count statements inside constructor bodies.
    pub skip_constructor_statements: bool,
    /// Attribute bare `revert()` calls to the jumps into the shared revert target.
    pub reconcile_reverts: bool,
    /// Only attribute instructions to the contract's own file and the files of its
    /// dependencies.
    pub restrict_to_dependencies: bool,
}

impl Default for CoverageConfig {
    fn default() -> Self {
        Self {
            skip_constructor_statements: true,
            reconcile_reverts: true,
            restrict_to_dependencies: true,
        }
    }
}
