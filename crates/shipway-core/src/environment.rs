//! Deployment environment resolution from branch naming.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{PipelineError, Result};

/// A named deployment tier, selected by branch-naming convention.
///
/// The set is closed: a branch matching no known prefix is a hard error,
/// never a silent default.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Environment {
    Dev,
    Prod,
}

impl Environment {
    /// Resolve the target environment from a branch name.
    ///
    /// `dev*` maps to [`Environment::Dev`], `main*` to [`Environment::Prod`].
    /// Any other prefix fails with `UnresolvedEnvironment`. Pure, no I/O.
    pub fn resolve(branch: &str) -> Result<Self> {
        if branch.starts_with("dev") {
            Ok(Environment::Dev)
        } else if branch.starts_with("main") {
            Ok(Environment::Prod)
        } else {
            Err(PipelineError::UnresolvedEnvironment(branch.to_string()))
        }
    }

    /// Path segment used in manifest locations.
    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Dev => "dev",
            Environment::Prod => "prod",
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
