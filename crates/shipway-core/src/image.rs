//! Fully qualified container image references.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The tagged address of a container image within a registry, composed as
/// `registry/repository:branch-version`.
///
/// Computed freshly each stage and never persisted by this core; the registry
/// and the manifest are the only persistent stores, both external.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ImageReference {
    /// Registry host, e.g. `registry.example.com`.
    pub registry: String,

    /// Repository identifier, e.g. `org/tts-api`.
    pub repository: String,

    /// Image tag, `branch-version`.
    pub tag: String,
}

impl ImageReference {
    /// Compose a reference for one release of a branch.
    pub fn new(registry: &str, repository: &str, branch: &str, version: &str) -> Self {
        Self {
            registry: registry.to_string(),
            repository: repository.to_string(),
            tag: format!("{branch}-{version}"),
        }
    }
}

impl fmt::Display for ImageReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}:{}", self.registry, self.repository, self.tag)
    }
}
