//! Release identity.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::Result;
use crate::version;

/// One versioned, built-and-published unit of software from a single commit.
///
/// Created once per build-stage invocation and immutable afterwards. The
/// deploy stage consumes `version` as an opaque string.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Release {
    /// Unique identifier for this release record.
    pub release_id: Uuid,

    /// Repository identifier, e.g. `org/tts-api`.
    pub repository: String,

    /// Branch that triggered the build.
    pub branch: String,

    /// Full commit sha of the triggering commit.
    pub commit_sha: String,

    /// Derived version string, `sha[0..7]-timestamp`.
    pub version: String,

    /// When the release was created.
    pub created_at: DateTime<Utc>,
}

impl Release {
    /// Create a release for a commit, deriving the version from the given
    /// build timestamp.
    pub fn new(repository: &str, branch: &str, commit_sha: &str, timestamp: i64) -> Result<Self> {
        let version = version::generate(commit_sha, timestamp)?;
        Ok(Self {
            release_id: Uuid::new_v4(),
            repository: repository.to_string(),
            branch: branch.to_string(),
            commit_sha: commit_sha.to_string(),
            version,
            created_at: Utc::now(),
        })
    }
}
