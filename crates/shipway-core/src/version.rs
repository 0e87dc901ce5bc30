//! Release version derivation.
//!
//! A version is `<sha-prefix>-<timestamp>`: the first 7 characters of the
//! triggering commit and the build time in seconds since epoch. Uniqueness
//! holds unless two releases share both the sha prefix and the same second.

use chrono::Utc;

use crate::error::{PipelineError, Result};

/// Number of commit-sha characters carried into the version string.
pub const SHA_PREFIX_LEN: usize = 7;

/// Derive a version string from a commit sha and a build timestamp.
///
/// Commit identifiers shorter than 7 characters are a caller error and are
/// rejected rather than silently truncated.
pub fn generate(commit_sha: &str, timestamp: i64) -> Result<String> {
    let prefix = commit_sha.get(..SHA_PREFIX_LEN).ok_or_else(|| {
        PipelineError::InvalidInput(format!(
            "commit sha '{commit_sha}' is shorter than {SHA_PREFIX_LEN} characters"
        ))
    })?;
    Ok(format!("{prefix}-{timestamp}"))
}

/// Derive a version string using the current wall-clock second.
pub fn generate_now(commit_sha: &str) -> Result<String> {
    generate(commit_sha, Utc::now().timestamp())
}
