//! Domain-level error taxonomy for the release pipeline.

use std::path::PathBuf;

/// Errors produced by the release pipeline.
///
/// Every variant aborts the current stage; no partial state counts as
/// success. `CommitPushConflict` is the only recoverable kind — the deploy
/// stage retries it from the latest trunk state a bounded number of times.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("branch '{0}' matches no known environment prefix")]
    UnresolvedEnvironment(String),

    #[error("image build failed: {0}")]
    BuildFailure(String),

    #[error("image publish failed: {0}")]
    PublishFailure(String),

    #[error("registry authentication rejected: {0}")]
    CredentialFailure(String),

    #[error("manifest not found: {0}")]
    ManifestNotFound(PathBuf),

    #[error("expected exactly one 'image:' line in {path}, found {matches}")]
    NoImageLineFound { path: PathBuf, matches: usize },

    #[error("push rejected, trunk moved since fetch: {0}")]
    CommitPushConflict(String),

    #[error("git error: {0}")]
    GitError(String),

    #[error("step '{step}' timed out after {secs} seconds")]
    Timeout { step: String, secs: u64 },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl PipelineError {
    /// Whether a retry from the latest trunk state can recover this error.
    pub fn is_retryable(&self) -> bool {
        matches!(self, PipelineError::CommitPushConflict(_))
    }
}

/// Result type for pipeline operations.
pub type Result<T> = std::result::Result<T, PipelineError>;
