//! Pipeline configuration.
//!
//! All parameters and credentials are gathered once at the entry point and
//! passed by value into each component; no component reads process-wide
//! environment variables on its own.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// An opaque credential value. Its `Debug` and `Display` output is always
/// redacted so a secret can never leak through a log line or a panic
/// message. Deliberately not serializable.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Expose the underlying value at the external-process boundary.
    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(****)")
    }
}

impl fmt::Display for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("****")
    }
}

impl From<String> for Secret {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// The secrets consumed by the pipeline.
#[derive(Debug, Clone, Default)]
pub struct Secrets {
    /// Registry credential used for `docker login`.
    pub registry_credential: Secret,
    /// Build-time SSH key passed into the build context.
    pub build_ssh_key: Secret,
    /// Build-time access token passed into the build context.
    pub build_access_token: Secret,
    /// Write credential for the manifest repository.
    pub manifest_credential: Secret,
}

/// External builder invocation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuilderConfig {
    /// Builder program to invoke. Tests substitute a stub here.
    pub program: String,

    /// Registry host images are pushed to.
    pub registry: String,

    /// Registry username for authentication.
    pub registry_user: String,

    /// Build context directory.
    pub context_dir: PathBuf,

    /// Dockerfile path, relative to the context.
    pub dockerfile: PathBuf,

    /// Timeout applied to each builder invocation, in seconds.
    pub timeout_secs: u64,
}

impl Default for BuilderConfig {
    fn default() -> Self {
        Self {
            program: "docker".to_string(),
            registry: String::new(),
            registry_user: String::new(),
            context_dir: PathBuf::from("."),
            dockerfile: PathBuf::from("Dockerfile"),
            timeout_secs: 1800,
        }
    }
}

/// Trigger input for the build stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildRequest {
    /// Repository identifier, e.g. `org/tts-api`.
    pub repository: String,
    /// Branch that triggered the build.
    pub branch: String,
    /// Full commit sha of the triggering commit.
    pub commit_sha: String,
}

/// Trigger input for the deploy stage. The version arrives as an external
/// input from the build stage rather than being recomputed, so the two
/// stages can run in different pipeline executions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeployRequest {
    /// Repository identifier, e.g. `org/tts-api`.
    pub repository: String,
    /// Branch that triggered the release.
    pub branch: String,
    /// Version string produced by the build stage, opaque here.
    pub version: String,
    /// Target cluster name.
    pub cluster: String,
    /// Path of the manifest repository checkout.
    pub manifest_repo: PathBuf,
    /// Trunk branch of the manifest repository.
    pub trunk: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_secret_debug_is_redacted() {
        let secret = Secret::new("hunter2");
        assert_eq!(format!("{secret:?}"), "Secret(****)");
        assert_eq!(secret.to_string(), "****");
        assert_eq!(secret.expose(), "hunter2");
    }

    #[test]
    fn test_secrets_struct_debug_leaks_nothing() {
        let secrets = Secrets {
            registry_credential: Secret::new("reg-cred"),
            build_ssh_key: Secret::new("ssh-key"),
            build_access_token: Secret::new("token"),
            manifest_credential: Secret::new("manifest-cred"),
        };
        let dump = format!("{secrets:?}");
        assert!(!dump.contains("reg-cred"));
        assert!(!dump.contains("ssh-key"));
        assert!(!dump.contains("token"));
        assert!(!dump.contains("manifest-cred"));
    }

    #[test]
    fn test_builder_config_default() {
        let config = BuilderConfig::default();
        assert_eq!(config.program, "docker");
        assert_eq!(config.dockerfile, PathBuf::from("Dockerfile"));
        assert!(config.timeout_secs > 0);
    }
}
