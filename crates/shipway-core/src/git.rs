//! Commit/push agent for the manifest repository.
//!
//! Wraps the `git` binary over an existing checkout. Every command is
//! bounded by an explicit timeout; a rejected push is surfaced as
//! `CommitPushConflict` so the deploy stage can retry from the latest
//! trunk state instead of force-pushing.

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use tokio::process::Command;
use tracing::{debug, info};

use crate::config::Secret;
use crate::error::{PipelineError, Result};

/// Fixed machine-author identity used for manifest commits.
#[derive(Debug, Clone)]
pub struct GitIdentity {
    pub name: String,
    pub email: String,
}

impl Default for GitIdentity {
    fn default() -> Self {
        Self {
            name: "shipway-release-bot".to_string(),
            email: "release-bot@shipway.dev".to_string(),
        }
    }
}

/// Askpass shim handing a write credential to git over the child
/// environment. The script itself never contains the value.
#[derive(Debug)]
struct AskpassHelper {
    _dir: tempfile::TempDir,
    script: PathBuf,
    credential: Secret,
}

/// A checkout of the manifest repository, pinned to its trunk branch.
#[derive(Debug, Clone)]
pub struct GitWorkspace {
    root: PathBuf,
    trunk: String,
    identity: GitIdentity,
    timeout_secs: u64,
    askpass: Option<Arc<AskpassHelper>>,
}

impl GitWorkspace {
    pub fn new(root: &Path, trunk: &str, identity: GitIdentity, timeout_secs: u64) -> Self {
        Self {
            root: root.to_path_buf(),
            trunk: trunk.to_string(),
            identity,
            timeout_secs,
            askpass: None,
        }
    }

    /// Route a write credential to git through `GIT_ASKPASS`.
    ///
    /// The helper script reads the value from its own environment, so the
    /// credential never appears on an argv, in the remote URL, or on disk.
    pub fn with_credential(mut self, credential: Secret) -> Result<Self> {
        let dir = tempfile::tempdir()?;
        let script = dir.path().join("askpass.sh");
        std::fs::write(&script, "#!/bin/sh\nprintf '%s' \"$SHIPWAY_GIT_CREDENTIAL\"\n")?;
        let mut perms = std::fs::metadata(&script)?.permissions();
        perms.set_mode(0o700);
        std::fs::set_permissions(&script, perms)?;

        self.askpass = Some(Arc::new(AskpassHelper {
            _dir: dir,
            script,
            credential,
        }));
        Ok(self)
    }

    /// Checkout root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Bring the checkout to the latest remote trunk state.
    ///
    /// Each push attempt starts here, so a previously failed attempt can
    /// never leak a dirty working tree into the next one.
    pub async fn sync_trunk(&self) -> Result<()> {
        self.git(&["fetch", "origin"]).await?;
        self.git(&["checkout", &self.trunk]).await?;
        let upstream = format!("origin/{}", self.trunk);
        self.git(&["reset", "--hard", &upstream]).await?;
        debug!(trunk = %self.trunk, "synced to remote trunk");
        Ok(())
    }

    /// Stage the given paths and commit them with the fixed bot identity.
    pub async fn commit(&self, paths: &[&str], message: &str) -> Result<()> {
        let mut add_args = vec!["add", "--"];
        add_args.extend_from_slice(paths);
        self.git(&add_args).await?;

        let name_cfg = format!("user.name={}", self.identity.name);
        let email_cfg = format!("user.email={}", self.identity.email);
        self.git(&["-c", &name_cfg, "-c", &email_cfg, "commit", "-m", message])
            .await?;
        info!(message = %message, "committed manifest change");
        Ok(())
    }

    /// Push the trunk branch to the remote.
    ///
    /// A non-fast-forward rejection (trunk moved since fetch) becomes
    /// `CommitPushConflict`; any other failure is a plain `GitError`.
    /// Errors are never discarded.
    pub async fn push(&self) -> Result<()> {
        match self.git(&["push", "origin", &self.trunk]).await {
            Ok(_) => {
                info!(trunk = %self.trunk, "pushed to remote trunk");
                Ok(())
            }
            Err(PipelineError::GitError(stderr)) if is_push_rejection(&stderr) => {
                Err(PipelineError::CommitPushConflict(stderr))
            }
            Err(e) => Err(e),
        }
    }

    /// Capture the HEAD commit sha of the checkout.
    pub async fn head_sha(&self) -> Result<String> {
        let sha = self.git(&["rev-parse", "HEAD"]).await?.trim().to_string();
        if sha.is_empty() {
            return Err(PipelineError::GitError(
                "git rev-parse HEAD returned empty output".to_string(),
            ));
        }
        Ok(sha)
    }

    /// Run one git command in the checkout, bounded by the workspace timeout.
    async fn git(&self, args: &[&str]) -> Result<String> {
        let mut command = Command::new("git");
        command
            .args(args)
            .current_dir(&self.root)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            // A fetch or push that outlives its bound must die with the
            // dropped wait future, not land on the remote afterwards.
            .kill_on_drop(true);
        if let Some(helper) = &self.askpass {
            command
                .env("GIT_ASKPASS", &helper.script)
                .env("SHIPWAY_GIT_CREDENTIAL", helper.credential.expose())
                .env("GIT_TERMINAL_PROMPT", "0");
        }
        let child = command
            .spawn()
            .map_err(|e| PipelineError::GitError(format!("failed to run git: {e}")))?;

        let step = format!("git {}", args.first().copied().unwrap_or(""));
        let output = tokio::time::timeout(
            Duration::from_secs(self.timeout_secs),
            child.wait_with_output(),
        )
        .await
        .map_err(|_| PipelineError::Timeout {
            step: step.clone(),
            secs: self.timeout_secs,
        })?
        .map_err(|e| PipelineError::GitError(format!("{step} failed: {e}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(PipelineError::GitError(format!(
                "{step} failed: {}",
                stderr.trim()
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }
}

/// Whether a push stderr indicates the remote moved since our fetch.
fn is_push_rejection(stderr: &str) -> bool {
    stderr.contains("non-fast-forward")
        || stderr.contains("fetch first")
        || stderr.contains("[rejected]")
}
