//! Deploy stage: propagate a built version into the manifest repository.
//!
//! The manifest repository is shared across concurrent releases with no
//! locking primitive, so the stage uses optimistic concurrency: sync to the
//! latest trunk, mutate, commit, push, and on a push rejection retry the
//! whole cycle from the latest state. Deploys for the same
//! `(environment, cluster, app)` key are serialized in-process.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use shipway_core::{
    app_name_from_repository, manifest, DeployRequest, DeploymentTarget, Environment, GitIdentity,
    GitWorkspace, ImageReference, MutationOutcome, Result, Secret,
};

/// Bound on fetch-mutate-commit-push cycles per deploy.
pub const MAX_PUSH_ATTEMPTS: u32 = 3;

/// Result of a deploy-stage invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeployOutcome {
    /// Resolved deployment target.
    pub target: DeploymentTarget,

    /// Image reference written into the manifest.
    pub image: ImageReference,

    /// Manifest path relative to the repository root.
    pub manifest_path: String,

    /// Whether a commit was pushed. `false` means the manifest already
    /// carried this reference.
    pub pushed: bool,

    /// Number of fetch-mutate-commit-push attempts used.
    pub attempts: u32,
}

/// Deploy-stage orchestrator.
///
/// Holds the registry host for image naming, the fixed commit identity,
/// and the per-target lock registry.
pub struct DeployStage {
    registry: String,
    identity: GitIdentity,
    git_timeout_secs: u64,
    manifest_credential: Option<Secret>,
    locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl DeployStage {
    pub fn new(registry: &str, identity: GitIdentity, git_timeout_secs: u64) -> Self {
        Self {
            registry: registry.to_string(),
            identity,
            git_timeout_secs,
            manifest_credential: None,
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// Write credential for the manifest remote. An empty value means the
    /// checkout authenticates on its own (ssh agent, credential helper).
    pub fn with_manifest_credential(mut self, credential: Secret) -> Self {
        if !credential.is_empty() {
            self.manifest_credential = Some(credential);
        }
        self
    }

    /// Run the deploy stage for one release.
    pub async fn run(&self, request: &DeployRequest) -> Result<DeployOutcome> {
        let environment = Environment::resolve(&request.branch)?;
        let app = app_name_from_repository(&request.repository)?;
        let target = DeploymentTarget::new(environment, &request.cluster, &app);
        let image = ImageReference::new(
            &self.registry,
            &request.repository,
            &request.branch,
            &request.version,
        );
        let manifest_path = target.manifest_path();

        info!(
            app = %app,
            environment = %environment,
            cluster = %request.cluster,
            version = %request.version,
            manifest = %manifest_path,
            "starting deploy stage"
        );

        let lock = self.target_lock(&target);
        let _guard = lock.lock().await;

        let mut workspace = GitWorkspace::new(
            &request.manifest_repo,
            &request.trunk,
            self.identity.clone(),
            self.git_timeout_secs,
        );
        if let Some(credential) = &self.manifest_credential {
            workspace = workspace.with_credential(credential.clone())?;
        }
        let message = format!(
            "deploy {app} to {environment}/{cluster}: {version}",
            cluster = request.cluster,
            version = request.version,
        );

        let mut attempt = 1u32;
        loop {
            workspace.sync_trunk().await?;

            let absolute = request.manifest_repo.join(&manifest_path);
            match manifest::set_image(&absolute, &image)? {
                MutationOutcome::Unchanged => {
                    info!(manifest = %manifest_path, "manifest already current, nothing to push");
                    return Ok(DeployOutcome {
                        target,
                        image,
                        manifest_path,
                        pushed: false,
                        attempts: attempt,
                    });
                }
                MutationOutcome::Updated => {}
            }

            workspace.commit(&[&manifest_path], &message).await?;
            match workspace.push().await {
                Ok(()) => {
                    info!(manifest = %manifest_path, attempts = attempt, "deploy stage complete");
                    return Ok(DeployOutcome {
                        target,
                        image,
                        manifest_path,
                        pushed: true,
                        attempts: attempt,
                    });
                }
                Err(e) if e.is_retryable() && attempt < MAX_PUSH_ATTEMPTS => {
                    warn!(
                        attempt = attempt,
                        error = %e,
                        "push rejected, retrying from latest trunk"
                    );
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Lock serializing deploys per `(environment, cluster, app)` key.
    fn target_lock(&self, target: &DeploymentTarget) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        locks
            .entry(target.lock_key())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone()
    }
}
