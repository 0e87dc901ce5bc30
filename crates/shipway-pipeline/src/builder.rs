//! Image builder/publisher orchestration.
//!
//! The pipeline only orchestrates the external builder: it composes the
//! invocation, wires secrets into the build context, and maps failures
//! onto the pipeline error taxonomy. Build and push failures are fatal to
//! the stage; the only recovery is re-triggering the whole pipeline.

use async_trait::async_trait;
use tracing::info;

use shipway_core::{BuilderConfig, ImageReference, PipelineError, Result, Secrets};

use crate::runner::CommandRunner;

/// Build-context secret ids exposed to the builder.
const SSH_KEY_SECRET_ID: &str = "ssh_key";
const ACCESS_TOKEN_SECRET_ID: &str = "access_token";

/// Seam for the external image build/publish toolchain.
#[async_trait]
pub trait ImageBuilder: Send + Sync {
    /// Authenticate to the registry. Must run before build/push.
    async fn login(&self, secrets: &Secrets) -> Result<()>;

    /// Build one image tagged with the given reference.
    async fn build(&self, image: &ImageReference, secrets: &Secrets) -> Result<()>;

    /// Upload a previously built image to the registry.
    async fn push(&self, image: &ImageReference) -> Result<()>;
}

/// Builder backed by a Docker-compatible CLI.
///
/// The program is configurable so tests can substitute a stub executable.
pub struct DockerBuilder {
    config: BuilderConfig,
}

impl DockerBuilder {
    pub fn new(config: BuilderConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &BuilderConfig {
        &self.config
    }
}

#[async_trait]
impl ImageBuilder for DockerBuilder {
    async fn login(&self, secrets: &Secrets) -> Result<()> {
        let args = vec![
            "login".to_string(),
            self.config.registry.clone(),
            "--username".to_string(),
            self.config.registry_user.clone(),
            "--password-stdin".to_string(),
        ];

        let output = CommandRunner::run(
            "registry login",
            &self.config.program,
            &args,
            &[],
            Some(secrets.registry_credential.expose()),
            self.config.timeout_secs,
        )
        .await?;

        if !output.success() {
            return Err(PipelineError::CredentialFailure(
                output.stderr.trim().to_string(),
            ));
        }
        info!(registry = %self.config.registry, "registry login ok");
        Ok(())
    }

    async fn build(&self, image: &ImageReference, secrets: &Secrets) -> Result<()> {
        // Secrets travel through the child environment and named build
        // secrets, never through the argv.
        let args = vec![
            "build".to_string(),
            "--file".to_string(),
            self.config.dockerfile.display().to_string(),
            "--tag".to_string(),
            image.to_string(),
            "--secret".to_string(),
            format!("id={SSH_KEY_SECRET_ID},env=SHIPWAY_SSH_KEY"),
            "--secret".to_string(),
            format!("id={ACCESS_TOKEN_SECRET_ID},env=SHIPWAY_ACCESS_TOKEN"),
            self.config.context_dir.display().to_string(),
        ];
        let envs = [
            ("SHIPWAY_SSH_KEY", secrets.build_ssh_key.expose().to_string()),
            (
                "SHIPWAY_ACCESS_TOKEN",
                secrets.build_access_token.expose().to_string(),
            ),
        ];

        info!(image = %image, "building image");
        let output = CommandRunner::run(
            "image build",
            &self.config.program,
            &args,
            &envs,
            None,
            self.config.timeout_secs,
        )
        .await?;

        if !output.success() {
            return Err(PipelineError::BuildFailure(
                output.stderr.trim().to_string(),
            ));
        }
        info!(image = %image, duration_ms = output.duration_ms, "image built");
        Ok(())
    }

    async fn push(&self, image: &ImageReference) -> Result<()> {
        let args = vec!["push".to_string(), image.to_string()];

        info!(image = %image, "pushing image");
        let output = CommandRunner::run(
            "image push",
            &self.config.program,
            &args,
            &[],
            None,
            self.config.timeout_secs,
        )
        .await?;

        if !output.success() {
            return Err(PipelineError::PublishFailure(
                output.stderr.trim().to_string(),
            ));
        }
        info!(image = %image, duration_ms = output.duration_ms, "image pushed");
        Ok(())
    }
}
