//! Build stage: commit -> versioned, registry-published image.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::info;

use shipway_core::{BuildRequest, BuilderConfig, ImageReference, Release, Result, Secrets};

use crate::builder::ImageBuilder;

/// Result of a build-stage invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildOutcome {
    /// The release created for this build.
    pub release: Release,

    /// The image reference pushed to the registry.
    pub image: ImageReference,
}

/// Run the build stage: derive the version, authenticate, build, push.
///
/// Any failure aborts the stage; callers re-trigger the whole pipeline to
/// recover. The version is derived from the current wall-clock second.
pub async fn build(
    request: &BuildRequest,
    config: &BuilderConfig,
    secrets: &Secrets,
    builder: &dyn ImageBuilder,
) -> Result<BuildOutcome> {
    build_at(request, config, secrets, builder, Utc::now().timestamp()).await
}

/// Run the build stage with an explicit build timestamp.
pub async fn build_at(
    request: &BuildRequest,
    config: &BuilderConfig,
    secrets: &Secrets,
    builder: &dyn ImageBuilder,
    timestamp: i64,
) -> Result<BuildOutcome> {
    let release = Release::new(
        &request.repository,
        &request.branch,
        &request.commit_sha,
        timestamp,
    )?;
    let image = ImageReference::new(
        &config.registry,
        &request.repository,
        &request.branch,
        &release.version,
    );

    info!(
        repository = %request.repository,
        branch = %request.branch,
        version = %release.version,
        image = %image,
        "starting build stage"
    );

    builder.login(secrets).await?;
    builder.build(&image, secrets).await?;
    builder.push(&image).await?;

    info!(version = %release.version, image = %image, "build stage complete");
    Ok(BuildOutcome { release, image })
}
