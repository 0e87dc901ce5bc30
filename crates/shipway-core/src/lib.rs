//! Shipway Core
//!
//! Domain logic for the two-stage release pipeline:
//! - Version scheme: `sha[0..7]-timestamp`
//! - Environment resolution from branch naming
//! - Deployment-target and manifest-path derivation
//! - Single-line manifest mutation with an exactly-one-match guard
//! - Commit/push plumbing for the manifest repository

pub mod config;
pub mod environment;
pub mod error;
pub mod git;
pub mod image;
pub mod manifest;
pub mod release;
pub mod target;
pub mod telemetry;
pub mod version;

pub use config::{BuildRequest, BuilderConfig, DeployRequest, Secret, Secrets};
pub use environment::Environment;
pub use error::{PipelineError, Result};
pub use git::{GitIdentity, GitWorkspace};
pub use image::ImageReference;
pub use manifest::{set_image, MutationOutcome};
pub use release::Release;
pub use target::{app_name_from_repository, DeploymentTarget};
pub use telemetry::init_tracing;
