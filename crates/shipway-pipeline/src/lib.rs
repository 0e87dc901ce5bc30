//! Shipway Pipeline - stage orchestration
//!
//! Provides the two pipeline stages:
//! - Build: version derivation, image build and registry publish
//! - Deploy: environment resolution, manifest mutation, commit/push with
//!   bounded retry-from-latest on push conflicts

pub mod build_stage;
pub mod builder;
pub mod deploy_stage;
pub mod runner;

// Re-export key types
pub use build_stage::{build, build_at, BuildOutcome};
pub use builder::{DockerBuilder, ImageBuilder};
pub use deploy_stage::{DeployOutcome, DeployStage, MAX_PUSH_ATTEMPTS};
pub use runner::{CommandOutput, CommandRunner};
