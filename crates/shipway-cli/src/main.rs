//! Shipway - two-stage container release pipeline
//!
//! The `shipway` command drives both pipeline stages:
//!
//! - `build`: turn a source-control push into a uniquely versioned,
//!   registry-published image
//! - `deploy`: propagate a built version into the manifest repository
//!   that drives downstream deployment
//!
//! The stages are decoupled: `deploy` receives the version as an input
//! rather than recomputing it, so they can run in different pipeline
//! executions. Any stage failure exits non-zero with a diagnostic naming
//! the failed step. Secrets arrive via environment variables and are never
//! logged.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::Level;

use shipway_core::{
    BuildRequest, BuilderConfig, DeployRequest, GitIdentity, Secret, Secrets,
};
use shipway_pipeline::{DeployStage, DockerBuilder};

#[derive(Parser)]
#[command(name = "shipway")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Two-stage container release pipeline", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build and publish a versioned image for one commit
    Build {
        /// Repository identifier, e.g. org/tts-api
        #[arg(long)]
        repository: String,

        /// Branch that triggered the build
        #[arg(long)]
        branch: String,

        /// Full commit sha of the triggering commit
        #[arg(long)]
        commit_sha: String,

        /// Registry host images are pushed to
        #[arg(long)]
        registry: String,

        /// Registry username
        #[arg(long)]
        registry_user: String,

        /// Build context directory
        #[arg(long, default_value = ".")]
        context: PathBuf,

        /// Dockerfile path relative to the context
        #[arg(long, default_value = "Dockerfile")]
        dockerfile: PathBuf,

        /// Builder program to invoke
        #[arg(long, default_value = "docker")]
        builder: String,

        /// Timeout per builder invocation, in seconds
        #[arg(long, default_value = "1800")]
        timeout: u64,

        /// Registry credential
        #[arg(long, env = "SHIPWAY_REGISTRY_CREDENTIAL", hide_env_values = true)]
        registry_credential: String,

        /// Build-time SSH key
        #[arg(long, env = "SHIPWAY_BUILD_SSH_KEY", hide_env_values = true, default_value = "")]
        build_ssh_key: String,

        /// Build-time access token
        #[arg(long, env = "SHIPWAY_BUILD_ACCESS_TOKEN", hide_env_values = true, default_value = "")]
        build_access_token: String,
    },

    /// Write a built version into the manifest repository and push
    Deploy {
        /// Repository identifier, e.g. org/tts-api
        #[arg(long)]
        repository: String,

        /// Branch that triggered the release
        #[arg(long)]
        branch: String,

        /// Version string produced by the build stage
        #[arg(long)]
        version: String,

        /// Target cluster name
        #[arg(long)]
        cluster: String,

        /// Path of the manifest repository checkout
        #[arg(long)]
        manifest_repo: PathBuf,

        /// Trunk branch of the manifest repository
        #[arg(long, default_value = "main")]
        trunk: String,

        /// Registry host used in the image reference
        #[arg(long)]
        registry: String,

        /// Timeout per git operation, in seconds
        #[arg(long, default_value = "120")]
        timeout: u64,

        /// Manifest repository write credential
        #[arg(
            long,
            env = "SHIPWAY_MANIFEST_CREDENTIAL",
            hide_env_values = true,
            default_value = ""
        )]
        manifest_credential: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    shipway_core::init_tracing(cli.json, level);

    match cli.command {
        Commands::Build {
            repository,
            branch,
            commit_sha,
            registry,
            registry_user,
            context,
            dockerfile,
            builder,
            timeout,
            registry_credential,
            build_ssh_key,
            build_access_token,
        } => {
            let request = BuildRequest {
                repository,
                branch,
                commit_sha,
            };
            let config = BuilderConfig {
                program: builder,
                registry,
                registry_user,
                context_dir: context,
                dockerfile,
                timeout_secs: timeout,
            };
            let secrets = Secrets {
                registry_credential: Secret::new(registry_credential),
                build_ssh_key: Secret::new(build_ssh_key),
                build_access_token: Secret::new(build_access_token),
                manifest_credential: Secret::default(),
            };
            cmd_build(&request, &config, &secrets).await
        }
        Commands::Deploy {
            repository,
            branch,
            version,
            cluster,
            manifest_repo,
            trunk,
            registry,
            timeout,
            manifest_credential,
        } => {
            let request = DeployRequest {
                repository,
                branch,
                version,
                cluster,
                manifest_repo,
                trunk,
            };
            cmd_deploy(&request, &registry, timeout, Secret::new(manifest_credential)).await
        }
    }
}

/// Run the build stage and print the published image reference.
async fn cmd_build(
    request: &BuildRequest,
    config: &BuilderConfig,
    secrets: &Secrets,
) -> Result<()> {
    let docker = DockerBuilder::new(config.clone());
    let outcome = shipway_pipeline::build(request, config, secrets, &docker)
        .await
        .context("build stage failed")?;

    println!("Version: {}", outcome.release.version);
    println!("Image:   {}", outcome.image);
    Ok(())
}

/// Run the deploy stage and print where the version landed.
async fn cmd_deploy(
    request: &DeployRequest,
    registry: &str,
    timeout: u64,
    manifest_credential: Secret,
) -> Result<()> {
    let stage = DeployStage::new(registry, GitIdentity::default(), timeout)
        .with_manifest_credential(manifest_credential);
    let outcome = stage.run(request).await.context("deploy stage failed")?;

    println!("Environment: {}", outcome.target.environment);
    println!("Manifest:    {}", outcome.manifest_path);
    println!("Image:       {}", outcome.image);
    if outcome.pushed {
        println!("Pushed after {} attempt(s)", outcome.attempts);
    } else {
        println!("Manifest already current, nothing pushed");
    }
    Ok(())
}
