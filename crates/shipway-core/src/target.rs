//! Deployment target identity and manifest location.

use serde::{Deserialize, Serialize};

use crate::environment::Environment;
use crate::error::{PipelineError, Result};

/// One application in one environment/cluster, governed by a single manifest
/// file in the manifest repository.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DeploymentTarget {
    /// Target environment tier.
    pub environment: Environment,

    /// Cluster name within the environment.
    pub cluster: String,

    /// Application name, derived from the repository identifier.
    pub app: String,
}

impl DeploymentTarget {
    pub fn new(environment: Environment, cluster: &str, app: &str) -> Self {
        Self {
            environment,
            cluster: cluster.to_string(),
            app: app.to_string(),
        }
    }

    /// Relative path of the manifest file governing this target, inside the
    /// manifest repository:
    /// `env/<environment>/<cluster>/apps/<app>/<app>.yaml`.
    ///
    /// Pure string composition; existence is checked at mutation time.
    pub fn manifest_path(&self) -> String {
        format!(
            "env/{}/{}/apps/{}/{}.yaml",
            self.environment, self.cluster, self.app, self.app
        )
    }

    /// Key under which concurrent deploys to this target are serialized.
    pub fn lock_key(&self) -> String {
        format!("{}/{}/{}", self.environment, self.cluster, self.app)
    }
}

/// Derive the application name from a repository identifier.
///
/// Takes the final path segment, so `org/tts-api` becomes `tts-api`.
pub fn app_name_from_repository(repository: &str) -> Result<String> {
    let app = repository
        .rsplit('/')
        .next()
        .unwrap_or(repository)
        .to_string();
    if app.is_empty() {
        return Err(PipelineError::InvalidInput(format!(
            "repository identifier '{repository}' has no usable base name"
        )));
    }
    Ok(app)
}
