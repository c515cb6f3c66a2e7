use std::{env, path::PathBuf, sync::Arc};
use tokio::sync::RwLock;

use kube::{runtime::events::Reporter, Client};
use serde::Serialize;
use tracing::info;

use crate::{artifacts::ArtifactRenderer, cluster_store::KubeClusterStore, constants, model::Error, operator_config::OperatorConfig};

#[derive(Clone)]
pub struct ContextData {
    /// Kubernetes client to make Kubernetes API requests with. Required for K8S resource management.
    pub client: Client,
    /// In memory state
    pub state: Arc<RwLock<State>>,

    pub config: OperatorConfig,

    /// Template catalog shared by every reconciliation pass
    pub renderer: Arc<ArtifactRenderer>,
}

/// Resolves the configuration file for the given operator environment
pub fn config_path(operator_environment: &str) -> Result<PathBuf, Error> {
    if operator_environment.eq("production") {
        return Ok(PathBuf::from("/app/config/config.yaml"));
    }
    let current_dir = env::current_dir().map_err(|error| Error::ConfigError(format!("Could not resolve the working directory: {error}")))?;
    Ok(current_dir.join(format!("sample_config-{operator_environment}.yaml")))
}

/// Reads the operator configuration and layers the environment overrides on top of it
pub fn load_config(operator_environment: &str, lookup: &dyn Fn(&str) -> Option<String>) -> Result<OperatorConfig, Error> {
    let path = config_path(operator_environment)?;
    let config_file = std::fs::File::open(&path).map_err(|error| Error::ConfigError(format!("Could not open config file {}: {error}", path.display())))?;
    let mut config: OperatorConfig = serde_yaml::from_reader(config_file)?;
    config.apply_env_overrides(lookup);
    info!("Operator configuration loaded from {}", path.display());
    Ok(config)
}

/// State wrapper around the controller outputs
impl ContextData {
    // Create a Controller Context that can update State
    pub async fn new(client: Client) -> Result<Self, Error> {
        let operator_environment = env::var(constants::OPERATOR_ENVIRONMENT).unwrap_or("local".to_owned());
        let config = load_config(&operator_environment, &|key| env::var(key).ok())?;

        Ok(ContextData {
            client,
            state: Arc::new(RwLock::new(State::default())),
            config,
            renderer: Arc::new(ArtifactRenderer::new()?),
        })
    }

    /// Cluster store publishing events under the operator reporter
    pub async fn cluster_store(&self) -> KubeClusterStore {
        let reporter = self.state.read().await.reporter.clone();
        KubeClusterStore::new(self.client.clone(), reporter)
    }
}

#[derive(Clone, Serialize)]
pub struct State {
    #[serde(skip)]
    pub reporter: Reporter,
}
impl Default for State {
    fn default() -> Self {
        Self {
            reporter: Reporter::from(constants::OPERATOR_REPORTER),
        }
    }
}
