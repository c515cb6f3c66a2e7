use std::sync::Arc;

use kube::Client;
use tracing::info;
use tracing_subscriber::EnvFilter;
pub mod model;
mod artifacts;
mod cluster_store;
mod config_hash;
mod constants;
mod context_data;
mod controller_grafana;
mod events;
mod grafana;
mod merge;
mod operator_config;
mod reconciler;
mod resource_generics;
mod utils;

use crate::context_data::ContextData;

#[tokio::main]
async fn main() -> Result<(), model::Error> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or(EnvFilter::new("info")))
        .init();
    let version: &str = env!("CARGO_PKG_VERSION");
    info!("Starting grafana-operator {}", version);
    let client: Client = Client::try_default().await?;
    let context_data: Arc<ContextData> = Arc::new(ContextData::new(client.clone()).await?);
    // Runs until the shutdown signal stops the controller stream
    controller_grafana::run(client, context_data).await;
    info!("Controller Grafana exited");
    Ok(())
}
