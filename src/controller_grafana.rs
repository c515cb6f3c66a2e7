use futures::StreamExt;
use k8s_openapi::api::{
    apps::v1::Deployment,
    core::v1::{ConfigMap, Secret, Service, ServiceAccount},
    networking::v1::Ingress,
};
use kube::{
    api::Api,
    client::Client,
    runtime::{
        controller::{Action, Controller},
        watcher::Config,
    },
    Resource, ResourceExt,
};
use std::sync::Arc;
use tokio::time::Duration;
use tracing::{error, info, warn};

use crate::{
    artifacts::ArtifactRenderer,
    cluster_store::ClusterStore,
    constants,
    context_data::ContextData,
    events::GrafanaEventEnum,
    grafana::{
        grafana_dashboard,
        grafana_resource::{Grafana, GrafanaPhaseEnum, GrafanaStatus},
    },
    model::Error,
    operator_config::OperatorConfig,
    reconciler::GrafanaReconciler,
};

/// Action to be taken upon a `Grafana` resource during reconciliation
#[derive(Debug, PartialEq)]
enum GrafanaAction {
    /// Register the finalizer, then run the first pass
    Create,
    /// Run a pass against the current specification
    Reconcile,
    /// Remove what garbage collection cannot reach, then release the finalizer
    Delete,
}

/// Resources arrives into reconciliation queue in a certain state. This function looks at
/// the state of given `Grafana` resource and decides which actions needs to be performed.
fn determine_action(grafana: &Grafana) -> GrafanaAction {
    if grafana.meta().deletion_timestamp.is_some() {
        GrafanaAction::Delete
    } else if !grafana.finalizers().iter().any(|finalizer| finalizer == constants::OPERATOR_FINALIZER) {
        GrafanaAction::Create
    } else {
        GrafanaAction::Reconcile
    }
}

/// Status to write after a pass, `None` when the current one is identical.
/// The transition time only moves when the phase changes.
fn next_status(current: Option<&GrafanaStatus>, phase: GrafanaPhaseEnum, message: String) -> Option<GrafanaStatus> {
    let last_transition_time = match current {
        Some(current) if current.phase == phase && current.message == message => return None,
        Some(current) if current.phase == phase => current.last_transition_time.clone(),
        _ => Some(chrono::Utc::now().to_rfc3339()),
    };
    Some(GrafanaStatus { phase, message, last_transition_time })
}

async fn write_status<S: ClusterStore>(store: &S, grafana: &Grafana, phase: GrafanaPhaseEnum, message: String) -> Result<bool, Error> {
    let Some(status) = next_status(grafana.status.as_ref(), phase, message) else {
        return Ok(false);
    };
    store.update_status(grafana, &status).await?;
    Ok(true)
}

async fn publish<S: ClusterStore>(store: &S, grafana: &Grafana, event: GrafanaEventEnum, attribute: Option<String>) {
    if let Err(error) = store.publish_event(grafana, event, attribute).await {
        warn!("Could not publish event {:?} for {}: {error}", event, grafana.name_any());
    }
}

/// Runs one reconciliation pass and records its outcome in the status of the resource
pub async fn reconcile_grafana<S: ClusterStore>(store: &S, grafana: &Grafana, config: &OperatorConfig, renderer: &ArtifactRenderer) -> Result<Action, Error> {
    let requeue = Action::requeue(Duration::from_secs(constants::RECONCILE_FREQUENCY));
    match determine_action(grafana) {
        GrafanaAction::Delete => return delete_grafana(store, grafana).await,
        GrafanaAction::Create => {
            store.add_finalizer(grafana).await?;
            publish(store, grafana, GrafanaEventEnum::Reconciling, None).await;
            write_status(store, grafana, GrafanaPhaseEnum::Reconciling, "Reconciling the Grafana monitoring stack".to_owned()).await?;
        }
        GrafanaAction::Reconcile => {}
    }

    match GrafanaReconciler::new(store, config, renderer).reconcile(grafana).await {
        Ok(report) if report.is_success() => {
            if write_status(store, grafana, GrafanaPhaseEnum::InSync, "Grafana monitoring stack is in sync".to_owned()).await? {
                publish(store, grafana, GrafanaEventEnum::InSync, None).await;
            }
            Ok(requeue)
        }
        Ok(report) => {
            let message = report.failure_message();
            write_status(store, grafana, GrafanaPhaseEnum::Failed, message).await?;
            Ok(requeue)
        }
        Err(error) => {
            let message = error.to_string();
            publish(store, grafana, GrafanaEventEnum::Failed, Some(message.to_owned())).await;
            if let Err(status_error) = write_status(store, grafana, GrafanaPhaseEnum::Failed, message).await {
                warn!("Could not record the failure of {}: {status_error}", grafana.name_any());
            }
            Err(error)
        }
    }
}

async fn delete_grafana<S: ClusterStore>(store: &S, grafana: &Grafana) -> Result<Action, Error> {
    let namespace = grafana.namespace().unwrap_or_default();
    info!("Grafana {} in namespace {} is being deleted", grafana.name_any(), namespace);
    publish(store, grafana, GrafanaEventEnum::Deleting, None).await;
    grafana_dashboard::delete_foreign_dashboards(store, &grafana.spec, &namespace).await?;
    store.remove_finalizer(grafana).await?;
    Ok(Action::await_change())
}

async fn reconciler(grafana: Arc<Grafana>, context: Arc<ContextData>) -> Result<Action, Error> {
    let store = context.cluster_store().await;
    reconcile_grafana(&store, &grafana, &context.config, &context.renderer).await
}

/// Actions to be taken when a reconciliation fails - for whatever reason.
/// Prints out the error and requeues the resource for another reconciliation after
/// the reconcile frequency.
pub fn on_error(grafana: Arc<Grafana>, error: &Error, _context: Arc<ContextData>) -> Action {
    error!("[Grafana] Reconciliation error of {}: {}", grafana.name_any(), error);
    Action::requeue(Duration::from_secs(constants::RECONCILE_FREQUENCY))
}

/// Initialize the controller
pub async fn run(client: Client, context_data: Arc<ContextData>) {
    let owned_api: Api<Grafana> = Api::<Grafana>::all(client.clone());
    let deployment = Api::<Deployment>::all(client.clone());
    let service = Api::<Service>::all(client.clone());
    let ingress = Api::<Ingress>::all(client.clone());
    let config_map = Api::<ConfigMap>::all(client.clone());
    let secret = Api::<Secret>::all(client.clone());
    let service_account = Api::<ServiceAccount>::all(client.clone());

    Controller::new(owned_api, Config::default())
        .owns(deployment, Config::default())
        .owns(service, Config::default())
        .owns(ingress, Config::default())
        .owns(config_map, Config::default())
        .owns(secret, Config::default())
        .owns(service_account, Config::default())
        .shutdown_on_signal()
        .run(reconciler, on_error, context_data)
        .for_each(|reconciliation_result| async move {
            match reconciliation_result {
                Ok(_grafana_resource) => {}
                Err(reconciliation_err) => {
                    let err_string = reconciliation_err.to_string();
                    if !err_string.contains("that was not found in local store") {
                        // https://github.com/kube-rs/kube/issues/712
                        error!("[Grafana] Reconciliation error: {:?}", reconciliation_err)
                    }
                }
            }
        })
        .await;
}
