use k8s_openapi::api::apps::v1::{DaemonSet, Deployment, StatefulSet};
use tracing::{info, warn};

use crate::{
    cluster_store::{ClusterStore, StoredResource},
    model::Error,
};

/// Kind of a resource left behind by the retired monitoring topology
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LegacyKind {
    Deployment,
    DaemonSet,
    StatefulSet,
}

pub const LEGACY_RESOURCES: &[(LegacyKind, &str)] = &[
    (LegacyKind::Deployment, "monitoring-prometheus-collectdexporter"),
    (LegacyKind::Deployment, "monitoring-prometheus-kubestatemetrics"),
    (LegacyKind::Deployment, "monitoring-mcm-ctl"),
    (LegacyKind::Deployment, "monitoring-prometheus-operator"),
    (LegacyKind::DaemonSet, "monitoring-prometheus-nodeexporter"),
    (LegacyKind::StatefulSet, "prometheus-monitoring-prometheus"),
    (LegacyKind::StatefulSet, "alertmanager-monitoring-prometheus-alertmanager"),
];

async fn delete_legacy<S: ClusterStore, K: StoredResource>(store: &S, namespace: &str, name: &str) -> Result<(), Error> {
    if store.delete::<K>(Some(namespace), name).await? {
        info!("Legacy {} {name} deleted", K::kind(&()));
    }
    Ok(())
}

/// Deletes every legacy resource of the namespace, absent resources count as deleted.
/// Failures never stop the loop, they are returned to the caller.
pub async fn cleanup_legacy_resources<S: ClusterStore>(store: &S, namespace: &str) -> Vec<Error> {
    let mut failures = Vec::new();
    for (kind, name) in LEGACY_RESOURCES {
        let result = match kind {
            LegacyKind::Deployment => delete_legacy::<S, Deployment>(store, namespace, name).await,
            LegacyKind::DaemonSet => delete_legacy::<S, DaemonSet>(store, namespace, name).await,
            LegacyKind::StatefulSet => delete_legacy::<S, StatefulSet>(store, namespace, name).await,
        };
        if let Err(error) = result {
            warn!("Could not delete legacy {:?} {name}: {error}", kind);
            failures.push(error);
        }
    }
    failures
}
