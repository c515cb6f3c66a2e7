use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;
use kube::{core::ObjectMeta, CustomResource};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info};

use crate::{
    cluster_store::{self, ClusterStore},
    constants,
    grafana::grafana_resource::GrafanaSpec,
    model::Error,
};

/// Dashboard definition consumed by the dashboard controller sidecar
#[derive(CustomResource, Serialize, Deserialize, Debug, PartialEq, Clone, JsonSchema, Default)]
#[kube(
    group = "monitoringcontroller.cloud.ibm.com",
    version = "v1",
    kind = "MonitoringDashboard",
    plural = "monitoringdashboards",
    namespaced
)]
pub struct MonitoringDashboardSpec {
    pub enabled: bool,
    pub data: String,
}

pub const MCM_CLUSTERS_DASHBOARD: &str = "mcm-clusters-monitoring";

pub struct BuiltinDashboard {
    pub name: &'static str,
    pub enabled: bool,
    pub body: &'static str,
}

pub const BUILTIN_DASHBOARDS: &[BuiltinDashboard] = &[
    BuiltinDashboard {
        name: "helm-release-monitoring",
        enabled: true,
        body: include_str!("../dashboards/helm-release-monitoring.json"),
    },
    BuiltinDashboard {
        name: "kubernetes-pod-overview",
        enabled: true,
        body: include_str!("../dashboards/kubernetes-pod-overview.json"),
    },
    BuiltinDashboard {
        name: "kubernetes-cluster-monitoring",
        enabled: true,
        body: include_str!("../dashboards/kubernetes-cluster-monitoring.json"),
    },
    BuiltinDashboard {
        name: "prometheus-stats",
        enabled: true,
        body: include_str!("../dashboards/prometheus-stats.json"),
    },
    BuiltinDashboard {
        name: MCM_CLUSTERS_DASHBOARD,
        enabled: false,
        body: include_str!("../dashboards/mcm-clusters-monitoring.json"),
    },
];

pub fn builtin_dashboard(name: &str) -> Option<&'static BuiltinDashboard> {
    BUILTIN_DASHBOARDS.iter().find(|dashboard| dashboard.name == name)
}

/// Applies explicit overrides, keys outside of the catalog are ignored
pub fn apply_overrides(status_map: &mut BTreeMap<String, bool>, overrides: &BTreeMap<String, bool>) {
    for (name, enabled) in overrides {
        if let Some(entry) = status_map.get_mut(name) {
            *entry = *enabled;
        }
    }
}

/// Builds the enablement map of this pass: catalog defaults, then the overrides.
/// On a hub cluster the clusters dashboard is always enabled.
pub fn build_status_map(spec: &GrafanaSpec) -> BTreeMap<String, bool> {
    let mut status_map: BTreeMap<String, bool> = BUILTIN_DASHBOARDS.iter().map(|dashboard| (dashboard.name.to_owned(), dashboard.enabled)).collect();
    if let Some(overrides) = spec.dashboards_config.as_ref().and_then(|config| config.dashboards_status.as_ref()) {
        apply_overrides(&mut status_map, overrides);
    }
    if spec.is_hub {
        status_map.insert(MCM_CLUSTERS_DASHBOARD.to_owned(), true);
    }
    status_map
}

/// Namespace holding the dashboard definitions
pub fn dashboards_namespace(spec: &GrafanaSpec, grafana_namespace: &str) -> String {
    spec.dashboards_config
        .as_ref()
        .and_then(|config| config.main_org.clone())
        .filter(|main_org| !main_org.is_empty())
        .unwrap_or(grafana_namespace.to_owned())
}

pub fn build_dashboard(
    name: &str,
    namespace: &str,
    enabled: bool,
    labels: BTreeMap<String, String>,
    owner_references: Option<Vec<OwnerReference>>,
) -> MonitoringDashboard {
    let data = builtin_dashboard(name).map(|dashboard| dashboard.body.to_owned()).unwrap_or_default();
    let mut dashboard = MonitoringDashboard::new(name, MonitoringDashboardSpec { enabled, data });
    dashboard.metadata = ObjectMeta {
        name: Some(name.to_owned()),
        namespace: Some(namespace.to_owned()),
        labels: Some(labels),
        owner_references,
        ..ObjectMeta::default()
    };
    dashboard
}

/// Creates every dashboard of the map and aligns the enabled flag of the existing ones.
/// Definitions placed outside of the Grafana namespace carry owner labels instead of an owner reference.
pub async fn reconcile_dashboards<S: ClusterStore>(
    store: &S,
    spec: &GrafanaSpec,
    grafana_name: &str,
    grafana_namespace: &str,
    labels: &BTreeMap<String, String>,
    owner_references: Option<Vec<OwnerReference>>,
) -> Result<(), Error> {
    let namespace = dashboards_namespace(spec, grafana_namespace);
    let cross_namespace = namespace != grafana_namespace;
    let mut labels = labels.clone();
    let owner_references = if cross_namespace {
        labels.insert(constants::LABEL_OWNER_NAME.to_owned(), grafana_name.to_owned());
        labels.insert(constants::LABEL_OWNER_NAMESPACE.to_owned(), grafana_namespace.to_owned());
        None
    } else {
        owner_references
    };

    for (name, enabled) in build_status_map(spec) {
        match store.get::<MonitoringDashboard>(Some(&namespace), &name).await? {
            None => {
                let dashboard = build_dashboard(&name, &namespace, enabled, labels.clone(), owner_references.clone());
                match store.create(&dashboard).await {
                    Ok(_) => info!("Dashboard {name} created in {namespace} with enabled={enabled}"),
                    Err(error) if cluster_store::is_conflict(&error) => debug!("Dashboard {name} created concurrently"),
                    Err(error) => return Err(error.into()),
                }
            }
            Some(mut existing) if existing.spec.enabled != enabled => {
                existing.spec.enabled = enabled;
                store.replace(&existing).await?;
                info!("Dashboard {name} in {namespace} set to enabled={enabled}");
            }
            Some(_) => debug!("Dashboard {name} already up to date"),
        }
    }
    Ok(())
}

/// Deletes the dashboards placed in a foreign namespace, garbage collection cannot reach them
pub async fn delete_foreign_dashboards<S: ClusterStore>(store: &S, spec: &GrafanaSpec, grafana_namespace: &str) -> Result<(), Error> {
    let namespace = dashboards_namespace(spec, grafana_namespace);
    if namespace == grafana_namespace {
        return Ok(());
    }
    for name in build_status_map(spec).keys() {
        if store.delete::<MonitoringDashboard>(Some(&namespace), name).await? {
            info!("Dashboard {name} deleted from {namespace}");
        }
    }
    Ok(())
}
