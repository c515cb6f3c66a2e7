use k8s_openapi::{
    api::core::v1::{Capabilities, HTTPGetAction, Probe, ResourceRequirements, SecurityContext},
    apimachinery::pkg::{api::resource::Quantity, util::intstr::IntOrString},
};
use std::collections::{BTreeMap, HashMap};

use crate::{
    constants,
    grafana::grafana_resource::{ContainerResources, GrafanaSpec},
    operator_config::{ImageConfig, OperatorConfig},
};

/// Sub-workloads of the Grafana pod
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WorkloadKind {
    Grafana,
    Router,
    DashboardController,
    Init,
    DsProxy,
}

impl WorkloadKind {
    fn spec_image<'a>(&self, spec: &'a GrafanaSpec) -> (Option<&'a String>, Option<&'a String>, Option<&'a String>) {
        match self {
            WorkloadKind::Grafana => (spec.base_image.as_ref(), spec.base_image_tag.as_ref(), spec.base_image_sha.as_ref()),
            WorkloadKind::Router => (spec.router_image.as_ref(), spec.router_image_tag.as_ref(), spec.router_image_sha.as_ref()),
            WorkloadKind::DashboardController => (
                spec.dashboard_controller_image.as_ref(),
                spec.dashboard_controller_image_tag.as_ref(),
                spec.dashboard_controller_image_sha.as_ref(),
            ),
            WorkloadKind::Init => (spec.init_image.as_ref(), spec.init_image_tag.as_ref(), spec.init_image_sha.as_ref()),
            WorkloadKind::DsProxy => (spec.ds_proxy_image.as_ref(), spec.ds_proxy_image_tag.as_ref(), spec.ds_proxy_image_sha.as_ref()),
        }
    }

    fn configured_image<'a>(&self, config: &'a OperatorConfig) -> &'a ImageConfig {
        match self {
            WorkloadKind::Grafana => &config.images.grafana,
            WorkloadKind::Router => &config.images.router,
            WorkloadKind::DashboardController => &config.images.dashboard_controller,
            WorkloadKind::Init => &config.images.init,
            WorkloadKind::DsProxy => &config.images.ds_proxy,
        }
    }
}

fn non_empty(value: Option<&String>) -> Option<&String> {
    value.filter(|value| !value.is_empty())
}

/// Resolves the image reference of a sub-workload.
///
/// A reference already pinned by digest is used verbatim, an explicit SHA pins the repository,
/// otherwise `repository:tag` is composed from the spec falling back to the operator configuration.
pub fn resolve_image(kind: WorkloadKind, spec: &GrafanaSpec, config: &OperatorConfig) -> String {
    let (image, tag, sha) = kind.spec_image(spec);
    let configured = kind.configured_image(config);
    let repository = non_empty(image).unwrap_or(&configured.repository);
    if repository.contains(constants::IMAGE_DIGEST_MARKER) {
        return repository.to_owned();
    }
    if let Some(sha) = non_empty(sha) {
        return format!("{}@{}", repository, sha);
    }
    let tag = non_empty(tag).unwrap_or(&configured.tag);
    format!("{}:{}", repository, tag)
}

/// Multiplier lookup table, invalid multipliers fall back to 1
pub fn resource_multipliers(spec: &GrafanaSpec) -> HashMap<WorkloadKind, i64> {
    let resources = spec.resources.clone().unwrap_or_default();
    let sanitize = |multiplier: Option<i32>| multiplier.filter(|value| *value > 0).map(i64::from).unwrap_or(1);
    HashMap::from([
        (WorkloadKind::Grafana, sanitize(resources.grafana)),
        (WorkloadKind::DashboardController, sanitize(resources.dashboard)),
        (WorkloadKind::Router, sanitize(resources.router)),
    ])
}

fn quantities(memory: &str, cpu: &str) -> BTreeMap<String, Quantity> {
    BTreeMap::from([("cpu".to_owned(), Quantity(cpu.to_owned())), ("memory".to_owned(), Quantity(memory.to_owned()))])
}

fn to_quantities(values: &BTreeMap<String, String>) -> BTreeMap<String, Quantity> {
    values.iter().map(|(key, value)| (key.to_owned(), Quantity(value.to_owned()))).collect()
}

/// Requests and limits of a sub-workload
pub fn resource_requirements(kind: WorkloadKind, spec: &GrafanaSpec, multipliers: &HashMap<WorkloadKind, i64>) -> ResourceRequirements {
    match kind {
        WorkloadKind::Init => ResourceRequirements {
            requests: Some(quantities("64Mi", "50m")),
            limits: Some(quantities("128Mi", "100m")),
            ..ResourceRequirements::default()
        },
        WorkloadKind::DsProxy => {
            let custom: ContainerResources = spec
                .datasource_config
                .as_ref()
                .and_then(|config| config.proxy_resources.clone())
                .unwrap_or_default();
            ResourceRequirements {
                requests: Some(custom.requests.as_ref().map(to_quantities).unwrap_or(quantities("16Mi", "5m"))),
                limits: Some(custom.limits.as_ref().map(to_quantities).unwrap_or(quantities("256Mi", "10m"))),
                ..ResourceRequirements::default()
            }
        }
        _ => {
            let multiplier = multipliers.get(&kind).copied().unwrap_or(1);
            ResourceRequirements {
                requests: Some(quantities(
                    &format!("{}Mi", constants::BASE_MEMORY_REQUEST_MI * multiplier),
                    &format!("{}m", constants::BASE_CPU_REQUEST_M * multiplier),
                )),
                limits: Some(quantities(
                    &format!("{}Mi", constants::BASE_MEMORY_LIMIT_MI * multiplier),
                    &format!("{}m", constants::BASE_CPU_LIMIT_M * multiplier),
                )),
                ..ResourceRequirements::default()
            }
        }
    }
}

/// Minimal security context applied to every container
pub fn hardened_security_context() -> SecurityContext {
    SecurityContext {
        allow_privilege_escalation: Some(false),
        privileged: Some(false),
        capabilities: Some(Capabilities {
            drop: Some(vec!["ALL".to_owned()]),
            add: None,
        }),
        ..SecurityContext::default()
    }
}

pub fn build_health_probe(initial_delay_seconds: Option<i32>, period_seconds: Option<i32>, failure_threshold: Option<i32>) -> Probe {
    Probe {
        http_get: Some(HTTPGetAction {
            path: Some(constants::GRAFANA_HEALTH_ENDPOINT.to_owned()),
            port: IntOrString::Int(constants::GRAFANA_PORT),
            scheme: Some("HTTPS".to_owned()),
            ..HTTPGetAction::default()
        }),
        initial_delay_seconds,
        timeout_seconds: Some(5),
        period_seconds,
        failure_threshold,
        ..Probe::default()
    }
}
