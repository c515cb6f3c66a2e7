use k8s_openapi::api::core::v1::ServiceAccount;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;
use kube::core::ObjectMeta;
use std::collections::BTreeMap;

use crate::{constants, grafana::grafana_resource::GrafanaSpec};

pub fn service_account_name(spec: &GrafanaSpec) -> String {
    spec.service_account
        .clone()
        .filter(|name| !name.is_empty())
        .unwrap_or(constants::GRAFANA_NAME.to_owned())
}

/// Identity the Grafana pod runs with
pub fn build_service_account(
    spec: &GrafanaSpec,
    namespace: &str,
    labels: BTreeMap<String, String>,
    owner_references: Option<Vec<OwnerReference>>,
) -> ServiceAccount {
    ServiceAccount {
        metadata: ObjectMeta {
            labels: Some(labels),
            name: Some(service_account_name(spec)),
            namespace: Some(namespace.to_owned()),
            owner_references,
            ..ObjectMeta::default()
        },
        ..ServiceAccount::default()
    }
}
