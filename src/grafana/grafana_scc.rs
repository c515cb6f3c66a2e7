use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use serde::{Deserialize, Serialize};

use crate::{constants, utils};

/// OpenShift `SecurityContextConstraints`, cluster scoped and not part of k8s-openapi
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct SecurityContextConstraints {
    pub api_version: String,
    pub kind: String,
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub allow_host_dir_volume_plugin: bool,
    #[serde(default, rename = "allowHostIPC")]
    pub allow_host_ipc: bool,
    #[serde(default)]
    pub allow_host_network: bool,
    #[serde(default, rename = "allowHostPID")]
    pub allow_host_pid: bool,
    #[serde(default)]
    pub allow_host_ports: bool,
    #[serde(default)]
    pub allow_privilege_escalation: Option<bool>,
    #[serde(default)]
    pub allow_privileged_container: bool,
    pub allowed_capabilities: Option<Vec<String>>,
    pub default_add_capabilities: Option<Vec<String>>,
    pub required_drop_capabilities: Option<Vec<String>>,
    #[serde(default)]
    pub read_only_root_filesystem: bool,
    pub fs_group: Option<StrategyOptions>,
    pub run_as_user: Option<StrategyOptions>,
    #[serde(rename = "seLinuxContext")]
    pub se_linux_context: Option<StrategyOptions>,
    pub supplemental_groups: Option<StrategyOptions>,
    pub volumes: Option<Vec<String>>,
    pub groups: Option<Vec<String>>,
    pub users: Option<Vec<String>>,
    pub priority: Option<i32>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct StrategyOptions {
    pub r#type: String,
}

impl StrategyOptions {
    fn of(strategy: &str) -> Option<Self> {
        Some(StrategyOptions { r#type: strategy.to_owned() })
    }
}

impl k8s_openapi::Resource for SecurityContextConstraints {
    const API_VERSION: &'static str = "security.openshift.io/v1";
    const GROUP: &'static str = "security.openshift.io";
    const KIND: &'static str = "SecurityContextConstraints";
    const VERSION: &'static str = "v1";
    const URL_PATH_SEGMENT: &'static str = "securitycontextconstraints";
    type Scope = k8s_openapi::ClusterResourceScope;
}

impl k8s_openapi::Metadata for SecurityContextConstraints {
    type Ty = ObjectMeta;

    fn metadata(&self) -> &Self::Ty {
        &self.metadata
    }

    fn metadata_mut(&mut self) -> &mut Self::Ty {
        &mut self.metadata
    }
}

/// Builds the policy granting the Grafana service account the minimal pod privileges it needs
pub fn build_security_policy(namespace: &str, service_account: &str) -> SecurityContextConstraints {
    let to_strings = |values: &[&str]| Some(values.iter().map(|value| value.to_string()).collect::<Vec<String>>());
    SecurityContextConstraints {
        api_version: <SecurityContextConstraints as k8s_openapi::Resource>::API_VERSION.to_owned(),
        kind: <SecurityContextConstraints as k8s_openapi::Resource>::KIND.to_owned(),
        metadata: ObjectMeta {
            name: Some(constants::GRAFANA_SCC_NAME.to_owned()),
            labels: Some(utils::common_lables("ibm-monitoring".to_owned(), None, Some(constants::GRAFANA_APP.to_owned()))),
            ..ObjectMeta::default()
        },
        allow_privilege_escalation: Some(false),
        allowed_capabilities: None,
        default_add_capabilities: None,
        required_drop_capabilities: to_strings(&["KILL", "MKNOD"]),
        fs_group: StrategyOptions::of("MustRunAs"),
        run_as_user: StrategyOptions::of("RunAsAny"),
        se_linux_context: StrategyOptions::of("MustRunAs"),
        supplemental_groups: StrategyOptions::of("RunAsAny"),
        volumes: to_strings(&["configMap", "downwardAPI", "emptyDir", "persistentVolumeClaim", "projected", "secret"]),
        groups: to_strings(&["system:authenticated"]),
        users: Some(vec![format!("system:serviceaccount:{}:{}", namespace, service_account)]),
        ..SecurityContextConstraints::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_policy_allow_list() {
        let policy = build_security_policy("monitoring", "ibm-monitoring-grafana");
        assert_eq!(policy.metadata.name.as_deref(), Some("ibm-monitoring-grafana-scc"));
        assert_eq!(policy.allowed_capabilities, None);
        assert_eq!(policy.required_drop_capabilities, Some(vec!["KILL".to_owned(), "MKNOD".to_owned()]));
        assert!(!policy.allow_host_network && !policy.allow_host_pid && !policy.allow_host_ports && !policy.allow_privileged_container);
        assert_eq!(policy.users, Some(vec!["system:serviceaccount:monitoring:ibm-monitoring-grafana".to_owned()]));
    }

    #[test]
    fn test_policy_serializes_openshift_field_names() {
        let value = serde_json::to_value(build_security_policy("monitoring", "grafana")).unwrap();
        assert_eq!(value["apiVersion"], "security.openshift.io/v1");
        assert_eq!(value["seLinuxContext"]["type"], "MustRunAs");
        assert_eq!(value["runAsUser"]["type"], "RunAsAny");
        assert_eq!(value["allowHostIPC"], false);
        assert_eq!(value["volumes"][3], "persistentVolumeClaim");
    }
}
