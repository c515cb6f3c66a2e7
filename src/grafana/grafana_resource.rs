use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::{
    collections::BTreeMap,
    fmt::{Display, Formatter},
};

/// Struct corresponding to the Specification (`spec`) part of the `Grafana` resource.
/// The `Grafana` struct will be generated by the `CustomResource` derive macro.
#[derive(CustomResource, Serialize, Deserialize, Debug, PartialEq, Clone, JsonSchema, Default)]
#[kube(
    group = "operator.ibm.com",
    version = "v1alpha1",
    kind = "Grafana",
    plural = "grafanas",
    derive = "PartialEq",
    namespaced
)]
#[kube(status = "GrafanaStatus", shortname = "grafana")]
#[serde(rename_all = "camelCase")]
pub struct GrafanaSpec {
    pub service: Option<GrafanaServiceSpec>,
    pub ingress: Option<GrafanaIngressSpec>,
    pub service_account: Option<String>,
    pub cluster_port: Option<i32>,

    pub base_image: Option<String>,
    pub base_image_tag: Option<String>,
    #[serde(rename = "baseImageSHA")]
    pub base_image_sha: Option<String>,
    pub router_image: Option<String>,
    pub router_image_tag: Option<String>,
    #[serde(rename = "routerImageSHA")]
    pub router_image_sha: Option<String>,
    #[serde(rename = "dashboardCtlImage")]
    pub dashboard_controller_image: Option<String>,
    #[serde(rename = "dashboardCtlImageTag")]
    pub dashboard_controller_image_tag: Option<String>,
    #[serde(rename = "dashboardCtlImageSHA")]
    pub dashboard_controller_image_sha: Option<String>,
    pub init_image: Option<String>,
    pub init_image_tag: Option<String>,
    #[serde(rename = "initImageSHA")]
    pub init_image_sha: Option<String>,
    pub ds_proxy_image: Option<String>,
    pub ds_proxy_image_tag: Option<String>,
    #[serde(rename = "dsProxyImageSHA")]
    pub ds_proxy_image_sha: Option<String>,
    pub image_pull_secrets: Option<Vec<String>>,

    pub resources: Option<GrafanaResources>,
    pub persistent_volume: Option<GrafanaPersistentVolume>,
    pub node_selector: Option<BTreeMap<String, String>>,

    #[serde(default)]
    pub is_hub: bool,
    pub prometheus_service_name: Option<String>,
    pub prometheus_service_port: Option<i32>,

    pub tls_secret_name: Option<String>,
    pub tls_client_secret_name: Option<String>,
    pub issuer: Option<String>,
    pub issuer_type: Option<String>,

    #[serde(rename = "dashboardConfig")]
    pub dashboards_config: Option<DashboardConfig>,
    pub grafana_config: Option<GrafanaIniConfig>,
    #[serde(rename = "datasourceConfig")]
    pub datasource_config: Option<DataSourceConfig>,
}

/// Per sub-workload resource multiplier of the base requests and limits
#[derive(Serialize, Deserialize, Debug, PartialEq, Clone, JsonSchema, Default)]
pub struct GrafanaResources {
    pub grafana: Option<i32>,
    pub dashboard: Option<i32>,
    pub router: Option<i32>,
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Clone, JsonSchema, Default)]
#[serde(rename_all = "camelCase")]
pub struct GrafanaPersistentVolume {
    #[serde(default)]
    pub enabled: bool,
    pub claim_name: Option<String>,
}

/// Exposure settings of the Grafana service
#[derive(Serialize, Deserialize, Debug, PartialEq, Clone, JsonSchema, Default)]
#[serde(rename_all = "camelCase")]
pub struct GrafanaServiceSpec {
    pub r#type: Option<String>,
    pub ports: Option<Vec<GrafanaServicePort>>,
    pub labels: Option<BTreeMap<String, String>>,
    pub annotations: Option<BTreeMap<String, String>>,
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Clone, JsonSchema, Default)]
#[serde(rename_all = "camelCase")]
pub struct GrafanaServicePort {
    pub name: String,
    pub port: i32,
    pub target_port: Option<i32>,
    pub protocol: Option<String>,
    pub node_port: Option<i32>,
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Clone, JsonSchema, Default)]
#[serde(rename_all = "camelCase")]
pub struct GrafanaIngressSpec {
    pub enabled: Option<bool>,
    pub host: Option<String>,
    pub path: Option<String>,
    pub tls_secret_name: Option<String>,
    pub ingress_class_name: Option<String>,
    pub annotations: Option<BTreeMap<String, String>>,
}

/// Dashboards enablement and placement
#[derive(Serialize, Deserialize, Debug, PartialEq, Clone, JsonSchema, Default)]
#[serde(rename_all = "camelCase")]
pub struct DashboardConfig {
    /// Namespace holding the dashboards of the main organization
    pub main_org: Option<String>,
    pub dashboards_status: Option<BTreeMap<String, bool>>,
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Clone, Copy, JsonSchema, Default)]
pub enum DatasourceType {
    /// OpenShift application monitoring through the thanos proxy
    #[default]
    #[serde(rename = "openshift")]
    Openshift,
    /// Prometheus compatible endpoint, common services prometheus or custom URL
    #[serde(rename = "common-service")]
    CommonService,
    #[serde(rename = "disabled")]
    Disabled,
}

impl DatasourceType {
    /// Whether the datasource is reached through the ds-proxy sidecar and its credential bundle
    pub fn needs_proxy(&self) -> bool {
        !matches!(self, DatasourceType::Disabled)
    }
}

impl Display for DatasourceType {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        match self {
            DatasourceType::Openshift => write!(f, "openshift"),
            DatasourceType::CommonService => write!(f, "common-service"),
            DatasourceType::Disabled => write!(f, "disabled"),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Clone, JsonSchema, Default)]
#[serde(rename_all = "camelCase")]
pub struct DataSourceConfig {
    pub r#type: DatasourceType,
    pub openshift: Option<OpenshiftDatasource>,
    pub common_service: Option<CommonServiceDatasource>,
    pub proxy_resources: Option<ContainerResources>,
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Clone, JsonSchema, Default)]
pub struct OpenshiftDatasource {
    pub url: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Clone, JsonSchema, Default)]
#[serde(rename_all = "camelCase")]
pub struct CommonServiceDatasource {
    pub service_name: Option<String>,
    pub service_port: Option<i32>,
    /// Custom endpoint, takes precedence over service name and port
    pub url: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Clone, JsonSchema, Default)]
pub struct ContainerResources {
    pub requests: Option<BTreeMap<String, String>>,
    pub limits: Option<BTreeMap<String, String>>,
}

/// Sections of grafana.ini
#[derive(Serialize, Deserialize, Debug, PartialEq, Clone, JsonSchema, Default)]
#[serde(rename_all = "camelCase")]
pub struct GrafanaIniConfig {
    pub paths: Option<IniPaths>,
    pub server: Option<IniServer>,
    pub users: Option<IniUsers>,
    pub auth: Option<IniAuth>,
    pub proxy: Option<IniAuthProxy>,
    pub security: Option<IniSecurity>,
    pub log: Option<IniLog>,
    /// Additional sections rendered verbatim
    pub extra: Option<BTreeMap<String, BTreeMap<String, String>>>,
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Clone, JsonSchema, Default)]
pub struct IniPaths {
    pub data: Option<String>,
    pub logs: Option<String>,
    pub plugins: Option<String>,
    pub provisioning: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Clone, JsonSchema, Default)]
#[serde(rename_all = "camelCase")]
pub struct IniServer {
    pub http_port: Option<String>,
    pub root_url: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Clone, JsonSchema, Default)]
#[serde(rename_all = "camelCase")]
pub struct IniUsers {
    pub default_theme: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Clone, JsonSchema, Default)]
#[serde(rename_all = "camelCase")]
pub struct IniAuth {
    pub disable_login_form: Option<bool>,
    pub disable_signout_menu: Option<bool>,
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Clone, JsonSchema, Default)]
#[serde(rename_all = "camelCase")]
pub struct IniAuthProxy {
    pub enabled: Option<bool>,
    pub header_name: Option<String>,
    pub header_property: Option<String>,
    pub auto_sign_up: Option<bool>,
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Clone, JsonSchema, Default)]
#[serde(rename_all = "camelCase")]
pub struct IniSecurity {
    pub admin_user: Option<String>,
    pub admin_password: Option<String>,
    pub allow_embedding: Option<bool>,
    pub disable_initial_admin_creation: Option<bool>,
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Clone, JsonSchema, Default)]
pub struct IniLog {
    pub mode: Option<String>,
    pub level: Option<String>,
    pub filters: Option<String>,
}

/// The status object of `Grafana`
#[derive(Serialize, Deserialize, Debug, PartialEq, Clone, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct GrafanaStatus {
    pub phase: GrafanaPhaseEnum,
    pub message: String,
    pub last_transition_time: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Copy, Clone, JsonSchema)]
pub enum GrafanaPhaseEnum {
    // A reconciliation pass is running for the first time
    Reconciling,
    /// The last pass failed, the message holds the cause
    Failed,
    /// The stack matches the specification
    InSync,
}

impl Display for GrafanaPhaseEnum {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        match self {
            GrafanaPhaseEnum::Reconciling => write!(f, "Reconciling"),
            GrafanaPhaseEnum::Failed => write!(f, "Failed"),
            GrafanaPhaseEnum::InSync => write!(f, "InSync"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spec_deserializes_original_field_names() {
        let spec: GrafanaSpec = serde_yaml::from_str(
            r#"
baseImage: registry.local/grafana
baseImageSHA: sha256:abc
dashboardCtlImageTag: "1.0"
isHub: true
dashboardConfig:
  mainOrg: org-main
  dashboardsStatus:
    helm-release-monitoring: false
datasourceConfig:
  type: common-service
  commonService:
    url: https://prom.example:9090
"#,
        )
        .unwrap();
        assert_eq!(spec.base_image_sha.as_deref(), Some("sha256:abc"));
        assert_eq!(spec.dashboard_controller_image_tag.as_deref(), Some("1.0"));
        assert!(spec.is_hub);
        assert_eq!(spec.dashboards_config.unwrap().main_org.as_deref(), Some("org-main"));
        let datasource = spec.datasource_config.unwrap();
        assert_eq!(datasource.r#type, DatasourceType::CommonService);
        assert_eq!(datasource.common_service.unwrap().url.as_deref(), Some("https://prom.example:9090"));
    }

    #[test]
    fn test_datasource_type_needs_proxy() {
        assert!(DatasourceType::Openshift.needs_proxy());
        assert!(DatasourceType::CommonService.needs_proxy());
        assert!(!DatasourceType::Disabled.needs_proxy());
        assert_eq!(DatasourceType::default(), DatasourceType::Openshift);
    }
}
