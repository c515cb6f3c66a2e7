use minijinja::{Environment, UndefinedBehavior};
use serde::Serialize;

use crate::{
    constants,
    grafana::{grafana_datasource, grafana_resource::GrafanaSpec},
    model::Error,
    operator_config::OperatorConfig,
};

/// A parameterized file shipped inside one of the config bundles
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Artifact {
    pub name: &'static str,
    pub config_map: &'static str,
    pub file_name: &'static str,
    source: &'static str,
}

pub const GRAFANA_LUA: Artifact = Artifact {
    name: "grafana-lua",
    config_map: constants::CM_GRAFANA_LUA,
    file_name: "grafana.lua",
    source: include_str!("artifacts/grafana.lua.j2"),
};
pub const UTIL_LUA: Artifact = Artifact {
    name: "util-lua",
    config_map: constants::CM_UTIL_LUA,
    file_name: "monitoring-util.lua",
    source: include_str!("artifacts/monitoring-util.lua.j2"),
};
pub const ROUTER_CONFIG: Artifact = Artifact {
    name: "router-config",
    config_map: constants::CM_ROUTER_CONFIG,
    file_name: "nginx.conf",
    source: include_str!("artifacts/nginx.conf.j2"),
};
pub const ROUTER_ENTRY: Artifact = Artifact {
    name: "router-entry",
    config_map: constants::CM_ROUTER_ENTRY,
    file_name: "entrypoint.sh",
    source: include_str!("artifacts/router-entrypoint.sh.j2"),
};
pub const CRD_ENTRY: Artifact = Artifact {
    name: "crd-entry",
    config_map: constants::CM_CRD_ENTRY,
    file_name: "run.sh",
    source: include_str!("artifacts/crd-entry-run.sh.j2"),
};
pub const DS_ENTRY: Artifact = Artifact {
    name: "ds-entry",
    config_map: constants::CM_DS_ENTRY,
    file_name: "entrypoint.sh",
    source: include_str!("artifacts/ds-entrypoint.sh.j2"),
};
pub const DASHBOARD_PROVIDERS: Artifact = Artifact {
    name: "dashboard-providers",
    config_map: constants::CM_DASHBOARD_CONFIG,
    file_name: "dashboards.yaml",
    source: include_str!("artifacts/dashboards.yaml.j2"),
};
pub const DS_PROXY_CONFIG: Artifact = Artifact {
    name: "ds-proxy-config",
    config_map: constants::DS_PROXY_SECRET_NAME,
    file_name: constants::DS_PROXY_CONFIG_KEY,
    source: include_str!("artifacts/dsproxy-config.yaml.j2"),
};

/// Artifacts rendered into config maps, the ds-proxy document goes into a secret instead
pub const CONFIG_MAP_ARTIFACTS: [Artifact; 7] = [GRAFANA_LUA, UTIL_LUA, ROUTER_CONFIG, ROUTER_ENTRY, CRD_ENTRY, DS_ENTRY, DASHBOARD_PROVIDERS];

/// Parameters shared by every artifact
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct TemplateContext {
    pub namespace: String,
    pub environment: String,
    pub cluster_domain: String,
    pub grafana_full_name: String,
    pub prometheus_full_name: String,
    pub cluster_port: i32,
    pub prometheus_port: i32,
    pub grafana_port: i32,
    pub ds_type: String,
    pub upstream_url: String,
    pub iam_namespace: String,
    pub iam_service_port: i32,
}

impl TemplateContext {
    pub fn new(namespace: &str, spec: &GrafanaSpec, config: &OperatorConfig) -> Self {
        let cluster_domain = config.platform.cluster_domain.to_owned();
        let prometheus_service = spec
            .prometheus_service_name
            .clone()
            .filter(|name| !name.is_empty())
            .unwrap_or(constants::DEFAULT_PROMETHEUS_SERVICE.to_owned());
        let datasource_type = grafana_datasource::datasource_type(spec);
        TemplateContext {
            namespace: namespace.to_owned(),
            environment: config.platform.environment.to_owned(),
            grafana_full_name: format!("{}.{}.svc.{}", constants::GRAFANA_NAME, namespace, cluster_domain),
            prometheus_full_name: format!("{}.{}.svc.{}", prometheus_service, namespace, cluster_domain),
            cluster_domain,
            cluster_port: spec.cluster_port.unwrap_or(constants::DEFAULT_CLUSTER_PORT),
            prometheus_port: spec.prometheus_service_port.unwrap_or(constants::PROMETHEUS_PORT),
            grafana_port: constants::GRAFANA_PORT,
            ds_type: datasource_type.to_string(),
            upstream_url: grafana_datasource::upstream_url(spec, namespace, config).unwrap_or_default(),
            iam_namespace: config.iam.namespace.to_owned(),
            iam_service_port: config.iam.service_port,
        }
    }
}

/// Renders the artifact catalog, every template is parsed once up front
pub struct ArtifactRenderer {
    environment: Environment<'static>,
}

impl ArtifactRenderer {
    pub fn new() -> Result<Self, Error> {
        let mut environment = Environment::new();
        environment.set_keep_trailing_newline(true);
        environment.set_undefined_behavior(UndefinedBehavior::Strict);
        for artifact in CONFIG_MAP_ARTIFACTS.iter().chain(std::iter::once(&DS_PROXY_CONFIG)) {
            environment.add_template(artifact.name, artifact.source)?;
        }
        Ok(ArtifactRenderer { environment })
    }

    pub fn render(&self, artifact: &Artifact, context: &TemplateContext) -> Result<String, Error> {
        let template = self.environment.get_template(artifact.name)?;
        Ok(template.render(context)?)
    }
}
