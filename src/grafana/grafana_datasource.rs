use serde_json::{json, Value};
use std::path::Path;

use crate::{
    config_hash, constants,
    grafana::grafana_resource::{DatasourceType, GrafanaSpec},
    model::Error,
    operator_config::OperatorConfig,
};

pub const DATASOURCE_FILE_NAME: &str = "datasource.yaml";
const PROXY_DATASOURCE_URL: &str = "http://127.0.0.1:9096";

pub fn datasource_type(spec: &GrafanaSpec) -> DatasourceType {
    spec.datasource_config.as_ref().map(|config| config.r#type).unwrap_or_default()
}

/// Endpoint queried by the datasource, either directly or through the ds-proxy sidecar
pub fn upstream_url(spec: &GrafanaSpec, namespace: &str, _config: &OperatorConfig) -> Option<String> {
    let datasource_config = spec.datasource_config.as_ref();
    match datasource_type(spec) {
        DatasourceType::Disabled => None,
        DatasourceType::Openshift => Some(
            datasource_config
                .and_then(|config| config.openshift.as_ref())
                .and_then(|openshift| openshift.url.clone())
                .filter(|url| !url.is_empty())
                .unwrap_or(constants::DEFAULT_THANOS_URL.to_owned()),
        ),
        DatasourceType::CommonService => {
            let common_service = datasource_config.and_then(|config| config.common_service.as_ref());
            if let Some(url) = common_service.and_then(|common| common.url.clone()).filter(|url| !url.is_empty()) {
                return Some(url);
            }
            let service_name = common_service
                .and_then(|common| common.service_name.clone())
                .filter(|name| !name.is_empty())
                .unwrap_or(constants::DEFAULT_PROMETHEUS_SERVICE.to_owned());
            let service_port = common_service.and_then(|common| common.service_port).unwrap_or(constants::PROMETHEUS_PORT);
            Some(format!("https://{}.{}.svc:{}", service_name, namespace, service_port))
        }
    }
}

fn read_tls_file(directory: &str, file_name: &str) -> Result<String, Error> {
    let path = Path::new(directory).join(file_name);
    std::fs::read_to_string(&path).map_err(|source| Error::TlsMaterialError {
        path: path.display().to_string(),
        source,
    })
}

/// Builds the provisioning document of the prometheus datasource.
/// The common-service kind embeds the client TLS material, so it fails when a file cannot be read.
pub fn build_datasource_document(spec: &GrafanaSpec, namespace: &str, config: &OperatorConfig) -> Result<Value, Error> {
    let datasource = match datasource_type(spec) {
        DatasourceType::Disabled => return Ok(json!({ "apiVersion": 1, "datasources": [] })),
        DatasourceType::Openshift => json!({
            "name": "prometheus",
            "type": "prometheus",
            "access": "proxy",
            "orgId": 1,
            "url": PROXY_DATASOURCE_URL,
            "isDefault": true,
            "editable": false,
            "jsonData": { "keepCookies": ["cfc-access-token-cookie"] }
        }),
        DatasourceType::CommonService => {
            let ca_cert = read_tls_file(&config.tls_material_dir, "ca.crt")?;
            let client_cert = read_tls_file(&config.tls_material_dir, "tls.crt")?;
            let client_key = read_tls_file(&config.tls_material_dir, "tls.key")?;
            json!({
                "name": "prometheus",
                "type": "prometheus",
                "access": "proxy",
                "orgId": 1,
                "url": upstream_url(spec, namespace, config),
                "isDefault": true,
                "editable": false,
                "jsonData": {
                    "keepCookies": ["cfc-access-token-cookie"],
                    "tlsAuth": true,
                    "tlsAuthWithCACert": true
                },
                "secureJsonData": {
                    "tlsCACert": ca_cert,
                    "tlsClientCert": client_cert,
                    "tlsClientKey": client_key
                }
            })
        }
    };
    Ok(json!({ "apiVersion": 1, "datasources": [datasource] }))
}

/// Renders the datasource document and hashes its canonical form
pub fn render_datasource(spec: &GrafanaSpec, namespace: &str, config: &OperatorConfig) -> Result<(String, String), Error> {
    let document = build_datasource_document(spec, namespace, config)?;
    let body = serde_yaml::to_string(&document)?;
    Ok((body, config_hash::hash_json(&document)))
}
