use serde::{Deserialize, Serialize};

use crate::constants;

#[derive(Serialize, Deserialize, PartialEq, Debug, Clone, Hash)]
pub struct OperatorConfig {
    pub instance: OperatorInstance,
    #[serde(default)]
    pub images: ImagesConfig,
    #[serde(default)]
    pub iam: IamConfig,
    #[serde(default)]
    pub platform: PlatformConfig,
    /// Directory holding `ca.crt`, `tls.crt` and `tls.key` embedded in direct datasource documents
    #[serde(default = "default_tls_material_dir")]
    pub tls_material_dir: String,
}

#[derive(Serialize, Deserialize, PartialEq, Debug, Clone, Hash)]
pub struct OperatorInstance {
    pub name: String,
    pub namespace: String,
}

#[derive(Serialize, Deserialize, PartialEq, Debug, Clone, Hash)]
pub struct ImageConfig {
    pub repository: String,
    pub tag: String,
}

impl ImageConfig {
    fn new(repository: &str, tag: &str) -> Self {
        ImageConfig { repository: repository.to_owned(), tag: tag.to_owned() }
    }

    fn apply_override(&mut self, lookup: &dyn Fn(&str) -> Option<String>, image_env: &str, tag_env: &str) {
        if let Some(repository) = lookup(image_env).filter(|value| !value.is_empty()) {
            self.repository = repository;
        }
        if let Some(tag) = lookup(tag_env).filter(|value| !value.is_empty()) {
            self.tag = tag;
        }
    }
}

#[derive(Serialize, Deserialize, PartialEq, Debug, Clone, Hash)]
pub struct ImagesConfig {
    pub grafana: ImageConfig,
    pub router: ImageConfig,
    pub dashboard_controller: ImageConfig,
    pub init: ImageConfig,
    pub ds_proxy: ImageConfig,
}

impl Default for ImagesConfig {
    fn default() -> Self {
        ImagesConfig {
            grafana: ImageConfig::new(constants::DEFAULT_GRAFANA_IMAGE, constants::DEFAULT_GRAFANA_IMAGE_TAG),
            router: ImageConfig::new(constants::DEFAULT_ROUTER_IMAGE, constants::DEFAULT_ROUTER_IMAGE_TAG),
            dashboard_controller: ImageConfig::new(constants::DEFAULT_DASHBOARD_CTL_IMAGE, constants::DEFAULT_DASHBOARD_CTL_IMAGE_TAG),
            init: ImageConfig::new(constants::DEFAULT_INIT_IMAGE, constants::DEFAULT_INIT_IMAGE_TAG),
            ds_proxy: ImageConfig::new(constants::DEFAULT_DS_PROXY_IMAGE, constants::DEFAULT_DS_PROXY_IMAGE_TAG),
        }
    }
}

#[derive(Serialize, Deserialize, PartialEq, Debug, Clone, Hash)]
pub struct IamConfig {
    pub namespace: String,
    pub service_port: i32,
}

impl Default for IamConfig {
    fn default() -> Self {
        IamConfig { namespace: "ibm-common-services".to_owned(), service_port: 4300 }
    }
}

#[derive(Serialize, Deserialize, PartialEq, Debug, Clone, Hash)]
pub struct PlatformConfig {
    pub environment: String,
    pub cluster_domain: String,
    /// Register the SecurityContextConstraints policy, only meaningful on OpenShift
    pub security_policy: bool,
}

impl Default for PlatformConfig {
    fn default() -> Self {
        PlatformConfig {
            environment: "openshift".to_owned(),
            cluster_domain: constants::CLUSTER_DOMAIN.to_owned(),
            security_policy: true,
        }
    }
}

fn default_tls_material_dir() -> String {
    "/opt/ibm/monitoring/certs".to_owned()
}

impl OperatorConfig {
    /// Layers the image overrides found in the environment on top of the configured defaults
    pub fn apply_env_overrides(&mut self, lookup: &dyn Fn(&str) -> Option<String>) {
        self.images.grafana.apply_override(lookup, constants::ENV_GRAFANA_IMAGE, constants::ENV_GRAFANA_IMAGE_TAG);
        self.images.router.apply_override(lookup, constants::ENV_ROUTER_IMAGE, constants::ENV_ROUTER_IMAGE_TAG);
        self.images
            .dashboard_controller
            .apply_override(lookup, constants::ENV_DASHBOARD_CTL_IMAGE, constants::ENV_DASHBOARD_CTL_IMAGE_TAG);
        self.images.init.apply_override(lookup, constants::ENV_INIT_IMAGE, constants::ENV_INIT_IMAGE_TAG);
        self.images.ds_proxy.apply_override(lookup, constants::ENV_DS_PROXY_IMAGE, constants::ENV_DS_PROXY_IMAGE_TAG);
    }
}

#[cfg(test)]
impl Default for OperatorConfig {
    fn default() -> Self {
        OperatorConfig {
            instance: OperatorInstance { name: "grafana-operator".to_owned(), namespace: "ibm-common-services".to_owned() },
            images: ImagesConfig::default(),
            iam: IamConfig::default(),
            platform: PlatformConfig::default(),
            tls_material_dir: default_tls_material_dir(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults_when_sections_missing() {
        let config: OperatorConfig = serde_yaml::from_str("instance:\n  name: grafana-operator\n  namespace: monitoring\n").unwrap();
        assert_eq!(config.images, ImagesConfig::default());
        assert_eq!(config.platform.cluster_domain, constants::CLUSTER_DOMAIN);
        assert!(config.platform.security_policy);
    }

    #[test]
    fn test_env_overrides_replace_defaults() {
        let mut config = OperatorConfig::default();
        let lookup = |key: &str| match key {
            constants::ENV_ROUTER_IMAGE => Some("registry.local/router".to_owned()),
            constants::ENV_ROUTER_IMAGE_TAG => Some("9.9".to_owned()),
            constants::ENV_INIT_IMAGE_TAG => Some(String::new()),
            _ => None,
        };
        config.apply_env_overrides(&lookup);
        assert_eq!(config.images.router, ImageConfig::new("registry.local/router", "9.9"));
        assert_eq!(config.images.init.tag, constants::DEFAULT_INIT_IMAGE_TAG);
        assert_eq!(config.images.grafana, ImagesConfig::default().grafana);
    }
}
