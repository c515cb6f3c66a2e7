use k8s_openapi::api::apps::v1::{Deployment, DeploymentSpec};
use k8s_openapi::api::core::v1::{
    ConfigMapVolumeSource, Container, ContainerPort, EmptyDirVolumeSource, EnvVar, EnvVarSource, KeyToPath, LocalObjectReference,
    PersistentVolumeClaimVolumeSource, PodSpec, PodTemplateSpec, SecretKeySelector, SecretVolumeSource, Volume, VolumeMount,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, OwnerReference};
use kube::api::ObjectMeta;
use std::collections::{BTreeMap, HashMap};

use crate::{
    constants,
    grafana::{
        grafana_certificate,
        grafana_datasource,
        grafana_deployment_spec::{self, WorkloadKind},
        grafana_resource::GrafanaSpec,
        grafana_service_account,
    },
    operator_config::OperatorConfig,
    utils,
};

const VOLUME_LOGS: &str = "grafana-logs";
const VOLUME_PROVISIONED_DATASOURCES: &str = "grafana-provisioned-datasources";
const VOLUME_PLUGINS: &str = "grafana-plugins";
const VOLUME_DASHBOARDS: &str = "grafana-dashboards";
const VOLUME_STORAGE: &str = "grafana-storage";
const VOLUME_CA_CERTS: &str = "ibm-monitoring-ca-certs";
const VOLUME_CERTS: &str = "ibm-monitoring-certs";
const VOLUME_CLIENT_CERTS: &str = "ibm-monitoring-client-certs";

const CONFIG_MAP_VOLUMES: [&str; 10] = [
    constants::CM_GRAFANA_LUA,
    constants::CM_UTIL_LUA,
    constants::CM_ROUTER_CONFIG,
    constants::CM_ROUTER_ENTRY,
    constants::CM_CRD_ENTRY,
    constants::CM_DEFAULT_DASHBOARDS,
    constants::CM_DS_ENTRY,
    constants::CM_GRAFANA_CONFIG,
    constants::CM_DASHBOARD_CONFIG,
    constants::CM_DATASOURCE,
];

/// Content hashes threaded into the pod template so that a configuration change restarts the pod
#[derive(Debug, Clone, PartialEq, Default)]
pub struct WorkloadHashes {
    pub config: String,
    pub ds_proxy: String,
}

fn product_annotations() -> BTreeMap<String, String> {
    BTreeMap::from([
        ("productName".to_owned(), "IBM Cloud Platform Common Services".to_owned()),
        ("productID".to_owned(), "068a62892a1e4db39641342e592daa25".to_owned()),
        ("productMetric".to_owned(), "FREE".to_owned()),
    ])
}

/// Builds the Grafana deployment
pub fn build_deployment(
    spec: &GrafanaSpec,
    namespace: &str,
    config: &OperatorConfig,
    hashes: &WorkloadHashes,
    labels: BTreeMap<String, String>,
    owner_references: Option<Vec<OwnerReference>>,
) -> Deployment {
    let mut annotations = product_annotations();
    utils::merge_maps(&mut annotations, spec.service.as_ref().and_then(|service| service.annotations.as_ref()));
    annotations.insert(constants::ANNOTATION_CONFIG_HASH.to_owned(), hashes.config.to_owned());
    annotations.insert(constants::ANNOTATION_DS_PROXY_HASH.to_owned(), hashes.ds_proxy.to_owned());

    Deployment {
        metadata: ObjectMeta {
            name: Some(constants::GRAFANA_NAME.to_owned()),
            namespace: Some(namespace.to_owned()),
            labels: Some(labels.clone()),
            owner_references,
            ..ObjectMeta::default()
        },
        spec: Some(DeploymentSpec {
            replicas: Some(1),
            selector: LabelSelector {
                match_labels: Some(utils::selector_labels()),
                ..LabelSelector::default()
            },
            template: PodTemplateSpec {
                metadata: Some(ObjectMeta {
                    labels: Some(labels),
                    annotations: Some(annotations),
                    ..ObjectMeta::default()
                }),
                spec: Some(build_pod_spec(spec, namespace, config)),
            },
            ..DeploymentSpec::default()
        }),
        ..Deployment::default()
    }
}

fn build_pod_spec(spec: &GrafanaSpec, namespace: &str, config: &OperatorConfig) -> PodSpec {
    let multipliers = grafana_deployment_spec::resource_multipliers(spec);
    let proxied = grafana_datasource::datasource_type(spec).needs_proxy();
    let mut containers = vec![
        build_grafana_container(spec, config, &multipliers),
        build_router_container(spec, config, &multipliers),
        build_dashboard_controller_container(spec, namespace, config, &multipliers),
    ];
    if proxied {
        containers.push(build_ds_proxy_container(spec, namespace, config, &multipliers));
    }
    let image_pull_secrets = spec.image_pull_secrets.as_ref().map(|secrets| {
        secrets
            .iter()
            .map(|name| LocalObjectReference { name: Some(name.to_owned()) })
            .collect()
    });

    PodSpec {
        service_account_name: Some(grafana_service_account::service_account_name(spec)),
        node_selector: spec.node_selector.clone(),
        image_pull_secrets,
        init_containers: Some(vec![build_init_container(spec, config, &multipliers)]),
        containers,
        volumes: Some(build_volumes(spec, proxied)),
        ..PodSpec::default()
    }
}

fn mount(name: &str, mount_path: &str) -> VolumeMount {
    VolumeMount {
        name: name.to_owned(),
        mount_path: mount_path.to_owned(),
        ..VolumeMount::default()
    }
}

fn sub_path_mount(name: &str, mount_path: &str, sub_path: &str) -> VolumeMount {
    VolumeMount {
        sub_path: Some(sub_path.to_owned()),
        ..mount(name, mount_path)
    }
}

fn env_value(name: &str, value: String) -> EnvVar {
    EnvVar {
        name: name.to_owned(),
        value: Some(value),
        ..EnvVar::default()
    }
}

fn env_from_admin_secret(name: &str, key: &str) -> EnvVar {
    EnvVar {
        name: name.to_owned(),
        value_from: Some(EnvVarSource {
            secret_key_ref: Some(SecretKeySelector {
                key: key.to_owned(),
                name: Some(constants::GRAFANA_ADMIN_SECRET_NAME.to_owned()),
                ..SecretKeySelector::default()
            }),
            ..EnvVarSource::default()
        }),
        ..EnvVar::default()
    }
}

fn build_container(kind: WorkloadKind, name: &str, spec: &GrafanaSpec, config: &OperatorConfig, multipliers: &HashMap<WorkloadKind, i64>) -> Container {
    Container {
        name: name.to_owned(),
        image: Some(grafana_deployment_spec::resolve_image(kind, spec, config)),
        image_pull_policy: Some("IfNotPresent".to_owned()),
        resources: Some(grafana_deployment_spec::resource_requirements(kind, spec, multipliers)),
        security_context: Some(grafana_deployment_spec::hardened_security_context()),
        ..Container::default()
    }
}

fn build_init_container(spec: &GrafanaSpec, config: &OperatorConfig, multipliers: &HashMap<WorkloadKind, i64>) -> Container {
    Container {
        command: Some(vec!["/opt/entry/entrypoint.sh".to_owned()]),
        volume_mounts: Some(vec![
            mount(constants::CM_DS_ENTRY, "/opt/entry"),
            mount(constants::CM_DATASOURCE, "/opt/datasource"),
            mount(VOLUME_PROVISIONED_DATASOURCES, "/etc/grafana/provisioning/datasources"),
            mount(VOLUME_PLUGINS, "/var/lib/grafana/plugins"),
            mount(VOLUME_CERTS, "/opt/ibm/monitoring/certs"),
        ]),
        ..build_container(WorkloadKind::Init, "init-container", spec, config, multipliers)
    }
}

fn build_grafana_container(spec: &GrafanaSpec, config: &OperatorConfig, multipliers: &HashMap<WorkloadKind, i64>) -> Container {
    Container {
        ports: Some(vec![ContainerPort {
            name: Some("web".to_owned()),
            container_port: constants::GRAFANA_PORT,
            protocol: Some("TCP".to_owned()),
            ..ContainerPort::default()
        }]),
        liveness_probe: Some(grafana_deployment_spec::build_health_probe(Some(30), Some(20), Some(10))),
        readiness_probe: Some(grafana_deployment_spec::build_health_probe(Some(10), Some(10), Some(3))),
        volume_mounts: Some(vec![
            sub_path_mount(constants::CM_GRAFANA_CONFIG, "/etc/grafana/grafana.ini", "grafana.ini"),
            mount(VOLUME_PROVISIONED_DATASOURCES, "/etc/grafana/provisioning/datasources"),
            mount(constants::CM_DASHBOARD_CONFIG, "/etc/grafana/provisioning/dashboards"),
            mount(VOLUME_DASHBOARDS, "/etc/grafana/dashboards/grafana"),
            mount(VOLUME_STORAGE, "/var/lib/grafana"),
            mount(VOLUME_PLUGINS, "/var/lib/grafana/plugins"),
            mount(VOLUME_LOGS, "/var/log/grafana"),
            mount(VOLUME_CERTS, "/opt/ibm/monitoring/certs"),
        ]),
        ..build_container(WorkloadKind::Grafana, "grafana", spec, config, multipliers)
    }
}

fn build_router_container(spec: &GrafanaSpec, config: &OperatorConfig, multipliers: &HashMap<WorkloadKind, i64>) -> Container {
    Container {
        command: Some(vec!["/opt/ibm/router/entry/entrypoint.sh".to_owned()]),
        ports: Some(vec![ContainerPort {
            name: Some("https".to_owned()),
            container_port: spec.cluster_port.unwrap_or(constants::DEFAULT_CLUSTER_PORT),
            protocol: Some("TCP".to_owned()),
            ..ContainerPort::default()
        }]),
        env: Some(vec![
            env_from_admin_secret("GF_SECURITY_ADMIN_USER", constants::GRAFANA_ADMIN_USER_KEY),
            env_from_admin_secret("GF_SECURITY_ADMIN_PASSWORD", constants::GRAFANA_ADMIN_PASSWORD_KEY),
        ]),
        volume_mounts: Some(vec![
            mount(constants::CM_ROUTER_CONFIG, "/opt/ibm/router/conf"),
            mount(constants::CM_ROUTER_ENTRY, "/opt/ibm/router/entry"),
            sub_path_mount(constants::CM_GRAFANA_LUA, "/opt/lua-scripts/grafana.lua", "grafana.lua"),
            sub_path_mount(constants::CM_UTIL_LUA, "/opt/lua-scripts/monitoring-util.lua", "monitoring-util.lua"),
            mount(VOLUME_CERTS, "/opt/ibm/router/certs"),
            mount(VOLUME_CA_CERTS, "/opt/ibm/router/ca-certs"),
        ]),
        ..build_container(WorkloadKind::Router, "router", spec, config, multipliers)
    }
}

fn build_dashboard_controller_container(
    spec: &GrafanaSpec,
    namespace: &str,
    config: &OperatorConfig,
    multipliers: &HashMap<WorkloadKind, i64>,
) -> Container {
    let prometheus_service = spec
        .prometheus_service_name
        .clone()
        .filter(|name| !name.is_empty())
        .unwrap_or(constants::DEFAULT_PROMETHEUS_SERVICE.to_owned());
    Container {
        command: Some(vec!["/grafana/entry/run.sh".to_owned()]),
        env: Some(vec![
            env_value("PROMETHEUS_HOST", format!("{}.{}.svc.{}", prometheus_service, namespace, config.platform.cluster_domain)),
            env_value("PROMETHEUS_PORT", spec.prometheus_service_port.unwrap_or(constants::PROMETHEUS_PORT).to_string()),
            env_value("PORT", constants::GRAFANA_PORT.to_string()),
            env_value("IS_HUB_CLUSTER", spec.is_hub.to_string()),
            env_from_admin_secret("USER", constants::GRAFANA_ADMIN_USER_KEY),
            env_from_admin_secret("PASSWORD", constants::GRAFANA_ADMIN_PASSWORD_KEY),
        ]),
        volume_mounts: Some(vec![
            mount(constants::CM_CRD_ENTRY, "/grafana/entry"),
            mount(constants::CM_DEFAULT_DASHBOARDS, "/opt/dashboards"),
            mount(VOLUME_DASHBOARDS, "/etc/grafana/dashboards/grafana"),
            mount(VOLUME_CLIENT_CERTS, "/opt/ibm/monitoring/certs"),
        ]),
        ..build_container(WorkloadKind::DashboardController, "dashboard-controller", spec, config, multipliers)
    }
}

fn build_ds_proxy_container(spec: &GrafanaSpec, namespace: &str, config: &OperatorConfig, multipliers: &HashMap<WorkloadKind, i64>) -> Container {
    let upstream = grafana_datasource::upstream_url(spec, namespace, config).unwrap_or_default();
    Container {
        command: Some(vec![
            "grafana-ocpthanos-proxy".to_owned(),
            format!("--listen-address={}", constants::DS_PROXY_LISTEN_ADDRESS),
            format!("--thanos-address={}", upstream),
            format!("--ns-parser-conf=/etc/conf/{}", constants::DS_PROXY_CONFIG_KEY),
        ]),
        volume_mounts: Some(vec![
            mount(constants::DS_PROXY_SECRET_NAME, "/etc/conf"),
            mount(VOLUME_CLIENT_CERTS, "/opt/ibm/monitoring/certs"),
        ]),
        ..build_container(WorkloadKind::DsProxy, "ds-proxy", spec, config, multipliers)
    }
}

fn empty_dir(name: &str) -> Volume {
    Volume {
        name: name.to_owned(),
        empty_dir: Some(EmptyDirVolumeSource::default()),
        ..Volume::default()
    }
}

fn secret_volume(name: &str, secret_name: &str, items: Option<Vec<KeyToPath>>) -> Volume {
    Volume {
        name: name.to_owned(),
        secret: Some(SecretVolumeSource {
            secret_name: Some(secret_name.to_owned()),
            items,
            ..SecretVolumeSource::default()
        }),
        ..Volume::default()
    }
}

/// Entry point scripts are executable, every other bundle is read-write for owner and group only
pub fn config_map_mode(name: &str) -> i32 {
    if name.contains("entry") {
        0o777
    } else {
        0o664
    }
}

fn build_volumes(spec: &GrafanaSpec, proxied: bool) -> Vec<Volume> {
    let mut volumes: Vec<Volume> = CONFIG_MAP_VOLUMES
        .iter()
        .map(|name| Volume {
            name: name.to_string(),
            config_map: Some(ConfigMapVolumeSource {
                name: Some(name.to_string()),
                default_mode: Some(config_map_mode(name)),
                ..ConfigMapVolumeSource::default()
            }),
            ..Volume::default()
        })
        .collect();

    volumes.extend([empty_dir(VOLUME_LOGS), empty_dir(VOLUME_PROVISIONED_DATASOURCES), empty_dir(VOLUME_PLUGINS), empty_dir(VOLUME_DASHBOARDS)]);

    let persistent_volume = spec.persistent_volume.clone().unwrap_or_default();
    if persistent_volume.enabled {
        volumes.push(Volume {
            name: VOLUME_STORAGE.to_owned(),
            persistent_volume_claim: Some(PersistentVolumeClaimVolumeSource {
                claim_name: persistent_volume
                    .claim_name
                    .filter(|claim_name| !claim_name.is_empty())
                    .unwrap_or(format!("{}-pvc", constants::GRAFANA_NAME)),
                read_only: Some(false),
            }),
            ..Volume::default()
        });
    } else {
        volumes.push(empty_dir(VOLUME_STORAGE));
    }

    let [tls_secret, tls_client_secret] = grafana_certificate::certificate_secret_names(spec);
    let ca_items = vec![KeyToPath {
        key: "ca.crt".to_owned(),
        path: "tls.crt".to_owned(),
        ..KeyToPath::default()
    }];
    volumes.push(secret_volume(VOLUME_CA_CERTS, &tls_secret, Some(ca_items)));
    volumes.push(secret_volume(VOLUME_CERTS, &tls_secret, None));
    volumes.push(secret_volume(VOLUME_CLIENT_CERTS, &tls_client_secret, None));
    if proxied {
        volumes.push(secret_volume(constants::DS_PROXY_SECRET_NAME, constants::DS_PROXY_SECRET_NAME, None));
    }
    volumes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grafana::grafana_resource::{DataSourceConfig, DatasourceType, GrafanaPersistentVolume, GrafanaServiceSpec};

    fn deployment(spec: &GrafanaSpec) -> Deployment {
        let hashes = WorkloadHashes { config: "abc".to_owned(), ds_proxy: "def".to_owned() };
        build_deployment(spec, "monitoring", &OperatorConfig::default(), &hashes, utils::grafana_labels("grafana"), None)
    }

    fn pod_spec(deployment: &Deployment) -> PodSpec {
        deployment.spec.clone().unwrap().template.spec.unwrap()
    }

    fn container_names(pod_spec: &PodSpec) -> Vec<String> {
        pod_spec.containers.iter().map(|container| container.name.to_owned()).collect()
    }

    #[test]
    fn test_default_deployment() {
        let deployment = deployment(&GrafanaSpec::default());
        let deployment_spec = deployment.spec.clone().unwrap();
        assert_eq!(deployment.metadata.name.as_deref(), Some("ibm-monitoring-grafana"));
        assert_eq!(deployment_spec.replicas, Some(1));
        assert_eq!(deployment_spec.selector.match_labels, Some(utils::selector_labels()));
        let pod_spec = pod_spec(&deployment);
        assert_eq!(container_names(&pod_spec), vec!["grafana", "router", "dashboard-controller", "ds-proxy"]);
        assert_eq!(pod_spec.service_account_name.as_deref(), Some("ibm-monitoring-grafana"));
        for container in pod_spec.containers.iter().chain(pod_spec.init_containers.unwrap().iter()) {
            let security_context = container.security_context.clone().unwrap();
            assert_eq!(security_context.capabilities.unwrap().drop, Some(vec!["ALL".to_owned()]), "{}", container.name);
            assert_eq!(security_context.allow_privilege_escalation, Some(false));
        }
    }

    #[test]
    fn test_pod_annotations_order() {
        let spec = GrafanaSpec {
            service: Some(GrafanaServiceSpec {
                annotations: Some(BTreeMap::from([
                    ("productMetric".to_owned(), "CUSTOM".to_owned()),
                    (constants::ANNOTATION_CONFIG_HASH.to_owned(), "forged".to_owned()),
                ])),
                ..GrafanaServiceSpec::default()
            }),
            ..GrafanaSpec::default()
        };
        let annotations = deployment(&spec).spec.unwrap().template.metadata.unwrap().annotations.unwrap();
        assert_eq!(annotations.get("productMetric"), Some(&"CUSTOM".to_owned()));
        assert_eq!(annotations.get(constants::ANNOTATION_CONFIG_HASH), Some(&"abc".to_owned()));
        assert_eq!(annotations.get(constants::ANNOTATION_DS_PROXY_HASH), Some(&"def".to_owned()));
    }

    #[test]
    fn test_disabled_datasource_has_no_proxy() {
        let spec = GrafanaSpec {
            datasource_config: Some(DataSourceConfig { r#type: DatasourceType::Disabled, ..DataSourceConfig::default() }),
            ..GrafanaSpec::default()
        };
        let pod_spec = pod_spec(&deployment(&spec));
        assert_eq!(container_names(&pod_spec), vec!["grafana", "router", "dashboard-controller"]);
        assert!(!pod_spec.volumes.unwrap().iter().any(|volume| volume.name == constants::DS_PROXY_SECRET_NAME));
    }

    #[test]
    fn test_ds_proxy_command() {
        let pod_spec = pod_spec(&deployment(&GrafanaSpec::default()));
        let command = pod_spec.containers[3].command.clone().unwrap();
        assert_eq!(command[1], "--listen-address=127.0.0.1:9096");
        assert_eq!(command[2], format!("--thanos-address={}", constants::DEFAULT_THANOS_URL));
        assert_eq!(command[3], "--ns-parser-conf=/etc/conf/dsproxy-config.yaml");
    }

    #[test]
    fn test_volume_modes_and_storage() {
        let spec = GrafanaSpec {
            persistent_volume: Some(GrafanaPersistentVolume { enabled: true, claim_name: Some("grafana-data".to_owned()) }),
            ..GrafanaSpec::default()
        };
        let volumes = pod_spec(&deployment(&spec)).volumes.unwrap();
        let find = |name: &str| volumes.iter().find(|volume| volume.name == name).cloned().unwrap();
        assert_eq!(find(constants::CM_ROUTER_ENTRY).config_map.unwrap().default_mode, Some(0o777));
        assert_eq!(find(constants::CM_DS_ENTRY).config_map.unwrap().default_mode, Some(0o777));
        assert_eq!(find(constants::CM_GRAFANA_CONFIG).config_map.unwrap().default_mode, Some(0o664));
        assert_eq!(find(VOLUME_STORAGE).persistent_volume_claim.unwrap().claim_name, "grafana-data");
        assert_eq!(find(VOLUME_CLIENT_CERTS).secret.unwrap().secret_name.as_deref(), Some("ibm-monitoring-client-certs"));

        let volumes = pod_spec(&deployment(&GrafanaSpec::default())).volumes.unwrap();
        assert!(volumes.iter().find(|volume| volume.name == VOLUME_STORAGE).unwrap().empty_dir.is_some());
    }

    #[test]
    fn test_router_port_follows_cluster_port() {
        let spec = GrafanaSpec { cluster_port: Some(9443), image_pull_secrets: Some(vec!["pull".to_owned()]), ..GrafanaSpec::default() };
        let pod_spec = pod_spec(&deployment(&spec));
        assert_eq!(pod_spec.containers[1].ports.clone().unwrap()[0].container_port, 9443);
        assert_eq!(pod_spec.image_pull_secrets.unwrap()[0].name.as_deref(), Some("pull"));
    }

    #[test]
    fn test_build_is_deterministic() {
        let spec = GrafanaSpec::default();
        assert_eq!(serde_json::to_string(&deployment(&spec)).unwrap(), serde_json::to_string(&deployment(&spec)).unwrap());
    }
}
