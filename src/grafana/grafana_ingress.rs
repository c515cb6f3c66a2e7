use k8s_openapi::{
    api::networking::v1::{
        HTTPIngressPath, HTTPIngressRuleValue, Ingress, IngressBackend, IngressRule, IngressServiceBackend, IngressSpec, IngressTLS, ServiceBackendPort,
    },
    apimachinery::pkg::apis::meta::v1::OwnerReference,
};
use kube::core::ObjectMeta;
use std::collections::BTreeMap;

use crate::{constants, grafana::grafana_resource::GrafanaSpec, utils};

/// Whether the route must exist, it is only removed on an explicit `enabled: false`
pub fn ingress_enabled(spec: &GrafanaSpec) -> bool {
    spec.ingress.as_ref().and_then(|ingress| ingress.enabled).unwrap_or(true)
}

fn management_annotations() -> BTreeMap<String, String> {
    BTreeMap::from([
        ("kubernetes.io/ingress.class".to_owned(), "ibm-icp-management".to_owned()),
        ("icp.management.ibm.com/secure-backends".to_owned(), "true".to_owned()),
        ("icp.management.ibm.com/rewrite-target".to_owned(), "/".to_owned()),
    ])
}

/// Builds the ingress route exposing Grafana through the management ingress
pub fn build_ingress(spec: &GrafanaSpec, namespace: &str, labels: BTreeMap<String, String>, owner_references: Option<Vec<OwnerReference>>) -> Ingress {
    let ingress_spec = spec.ingress.clone().unwrap_or_default();
    let mut annotations = management_annotations();
    utils::merge_maps(&mut annotations, ingress_spec.annotations.as_ref());
    let host = ingress_spec.host.filter(|host| !host.is_empty());
    let tls = ingress_spec.tls_secret_name.filter(|secret| !secret.is_empty()).map(|secret_name| {
        vec![IngressTLS {
            hosts: host.clone().map(|host| vec![host]),
            secret_name: Some(secret_name),
        }]
    });

    Ingress {
        metadata: ObjectMeta {
            name: Some(constants::GRAFANA_NAME.to_owned()),
            namespace: Some(namespace.to_owned()),
            labels: Some(labels),
            annotations: Some(annotations),
            owner_references,
            ..ObjectMeta::default()
        },
        spec: Some(IngressSpec {
            ingress_class_name: ingress_spec.ingress_class_name,
            rules: Some(vec![IngressRule {
                host,
                http: Some(HTTPIngressRuleValue {
                    paths: vec![HTTPIngressPath {
                        path: Some(ingress_spec.path.filter(|path| !path.is_empty()).unwrap_or(constants::DEFAULT_INGRESS_PATH.to_owned())),
                        path_type: "Prefix".to_owned(),
                        backend: IngressBackend {
                            service: Some(IngressServiceBackend {
                                name: constants::GRAFANA_NAME.to_owned(),
                                port: Some(ServiceBackendPort {
                                    name: Some(constants::GRAFANA_HTTP_PORT_NAME.to_owned()),
                                    ..ServiceBackendPort::default()
                                }),
                            }),
                            ..IngressBackend::default()
                        },
                    }],
                }),
            }]),
            tls,
            ..IngressSpec::default()
        }),
        ..Ingress::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grafana::grafana_resource::GrafanaIngressSpec;

    #[test]
    fn test_default_ingress() {
        assert!(ingress_enabled(&GrafanaSpec::default()));
        let ingress = build_ingress(&GrafanaSpec::default(), "monitoring", BTreeMap::new(), None);
        let ingress_spec = ingress.spec.unwrap();
        assert!(ingress_spec.tls.is_none());
        let rule = &ingress_spec.rules.unwrap()[0];
        assert!(rule.host.is_none());
        let path = &rule.http.as_ref().unwrap().paths[0];
        assert_eq!(path.path.as_deref(), Some("/grafana"));
        assert_eq!(path.path_type, "Prefix");
        assert_eq!(path.backend.service.as_ref().unwrap().port.as_ref().unwrap().name.as_deref(), Some("grafana"));
    }

    #[test]
    fn test_ingress_overrides() {
        let spec = GrafanaSpec {
            ingress: Some(GrafanaIngressSpec {
                enabled: Some(true),
                host: Some("grafana.example.com".to_owned()),
                path: Some("/dashboards".to_owned()),
                tls_secret_name: Some("grafana-tls".to_owned()),
                ingress_class_name: Some("nginx".to_owned()),
                annotations: Some(BTreeMap::from([("kubernetes.io/ingress.class".to_owned(), "nginx".to_owned())])),
            }),
            ..GrafanaSpec::default()
        };
        let ingress = build_ingress(&spec, "monitoring", BTreeMap::new(), None);
        assert_eq!(ingress.metadata.annotations.unwrap().get("kubernetes.io/ingress.class"), Some(&"nginx".to_owned()));
        let ingress_spec = ingress.spec.unwrap();
        let tls = &ingress_spec.tls.unwrap()[0];
        assert_eq!(tls.hosts, Some(vec!["grafana.example.com".to_owned()]));
        assert_eq!(ingress_spec.rules.unwrap()[0].http.as_ref().unwrap().paths[0].path.as_deref(), Some("/dashboards"));
    }

    #[test]
    fn test_disabled_ingress() {
        let spec = GrafanaSpec { ingress: Some(GrafanaIngressSpec { enabled: Some(false), ..GrafanaIngressSpec::default() }), ..GrafanaSpec::default() };
        assert!(!ingress_enabled(&spec));
    }
}
