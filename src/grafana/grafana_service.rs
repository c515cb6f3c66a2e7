use k8s_openapi::{
    api::core::v1::{Service, ServicePort, ServiceSpec},
    apimachinery::pkg::{apis::meta::v1::OwnerReference, util::intstr::IntOrString},
};
use kube::core::ObjectMeta;
use std::collections::BTreeMap;

use crate::{constants, grafana::grafana_resource::GrafanaSpec, utils};

/// Builds the service fronting the router. The `grafana` port always comes first, extra ports
/// from the spec are appended unless their name or number collides with an earlier one.
pub fn build_service(
    spec: &GrafanaSpec,
    namespace: &str,
    labels: BTreeMap<String, String>,
    owner_references: Option<Vec<OwnerReference>>,
) -> Service {
    let service_spec = spec.service.clone().unwrap_or_default();
    let mut labels = labels;
    utils::merge_maps(&mut labels, service_spec.labels.as_ref());

    let mut ports = vec![ServicePort {
        name: Some(constants::GRAFANA_HTTP_PORT_NAME.to_owned()),
        port: spec.cluster_port.unwrap_or(constants::DEFAULT_CLUSTER_PORT),
        protocol: Some("TCP".to_owned()),
        target_port: Some(IntOrString::String("https".to_owned())),
        ..ServicePort::default()
    }];
    for extra in service_spec.ports.unwrap_or_default() {
        let collides = ports.iter().any(|port| port.name.as_deref() == Some(extra.name.as_str()) || port.port == extra.port);
        if collides {
            continue;
        }
        ports.push(ServicePort {
            name: Some(extra.name),
            port: extra.port,
            protocol: Some(extra.protocol.unwrap_or("TCP".to_owned())),
            target_port: Some(IntOrString::Int(extra.target_port.unwrap_or(extra.port))),
            node_port: extra.node_port,
            ..ServicePort::default()
        });
    }

    Service {
        metadata: ObjectMeta {
            name: Some(constants::GRAFANA_NAME.to_owned()),
            namespace: Some(namespace.to_owned()),
            labels: Some(labels),
            annotations: service_spec.annotations,
            owner_references,
            ..ObjectMeta::default()
        },
        spec: Some(ServiceSpec {
            selector: Some(BTreeMap::from([(constants::LABEL_APP.to_owned(), constants::GRAFANA_APP.to_owned())])),
            type_: Some(service_spec.r#type.filter(|type_| !type_.is_empty()).unwrap_or("ClusterIP".to_owned())),
            ports: Some(ports),
            ..ServiceSpec::default()
        }),
        ..Service::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grafana::grafana_resource::{GrafanaServicePort, GrafanaServiceSpec};

    fn extra_port(name: &str, port: i32) -> GrafanaServicePort {
        GrafanaServicePort { name: name.to_owned(), port, ..GrafanaServicePort::default() }
    }

    #[test]
    fn test_default_service() {
        let service = build_service(&GrafanaSpec::default(), "monitoring", BTreeMap::new(), None);
        let service_spec = service.spec.unwrap();
        assert_eq!(service_spec.type_.as_deref(), Some("ClusterIP"));
        let ports = service_spec.ports.unwrap();
        assert_eq!(ports.len(), 1);
        assert_eq!(ports[0].name.as_deref(), Some("grafana"));
        assert_eq!(ports[0].port, 8443);
        assert_eq!(ports[0].target_port, Some(IntOrString::String("https".to_owned())));
        assert_eq!(service_spec.selector.unwrap().get("app"), Some(&"grafana".to_owned()));
    }

    #[test]
    fn test_extra_ports_skip_collisions() {
        let spec = GrafanaSpec {
            service: Some(GrafanaServiceSpec {
                r#type: Some("NodePort".to_owned()),
                ports: Some(vec![extra_port("grafana", 9000), extra_port("metrics", 8443), extra_port("metrics", 9100), extra_port("metrics", 9200)]),
                labels: Some(BTreeMap::from([("team".to_owned(), "observability".to_owned())])),
                annotations: None,
            }),
            ..GrafanaSpec::default()
        };
        let service = build_service(&spec, "monitoring", BTreeMap::new(), None);
        assert_eq!(service.metadata.labels.unwrap().get("team"), Some(&"observability".to_owned()));
        let service_spec = service.spec.unwrap();
        assert_eq!(service_spec.type_.as_deref(), Some("NodePort"));
        let ports: Vec<(Option<String>, i32)> = service_spec.ports.unwrap().into_iter().map(|port| (port.name, port.port)).collect();
        assert_eq!(ports, vec![(Some("grafana".to_owned()), 8443), (Some("metrics".to_owned()), 9100)]);
    }
}
