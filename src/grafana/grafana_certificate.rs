use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;
use kube::{core::ObjectMeta, CustomResource};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::{constants, grafana::grafana_resource::GrafanaSpec};

/// cert-manager certificate request, the issuer stores the key material in `secretName`
#[derive(CustomResource, Serialize, Deserialize, Debug, PartialEq, Clone, JsonSchema, Default)]
#[kube(group = "certmanager.k8s.io", version = "v1alpha1", kind = "Certificate", plural = "certificates", namespaced)]
#[serde(rename_all = "camelCase")]
pub struct CertificateSpec {
    pub secret_name: String,
    pub issuer_ref: IssuerReference,
    pub common_name: String,
    pub dns_names: Vec<String>,
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Clone, JsonSchema, Default)]
pub struct IssuerReference {
    pub name: String,
    pub kind: String,
}

fn or_default(value: Option<&String>, default: &str) -> String {
    value.filter(|value| !value.is_empty()).cloned().unwrap_or(default.to_owned())
}

/// Names of the server and client certificate secrets
pub fn certificate_secret_names(spec: &GrafanaSpec) -> [String; 2] {
    [
        or_default(spec.tls_secret_name.as_ref(), constants::DEFAULT_TLS_SECRET_NAME),
        or_default(spec.tls_client_secret_name.as_ref(), constants::DEFAULT_TLS_CLIENT_SECRET_NAME),
    ]
}

pub fn build_certificate(
    name: &str,
    namespace: &str,
    spec: &GrafanaSpec,
    labels: BTreeMap<String, String>,
    owner_references: Option<Vec<OwnerReference>>,
) -> Certificate {
    let service = constants::GRAFANA_NAME;
    let mut certificate = Certificate::new(
        name,
        CertificateSpec {
            secret_name: name.to_owned(),
            issuer_ref: IssuerReference {
                name: or_default(spec.issuer.as_ref(), constants::DEFAULT_ISSUER_NAME),
                kind: or_default(spec.issuer_type.as_ref(), constants::DEFAULT_ISSUER_KIND),
            },
            common_name: constants::CERTIFICATE_COMMON_NAME.to_owned(),
            dns_names: vec![
                service.to_owned(),
                format!("{}.{}", service, namespace),
                format!("*.{}", namespace),
                format!("*.{}.svc", namespace),
            ],
        },
    );
    certificate.metadata = ObjectMeta {
        name: Some(name.to_owned()),
        namespace: Some(namespace.to_owned()),
        labels: Some(labels),
        owner_references,
        ..ObjectMeta::default()
    };
    certificate
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_certificate_defaults() {
        let spec = GrafanaSpec::default();
        let [server, client] = certificate_secret_names(&spec);
        assert_eq!(server, "ibm-monitoring-certs");
        assert_eq!(client, "ibm-monitoring-client-certs");
        let certificate = build_certificate(&server, "monitoring", &spec, BTreeMap::new(), None);
        assert_eq!(certificate.spec.secret_name, "ibm-monitoring-certs");
        assert_eq!(certificate.spec.issuer_ref, IssuerReference { name: "cs-ca-clusterissuer".to_owned(), kind: "ClusterIssuer".to_owned() });
        assert_eq!(
            certificate.spec.dns_names,
            vec!["ibm-monitoring-grafana", "ibm-monitoring-grafana.monitoring", "*.monitoring", "*.monitoring.svc"]
        );
        assert_eq!(certificate.metadata.namespace.as_deref(), Some("monitoring"));
    }

    #[test]
    fn test_certificate_issuer_override() {
        let spec = GrafanaSpec {
            tls_secret_name: Some("custom-certs".to_owned()),
            issuer: Some("my-issuer".to_owned()),
            issuer_type: Some("Issuer".to_owned()),
            ..GrafanaSpec::default()
        };
        let [server, _] = certificate_secret_names(&spec);
        let certificate = build_certificate(&server, "monitoring", &spec, BTreeMap::new(), None);
        assert_eq!(certificate.metadata.name.as_deref(), Some("custom-certs"));
        assert_eq!(certificate.spec.issuer_ref.kind, "Issuer");
        assert_eq!(certificate.spec.common_name, "ibm-monitoring");
    }
}
