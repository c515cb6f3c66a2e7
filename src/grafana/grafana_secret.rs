use k8s_openapi::{api::core::v1::Secret, apimachinery::pkg::apis::meta::v1::OwnerReference, ByteString};
use kube::core::ObjectMeta;
use std::collections::BTreeMap;
use tracing::{debug, info};

use crate::{
    artifacts::{ArtifactRenderer, TemplateContext, DS_PROXY_CONFIG},
    cluster_store::{self, ClusterStore},
    config_hash, constants,
    grafana::{grafana_config, grafana_datasource, grafana_resource::GrafanaSpec},
    model::Error,
    operator_config::OperatorConfig,
};

fn opaque_secret(
    name: &str,
    namespace: &str,
    data: BTreeMap<String, ByteString>,
    annotations: Option<BTreeMap<String, String>>,
    labels: BTreeMap<String, String>,
    owner_references: Option<Vec<OwnerReference>>,
) -> Secret {
    Secret {
        metadata: ObjectMeta {
            name: Some(name.to_owned()),
            namespace: Some(namespace.to_owned()),
            labels: Some(labels),
            annotations,
            owner_references,
            ..ObjectMeta::default()
        },
        type_: Some("Opaque".to_owned()),
        data: Some(data),
        ..Secret::default()
    }
}

/// Credentials of the default administrative account
pub fn build_admin_secret(spec: &GrafanaSpec, namespace: &str, labels: BTreeMap<String, String>, owner_references: Option<Vec<OwnerReference>>) -> Secret {
    let (user, password) = grafana_config::admin_credentials(spec);
    let data = BTreeMap::from([
        (constants::GRAFANA_ADMIN_USER_KEY.to_owned(), ByteString(user.into_bytes())),
        (constants::GRAFANA_ADMIN_PASSWORD_KEY.to_owned(), ByteString(password.into_bytes())),
    ]);
    opaque_secret(constants::GRAFANA_ADMIN_SECRET_NAME, namespace, data, None, labels, owner_references)
}

/// Writes the administrator secret when absent or when its credentials differ
pub async fn reconcile_admin_secret<S: ClusterStore>(store: &S, desired: &Secret) -> Result<(), Error> {
    let namespace = desired.metadata.namespace.as_deref();
    match store.get::<Secret>(namespace, constants::GRAFANA_ADMIN_SECRET_NAME).await? {
        Some(observed) if observed.data == desired.data => debug!("Secret {} unchanged", constants::GRAFANA_ADMIN_SECRET_NAME),
        Some(observed) => {
            cluster_store::replace_observed(store, desired, &observed).await?;
            info!("Secret {} updated", constants::GRAFANA_ADMIN_SECRET_NAME);
        }
        None => {
            cluster_store::apply(store, desired).await?;
            info!("Secret {} created", constants::GRAFANA_ADMIN_SECRET_NAME);
        }
    }
    Ok(())
}

/// Renders the ds-proxy configuration, `None` when the datasource kind needs no proxy
pub fn build_ds_proxy_secret(
    spec: &GrafanaSpec,
    namespace: &str,
    config: &OperatorConfig,
    renderer: &ArtifactRenderer,
    labels: BTreeMap<String, String>,
    owner_references: Option<Vec<OwnerReference>>,
) -> Result<Option<(Secret, String)>, Error> {
    if !grafana_datasource::datasource_type(spec).needs_proxy() {
        return Ok(None);
    }
    let context = TemplateContext::new(namespace, spec, config);
    let (body, hash) = config_hash::stamp(renderer.render(&DS_PROXY_CONFIG, &context)?);
    let data = BTreeMap::from([(constants::DS_PROXY_CONFIG_KEY.to_owned(), ByteString(body.into_bytes()))]);
    let annotations = BTreeMap::from([(constants::ANNOTATION_LAST_CONFIG.to_owned(), hash.to_owned())]);
    let secret = opaque_secret(constants::DS_PROXY_SECRET_NAME, namespace, data, Some(annotations), labels, owner_references);
    Ok(Some((secret, hash)))
}

/// Creates, updates or deletes the ds-proxy secret. Returns the hash of its content, empty
/// when the secret is not needed.
pub async fn reconcile_ds_proxy_secret<S: ClusterStore>(store: &S, namespace: &str, desired: Option<(Secret, String)>) -> Result<String, Error> {
    let Some((secret, hash)) = desired else {
        if store.delete::<Secret>(Some(namespace), constants::DS_PROXY_SECRET_NAME).await? {
            info!("Secret {} deleted, the datasource no longer needs a proxy", constants::DS_PROXY_SECRET_NAME);
        }
        return Ok(String::new());
    };
    match store.get::<Secret>(Some(namespace), constants::DS_PROXY_SECRET_NAME).await? {
        Some(observed) => {
            let stored_hash = observed.metadata.annotations.as_ref().and_then(|annotations| annotations.get(constants::ANNOTATION_LAST_CONFIG));
            if config_hash::needs_write(stored_hash.map(String::as_str), &hash) {
                cluster_store::replace_observed(store, &secret, &observed).await?;
                info!("Secret {} updated", constants::DS_PROXY_SECRET_NAME);
            }
        }
        None => {
            cluster_store::apply(store, &secret).await?;
            info!("Secret {} created", constants::DS_PROXY_SECRET_NAME);
        }
    }
    Ok(hash)
}
