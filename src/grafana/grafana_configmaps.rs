use k8s_openapi::{api::core::v1::ConfigMap, apimachinery::pkg::apis::meta::v1::OwnerReference};
use kube::core::ObjectMeta;
use std::collections::BTreeMap;
use tracing::{debug, info};

use crate::{
    artifacts::{ArtifactRenderer, TemplateContext, CONFIG_MAP_ARTIFACTS},
    cluster_store::{self, ClusterStore},
    config_hash, constants,
    grafana::{grafana_config, grafana_dashboard::BUILTIN_DASHBOARDS, grafana_datasource, grafana_resource::GrafanaSpec},
    model::Error,
    operator_config::OperatorConfig,
};

/// Rendered content of one config map together with its content hash
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigBundle {
    pub name: String,
    pub data: BTreeMap<String, String>,
    pub hash: String,
}

impl ConfigBundle {
    fn from_files(name: &str, data: BTreeMap<String, String>) -> Self {
        let hash = config_hash::hash_files(&data);
        ConfigBundle { name: name.to_owned(), data, hash }
    }

    pub fn to_config_map(&self, namespace: &str, labels: BTreeMap<String, String>, owner_references: Option<Vec<OwnerReference>>) -> ConfigMap {
        ConfigMap {
            metadata: ObjectMeta {
                name: Some(self.name.to_owned()),
                namespace: Some(namespace.to_owned()),
                labels: Some(labels),
                annotations: Some(BTreeMap::from([(constants::ANNOTATION_LAST_CONFIG.to_owned(), self.hash.to_owned())])),
                owner_references,
                ..ObjectMeta::default()
            },
            data: Some(self.data.clone()),
            ..ConfigMap::default()
        }
    }
}

/// Renders every config bundle of the Grafana pod, sorted by name
pub fn build_config_bundles(
    spec: &GrafanaSpec,
    namespace: &str,
    config: &OperatorConfig,
    renderer: &ArtifactRenderer,
) -> Result<Vec<ConfigBundle>, Error> {
    let context = TemplateContext::new(namespace, spec, config);
    let mut bundles = Vec::new();
    for artifact in CONFIG_MAP_ARTIFACTS.iter() {
        let body = renderer.render(artifact, &context)?;
        bundles.push(ConfigBundle::from_files(artifact.config_map, BTreeMap::from([(artifact.file_name.to_owned(), body)])));
    }

    let grafana_ini = grafana_config::build_grafana_ini(spec).render();
    bundles.push(ConfigBundle::from_files(constants::CM_GRAFANA_CONFIG, BTreeMap::from([("grafana.ini".to_owned(), grafana_ini)])));

    let dashboards = BUILTIN_DASHBOARDS
        .iter()
        .map(|dashboard| (format!("{}.json", dashboard.name), dashboard.body.to_owned()))
        .collect();
    bundles.push(ConfigBundle::from_files(constants::CM_DEFAULT_DASHBOARDS, dashboards));

    let (datasource, datasource_hash) = grafana_datasource::render_datasource(spec, namespace, config)?;
    bundles.push(ConfigBundle {
        name: constants::CM_DATASOURCE.to_owned(),
        data: BTreeMap::from([(grafana_datasource::DATASOURCE_FILE_NAME.to_owned(), datasource)]),
        hash: datasource_hash,
    });

    bundles.sort_by(|left, right| left.name.cmp(&right.name));
    Ok(bundles)
}

/// Aggregate over the bundle hashes in name order, threaded into the pod template
pub fn aggregate_hash(bundles: &[ConfigBundle]) -> String {
    let hashes: BTreeMap<String, String> = bundles.iter().map(|bundle| (bundle.name.to_owned(), bundle.hash.to_owned())).collect();
    config_hash::hash_files(&hashes)
}

/// Writes the bundle unless the stored `lastConfig` hash already matches
pub async fn reconcile_config_map<S: ClusterStore>(
    store: &S,
    bundle: &ConfigBundle,
    namespace: &str,
    labels: BTreeMap<String, String>,
    owner_references: Option<Vec<OwnerReference>>,
) -> Result<(), Error> {
    let desired = bundle.to_config_map(namespace, labels, owner_references);
    match store.get::<ConfigMap>(Some(namespace), &bundle.name).await? {
        Some(observed) => {
            let stored_hash = observed.metadata.annotations.as_ref().and_then(|annotations| annotations.get(constants::ANNOTATION_LAST_CONFIG));
            if config_hash::needs_write(stored_hash.map(String::as_str), &bundle.hash) {
                cluster_store::replace_observed(store, &desired, &observed).await?;
                info!("ConfigMap {} updated", bundle.name);
            } else {
                debug!("ConfigMap {} unchanged", bundle.name);
            }
        }
        None => {
            cluster_store::apply(store, &desired).await?;
            info!("ConfigMap {} created", bundle.name);
        }
    }
    Ok(())
}
