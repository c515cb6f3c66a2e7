use async_trait::async_trait;
use k8s_openapi::api::{
    apps::v1::{DaemonSet, Deployment, StatefulSet},
    core::v1::{ConfigMap, Secret, Service, ServiceAccount},
    networking::v1::Ingress,
};
use kube::{
    api::{DeleteParams, Patch, PatchParams, PostParams},
    runtime::events::{Recorder, Reporter},
    Api, Client, Resource, ResourceExt,
};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::json;
use std::fmt::Debug;
use tracing::debug;

use crate::{
    events::{GrafanaEventEnum, ResourceEvent},
    grafana::{
        grafana_certificate::Certificate,
        grafana_dashboard::MonitoringDashboard,
        grafana_resource::{Grafana, GrafanaStatus},
        grafana_scc::SecurityContextConstraints,
    },
    merge,
    model::Error,
    resource_generics,
};

#[cfg(test)]
pub mod mock;

/// Kinds the reconciliation engine reads and writes
pub trait StoredResource: Resource<DynamicType = ()> + Clone + Debug + Serialize + DeserializeOwned + Send + Sync + 'static {
    fn api(client: Client, namespace: Option<&str>) -> Api<Self>;
}

macro_rules! namespaced_resource {
    ($($kind:ty),* $(,)?) => {
        $(
            impl StoredResource for $kind {
                fn api(client: Client, namespace: Option<&str>) -> Api<Self> {
                    match namespace {
                        Some(namespace) => Api::namespaced(client, namespace),
                        None => Api::default_namespaced(client),
                    }
                }
            }
        )*
    };
}

namespaced_resource!(
    Grafana,
    Deployment,
    DaemonSet,
    StatefulSet,
    Service,
    Ingress,
    ConfigMap,
    Secret,
    ServiceAccount,
    Certificate,
    MonitoringDashboard,
);

impl StoredResource for SecurityContextConstraints {
    fn api(client: Client, _namespace: Option<&str>) -> Api<Self> {
        Api::all(client)
    }
}

/// Access to the cluster object store.
///
/// Errors stay `kube::Error` so callers can tell a missing object (404) or a conflict (409)
/// from a real failure.
#[async_trait]
pub trait ClusterStore: Send + Sync {
    async fn get<K: StoredResource>(&self, namespace: Option<&str>, name: &str) -> Result<Option<K>, kube::Error>;

    async fn create<K: StoredResource>(&self, object: &K) -> Result<K, kube::Error>;

    /// Full replace of the stored object, the resource version of `object` must be current
    async fn replace<K: StoredResource>(&self, object: &K) -> Result<K, kube::Error>;

    /// Returns false when the object was already absent
    async fn delete<K: StoredResource>(&self, namespace: Option<&str>, name: &str) -> Result<bool, kube::Error>;

    async fn update_status(&self, grafana: &Grafana, status: &GrafanaStatus) -> Result<(), kube::Error>;

    async fn publish_event(&self, grafana: &Grafana, event: GrafanaEventEnum, attribute: Option<String>) -> Result<(), kube::Error>;

    async fn add_finalizer(&self, grafana: &Grafana) -> Result<(), kube::Error>;

    async fn remove_finalizer(&self, grafana: &Grafana) -> Result<(), kube::Error>;
}

pub fn is_not_found(error: &kube::Error) -> bool {
    matches!(error, kube::Error::Api(response) if response.code == 404)
}

pub fn is_conflict(error: &kube::Error) -> bool {
    matches!(error, kube::Error::Api(response) if response.code == 409)
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ApplyOutcome {
    Created,
    Replaced,
    Unchanged,
}

/// Get-or-create-then-replace of the desired object.
/// A conflict on create or replace triggers one refetch before the write is retried.
pub async fn apply<S: ClusterStore, K: StoredResource>(store: &S, desired: &K) -> Result<ApplyOutcome, Error> {
    let namespace = desired.meta().namespace.clone();
    let name = desired.name_any();
    let observed = match store.get::<K>(namespace.as_deref(), &name).await? {
        Some(observed) => observed,
        None => match store.create(desired).await {
            Ok(_) => {
                debug!("{} {name} created", K::kind(&()));
                return Ok(ApplyOutcome::Created);
            }
            Err(error) if is_conflict(&error) => match store.get::<K>(namespace.as_deref(), &name).await? {
                Some(observed) => observed,
                None => return Err(error.into()),
            },
            Err(error) => return Err(error.into()),
        },
    };
    replace_observed(store, desired, &observed).await
}

/// Overwrites `observed` with `desired`, keeping the observed-wins fields. No write is issued
/// when the stored object already holds every field the merged one sets.
pub async fn replace_observed<S: ClusterStore, K: StoredResource>(store: &S, desired: &K, observed: &K) -> Result<ApplyOutcome, Error> {
    let merged = merge::merge(desired, observed)?;
    if merge::contains(&serde_json::to_value(observed)?, &serde_json::to_value(&merged)?) {
        return Ok(ApplyOutcome::Unchanged);
    }
    match store.replace(&merged).await {
        Ok(_) => Ok(ApplyOutcome::Replaced),
        Err(error) if is_conflict(&error) => {
            let name = desired.name_any();
            let Some(current) = store.get::<K>(desired.meta().namespace.as_deref(), &name).await? else {
                return Err(error.into());
            };
            debug!("{} {name} changed concurrently, retrying", K::kind(&()));
            store.replace(&merge::merge(desired, &current)?).await?;
            Ok(ApplyOutcome::Replaced)
        }
        Err(error) => Err(error.into()),
    }
}

/// Store backed by the Kubernetes API server
#[derive(Clone)]
pub struct KubeClusterStore {
    client: Client,
    reporter: Reporter,
}

impl KubeClusterStore {
    pub fn new(client: Client, reporter: Reporter) -> Self {
        KubeClusterStore { client, reporter }
    }
}

#[async_trait]
impl ClusterStore for KubeClusterStore {
    async fn get<K: StoredResource>(&self, namespace: Option<&str>, name: &str) -> Result<Option<K>, kube::Error> {
        K::api(self.client.clone(), namespace).get_opt(name).await
    }

    async fn create<K: StoredResource>(&self, object: &K) -> Result<K, kube::Error> {
        let api = K::api(self.client.clone(), object.meta().namespace.as_deref());
        api.create(&PostParams::default(), object).await
    }

    async fn replace<K: StoredResource>(&self, object: &K) -> Result<K, kube::Error> {
        let api = K::api(self.client.clone(), object.meta().namespace.as_deref());
        api.replace(&object.name_any(), &PostParams::default(), object).await
    }

    async fn delete<K: StoredResource>(&self, namespace: Option<&str>, name: &str) -> Result<bool, kube::Error> {
        let api = K::api(self.client.clone(), namespace);
        match api.delete(name, &DeleteParams::default()).await {
            Ok(_) => Ok(true),
            Err(error) if is_not_found(&error) => {
                debug!("{} {name} already absent", K::kind(&()));
                Ok(false)
            }
            Err(error) => Err(error),
        }
    }

    async fn update_status(&self, grafana: &Grafana, status: &GrafanaStatus) -> Result<(), kube::Error> {
        let api: Api<Grafana> = Grafana::api(self.client.clone(), grafana.namespace().as_deref());
        let patch = Patch::Merge(json!({ "status": status }));
        api.patch_status(&grafana.name_any(), &PatchParams::default(), &patch).await?;
        Ok(())
    }

    async fn publish_event(&self, grafana: &Grafana, event: GrafanaEventEnum, attribute: Option<String>) -> Result<(), kube::Error> {
        Recorder::new(self.client.clone(), self.reporter.clone(), grafana.object_ref(&()))
            .publish(event.to_event(attribute))
            .await
    }

    async fn add_finalizer(&self, grafana: &Grafana) -> Result<(), kube::Error> {
        resource_generics::add_finalizer(self.client.clone(), grafana).await
    }

    async fn remove_finalizer(&self, grafana: &Grafana) -> Result<(), kube::Error> {
        resource_generics::remove_finalizer(self.client.clone(), grafana).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster_store::mock::{MockClusterStore, Op};
    use k8s_openapi::api::core::v1::ServiceSpec;
    use kube::core::ObjectMeta;

    fn service(type_: &str) -> Service {
        Service {
            metadata: ObjectMeta {
                name: Some("ibm-monitoring-grafana".to_owned()),
                namespace: Some("monitoring".to_owned()),
                ..ObjectMeta::default()
            },
            spec: Some(ServiceSpec { type_: Some(type_.to_owned()), ..ServiceSpec::default() }),
            ..Service::default()
        }
    }

    #[tokio::test]
    async fn test_apply_creates_then_skips_identical() {
        let store = MockClusterStore::default();
        assert_eq!(apply(&store, &service("ClusterIP")).await.unwrap(), ApplyOutcome::Created);
        assert_eq!(apply(&store, &service("ClusterIP")).await.unwrap(), ApplyOutcome::Unchanged);
        assert_eq!(apply(&store, &service("NodePort")).await.unwrap(), ApplyOutcome::Replaced);
        assert_eq!(store.count(Op::Create, "Service"), 1);
        assert_eq!(store.count(Op::Replace, "Service"), 1);
    }

    #[tokio::test]
    async fn test_apply_keeps_cluster_ip() {
        let store = MockClusterStore::default();
        let mut observed = service("ClusterIP");
        observed.spec.as_mut().unwrap().cluster_ip = Some("10.0.0.7".to_owned());
        store.insert(&observed);
        apply(&store, &service("NodePort")).await.unwrap();
        let stored: Service = store.object(Some("monitoring"), "ibm-monitoring-grafana").unwrap();
        assert_eq!(stored.spec.unwrap().cluster_ip.as_deref(), Some("10.0.0.7"));
    }

    #[tokio::test]
    async fn test_apply_ignores_server_populated_fields() {
        let store = MockClusterStore::with_server_defaults();
        assert_eq!(apply(&store, &service("ClusterIP")).await.unwrap(), ApplyOutcome::Created);
        let stored: Service = store.object(Some("monitoring"), "ibm-monitoring-grafana").unwrap();
        assert!(stored.metadata.uid.is_some());
        assert!(stored.metadata.creation_timestamp.is_some());
        for _ in 0..3 {
            assert_eq!(apply(&store, &service("ClusterIP")).await.unwrap(), ApplyOutcome::Unchanged);
        }
        assert_eq!(store.count(Op::Replace, "Service"), 0);
        assert_eq!(apply(&store, &service("NodePort")).await.unwrap(), ApplyOutcome::Replaced);
    }

    #[tokio::test]
    async fn test_apply_propagates_store_failure() {
        let store = MockClusterStore::default();
        store.fail("Service", Op::Create, 500);
        match apply(&store, &service("ClusterIP")).await {
            Err(Error::KubeError { source }) => assert!(!is_conflict(&source) && !is_not_found(&source)),
            other => panic!("unexpected result {:?}", other),
        }
    }
}
