use async_trait::async_trait;
use kube::{core::ErrorResponse, Resource, ResourceExt};
use serde_json::{json, Value};
use std::{
    collections::{BTreeMap, HashMap},
    sync::Mutex,
};

use crate::{
    cluster_store::{ClusterStore, StoredResource},
    constants,
    events::GrafanaEventEnum,
    grafana::grafana_resource::{Grafana, GrafanaStatus},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    Get,
    Create,
    Replace,
    Delete,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Operation {
    pub op: Op,
    pub kind: String,
    pub namespace: Option<String>,
    pub name: String,
}

type ObjectKey = (String, Option<String>, String);

#[derive(Default)]
struct MockState {
    objects: BTreeMap<ObjectKey, Value>,
    operations: Vec<Operation>,
    faults: HashMap<(String, Op), u16>,
    statuses: Vec<GrafanaStatus>,
    events: Vec<(GrafanaEventEnum, Option<String>)>,
    finalizers: Vec<String>,
    resource_version: u64,
    server_defaults: bool,
}

/// In memory store recording every operation, with fault injection per kind and operation
#[derive(Default)]
pub struct MockClusterStore {
    state: Mutex<MockState>,
}

fn api_error(code: u16, reason: &str, message: String) -> kube::Error {
    kube::Error::Api(ErrorResponse {
        status: "Failure".to_owned(),
        message,
        reason: reason.to_owned(),
        code,
    })
}

fn key_of<K: StoredResource>(namespace: Option<&str>, name: &str) -> ObjectKey {
    (K::kind(&()).to_string(), namespace.map(str::to_owned), name.to_owned())
}

/// Fills what an API server adds to every written object: identity, timestamps, managed fields,
/// defaulted spec fields and status. Identity and creation time survive a replace.
fn populate_server_fields(kind: &str, value: &mut Value, previous: Option<&Value>, resource_version: u64) {
    let uid = previous
        .and_then(|previous| previous.pointer("/metadata/uid"))
        .cloned()
        .unwrap_or(Value::String(format!("00000000-0000-4000-8000-{:012}", resource_version)));
    let created = previous
        .and_then(|previous| previous.pointer("/metadata/creationTimestamp"))
        .cloned()
        .unwrap_or(Value::String("2024-01-01T00:00:00Z".to_owned()));
    let generation = previous.and_then(|previous| previous.pointer("/metadata/generation")).and_then(Value::as_i64).unwrap_or(0) + 1;
    value["metadata"]["uid"] = uid;
    value["metadata"]["creationTimestamp"] = created;
    value["metadata"]["generation"] = json!(generation);
    value["metadata"]["managedFields"] = json!([{ "manager": "grafana-operator", "operation": "Update", "apiVersion": "v1" }]);
    match kind {
        "Service" => {
            if value.pointer("/spec/sessionAffinity").is_none() {
                value["spec"]["sessionAffinity"] = json!("None");
            }
            value["status"] = json!({ "loadBalancer": {} });
        }
        "Deployment" => {
            if value.pointer("/spec/progressDeadlineSeconds").is_none() {
                value["spec"]["progressDeadlineSeconds"] = json!(600);
            }
            value["status"] = json!({ "observedGeneration": generation, "replicas": 1 });
        }
        _ => {}
    }
}

impl MockClusterStore {
    /// Store that populates server side fields on every write, the way an API server does
    pub fn with_server_defaults() -> Self {
        let store = MockClusterStore::default();
        store.lock().server_defaults = true;
        store
    }

    /// Every following `op` on `kind` fails with the given HTTP code
    pub fn fail(&self, kind: &str, op: Op, code: u16) {
        self.lock().faults.insert((kind.to_owned(), op), code);
    }

    /// Seeds an object without recording an operation
    pub fn insert<K: StoredResource>(&self, object: &K) {
        let mut state = self.lock();
        state.resource_version += 1;
        let mut value = serde_json::to_value(object).unwrap();
        value["metadata"]["resourceVersion"] = Value::String(state.resource_version.to_string());
        state.objects.insert(key_of::<K>(object.meta().namespace.as_deref(), &object.name_any()), value);
    }

    pub fn object<K: StoredResource>(&self, namespace: Option<&str>, name: &str) -> Option<K> {
        self.lock()
            .objects
            .get(&key_of::<K>(namespace, name))
            .map(|value| serde_json::from_value(value.clone()).unwrap())
    }

    pub fn operations(&self) -> Vec<Operation> {
        self.lock().operations.clone()
    }

    /// Write operations only, in the order they were issued
    pub fn writes(&self) -> Vec<Operation> {
        self.operations().into_iter().filter(|operation| operation.op != Op::Get).collect()
    }

    pub fn count(&self, op: Op, kind: &str) -> usize {
        self.lock().operations.iter().filter(|operation| operation.op == op && operation.kind == kind).count()
    }

    pub fn clear_operations(&self) {
        self.lock().operations.clear();
    }

    pub fn statuses(&self) -> Vec<GrafanaStatus> {
        self.lock().statuses.clone()
    }

    pub fn events(&self) -> Vec<(GrafanaEventEnum, Option<String>)> {
        self.lock().events.clone()
    }

    pub fn finalizers(&self) -> Vec<String> {
        self.lock().finalizers.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MockState> {
        self.state.lock().unwrap()
    }

    fn record(&self, op: Op, key: &ObjectKey) -> Result<(), kube::Error> {
        let mut state = self.lock();
        state.operations.push(Operation {
            op,
            kind: key.0.to_owned(),
            namespace: key.1.to_owned(),
            name: key.2.to_owned(),
        });
        match state.faults.get(&(key.0.to_owned(), op)) {
            Some(code) => Err(api_error(*code, "Injected", format!("injected failure on {:?} {}", op, key.2))),
            None => Ok(()),
        }
    }

    fn store<K: StoredResource>(&self, key: ObjectKey, object: &K) -> Result<K, kube::Error> {
        let mut state = self.lock();
        state.resource_version += 1;
        let mut value = serde_json::to_value(object).map_err(kube::Error::SerdeError)?;
        value["metadata"]["resourceVersion"] = Value::String(state.resource_version.to_string());
        if state.server_defaults {
            populate_server_fields(&key.0, &mut value, state.objects.get(&key), state.resource_version);
        }
        state.objects.insert(key, value.clone());
        serde_json::from_value(value).map_err(kube::Error::SerdeError)
    }
}

#[async_trait]
impl ClusterStore for MockClusterStore {
    async fn get<K: StoredResource>(&self, namespace: Option<&str>, name: &str) -> Result<Option<K>, kube::Error> {
        let key = key_of::<K>(namespace, name);
        self.record(Op::Get, &key)?;
        let value = self.lock().objects.get(&key).cloned();
        value.map(|value| serde_json::from_value(value).map_err(kube::Error::SerdeError)).transpose()
    }

    async fn create<K: StoredResource>(&self, object: &K) -> Result<K, kube::Error> {
        let key = key_of::<K>(object.meta().namespace.as_deref(), &object.name_any());
        self.record(Op::Create, &key)?;
        if self.lock().objects.contains_key(&key) {
            return Err(api_error(409, "AlreadyExists", format!("{} {} already exists", key.0, key.2)));
        }
        self.store(key, object)
    }

    async fn replace<K: StoredResource>(&self, object: &K) -> Result<K, kube::Error> {
        let key = key_of::<K>(object.meta().namespace.as_deref(), &object.name_any());
        self.record(Op::Replace, &key)?;
        if !self.lock().objects.contains_key(&key) {
            return Err(api_error(404, "NotFound", format!("{} {} not found", key.0, key.2)));
        }
        self.store(key, object)
    }

    async fn delete<K: StoredResource>(&self, namespace: Option<&str>, name: &str) -> Result<bool, kube::Error> {
        let key = key_of::<K>(namespace, name);
        self.record(Op::Delete, &key)?;
        Ok(self.lock().objects.remove(&key).is_some())
    }

    async fn update_status(&self, grafana: &Grafana, status: &GrafanaStatus) -> Result<(), kube::Error> {
        let mut state = self.lock();
        state.statuses.push(status.clone());
        let key = key_of::<Grafana>(grafana.namespace().as_deref(), &grafana.name_any());
        if let Some(object) = state.objects.get_mut(&key) {
            object["status"] = serde_json::to_value(status).map_err(kube::Error::SerdeError)?;
        }
        Ok(())
    }

    async fn publish_event(&self, _grafana: &Grafana, event: GrafanaEventEnum, attribute: Option<String>) -> Result<(), kube::Error> {
        self.lock().events.push((event, attribute));
        Ok(())
    }

    async fn add_finalizer(&self, grafana: &Grafana) -> Result<(), kube::Error> {
        let mut state = self.lock();
        state.finalizers.push(format!("add {}", grafana.name_any()));
        let key = key_of::<Grafana>(grafana.namespace().as_deref(), &grafana.name_any());
        if let Some(object) = state.objects.get_mut(&key) {
            object["metadata"]["finalizers"] = serde_json::json!([constants::OPERATOR_FINALIZER]);
        }
        Ok(())
    }

    async fn remove_finalizer(&self, grafana: &Grafana) -> Result<(), kube::Error> {
        let mut state = self.lock();
        state.finalizers.push(format!("remove {}", grafana.name_any()));
        let key = key_of::<Grafana>(grafana.namespace().as_deref(), &grafana.name_any());
        if let Some(object) = state.objects.get_mut(&key) {
            object["metadata"]["finalizers"] = Value::Null;
        }
        Ok(())
    }
}
