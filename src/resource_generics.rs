use json_patch::{AddOperation, PatchOperation, RemoveOperation, TestOperation};
use k8s_openapi::NamespaceResourceScope;
use kube::{
    api::{Patch, PatchParams},
    client::Client,
    Api, ResourceExt,
};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::fmt::Debug;
use tracing::debug;

use crate::constants;

fn namespaced_api<K>(client: Client, resource: &K) -> Api<K>
where
    K: kube::Resource<Scope = NamespaceResourceScope, DynamicType = ()>,
{
    match resource.namespace() {
        Some(namespace) => Api::namespaced(client, &namespace),
        None => Api::default_namespaced(client),
    }
}

/// Patch appending the operator finalizer, creating the list when the resource has none
pub fn add_finalizer_patch(finalizers: &[String]) -> Option<json_patch::Patch> {
    if finalizers.iter().any(|finalizer| finalizer == constants::OPERATOR_FINALIZER) {
        return None;
    }
    let operation = if finalizers.is_empty() {
        PatchOperation::Add(AddOperation {
            path: "/metadata/finalizers".to_owned(),
            value: json!([constants::OPERATOR_FINALIZER]),
        })
    } else {
        PatchOperation::Add(AddOperation {
            path: "/metadata/finalizers/-".to_owned(),
            value: json!(constants::OPERATOR_FINALIZER),
        })
    };
    Some(json_patch::Patch(vec![operation]))
}

/// Patch removing only the operator finalizer, finalizers owned by others are kept
pub fn remove_finalizer_patch(finalizers: &[String]) -> Option<json_patch::Patch> {
    let index = finalizers.iter().position(|finalizer| finalizer == constants::OPERATOR_FINALIZER)?;
    let path = format!("/metadata/finalizers/{}", index);
    Some(json_patch::Patch(vec![
        PatchOperation::Test(TestOperation {
            path: path.clone(),
            value: json!(constants::OPERATOR_FINALIZER),
        }),
        PatchOperation::Remove(RemoveOperation { path }),
    ]))
}

/// Adds the operator finalizer record into the K8s resource
pub async fn add_finalizer<K>(client: Client, resource: &K) -> Result<(), kube::Error>
where
    K: kube::Resource<Scope = NamespaceResourceScope, DynamicType = ()> + Clone + Debug + DeserializeOwned,
{
    let name = resource.name_any();
    match add_finalizer_patch(resource.finalizers()) {
        Some(json_patch) => {
            let api: Api<K> = namespaced_api(client, resource);
            let patch: Patch<&Value> = Patch::Json::<&Value>(json_patch);
            api.patch(&name, &PatchParams::default(), &patch).await?;
            debug!("Finalizer added on {name}");
        }
        None => debug!("Finalizer already present on {name}"),
    }
    Ok(())
}

/// Removes the operator finalizer from the resource
pub async fn remove_finalizer<K>(client: Client, resource: &K) -> Result<(), kube::Error>
where
    K: kube::Resource<Scope = NamespaceResourceScope, DynamicType = ()> + Clone + Debug + DeserializeOwned,
{
    let name = resource.name_any();
    let api: Api<K> = namespaced_api(client, resource);
    if api.get_opt(&name).await?.is_none() {
        debug!("{name} already deleted");
        return Ok(());
    }
    if let Some(json_patch) = remove_finalizer_patch(resource.finalizers()) {
        let patch: Patch<&Value> = Patch::Json::<&Value>(json_patch);
        api.patch(&name, &PatchParams::default(), &patch).await?;
        debug!("Finalizer removed from {name}");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_finalizer_patch() {
        let patch = add_finalizer_patch(&[]).unwrap();
        assert_eq!(serde_json::to_value(&patch).unwrap(), json!([{ "op": "add", "path": "/metadata/finalizers", "value": [constants::OPERATOR_FINALIZER] }]));
        let patch = add_finalizer_patch(&["other/finalizer".to_owned()]).unwrap();
        assert_eq!(serde_json::to_value(&patch).unwrap()[0]["path"], "/metadata/finalizers/-");
        assert!(add_finalizer_patch(&[constants::OPERATOR_FINALIZER.to_owned()]).is_none());
    }

    #[test]
    fn test_remove_finalizer_patch_keeps_others() {
        let finalizers = vec!["other/finalizer".to_owned(), constants::OPERATOR_FINALIZER.to_owned()];
        let patch = remove_finalizer_patch(&finalizers).unwrap();
        let mut document = json!({ "metadata": { "finalizers": finalizers } });
        json_patch::patch(&mut document, &patch).unwrap();
        assert_eq!(document, json!({ "metadata": { "finalizers": ["other/finalizer"] } }));
        assert!(remove_finalizer_patch(&["other/finalizer".to_owned()]).is_none());
    }
}
