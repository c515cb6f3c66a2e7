use crate::constants;
use std::collections::BTreeMap;

pub fn common_lables(name: String, instance: Option<String>, component: Option<String>) -> BTreeMap<String, String> {
    let mut labels: BTreeMap<String, String> = BTreeMap::new();
    labels.insert(constants::LABEL_KUBERNETES_NAME.to_owned(), name);
    match instance {
        Some(instance) => {
            labels.insert(constants::LABEL_KUBERNETES_INSTANCE.to_owned(), instance);
        }
        None => {}
    }
    match component {
        Some(component) => {
            labels.insert(constants::LABEL_KUBERNETES_COMPONENT.to_owned(), component);
        }
        None => {}
    }
    labels.insert(constants::LABEL_KUBERNETES_MANAGED_BY.to_owned(), constants::OPERATOR_REPORTER.to_owned());
    return labels;
}

/// Labels every object derived from a Grafana instance carries
pub fn grafana_labels(instance_name: &str) -> BTreeMap<String, String> {
    let mut labels = common_lables("ibm-monitoring".to_owned(), Some(instance_name.to_owned()), Some(constants::GRAFANA_APP.to_owned()));
    labels.extend(selector_labels());
    labels
}

/// Stable selector shared by the workload, its pods and the service
pub fn selector_labels() -> BTreeMap<String, String> {
    let mut labels: BTreeMap<String, String> = BTreeMap::new();
    labels.insert(constants::LABEL_APP.to_owned(), constants::GRAFANA_APP.to_owned());
    labels.insert(constants::LABEL_COMPONENT.to_owned(), constants::GRAFANA_APP.to_owned());
    labels
}

/// Copies every entry of `from` into `to`, overwriting existing keys
pub fn merge_maps(to: &mut BTreeMap<String, String>, from: Option<&BTreeMap<String, String>>) {
    if let Some(from) = from {
        for (key, value) in from {
            to.insert(key.to_owned(), value.to_owned());
        }
    }
}
