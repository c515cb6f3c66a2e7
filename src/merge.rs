use serde::{de::DeserializeOwned, Serialize};
use serde_json::{Map, Value};

/// A field of the observed object that survives the overwrite with the desired one
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Carry {
    /// Value at a JSON pointer, copied when present on the observed object
    Pointer(&'static str),
    /// Cluster assigned `nodePort` of the named service port, only for NodePort services
    NodePort(&'static str),
    /// Labels at the pointer that exist on the observed object only, injected by third parties
    ForeignLabels(&'static str),
}

pub const OBSERVED_WINS: &[Carry] = &[
    Carry::Pointer("/metadata/resourceVersion"),
    Carry::Pointer("/spec/clusterIP"),
    Carry::Pointer("/spec/clusterIPs"),
    Carry::NodePort(crate::constants::GRAFANA_HTTP_PORT_NAME),
    Carry::ForeignLabels("/spec/template/metadata/labels"),
];

/// Sets `value` at an object-only JSON pointer, creating the missing intermediate objects
fn set_pointer(target: &mut Value, pointer: &str, value: Value) {
    let mut current = target;
    for segment in pointer.split('/').skip(1) {
        if !current.is_object() {
            *current = Value::Object(Map::new());
        }
        let Value::Object(map) = current else { return };
        current = map.entry(segment.to_owned()).or_insert(Value::Null);
    }
    *current = value;
}

impl Carry {
    fn apply(&self, desired: &mut Value, observed: &Value) {
        match self {
            Carry::Pointer(pointer) => {
                if let Some(value) = observed.pointer(pointer).filter(|value| !value.is_null()) {
                    set_pointer(desired, pointer, value.clone());
                }
            }
            Carry::NodePort(port_name) => {
                if desired.pointer("/spec/type").and_then(Value::as_str) != Some("NodePort") {
                    return;
                }
                let observed_node_port = observed
                    .pointer("/spec/ports")
                    .and_then(Value::as_array)
                    .and_then(|ports| ports.iter().find(|port| port["name"] == *port_name))
                    .and_then(|port| port.get("nodePort"))
                    .filter(|node_port| !node_port.is_null())
                    .cloned();
                let Some(node_port) = observed_node_port else { return };
                if let Some(ports) = desired.pointer_mut("/spec/ports").and_then(Value::as_array_mut) {
                    for port in ports.iter_mut().filter(|port| port["name"] == *port_name) {
                        if let Some(port) = port.as_object_mut() {
                            if port.get("nodePort").map_or(true, Value::is_null) {
                                port.insert("nodePort".to_owned(), node_port.clone());
                            }
                        }
                    }
                }
            }
            Carry::ForeignLabels(pointer) => {
                let Some(observed_labels) = observed.pointer(pointer).and_then(Value::as_object) else { return };
                let mut labels = desired.pointer(pointer).and_then(Value::as_object).cloned().unwrap_or_default();
                for (key, value) in observed_labels {
                    labels.entry(key.to_owned()).or_insert(value.clone());
                }
                set_pointer(desired, pointer, Value::Object(labels));
            }
        }
    }
}

pub fn merge_values(desired: Value, observed: &Value) -> Value {
    let mut merged = desired;
    for carry in OBSERVED_WINS {
        carry.apply(&mut merged, observed);
    }
    merged
}

/// Whether every field set on `desired` holds the same value on `observed`.
/// Fields only the server populates are ignored, unset and empty desired values match absence.
pub fn contains(observed: &Value, desired: &Value) -> bool {
    match (observed, desired) {
        (_, Value::Null) => true,
        (Value::Object(observed), Value::Object(desired)) => desired.iter().all(|(key, value)| match observed.get(key) {
            Some(observed_value) => contains(observed_value, value),
            None => is_empty(value),
        }),
        (Value::Array(observed), Value::Array(desired)) => {
            observed.len() == desired.len() && observed.iter().zip(desired).all(|(observed, desired)| contains(observed, desired))
        }
        (Value::Null, desired) => is_empty(desired),
        (observed, desired) => observed == desired,
    }
}

fn is_empty(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Object(map) => map.values().all(is_empty),
        Value::Array(items) => items.is_empty(),
        _ => false,
    }
}

/// Overwrites `observed` with `desired`, keeping the observed-wins fields
pub fn merge<K: Serialize + DeserializeOwned>(desired: &K, observed: &K) -> Result<K, serde_json::Error> {
    let merged = merge_values(serde_json::to_value(desired)?, &serde_json::to_value(observed)?);
    serde_json::from_value(merged)
}
