use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

/// Computes the content hash of a rendered payload
pub fn hash_content(payload: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(payload.as_bytes());
    hex::encode(hasher.finalize())
}

/// Returns the payload together with its content hash
pub fn stamp(payload: String) -> (String, String) {
    let hash = hash_content(&payload);
    (payload, hash)
}

/// A write is required whenever no hash was stored yet or the stored one differs
pub fn needs_write(stored_hash: Option<&str>, new_hash: &str) -> bool {
    stored_hash.map_or(true, |stored| stored != new_hash)
}

/// Hash of a multi file bundle. Files are visited in key order and each name is mixed in,
/// so moving content between two keys changes the result.
pub fn hash_files(files: &BTreeMap<String, String>) -> String {
    let mut hasher = Sha256::new();
    for (name, content) in files {
        hasher.update(name.as_bytes());
        hasher.update([0u8]);
        hasher.update(content.as_bytes());
        hasher.update([0u8]);
    }
    hex::encode(hasher.finalize())
}

/// Serializes a JSON document with object keys sorted at every depth, `serde_json::Map`
/// keeps its keys ordered
pub fn canonical_json(value: &Value) -> String {
    value.to_string()
}

/// Content hash of a JSON document, independent of object key order
pub fn hash_json(value: &Value) -> String {
    hash_content(&canonical_json(value))
}
