//! Accessors over schema-loose resource instances.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use serde_json::Value;

use super::Identifier;

/// Returns the declared resource type of an instance, if present.
pub fn resource_type(resource: &Value) -> Option<&str> {
    resource.get("resourceType").and_then(Value::as_str)
}

/// Returns the logical id of an instance, if present.
pub fn resource_id(resource: &Value) -> Option<&str> {
    resource.get("id").and_then(Value::as_str)
}

/// Extracts the entry resources of a searchset bundle.
pub fn bundle_resources(bundle: &Value) -> Vec<Value> {
    bundle
        .get("entry")
        .and_then(Value::as_array)
        .map(|entries| {
            entries
                .iter()
                .filter_map(|entry| entry.get("resource"))
                .cloned()
                .collect()
        })
        .unwrap_or_default()
}

/// Returns the bundle's `next` page link, if present.
pub fn next_link(bundle: &Value) -> Option<&str> {
    bundle
        .get("link")
        .and_then(Value::as_array)?
        .iter()
        .find(|link| link.get("relation").and_then(Value::as_str) == Some("next"))
        .and_then(|link| link.get("url"))
        .and_then(Value::as_str)
}

/// A stable key identifying one instance within an execution.
///
/// `Type/id` when the instance carries a logical id; otherwise a hash over
/// its identifier tokens, so id-less payloads still dedup in visited sets.
pub fn instance_key(resource: &Value) -> String {
    let rt = resource_type(resource).unwrap_or("?");
    if let Some(id) = resource_id(resource) {
        return format!("{}/{}", rt, id);
    }
    let mut hasher = DefaultHasher::new();
    for identifier in Identifier::all_of(resource) {
        identifier.token().hash(&mut hasher);
    }
    format!("{}#{:016x}", rt, hasher.finish())
}
