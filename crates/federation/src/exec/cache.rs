//! The per-chain resource instance cache.

use std::collections::HashMap;

use serde_json::Value;

use crate::types::resource_type;

/// Instances fetched so far during one chain execution, grouped by resource
/// type.
///
/// The cache is append-only for the duration of a chain and discarded
/// afterwards; it exists so multiple dependent hops can project from the
/// same upstream set without re-fetching it. Entries are never deduplicated
/// here.
#[derive(Debug, Clone, Default)]
pub struct TypeCache {
    entries: HashMap<String, Vec<Value>>,
}

impl TypeCache {
    /// Creates an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a cache seeded with the given instances, grouped by their
    /// declared resource type. Instances without one are ignored.
    pub fn seeded(resources: &[Value]) -> Self {
        let mut cache = Self::new();
        for resource in resources {
            if let Some(rt) = resource_type(resource) {
                cache
                    .entries
                    .entry(rt.to_string())
                    .or_default()
                    .push(resource.clone());
            }
        }
        cache
    }

    /// Appends instances to a type's slot, initializing it on first write.
    pub fn append(&mut self, resource_type: &str, resources: Vec<Value>) {
        if resources.is_empty() {
            return;
        }
        self.entries
            .entry(resource_type.to_string())
            .or_default()
            .extend(resources);
    }

    /// The instances cached for a type, if the slot was ever written.
    pub fn get(&self, resource_type: &str) -> Option<&[Value]> {
        self.entries.get(resource_type).map(Vec::as_slice)
    }

    /// Whether the type's slot has been written.
    pub fn contains(&self, resource_type: &str) -> bool {
        self.entries.contains_key(resource_type)
    }

    /// Number of cached instances across all types.
    pub fn len(&self) -> usize {
        self.entries.values().map(Vec::len).sum()
    }

    /// Whether the cache holds no instances.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
