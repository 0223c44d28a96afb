//! Business identifiers.
//!
//! Backends assign their own local record ids; the only identity that
//! survives federation is the business identifier, a (system, value) pair.
//! Identifiers are rendered as `system|value` search tokens when sent back
//! out as OR-batched filters.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A (system, value) business identifier pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Identifier {
    /// The naming system the value belongs to, when declared.
    pub system: Option<String>,
    /// The identifier value.
    pub value: String,
}

impl Identifier {
    /// Creates an identifier with a system.
    pub fn new(system: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            system: Some(system.into()),
            value: value.into(),
        }
    }

    /// Creates an identifier without a system.
    pub fn bare(value: impl Into<String>) -> Self {
        Self {
            system: None,
            value: value.into(),
        }
    }

    /// Renders the search token form: `system|value`, or the bare value
    /// when no system is declared.
    pub fn token(&self) -> String {
        match &self.system {
            Some(system) => format!("{}|{}", system, self.value),
            None => self.value.clone(),
        }
    }

    /// Reads one identifier element from instance JSON.
    ///
    /// Elements without a usable `value` are skipped (returns `None`).
    pub fn from_json(element: &Value) -> Option<Self> {
        let value = element.get("value")?.as_str()?;
        if value.is_empty() {
            return None;
        }
        let system = element
            .get("system")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(str::to_string);
        Some(Self {
            system,
            value: value.to_string(),
        })
    }

    /// Collects every declared identifier of a resource instance, in
    /// declaration order.
    pub fn all_of(resource: &Value) -> Vec<Self> {
        match resource.get("identifier") {
            Some(Value::Array(elements)) => {
                elements.iter().filter_map(Self::from_json).collect()
            }
            Some(element @ Value::Object(_)) => Self::from_json(element).into_iter().collect(),
            _ => Vec::new(),
        }
    }

    /// Returns the first declared identifier of a resource instance.
    pub fn first_of(resource: &Value) -> Option<Self> {
        Self::all_of(resource).into_iter().next()
    }

    /// Looks up the value declared under `system`, if any.
    pub fn value_for_system<'a>(identifiers: &'a [Self], system: &str) -> Option<&'a str> {
        identifiers
            .iter()
            .find(|id| id.system.as_deref() == Some(system))
            .map(|id| id.value.as_str())
    }
}
