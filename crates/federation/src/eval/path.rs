//! Dotted element paths over resource JSON.

use serde_json::Value;

use crate::types::resource_type;

/// A parsed dotted element path, e.g. `Patient.managingOrganization`.
///
/// When evaluated against an instance whose `resourceType` matches the first
/// segment, that segment acts as a type anchor and is consumed; otherwise
/// every segment is treated as a field name. Arrays are flattened at each
/// step, so `Patient.name.given` collects the given names of every name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathExpr {
    segments: Vec<String>,
}

impl PathExpr {
    /// Parses a dotted path. Empty segments are dropped.
    pub fn parse(path: &str) -> Self {
        Self {
            segments: path
                .split('.')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect(),
        }
    }

    /// The path segments, including any leading type anchor.
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Collects the values this path selects on an instance.
    pub fn evaluate<'a>(&self, instance: &'a Value) -> Vec<&'a Value> {
        let segments = match (self.segments.first(), resource_type(instance)) {
            (Some(first), Some(rt)) if first == rt => &self.segments[1..],
            _ => &self.segments[..],
        };
        if segments.is_empty() {
            return vec![instance];
        }
        walk(instance, segments)
    }
}

impl std::fmt::Display for PathExpr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.segments.join("."))
    }
}

/// Walks a field path from a root value, flattening arrays at each step.
pub fn walk<'a>(root: &'a Value, segments: &[String]) -> Vec<&'a Value> {
    let mut current = vec![root];
    for segment in segments {
        let mut next = Vec::new();
        for value in current {
            collect_field(value, segment, &mut next);
        }
        if next.is_empty() {
            return next;
        }
        current = next;
    }
    current
}

fn collect_field<'a>(value: &'a Value, field: &str, out: &mut Vec<&'a Value>) {
    match value {
        Value::Array(items) => {
            for item in items {
                collect_field(item, field, out);
            }
        }
        Value::Object(map) => match map.get(field) {
            Some(Value::Array(items)) => out.extend(items.iter()),
            Some(other) => out.push(other),
            None => {}
        },
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn patient() -> Value {
        json!({
            "resourceType": "Patient",
            "id": "p1",
            "active": true,
            "name": [
                {"family": "Chalmers", "given": ["Peter", "James"]},
                {"family": "Windsor", "given": ["Pete"]}
            ],
            "managingOrganization": {"reference": "Organization/org1"}
        })
    }

    #[test]
    fn test_anchor_segment_is_consumed() {
        let path = PathExpr::parse("Patient.managingOrganization.reference");
        let instance = patient();
        let values = path.evaluate(&instance);
        assert_eq!(values, vec![&json!("Organization/org1")]);
    }

    #[test]
    fn test_unanchored_path() {
        let path = PathExpr::parse("active");
        assert_eq!(path.evaluate(&patient()), vec![&json!(true)]);
    }

    #[test]
    fn test_mismatched_anchor_selects_nothing() {
        let path = PathExpr::parse("Observation.subject");
        assert!(path.evaluate(&patient()).is_empty());
    }

    #[test]
    fn test_arrays_are_flattened() {
        let path = PathExpr::parse("Patient.name.given");
        let instance = patient();
        let values = path.evaluate(&instance);
        assert_eq!(
            values,
            vec![&json!("Peter"), &json!("James"), &json!("Pete")]
        );
    }

    #[test]
    fn test_bare_type_anchor_selects_instance() {
        let path = PathExpr::parse("Patient");
        let instance = patient();
        assert_eq!(path.evaluate(&instance), vec![&instance]);
    }

    #[test]
    fn test_missing_field_is_empty() {
        let path = PathExpr::parse("Patient.deceasedBoolean");
        assert!(path.evaluate(&patient()).is_empty());
    }
}
