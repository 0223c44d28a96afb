//! Search-parameter definitions: codes, element paths, and chain targets.
//!
//! The registry resolves a `(resource type, parameter code)` pair to the
//! element path the parameter searches on and, for reference parameters, the
//! resource types it can point at. A built-in table covers the common R4
//! parameters; additional definitions can be paged in from a directory
//! server's `SearchParameter` resources at startup.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;

use crate::types::resource_type;

/// One search-parameter definition for a resource type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchParamDef {
    /// The parameter code as it appears in query strings.
    pub code: String,
    /// Element path relative to the resource root, e.g. `subject` or
    /// `name.family`.
    pub path: String,
    /// Target resource types, for reference parameters.
    pub targets: Vec<String>,
}

impl SearchParamDef {
    fn new(code: &str, path: &str, targets: &[&str]) -> Self {
        Self {
            code: code.to_string(),
            path: path.to_string(),
            targets: targets.iter().map(|t| t.to_string()).collect(),
        }
    }

    /// Whether this parameter searches across references.
    pub fn is_reference(&self) -> bool {
        !self.targets.is_empty()
    }
}

/// Two-level index of search-parameter definitions.
///
/// Lookups fall back from the concrete resource type to the `Resource` base,
/// which carries the cross-type parameters such as `_id`.
#[derive(Debug, Clone, Default)]
pub struct SearchPathRegistry {
    by_type: HashMap<String, HashMap<String, Arc<SearchParamDef>>>,
}

impl SearchPathRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry seeded with the built-in R4 parameter table.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        for (base, code, path, targets) in DEFAULT_PARAMS {
            registry.register(base, SearchParamDef::new(code, path, targets));
        }
        registry
    }

    /// Registers a definition under a resource type (or `Resource`).
    pub fn register(&mut self, resource_type: &str, def: SearchParamDef) {
        self.by_type
            .entry(resource_type.to_string())
            .or_default()
            .insert(def.code.clone(), Arc::new(def));
    }

    /// Resolves a parameter code for a resource type, falling back to the
    /// `Resource` base.
    pub fn resolve(&self, resource_type: &str, code: &str) -> Option<Arc<SearchParamDef>> {
        self.by_type
            .get(resource_type)
            .and_then(|params| params.get(code))
            .or_else(|| self.by_type.get("Resource").and_then(|params| params.get(code)))
            .cloned()
    }

    /// Whether the parameter code is defined for the resource type.
    pub fn is_known(&self, resource_type: &str, code: &str) -> bool {
        self.resolve(resource_type, code).is_some()
    }

    /// The element path a parameter searches on, defaulting to the code
    /// itself when no definition exists.
    pub fn element_path(&self, resource_type: &str, code: &str) -> String {
        match self.resolve(resource_type, code) {
            Some(def) => def.path.clone(),
            None => code.to_string(),
        }
    }

    /// Reference targets for a parameter, empty when unknown or not a
    /// reference parameter.
    pub fn targets(&self, resource_type: &str, code: &str) -> Vec<String> {
        self.resolve(resource_type, code)
            .map(|def| def.targets.clone())
            .unwrap_or_default()
    }

    /// Registers the definitions carried by one `SearchParameter` resource.
    ///
    /// Returns the number of `(base, code)` entries added. Resources without
    /// a usable code or expression are skipped.
    pub fn apply_search_parameter(&mut self, resource: &Value) -> usize {
        if resource_type(resource) != Some("SearchParameter") {
            return 0;
        }
        let Some(code) = resource["code"].as_str() else {
            return 0;
        };
        let expression = resource["expression"].as_str().unwrap_or_default();
        let targets: Vec<&str> = resource["target"]
            .as_array()
            .map(|items| items.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default();
        let bases: Vec<&str> = resource["base"]
            .as_array()
            .map(|items| items.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default();

        let mut added = 0;
        for base in bases {
            let Some(path) = element_path_for_base(expression, base) else {
                continue;
            };
            self.register(base, SearchParamDef::new(code, &path, &targets));
            added += 1;
        }
        added
    }

    /// Number of resource types with at least one definition.
    pub fn type_count(&self) -> usize {
        self.by_type.len()
    }
}

/// Extracts the element path for one base type from a FHIRPath expression
/// such as `Patient.name | Person.name` or
/// `Observation.subject.where(resolve() is Patient)`.
fn element_path_for_base(expression: &str, base: &str) -> Option<String> {
    for alternative in expression.split('|') {
        let alternative = alternative.trim();
        let Some(rest) = alternative.strip_prefix(base) else {
            continue;
        };
        let Some(path) = rest.strip_prefix('.') else {
            continue;
        };
        let path = match path.find(".where(") {
            Some(at) => &path[..at],
            None => path,
        };
        let path = match path.find(" as ") {
            Some(at) => &path[..at],
            None => path,
        };
        if !path.is_empty() {
            return Some(path.to_string());
        }
    }
    None
}

#[rustfmt::skip]
const DEFAULT_PARAMS: &[(&str, &str, &str, &[&str])] = &[
    ("Resource", "_id", "id", &[]),
    ("Resource", "_lastUpdated", "meta.lastUpdated", &[]),
    ("Resource", "identifier", "identifier", &[]),

    ("Patient", "identifier", "identifier", &[]),
    ("Patient", "active", "active", &[]),
    ("Patient", "name", "name", &[]),
    ("Patient", "family", "name.family", &[]),
    ("Patient", "given", "name.given", &[]),
    ("Patient", "birthdate", "birthDate", &[]),
    ("Patient", "gender", "gender", &[]),
    ("Patient", "telecom", "telecom", &[]),
    ("Patient", "address-city", "address.city", &[]),
    ("Patient", "general-practitioner", "generalPractitioner", &["Practitioner", "PractitionerRole", "Organization"]),
    ("Patient", "organization", "managingOrganization", &["Organization"]),
    ("Patient", "link", "link.other", &["Patient", "RelatedPerson"]),

    ("Encounter", "identifier", "identifier", &[]),
    ("Encounter", "status", "status", &[]),
    ("Encounter", "class", "class", &[]),
    ("Encounter", "type", "type", &[]),
    ("Encounter", "date", "period", &[]),
    ("Encounter", "subject", "subject", &["Patient", "Group"]),
    ("Encounter", "patient", "subject", &["Patient"]),
    ("Encounter", "participant", "participant.individual", &["Practitioner", "PractitionerRole", "RelatedPerson"]),
    ("Encounter", "service-provider", "serviceProvider", &["Organization"]),
    ("Encounter", "part-of", "partOf", &["Encounter"]),
    ("Encounter", "location", "location.location", &["Location"]),

    ("Observation", "identifier", "identifier", &[]),
    ("Observation", "status", "status", &[]),
    ("Observation", "code", "code", &[]),
    ("Observation", "category", "category", &[]),
    ("Observation", "date", "effectiveDateTime", &[]),
    ("Observation", "subject", "subject", &["Patient", "Group", "Device", "Location"]),
    ("Observation", "patient", "subject", &["Patient"]),
    ("Observation", "encounter", "encounter", &["Encounter"]),
    ("Observation", "performer", "performer", &["Practitioner", "PractitionerRole", "Organization", "CareTeam", "Patient", "RelatedPerson"]),
    ("Observation", "has-member", "hasMember", &["Observation"]),
    ("Observation", "derived-from", "derivedFrom", &["Observation"]),

    ("Condition", "identifier", "identifier", &[]),
    ("Condition", "code", "code", &[]),
    ("Condition", "clinical-status", "clinicalStatus", &[]),
    ("Condition", "onset-date", "onsetDateTime", &[]),
    ("Condition", "subject", "subject", &["Patient", "Group"]),
    ("Condition", "patient", "subject", &["Patient"]),
    ("Condition", "encounter", "encounter", &["Encounter"]),

    ("MedicationRequest", "identifier", "identifier", &[]),
    ("MedicationRequest", "status", "status", &[]),
    ("MedicationRequest", "intent", "intent", &[]),
    ("MedicationRequest", "subject", "subject", &["Patient", "Group"]),
    ("MedicationRequest", "patient", "subject", &["Patient"]),
    ("MedicationRequest", "encounter", "encounter", &["Encounter"]),
    ("MedicationRequest", "medication", "medicationReference", &["Medication"]),
    ("MedicationRequest", "requester", "requester", &["Practitioner", "PractitionerRole", "Organization", "Patient", "RelatedPerson", "Device"]),

    ("DiagnosticReport", "identifier", "identifier", &[]),
    ("DiagnosticReport", "status", "status", &[]),
    ("DiagnosticReport", "code", "code", &[]),
    ("DiagnosticReport", "category", "category", &[]),
    ("DiagnosticReport", "date", "effectiveDateTime", &[]),
    ("DiagnosticReport", "subject", "subject", &["Patient", "Group", "Device", "Location"]),
    ("DiagnosticReport", "patient", "subject", &["Patient"]),
    ("DiagnosticReport", "encounter", "encounter", &["Encounter"]),
    ("DiagnosticReport", "result", "result", &["Observation"]),
    ("DiagnosticReport", "performer", "performer", &["Practitioner", "PractitionerRole", "Organization", "CareTeam"]),

    ("Procedure", "identifier", "identifier", &[]),
    ("Procedure", "status", "status", &[]),
    ("Procedure", "code", "code", &[]),
    ("Procedure", "date", "performedDateTime", &[]),
    ("Procedure", "subject", "subject", &["Patient", "Group"]),
    ("Procedure", "patient", "subject", &["Patient"]),
    ("Procedure", "encounter", "encounter", &["Encounter"]),
    ("Procedure", "performer", "performer.actor", &["Practitioner", "PractitionerRole", "Organization"]),

    ("AllergyIntolerance", "identifier", "identifier", &[]),
    ("AllergyIntolerance", "clinical-status", "clinicalStatus", &[]),
    ("AllergyIntolerance", "code", "code", &[]),
    ("AllergyIntolerance", "patient", "patient", &["Patient"]),

    ("Immunization", "identifier", "identifier", &[]),
    ("Immunization", "status", "status", &[]),
    ("Immunization", "date", "occurrenceDateTime", &[]),
    ("Immunization", "vaccine-code", "vaccineCode", &[]),
    ("Immunization", "patient", "patient", &["Patient"]),

    ("Organization", "identifier", "identifier", &[]),
    ("Organization", "name", "name", &[]),
    ("Organization", "active", "active", &[]),
    ("Organization", "type", "type", &[]),
    ("Organization", "address-city", "address.city", &[]),
    ("Organization", "partof", "partOf", &["Organization"]),

    ("Practitioner", "identifier", "identifier", &[]),
    ("Practitioner", "name", "name", &[]),
    ("Practitioner", "family", "name.family", &[]),
    ("Practitioner", "given", "name.given", &[]),
    ("Practitioner", "active", "active", &[]),

    ("PractitionerRole", "identifier", "identifier", &[]),
    ("PractitionerRole", "specialty", "specialty", &[]),
    ("PractitionerRole", "practitioner", "practitioner", &["Practitioner"]),
    ("PractitionerRole", "organization", "organization", &["Organization"]),

    ("Location", "identifier", "identifier", &[]),
    ("Location", "name", "name", &[]),
    ("Location", "address-city", "address.city", &[]),
    ("Location", "organization", "managingOrganization", &["Organization"]),

    ("Medication", "identifier", "identifier", &[]),
    ("Medication", "code", "code", &[]),
    ("Medication", "status", "status", &[]),

    ("Group", "identifier", "identifier", &[]),
    ("Group", "type", "type", &[]),
    ("Group", "member", "member.entity", &["Patient", "Practitioner", "PractitionerRole", "Device", "Medication", "Substance", "Group"]),

    ("ServiceRequest", "identifier", "identifier", &[]),
    ("ServiceRequest", "status", "status", &[]),
    ("ServiceRequest", "code", "code", &[]),
    ("ServiceRequest", "subject", "subject", &["Patient", "Group", "Location", "Device"]),
    ("ServiceRequest", "patient", "subject", &["Patient"]),
    ("ServiceRequest", "encounter", "encounter", &["Encounter"]),
    ("ServiceRequest", "requester", "requester", &["Practitioner", "PractitionerRole", "Organization", "Patient", "RelatedPerson", "Device"]),

    ("CarePlan", "identifier", "identifier", &[]),
    ("CarePlan", "status", "status", &[]),
    ("CarePlan", "category", "category", &[]),
    ("CarePlan", "subject", "subject", &["Patient", "Group"]),
    ("CarePlan", "patient", "subject", &["Patient"]),
    ("CarePlan", "encounter", "encounter", &["Encounter"]),

    ("Device", "identifier", "identifier", &[]),
    ("Device", "status", "status", &[]),
    ("Device", "type", "type", &[]),
    ("Device", "patient", "patient", &["Patient"]),

    ("Specimen", "identifier", "identifier", &[]),
    ("Specimen", "subject", "subject", &["Patient", "Group", "Device", "Substance", "Location"]),
    ("Specimen", "patient", "subject", &["Patient"]),

    ("RelatedPerson", "identifier", "identifier", &[]),
    ("RelatedPerson", "name", "name", &[]),
    ("RelatedPerson", "patient", "patient", &["Patient"]),

    ("Coverage", "identifier", "identifier", &[]),
    ("Coverage", "beneficiary", "beneficiary", &["Patient"]),
    ("Coverage", "patient", "beneficiary", &["Patient"]),
    ("Coverage", "payor", "payor", &["Organization", "Patient", "RelatedPerson"]),
];

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_typed_lookup() {
        let registry = SearchPathRegistry::with_defaults();
        let def = registry.resolve("Encounter", "patient").unwrap();
        assert_eq!(def.path, "subject");
        assert_eq!(def.targets, vec!["Patient"]);
        assert!(def.is_reference());
    }

    #[test]
    fn test_resource_base_fallback() {
        let registry = SearchPathRegistry::with_defaults();
        assert!(registry.is_known("Encounter", "_id"));
        assert_eq!(registry.element_path("CareTeam", "_id"), "id");
    }

    #[test]
    fn test_identity_path_fallback() {
        let registry = SearchPathRegistry::with_defaults();
        assert!(!registry.is_known("Patient", "favorite-color"));
        assert_eq!(registry.element_path("Patient", "favorite-color"), "favorite-color");
    }

    #[test]
    fn test_targets_for_non_reference_param() {
        let registry = SearchPathRegistry::with_defaults();
        assert!(registry.targets("Patient", "family").is_empty());
    }

    #[test]
    fn test_apply_search_parameter() {
        let mut registry = SearchPathRegistry::new();
        let resource = json!({
            "resourceType": "SearchParameter",
            "id": "clinical-patient",
            "code": "patient",
            "base": ["Observation", "Condition"],
            "type": "reference",
            "expression": "Observation.subject.where(resolve() is Patient) | Condition.subject.where(resolve() is Patient)",
            "target": ["Patient"]
        });
        assert_eq!(registry.apply_search_parameter(&resource), 2);
        assert_eq!(registry.element_path("Condition", "patient"), "subject");
        assert_eq!(registry.targets("Observation", "patient"), vec!["Patient"]);
    }

    #[test]
    fn test_apply_skips_non_search_parameter() {
        let mut registry = SearchPathRegistry::new();
        assert_eq!(
            registry.apply_search_parameter(&json!({"resourceType": "Patient"})),
            0
        );
    }
}
