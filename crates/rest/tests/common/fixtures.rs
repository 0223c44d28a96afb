//! Canned FHIR instances for federation scenarios.

use serde_json::{Value, json};

/// Identifier system used for patient MRNs across test backends.
pub const MRN_SYSTEM: &str = "http://hospital.example/mrn";

/// A second identifier system, outside the usual allow-lists.
pub const SSN_SYSTEM: &str = "http://hospital.example/ssn";

/// Identifier system for lab observations.
pub const OBS_SYSTEM: &str = "http://lab.example/obs";

/// A patient whose business identity is an MRN token.
pub fn patient(id: &str, family: &str, mrn: &str) -> Value {
    let mut resource = patient_body(family, mrn);
    resource["id"] = json!(id);
    resource
}

/// A patient body without a logical id, as submitted on create.
pub fn patient_body(family: &str, mrn: &str) -> Value {
    json!({
        "resourceType": "Patient",
        "active": true,
        "name": [{"family": family}],
        "identifier": [{"system": MRN_SYSTEM, "value": mrn}]
    })
}

/// A patient carrying both an MRN and an SSN identifier.
pub fn patient_with_ssn(id: &str, family: &str, mrn: &str, ssn: &str) -> Value {
    json!({
        "resourceType": "Patient",
        "id": id,
        "active": true,
        "name": [{"family": family}],
        "identifier": [
            {"system": MRN_SYSTEM, "value": mrn},
            {"system": SSN_SYSTEM, "value": ssn}
        ]
    })
}

/// An encounter referencing its patient by literal id plus inline business
/// identifier, the way partition-aware sources publish references.
pub fn encounter(id: &str, patient_id: &str, mrn: &str, status: &str) -> Value {
    json!({
        "resourceType": "Encounter",
        "id": id,
        "status": status,
        "subject": {
            "reference": format!("Patient/{}", patient_id),
            "identifier": {"system": MRN_SYSTEM, "value": mrn}
        }
    })
}

/// An encounter whose subject reference carries no inline identifier, so
/// correlation has to dereference it.
pub fn encounter_by_reference(id: &str, patient_id: &str, status: &str) -> Value {
    json!({
        "resourceType": "Encounter",
        "id": id,
        "status": status,
        "subject": {"reference": format!("Patient/{}", patient_id)}
    })
}

/// A lab observation that may point at one child through `hasMember`.
pub fn observation(id: &str, ident: &str, member: Option<(&str, &str)>) -> Value {
    let mut resource = json!({
        "resourceType": "Observation",
        "id": id,
        "status": "final",
        "identifier": [{"system": OBS_SYSTEM, "value": ident}]
    });
    if let Some((member_id, member_ident)) = member {
        resource["hasMember"] = json!([{
            "reference": format!("Observation/{}", member_id),
            "identifier": {"system": OBS_SYSTEM, "value": member_ident}
        }]);
    }
    resource
}
