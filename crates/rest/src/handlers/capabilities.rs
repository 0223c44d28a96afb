//! Capability statement handler.

use axum::{Json, extract::State, response::IntoResponse, response::Response};
use serde_json::{Value, json};

use crate::state::AppState;

const SUPPORTED_INTERACTIONS: &[&str] = &["read", "search-type", "create", "update", "delete"];

/// Handles GET /metadata requests.
///
/// The resource list is derived from the configured routing topology; every
/// explicitly routed type is advertised with the gateway's full interaction
/// set.
pub async fn capabilities_handler(State(state): State<AppState>) -> Response {
    let mut types: Vec<&str> = state.engine().routes().configured_types().collect();
    types.sort_unstable();

    let resources: Vec<Value> = types
        .iter()
        .map(|resource_type| {
            json!({
                "type": resource_type,
                "interaction": SUPPORTED_INTERACTIONS
                    .iter()
                    .map(|code| json!({"code": code}))
                    .collect::<Vec<_>>(),
            })
        })
        .collect();

    let statement = json!({
        "resourceType": "CapabilityStatement",
        "status": "active",
        "date": chrono::Utc::now().to_rfc3339(),
        "kind": "instance",
        "software": {
            "name": "Meridian Federation Gateway",
            "version": env!("CARGO_PKG_VERSION"),
        },
        "implementation": {
            "description": "Federated FHIR endpoint over partitioned backends",
            "url": state.base_url(),
        },
        "fhirVersion": "4.0.1",
        "format": ["application/fhir+json"],
        "rest": [{
            "mode": "server",
            "resource": resources,
        }],
    });

    Json(statement).into_response()
}
