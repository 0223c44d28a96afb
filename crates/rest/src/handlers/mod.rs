//! Request handlers for the gateway's FHIR operations.

pub mod capabilities;
pub mod create;
pub mod delete;
pub mod health;
pub mod read;
pub mod search;
pub mod update;

pub use capabilities::capabilities_handler;
pub use create::create_handler;
pub use delete::{conditional_delete_handler, delete_handler};
pub use health::{health_handler, liveness_handler};
pub use read::read_handler;
pub use search::{search_get_handler, search_post_handler};
pub use update::{conditional_update_handler, update_handler};

use axum::{
    Json,
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use meridian_federation::client::WriteOutcome;
use meridian_federation::types::{resource_id, resource_type};
use serde_json::Value;

use crate::error::{RestError, RestResult};
use crate::extractors::PreferHeader;
use crate::state::AppState;

/// Turns a routed write outcome into the gateway's response.
///
/// The backend's status is re-raised as-is. The body is forwarded when the
/// backend returned one and the client did not prefer a minimal return. On
/// success the Location header points at the gateway's own address for the
/// written instance, falling back to the backend's Location verbatim.
pub(crate) fn proxy_write(
    state: &AppState,
    resource_type: &str,
    prefer: &PreferHeader,
    outcome: WriteOutcome,
) -> Response {
    let status = StatusCode::from_u16(outcome.status).unwrap_or(StatusCode::BAD_GATEWAY);
    let location = if outcome.is_success() {
        outcome
            .body
            .as_ref()
            .and_then(resource_id)
            .map(|id| format!("{}/{}/{}", state.base_url(), resource_type, id))
            .or(outcome.location)
    } else {
        None
    };

    let mut response = match outcome.body {
        Some(body) if !prefer.is_minimal() => (status, Json(body)).into_response(),
        _ => status.into_response(),
    };
    if let Some(location) = location {
        if let Ok(value) = HeaderValue::from_str(&location) {
            response.headers_mut().insert(header::LOCATION, value);
        }
    }
    response
}

/// Rejects write bodies whose declared type does not match the request URL.
pub(crate) fn require_type_match(expected: &str, resource: &Value) -> RestResult<()> {
    match resource_type(resource) {
        Some(actual) if actual == expected => Ok(()),
        Some(actual) => Err(RestError::BadRequest {
            message: format!(
                "Resource type in body ({}) does not match resource type in URL ({})",
                actual, expected
            ),
        }),
        None => Err(RestError::BadRequest {
            message: "Resource body is missing resourceType".to_string(),
        }),
    }
}
