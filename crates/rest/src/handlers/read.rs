//! Read handler for retrieving a resource by id.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use tracing::debug;

use crate::error::{RestError, RestResult};
use crate::state::AppState;

/// Handles GET /:resource_type/:id requests.
///
/// The read is tried against each read-eligible backend in route order;
/// the first hit wins.
pub async fn read_handler(
    State(state): State<AppState>,
    Path((resource_type, id)): Path<(String, String)>,
) -> RestResult<Response> {
    debug!(resource_type = %resource_type, id = %id, "read request");

    match state.engine().read(&resource_type, &id).await? {
        Some(resource) => Ok((StatusCode::OK, Json(resource)).into_response()),
        None => Err(RestError::NotFound {
            resource_type,
            id: Some(id),
        }),
    }
}
