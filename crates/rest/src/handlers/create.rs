//! Create handler for new resources.

use axum::{
    Json,
    extract::{Path, State},
    response::Response,
};
use serde_json::Value;
use tracing::debug;

use crate::error::RestResult;
use crate::extractors::PreferHeader;
use crate::state::AppState;

use super::{proxy_write, require_type_match};

/// Handles POST /:resource_type requests.
///
/// Routing rules pick the one backend that owns the instance; its response
/// status and body are re-raised to the client.
pub async fn create_handler(
    State(state): State<AppState>,
    Path(resource_type): Path<String>,
    prefer: PreferHeader,
    Json(resource): Json<Value>,
) -> RestResult<Response> {
    require_type_match(&resource_type, &resource)?;
    debug!(resource_type = %resource_type, "create request");

    let outcome = state.engine().create(&resource_type, &resource).await?;
    Ok(proxy_write(&state, &resource_type, &prefer, outcome))
}
