//! Update handlers: direct by id and conditional by criteria.

use axum::{
    Json,
    extract::{Path, RawQuery, State},
    response::Response,
};
use serde_json::Value;
use tracing::debug;

use meridian_federation::types::resource_id;

use crate::error::{RestError, RestResult};
use crate::extractors::{PreferHeader, decode_query, parse_search};
use crate::state::AppState;

use super::{proxy_write, require_type_match};

/// Handles PUT /:resource_type/:id requests.
pub async fn update_handler(
    State(state): State<AppState>,
    Path((resource_type, id)): Path<(String, String)>,
    prefer: PreferHeader,
    Json(resource): Json<Value>,
) -> RestResult<Response> {
    require_type_match(&resource_type, &resource)?;
    if let Some(body_id) = resource_id(&resource) {
        if body_id != id {
            return Err(RestError::BadRequest {
                message: format!(
                    "Resource id in body ({}) does not match id in URL ({})",
                    body_id, id
                ),
            });
        }
    }
    debug!(resource_type = %resource_type, id = %id, "update request");

    let outcome = state.engine().update(&resource_type, &id, &resource).await?;
    Ok(proxy_write(&state, &resource_type, &prefer, outcome))
}

/// Handles PUT /:resource_type?criteria conditional update requests.
///
/// The criteria run as a full federated search; every matched instance is
/// updated at its routed backend, and the first success (else the first
/// failure) is re-raised. No match at all is a 404.
pub async fn conditional_update_handler(
    State(state): State<AppState>,
    Path(resource_type): Path<String>,
    RawQuery(query): RawQuery,
    prefer: PreferHeader,
    Json(resource): Json<Value>,
) -> RestResult<Response> {
    let query = query.unwrap_or_default();
    let request = parse_search(&resource_type, &decode_query(&query));
    if request.expression.groups.is_empty() {
        return Err(RestError::BadRequest {
            message: "Conditional update requires search criteria".to_string(),
        });
    }
    require_type_match(&resource_type, &resource)?;
    debug!(
        resource_type = %resource_type,
        criteria = %query,
        "conditional update request"
    );

    let outcome = state
        .engine()
        .conditional_update(&resource_type, &request.expression, &resource, prefer.is_strict())
        .await?;
    Ok(proxy_write(&state, &resource_type, &prefer, outcome))
}
