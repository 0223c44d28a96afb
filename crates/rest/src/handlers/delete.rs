//! Delete handlers: direct by id and conditional by criteria.

use axum::{
    extract::{Path, RawQuery, State},
    response::Response,
};
use tracing::debug;

use crate::error::{RestError, RestResult};
use crate::extractors::{PreferHeader, decode_query, parse_search};
use crate::state::AppState;

use super::proxy_write;

/// Handles DELETE /:resource_type/:id requests.
pub async fn delete_handler(
    State(state): State<AppState>,
    Path((resource_type, id)): Path<(String, String)>,
    prefer: PreferHeader,
) -> RestResult<Response> {
    debug!(resource_type = %resource_type, id = %id, "delete request");

    let outcome = state.engine().delete(&resource_type, &id).await?;
    Ok(proxy_write(&state, &resource_type, &prefer, outcome))
}

/// Handles DELETE /:resource_type?criteria conditional delete requests.
///
/// Matching instances are deleted wherever they live; no match is a 404.
pub async fn conditional_delete_handler(
    State(state): State<AppState>,
    Path(resource_type): Path<String>,
    RawQuery(query): RawQuery,
    prefer: PreferHeader,
) -> RestResult<Response> {
    let query = query.unwrap_or_default();
    let request = parse_search(&resource_type, &decode_query(&query));
    if request.expression.groups.is_empty() {
        return Err(RestError::BadRequest {
            message: "Conditional delete requires search criteria".to_string(),
        });
    }
    debug!(
        resource_type = %resource_type,
        criteria = %query,
        "conditional delete request"
    );

    let outcome = state
        .engine()
        .conditional_delete(&resource_type, &request.expression, prefer.is_strict())
        .await?;
    Ok(proxy_write(&state, &resource_type, &prefer, outcome))
}
