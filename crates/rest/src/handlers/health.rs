//! Health check handlers.

use axum::{Json, extract::State, http::StatusCode, response::IntoResponse, response::Response};
use serde_json::json;

use crate::state::AppState;

/// Handles GET /health requests.
pub async fn health_handler(State(state): State<AppState>) -> Response {
    Json(json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
        "members": state.engine().member_count(),
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
    .into_response()
}

/// Handles GET /_liveness requests with a bare 200.
pub async fn liveness_handler() -> StatusCode {
    StatusCode::OK
}
