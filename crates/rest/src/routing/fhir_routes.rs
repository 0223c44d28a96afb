//! FHIR route configuration.
//!
//! Defines all routes for the gateway's RESTful surface.

use axum::{
    Router,
    routing::{delete, get, post, put},
};

use crate::handlers;
use crate::state::AppState;

/// Creates all gateway routes.
///
/// # Routes
///
/// ## System-level
/// - `GET /metadata` - CapabilityStatement
/// - `GET /health` - Health check
/// - `GET /_liveness` - Bare liveness probe
///
/// ## Type-level
/// - `GET /{type}` - Federated search
/// - `POST /{type}` - Create
/// - `PUT /{type}?criteria` - Conditional update
/// - `DELETE /{type}?criteria` - Conditional delete
/// - `POST /{type}/_search` - Federated search (POST form)
///
/// ## Instance-level
/// - `GET /{type}/{id}` - Read
/// - `PUT /{type}/{id}` - Update
/// - `DELETE /{type}/{id}` - Delete
pub fn create_routes(state: AppState) -> Router {
    Router::new()
        // System-level routes
        .route("/metadata", get(handlers::capabilities_handler))
        .route("/health", get(handlers::health_handler))
        .route("/_liveness", get(handlers::health::liveness_handler))
        // Type-level routes
        .route("/{resource_type}", get(handlers::search_get_handler))
        .route("/{resource_type}", post(handlers::create_handler))
        .route(
            "/{resource_type}",
            put(handlers::conditional_update_handler),
        )
        .route(
            "/{resource_type}",
            delete(handlers::conditional_delete_handler),
        )
        .route(
            "/{resource_type}/_search",
            post(handlers::search_post_handler),
        )
        // Instance-level routes
        .route("/{resource_type}/{id}", get(handlers::read_handler))
        .route("/{resource_type}/{id}", put(handlers::update_handler))
        .route("/{resource_type}/{id}", delete(handlers::delete_handler))
        // State
        .with_state(state)
}
