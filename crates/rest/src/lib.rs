//! # meridian-rest - FHIR RESTful Gateway Surface
//!
//! This crate provides the HTTP surface of the Meridian Federation Gateway:
//! a single [FHIR RESTful API](https://hl7.org/fhir/http.html) endpoint over
//! a fleet of partitioned FHIR backends. Requests are parsed here and
//! executed by the `meridian-federation` engine; responses come back as
//! merged searchset Bundles or re-raised backend outcomes.
//!
//! ## Features
//!
//! - **Federated search**: fan-out with chained parameters, `_has`,
//!   `_include`/`_revinclude` and multi-value OR, merged into one Bundle
//! - **Gateway paging**: complete federated results are snapshotted and
//!   served page by page through `_getpages` continuation links
//! - **Routed writes**: create, update, delete and their conditional forms
//!   are routed to the owning backend by the configured rules
//! - **Strict handling**: `Prefer: handling=strict` turns unknown search
//!   parameters into errors instead of silently ignoring them
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//!
//! use meridian_federation::{FederationEngine, config::FederationConfig};
//! use meridian_rest::{ServerConfig, create_app_with_config};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = ServerConfig::from_env();
//!     let topology = FederationConfig::from_yaml_file(&config.topology)?;
//!     let (engine, _warnings) = FederationEngine::from_config(&topology).await?;
//!
//!     let app = create_app_with_config(Arc::new(engine), config);
//!
//!     let listener = tokio::net::TcpListener::bind("127.0.0.1:8080").await?;
//!     axum::serve(listener, app).await?;
//!
//!     Ok(())
//! }
//! ```
//!
//! ## API Endpoints
//!
//! | Interaction | HTTP Method | URL Pattern |
//! |------------|-------------|-------------|
//! | search | GET/POST | `/[type]?params` or `/[type]/_search` |
//! | paging continuation | GET | `/[type]?_getpages=[cursor]` |
//! | read | GET | `/[type]/[id]` |
//! | create | POST | `/[type]` |
//! | update | PUT | `/[type]/[id]` |
//! | conditional update | PUT | `/[type]?criteria` |
//! | delete | DELETE | `/[type]/[id]` |
//! | conditional delete | DELETE | `/[type]?criteria` |
//! | capabilities | GET | `/metadata` |
//! | health | GET | `/health` |
//!
//! ## Error Handling
//!
//! All errors are returned as FHIR [OperationOutcome](https://hl7.org/fhir/operationoutcome.html)
//! resources with appropriate HTTP status codes:
//!
//! | HTTP Status | FHIR Issue Code | Description |
//! |-------------|-----------------|-------------|
//! | 400 | invalid | Bad request / rejected search parameter |
//! | 404 | not-found | Resource or conditional match not found |
//! | 410 | deleted | Paging continuation expired |
//! | 422 | processing | No backend eligible for the write |
//! | 502 | transient | Backend unreachable |
//! | 500 | exception | Internal gateway error |
//!
//! Writes that reach a backend re-raise that backend's own status.
//!
//! ## Configuration
//!
//! The gateway process is configured via environment variables (see
//! [`config`]); the federation topology itself lives in the YAML file named
//! by `MFG_TOPOLOGY`.
//!
//! ## Architecture
//!
//! - [`error`] - Error types and OperationOutcome generation
//! - [`config`] - Server configuration
//! - [`state`] - Application state (engine, page store, configuration)
//! - [`extractors`] - Query-string and Prefer header parsing
//! - [`handlers`] - HTTP request handlers for each interaction
//! - [`responses`] - Bundle and OperationOutcome building
//! - [`routing`] - Route configuration

// Enforce documentation
#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod config;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod responses;
pub mod routing;
pub mod state;

// Re-export commonly used types
pub use config::ServerConfig;
pub use error::{RestError, RestResult};
pub use state::AppState;

use std::sync::Arc;

use axum::Router;
use meridian_federation::FederationEngine;
use meridian_federation::paging::InMemoryPageStore;
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::info;

/// Creates the Axum application with default configuration.
///
/// This is a convenience function that creates the app with default
/// settings. For more control, use [`create_app_with_config`].
pub fn create_app(engine: Arc<FederationEngine>) -> Router {
    create_app_with_config(engine, ServerConfig::default())
}

/// Creates the Axum application with custom configuration.
///
/// Sets up the complete gateway surface: all handlers, the pagination
/// snapshot store, tracing, timeouts and CORS.
pub fn create_app_with_config(engine: Arc<FederationEngine>, config: ServerConfig) -> Router {
    info!(members = engine.member_count(), "Creating gateway REST surface");

    let pages = Arc::new(InMemoryPageStore::new(config.page_cache_size));
    let state = AppState::new(engine, pages, config.clone());

    // Build the router with all gateway routes
    let router = routing::fhir_routes::create_routes(state);

    // Build middleware stack
    let service_builder = ServiceBuilder::new()
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::with_status_code(
            axum::http::StatusCode::REQUEST_TIMEOUT,
            std::time::Duration::from_secs(config.request_timeout),
        ));

    // Add CORS if enabled
    let router = if config.enable_cors {
        let cors = build_cors_layer(&config);
        router.layer(cors)
    } else {
        router
    };

    // Apply remaining middleware
    router.layer(service_builder)
}

/// Builds the CORS layer based on configuration.
fn build_cors_layer(config: &ServerConfig) -> CorsLayer {
    let mut cors = CorsLayer::new();

    // Configure origins
    if config.cors_origins == "*" {
        cors = cors.allow_origin(Any);
    } else {
        let origins: Vec<_> = config
            .cors_origins
            .split(',')
            .filter_map(|s| s.trim().parse().ok())
            .collect();
        cors = cors.allow_origin(origins);
    }

    // Configure methods
    if config.cors_methods == "*" {
        cors = cors.allow_methods(Any);
    } else {
        let methods: Vec<_> = config
            .cors_methods
            .split(',')
            .filter_map(|s| s.trim().parse().ok())
            .collect();
        cors = cors.allow_methods(methods);
    }

    // Configure headers
    if config.cors_headers == "*" {
        cors = cors.allow_headers(Any);
    } else {
        let headers: Vec<_> = config
            .cors_headers
            .split(',')
            .filter_map(|s| s.trim().parse().ok())
            .collect();
        cors = cors.allow_headers(headers);
    }

    cors
}

/// Initializes the tracing subscriber for logging.
///
/// This should be called once at application startup.
pub fn init_logging(level: &str) {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "meridian_rest={level},meridian_federation={level},tower_http=debug"
        ))
    });

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();
}
