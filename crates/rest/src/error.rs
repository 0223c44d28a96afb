//! Error types for the gateway's REST surface.
//!
//! This module defines all error types used throughout the REST layer, with
//! automatic conversion to FHIR OperationOutcome responses.
//!
//! # Error Mapping
//!
//! Federation errors from the engine are mapped to appropriate HTTP status
//! codes and FHIR issue codes:
//!
//! | Federation Error | HTTP Status | FHIR Issue Code |
//! |------------------|-------------|-----------------|
//! | NoEligibleBackend | 422 | processing |
//! | InvalidParameter | 400 | invalid |
//! | NoMatch | 404 | not-found |
//! | Backend | backend's status | processing |
//! | Transport | 502 | transient |
//! | Config / InvalidUrl / UnknownMember | 500 | exception |

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use meridian_federation::routing::RoutingError;
use meridian_federation::FederationError;
use thiserror::Error;

use crate::responses::operation_outcome::{IssueType, error_outcome};

/// The primary error type for REST API operations.
///
/// Each variant maps to one HTTP status code and one FHIR OperationOutcome
/// issue code.
#[derive(Debug, Error)]
pub enum RestError {
    /// Resource not found (HTTP 404).
    #[error("resource not found: {resource_type}{}", id.as_deref().map(|i| format!("/{i}")).unwrap_or_default())]
    NotFound {
        /// The resource type (e.g., "Patient").
        resource_type: String,
        /// The resource id, when the miss was a direct read.
        id: Option<String>,
    },

    /// A page snapshot expired or never existed (HTTP 410 Gone).
    #[error("gone: {message}")]
    Gone {
        /// Why the referenced state is gone.
        message: String,
    },

    /// Bad request - malformed query or body (HTTP 400).
    #[error("bad request: {message}")]
    BadRequest {
        /// Error message.
        message: String,
    },

    /// No backend can take the operation (HTTP 422).
    #[error("unprocessable: {message}")]
    Unprocessable {
        /// Error message.
        message: String,
    },

    /// A backend rejected a routed operation; its status is re-raised.
    #[error("upstream failure ({status}): {message}")]
    Upstream {
        /// The backend's HTTP status.
        status: u16,
        /// Error message.
        message: String,
    },

    /// A backend could not be reached (HTTP 502).
    #[error("bad gateway: {message}")]
    BadGateway {
        /// Error message.
        message: String,
    },

    /// Internal server error (HTTP 500).
    #[error("internal error: {message}")]
    Internal {
        /// Error message.
        message: String,
    },
}

impl IntoResponse for RestError {
    fn into_response(self) -> Response {
        let (status, code, details) = match &self {
            RestError::NotFound { resource_type, id } => (
                StatusCode::NOT_FOUND,
                IssueType::NotFound,
                match id {
                    Some(id) => format!("Resource {}/{} not found", resource_type, id),
                    None => format!("No {} matches the given criteria", resource_type),
                },
            ),
            RestError::Gone { message } => (StatusCode::GONE, IssueType::Deleted, message.clone()),
            RestError::BadRequest { message } => {
                (StatusCode::BAD_REQUEST, IssueType::Invalid, message.clone())
            }
            RestError::Unprocessable { message } => (
                StatusCode::UNPROCESSABLE_ENTITY,
                IssueType::Processing,
                message.clone(),
            ),
            RestError::Upstream { status, message } => (
                StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_GATEWAY),
                IssueType::Processing,
                message.clone(),
            ),
            RestError::BadGateway { message } => {
                (StatusCode::BAD_GATEWAY, IssueType::Transient, message.clone())
            }
            RestError::Internal { message } => (
                StatusCode::INTERNAL_SERVER_ERROR,
                IssueType::Exception,
                message.clone(),
            ),
        };

        (status, Json(error_outcome(code, &details))).into_response()
    }
}

impl From<FederationError> for RestError {
    fn from(err: FederationError) -> Self {
        let message = err.to_string();
        match err {
            FederationError::Routing(RoutingError::NoEligibleBackend { .. }) => {
                RestError::Unprocessable { message }
            }
            FederationError::Routing(RoutingError::UnknownMember { .. }) => {
                RestError::Internal { message }
            }
            FederationError::InvalidParameter { .. } => RestError::BadRequest { message },
            FederationError::NoMatch { resource_type } => RestError::NotFound {
                resource_type,
                id: None,
            },
            FederationError::Backend { status, .. } => RestError::Upstream { status, message },
            FederationError::Transport(_) => RestError::BadGateway { message },
            FederationError::Config(_) | FederationError::InvalidUrl(_) => {
                RestError::Internal { message }
            }
        }
    }
}

impl From<serde_json::Error> for RestError {
    fn from(err: serde_json::Error) -> Self {
        RestError::BadRequest {
            message: format!("Invalid JSON: {}", err),
        }
    }
}

/// Result type alias for REST operations.
pub type RestResult<T> = Result<T, RestError>;
