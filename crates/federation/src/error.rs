//! Error types for the federation engine.
//!
//! The taxonomy mirrors the engine's failure policy: routing and
//! configuration problems are hard errors, a backend failure on a routed
//! operation keeps its originating status code so the surface can re-raise
//! it, and backend failures during search fan-out never appear here at all
//! because a failing fetch degrades to zero results inside the executor.

use thiserror::Error;

use crate::config::ConfigError;
use crate::routing::RoutingError;

/// Result type for federation operations.
pub type FederationResult<T> = Result<T, FederationError>;

/// Top-level error for the federation engine.
#[derive(Debug, Error)]
pub enum FederationError {
    /// No eligible backend for a routed action.
    #[error(transparent)]
    Routing(#[from] RoutingError),

    /// Federation topology configuration error.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A search parameter key was rejected under strict handling.
    #[error("unknown search parameter '{name}' for resource type {resource_type}")]
    InvalidParameter {
        /// The resource type the parameter was applied to.
        resource_type: String,
        /// The offending parameter key.
        name: String,
    },

    /// A conditional operation's criteria matched no instances.
    #[error("no {resource_type} instance matches the given criteria")]
    NoMatch {
        /// The resource type searched.
        resource_type: String,
    },

    /// A backend rejected an operation; the originating status is preserved.
    #[error("backend at {location} returned status {status}")]
    Backend {
        /// Base URL of the failing backend.
        location: String,
        /// The HTTP status code the backend returned.
        status: u16,
        /// Response body, when one was readable.
        message: Option<String>,
    },

    /// Transport-level failure talking to a backend.
    #[error("backend request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// A backend base URL could not be parsed.
    #[error("invalid backend url: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

impl FederationError {
    /// Returns the preserved backend status code, when this error carries one.
    pub fn backend_status(&self) -> Option<u16> {
        match self {
            FederationError::Backend { status, .. } => Some(*status),
            _ => None,
        }
    }
}
