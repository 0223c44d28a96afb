//! Per-action backend selection.
//!
//! Every instance-level operation resolves to exactly one backend: the first
//! location of the resource type's route whose rule for the action holds.
//! Rules that need an instance are evaluated against the candidate resource;
//! delete rules are decided on literals alone because no instance is
//! available at delete time.

mod evaluator;

pub use evaluator::{eligible_location, eligible_locations};

/// The write-path and read-path actions a route can gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    /// Instance read by id.
    Read,
    /// Resource creation.
    Create,
    /// Instance update.
    Update,
    /// Instance delete.
    Delete,
}

impl Action {
    /// Lowercase action name, as used in log fields and error messages.
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Read => "read",
            Action::Create => "create",
            Action::Update => "update",
            Action::Delete => "delete",
        }
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors raised while selecting a backend for an action.
#[derive(Debug, thiserror::Error)]
pub enum RoutingError {
    /// Every candidate location's rule evaluated to false.
    #[error("no backend available for {action} of {resource_type}")]
    NoEligibleBackend {
        /// The resource type being routed.
        resource_type: String,
        /// The action that found no eligible location.
        action: Action,
    },

    /// The member a location points at has no registered client.
    #[error("route for {resource_type} references unknown member '{member}'")]
    UnknownMember {
        /// The resource type being routed.
        resource_type: String,
        /// The unresolvable member id.
        member: String,
    },
}
