//! The route table: where each resource type lives and under what rules.

use std::collections::HashMap;
use std::sync::Arc;

use crate::config::{FederationConfig, LocationConfig, RouteConfig};
use crate::eval::RuleExpr;
use crate::routing::Action;

/// Identifier batch limit applied when a route does not set its own.
pub const DEFAULT_MAX_BATCH: usize = 10;

/// Eligibility rule for one action at one location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionRule {
    /// No rule configured; the location is always eligible.
    Always,
    /// A configured rule expression.
    Expr(RuleExpr),
}

impl ActionRule {
    fn from_config(rule: Option<&String>) -> Self {
        match rule {
            Some(text) => ActionRule::Expr(RuleExpr::parse(text)),
            None => ActionRule::Always,
        }
    }
}

/// One candidate location of a route, with its parsed action rules.
#[derive(Debug, Clone)]
pub struct Location {
    member: String,
    read: ActionRule,
    create: ActionRule,
    update: ActionRule,
    delete: ActionRule,
}

impl Location {
    fn from_config(config: &LocationConfig) -> Self {
        Self {
            member: config.member.clone(),
            read: ActionRule::from_config(config.read.as_ref()),
            create: ActionRule::from_config(config.create.as_ref()),
            update: ActionRule::from_config(config.update.as_ref()),
            delete: ActionRule::from_config(config.delete.as_ref()),
        }
    }

    /// The member id this location points at.
    pub fn member(&self) -> &str {
        &self.member
    }

    /// The rule governing the given action.
    pub fn rule(&self, action: Action) -> &ActionRule {
        match action {
            Action::Read => &self.read,
            Action::Create => &self.create,
            Action::Update => &self.update,
            Action::Delete => &self.delete,
        }
    }
}

/// Resolved routing entry for one resource type.
#[derive(Debug, Clone)]
pub struct Route {
    resource_type: String,
    max_batch: usize,
    identifier_groups: Vec<Vec<String>>,
    locations: Vec<Location>,
}

impl Route {
    fn from_config(resource_type: &str, config: &RouteConfig) -> Self {
        Self {
            resource_type: resource_type.to_string(),
            max_batch: config.max_batch.unwrap_or(DEFAULT_MAX_BATCH),
            identifier_groups: config
                .identifier_systems
                .iter()
                .map(|group| group.all_of.clone())
                .collect(),
            locations: config.locations.iter().map(Location::from_config).collect(),
        }
    }

    /// The resource type this route was configured for, or `"default"`.
    pub fn resource_type(&self) -> &str {
        &self.resource_type
    }

    /// Upper bound on OR-ed identifier values per backend query.
    pub fn max_batch(&self) -> usize {
        self.max_batch
    }

    /// OR-of-AND identifier-system groups; empty when no allow-list is set.
    pub fn identifier_groups(&self) -> &[Vec<String>] {
        &self.identifier_groups
    }

    /// Candidate locations in preference order.
    pub fn locations(&self) -> &[Location] {
        &self.locations
    }
}

/// Route lookup with default fallback.
#[derive(Debug, Clone)]
pub struct RouteRegistry {
    routes: HashMap<String, Arc<Route>>,
    default: Arc<Route>,
}

impl RouteRegistry {
    /// Builds the registry from a validated topology.
    pub fn from_config(config: &FederationConfig) -> Self {
        let default = config
            .resources
            .default
            .as_ref()
            .map(|route| Route::from_config("default", route))
            .unwrap_or_else(|| Route::from_config("default", &RouteConfig::default()));
        let routes = config
            .resources
            .types
            .iter()
            .map(|(name, route)| (name.clone(), Arc::new(Route::from_config(name, route))))
            .collect();
        Self {
            routes,
            default: Arc::new(default),
        }
    }

    /// Returns the route for a resource type, falling back to the default.
    pub fn route(&self, resource_type: &str) -> Arc<Route> {
        self.routes
            .get(resource_type)
            .cloned()
            .unwrap_or_else(|| Arc::clone(&self.default))
    }

    /// Whether the type has its own route rather than the default.
    pub fn has_route(&self, resource_type: &str) -> bool {
        self.routes.contains_key(resource_type)
    }

    /// The configured resource types, in no particular order.
    pub fn configured_types(&self) -> impl Iterator<Item = &str> {
        self.routes.keys().map(String::as_str)
    }
}
