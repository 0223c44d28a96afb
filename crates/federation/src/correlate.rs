//! Identity correlation across backend id spaces.
//!
//! Backends mint their own resource ids, so "same entity" is decided on
//! business identifiers. Without a configured allow-list the first declared
//! identifier pair of each side is compared, system and value both; the
//! comparison is order-sensitive, so two resources carrying the same
//! identifiers in a different order do not match. With an allow-list of
//! OR-of-AND system groups, a pair matches when at least one group is fully
//! satisfied on both sides.

use std::sync::Arc;

use serde_json::Value;

use crate::registry::RouteRegistry;
use crate::types::{resource_type, Identifier};

/// Decides whether two instances of one resource type are the same entity.
#[derive(Debug, Clone)]
pub struct IdentityPredicate {
    routes: Arc<RouteRegistry>,
}

impl IdentityPredicate {
    /// Creates a predicate over the route table's allow-lists.
    pub fn new(routes: Arc<RouteRegistry>) -> Self {
        Self { routes }
    }

    /// Whether `a` and `b` represent the same entity.
    ///
    /// Instances of different resource types never match.
    pub fn matches(&self, a: &Value, b: &Value) -> bool {
        let (Some(type_a), Some(type_b)) = (resource_type(a), resource_type(b)) else {
            return false;
        };
        if type_a != type_b {
            return false;
        }

        let ids_a = Identifier::all_of(a);
        let ids_b = Identifier::all_of(b);
        let route = self.routes.route(type_a);
        let groups = route.identifier_groups();

        if groups.is_empty() {
            return match (ids_a.first(), ids_b.first()) {
                (Some(first_a), Some(first_b)) => first_a == first_b,
                _ => false,
            };
        }

        groups
            .iter()
            .any(|group| group_satisfied(group, &ids_a, &ids_b))
    }
}

fn group_satisfied(systems: &[String], ids_a: &[Identifier], ids_b: &[Identifier]) -> bool {
    if systems.is_empty() {
        return false;
    }
    systems.iter().all(|system| {
        match (
            Identifier::value_for_system(ids_a, system),
            Identifier::value_for_system(ids_b, system),
        ) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        }
    })
}
