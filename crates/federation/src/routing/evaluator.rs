//! Rule evaluation over a route's candidate locations.

use serde_json::Value;

use super::{Action, RoutingError};
use crate::registry::{ActionRule, Location, Route};

/// Selects the first location of the route eligible for the action.
///
/// An absent rule always grants eligibility. Literal rules decide without an
/// instance. Path-expression rules are evaluated against `instance` when one
/// is given; without an instance they deny. Delete rules deny on anything
/// but a literal, so a misconfigured path rule fails closed.
pub fn eligible_location<'r>(
    route: &'r Route,
    action: Action,
    instance: Option<&Value>,
) -> Result<&'r Location, RoutingError> {
    route
        .locations()
        .iter()
        .find(|location| location_eligible(location, action, instance))
        .ok_or_else(|| RoutingError::NoEligibleBackend {
            resource_type: route.resource_type().to_string(),
            action,
        })
}

/// Collects every eligible location, preserving route order.
///
/// Used by conditional writes, where each matched instance routes
/// independently but callers want the candidates up front.
pub fn eligible_locations<'r>(
    route: &'r Route,
    action: Action,
    instance: Option<&Value>,
) -> Vec<&'r Location> {
    route
        .locations()
        .iter()
        .filter(|location| location_eligible(location, action, instance))
        .collect()
}

fn location_eligible(location: &Location, action: Action, instance: Option<&Value>) -> bool {
    match location.rule(action) {
        ActionRule::Always => true,
        ActionRule::Expr(expr) if expr.is_literal() => expr.evaluate(&Value::Null),
        ActionRule::Expr(_) if action == Action::Delete => false,
        ActionRule::Expr(expr) => match instance {
            Some(instance) => expr.evaluate(instance),
            None => false,
        },
    }
}
