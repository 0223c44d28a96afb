//! Path and rule evaluation over resource JSON.
//!
//! Routing rules and correlation projections both navigate resources by
//! dotted element paths. [`PathExpr`] walks a path against a resource,
//! flattening arrays at each step; [`RuleExpr`] layers the small rule
//! language used by route locations on top of it.

mod path;
mod rules;

pub use path::{walk, PathExpr};
pub use rules::RuleExpr;
