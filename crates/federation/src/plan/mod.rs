//! Query planning: hop chains and the execution plan tree.
//!
//! The [`QueryPlanBuilder`] turns a parsed search expression into
//! [`Chain`]s of [`PartialQuery`] hops and composes them into a [`PlanNode`]
//! tree. Plans are built once per request, executed once, and discarded.

mod ast;
mod builder;
mod hop;

pub use ast::PlanNode;
pub use builder::QueryPlanBuilder;
pub use hop::{Chain, Dependency, PartialQuery};
