//! Core model types for the federation engine.
//!
//! Resource instances are carried as schema-loose [`serde_json::Value`]
//! payloads throughout the engine; [`resource`] provides the few accessors
//! the engine needs over them. [`identifier`] models business identifiers,
//! the currency of cross-backend correlation. [`search`] is the parsed
//! search expression the query planner consumes.

pub mod identifier;
pub mod resource;
pub mod search;

pub use identifier::Identifier;
pub use resource::{bundle_resources, instance_key, next_link, resource_id, resource_type};
pub use search::{
    AndGroup, HopKind, IncludeDirection, IncludeDirective, ParsedHop, SearchExpression,
};
