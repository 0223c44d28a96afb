//! Chain execution: cache, identifier projection, backend fan-out.

mod cache;
mod executor;
mod project;

pub use cache::TypeCache;
pub use executor::ChainExecutor;
pub use project::{allowed_systems, discover_targets, project_identifiers, ReferenceResolver};
