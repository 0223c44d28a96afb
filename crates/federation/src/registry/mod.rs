//! Registries built from the topology at startup.
//!
//! Three registries back the engine:
//!
//! - [`ClientRegistry`]: one HTTP client handle per member backend
//! - [`RouteRegistry`]: the per-resource-type [`Route`] table with its
//!   default fallback
//! - [`SearchPathRegistry`]: search-parameter definitions used to resolve
//!   chain targets and element paths

mod clients;
mod routes;
mod search_paths;

pub use clients::ClientRegistry;
pub use routes::{ActionRule, Location, Route, RouteRegistry, DEFAULT_MAX_BATCH};
pub use search_paths::{SearchParamDef, SearchPathRegistry};
