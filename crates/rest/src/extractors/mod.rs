//! Request extraction and parsing.
//!
//! Turns raw HTTP request material (query strings, form bodies, headers)
//! into the typed structures the handlers work with.

pub mod prefer;
pub mod search_params;

pub use prefer::PreferHeader;
pub use search_params::{PageParams, SearchRequest, decode_query, parse_search};
