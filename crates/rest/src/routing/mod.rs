//! HTTP route construction.

pub mod fhir_routes;

pub use fhir_routes::create_routes;
