//! Meridian Federation Engine
//!
//! This crate implements the query-federation core of the Meridian Federation
//! Gateway: a single logical FHIR search or write is executed transparently
//! across a registry of independently-hosted backend servers, each of which
//! may hold only a partition of the data, and the partial results are merged,
//! correlated, and joined into one coherent answer.
//!
//! # Architecture
//!
//! The engine is organized leaf-first:
//!
//! - [`registry`] - immutable lookup tables built once at startup: backend
//!   clients, per-resource-type routes, and search-parameter paths
//! - [`types`] - the parsed search expression model and business identifiers
//! - [`eval`] - path walking over schema-loose resource JSON and the
//!   eligibility rule expression subset
//! - [`routing`] - per-action backend eligibility (which server owns a write)
//! - [`correlate`] - the identity correlation predicate that decides whether
//!   two instances from different backends are the same real-world entity
//! - [`plan`] - the query plan builder and the execution AST (And / Include /
//!   Parameter / Noop)
//! - [`exec`] - the chain executor: tail-first hop evaluation, identifier
//!   batching, parallel fan-out, pagination following
//! - [`client`] - the backend HTTP client
//! - [`paging`] - the opaque page-cursor store used for "next" links
//! - [`config`] - the YAML federation topology
//! - [`engine`] - the façade tying registries, planner, and executor together
//!
//! # Data flow
//!
//! ```text
//! SearchExpression -> QueryPlanBuilder -> hop chains -> PlanNode tree
//!                  -> PlanNode::execute (ChainExecutor per chain)
//!                  -> merged resource list
//! ```
//!
//! Registries are constructed at process start and are immutable thereafter;
//! they are shared into every component as `Arc`s, never as ambient state.
//! Plans and their hop chains are built per request and discarded with it.
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use meridian_federation::config::FederationConfig;
//! use meridian_federation::engine::FederationEngine;
//! use meridian_federation::types::SearchExpression;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let yaml = r#"
//! members:
//!   - id: alpha
//!     url: http://backend-a.example/fhir
//!   - id: beta
//!     url: http://backend-b.example/fhir
//! resources:
//!   default:
//!     locations:
//!       - member: alpha
//!       - member: beta
//! "#;
//!     let config = FederationConfig::from_yaml_str(yaml)?;
//!     let (engine, warnings) = FederationEngine::from_config(&config).await?;
//!     for warning in &warnings {
//!         eprintln!("topology warning: {warning}");
//!     }
//!     let engine = Arc::new(engine);
//!     let results = engine.search(&SearchExpression::new("Patient"), false).await?;
//!     println!("{} patients across the federation", results.len());
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod client;
pub mod config;
pub mod correlate;
pub mod engine;
pub mod error;
pub mod eval;
pub mod exec;
pub mod paging;
pub mod plan;
pub mod registry;
pub mod routing;
pub mod types;

pub use engine::FederationEngine;
pub use error::{FederationError, FederationResult};
