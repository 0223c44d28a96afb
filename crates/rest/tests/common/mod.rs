//! Common test utilities for gateway integration testing.
//!
//! This module provides test infrastructure including:
//!
//! - [`backends`] - In-process FHIR backend doubles
//! - [`fixtures`] - Test data fixtures
//! - Gateway bootstrap helpers and topology builders

pub mod backends;
pub mod fixtures;

use std::sync::Arc;

use axum_test::TestServer;
use serde_json::Value;

use meridian_federation::FederationEngine;
use meridian_federation::config::FederationConfig;
use meridian_rest::{ServerConfig, create_app_with_config};

/// The public base URL every test gateway advertises in links.
pub const GATEWAY_BASE: &str = "http://gateway.example";

/// Boots a gateway over the topology with test-friendly defaults.
pub async fn spawn_gateway(topology: &str) -> TestServer {
    spawn_gateway_with(topology, ServerConfig::for_testing()).await
}

/// Boots a gateway with an explicit server configuration.
pub async fn spawn_gateway_with(topology: &str, mut config: ServerConfig) -> TestServer {
    config.base_url = GATEWAY_BASE.to_string();
    let federation =
        FederationConfig::from_yaml_str(topology).expect("Failed to parse test topology");
    let (engine, _warnings) = FederationEngine::from_config(&federation)
        .await
        .expect("Failed to build federation engine");
    let app = create_app_with_config(Arc::new(engine), config);
    TestServer::new(app).expect("Failed to create test server")
}

/// A topology with one member serving every resource type.
pub fn single_member_topology(url: &str) -> String {
    format!(
        r#"
members:
  - id: solo
    url: {url}
resources:
  default:
    locations:
      - member: solo
"#
    )
}

/// A topology with two equal members serving every resource type, north
/// ahead of south in route order.
pub fn two_member_topology(north: &str, south: &str) -> String {
    format!(
        r#"
members:
  - id: north
    url: {north}
  - id: south
    url: {south}
resources:
  default:
    locations:
      - member: north
      - member: south
"#
    )
}

/// The entry list of a bundle response, empty when absent.
pub fn bundle_entries(bundle: &Value) -> Vec<Value> {
    bundle["entry"].as_array().cloned().unwrap_or_default()
}

/// Sorted `Type/id` keys of every entry resource in the bundle.
pub fn entry_keys(bundle: &Value) -> Vec<String> {
    let mut keys: Vec<String> = bundle_entries(bundle)
        .iter()
        .map(|entry| {
            format!(
                "{}/{}",
                entry["resource"]["resourceType"].as_str().unwrap_or("?"),
                entry["resource"]["id"].as_str().unwrap_or("?")
            )
        })
        .collect();
    keys.sort();
    keys
}

/// The search mode recorded for one entry resource id.
pub fn entry_mode(bundle: &Value, id: &str) -> Option<String> {
    bundle_entries(bundle)
        .iter()
        .find(|entry| entry["resource"]["id"] == id)
        .and_then(|entry| entry["search"]["mode"].as_str().map(str::to_string))
}

/// The path-and-query of the bundle's `next` link, relative to the
/// gateway base. `None` when the bundle carries no next link.
pub fn next_page_path(bundle: &Value) -> Option<String> {
    let links = bundle["link"].as_array()?;
    let url = links
        .iter()
        .find(|link| link["relation"] == "next")?
        .get("url")?
        .as_str()?;
    url.strip_prefix(GATEWAY_BASE).map(str::to_string)
}
