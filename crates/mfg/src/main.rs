//! Meridian Federation Gateway (MFG)
//!
//! One FHIR endpoint over a fleet of partitioned FHIR backends.

use std::sync::Arc;

use clap::Parser;
use meridian_federation::FederationEngine;
use meridian_federation::config::FederationConfig;
use meridian_rest::{ServerConfig, create_app_with_config, init_logging};
use tracing::info;

/// Starts the Axum HTTP server.
async fn serve(app: axum::Router, config: &ServerConfig) -> anyhow::Result<()> {
    let addr = config.socket_addr();
    info!(address = %addr, "Server listening");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ServerConfig::parse();
    init_logging(&config.log_level);

    if let Err(errors) = config.validate() {
        for error in &errors {
            eprintln!("Configuration error: {}", error);
        }
        std::process::exit(1);
    }

    info!(
        port = config.port,
        host = %config.host,
        topology = %config.topology,
        "Starting Meridian Federation Gateway"
    );

    let topology = FederationConfig::from_yaml_file(&config.topology)
        .map_err(|e| anyhow::anyhow!("Failed to load topology {}: {}", config.topology, e))?;

    // Non-fatal topology warnings are logged by the engine itself.
    let (engine, _warnings) = FederationEngine::from_config(&topology).await?;

    let app = create_app_with_config(Arc::new(engine), config.clone());
    serve(app, &config).await
}
