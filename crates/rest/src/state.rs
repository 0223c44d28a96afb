//! Application state shared across request handlers.

use std::sync::Arc;

use meridian_federation::FederationEngine;
use meridian_federation::paging::PageStore;

use crate::config::ServerConfig;

/// Shared application state passed to all request handlers.
///
/// Holds the federation engine, the pagination snapshot store, and the
/// server configuration. Cloning is cheap; all fields are reference
/// counted.
pub struct AppState {
    engine: Arc<FederationEngine>,
    pages: Arc<dyn PageStore>,
    config: Arc<ServerConfig>,
}

impl AppState {
    /// Creates new application state.
    pub fn new(
        engine: Arc<FederationEngine>,
        pages: Arc<dyn PageStore>,
        config: ServerConfig,
    ) -> Self {
        Self {
            engine,
            pages,
            config: Arc::new(config),
        }
    }

    /// Returns a reference to the federation engine.
    pub fn engine(&self) -> &FederationEngine {
        &self.engine
    }

    /// Returns a reference to the pagination snapshot store.
    pub fn pages(&self) -> &Arc<dyn PageStore> {
        &self.pages
    }

    /// Returns a reference to the server configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// The externally visible base URL, without a trailing slash.
    pub fn base_url(&self) -> &str {
        self.config.base_url.trim_end_matches('/')
    }

    /// Page size applied when the client sends no `_count`.
    pub fn default_page_size(&self) -> usize {
        self.config.default_page_size
    }

    /// Upper bound for client-requested `_count` values.
    pub fn max_page_size(&self) -> usize {
        self.config.max_page_size
    }
}

impl Clone for AppState {
    fn clone(&self) -> Self {
        Self {
            engine: Arc::clone(&self.engine),
            pages: Arc::clone(&self.pages),
            config: Arc::clone(&self.config),
        }
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("engine", &self.engine)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
