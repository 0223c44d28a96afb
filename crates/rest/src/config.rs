//! Server configuration for the federation gateway.
//!
//! This module provides configuration types for the gateway process,
//! supporting both programmatic configuration and environment variable
//! overrides. The federation topology itself (member backends, routes) lives
//! in a separate YAML file named by [`ServerConfig::topology`].
//!
//! # Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `MFG_SERVER_PORT` | 8080 | Server port |
//! | `MFG_SERVER_HOST` | 127.0.0.1 | Host to bind |
//! | `MFG_LOG_LEVEL` | info | Log level |
//! | `MFG_TOPOLOGY` | federation.yml | Federation topology file |
//! | `MFG_BASE_URL` | http://localhost:8080 | Public base URL |
//! | `MFG_REQUEST_TIMEOUT` | 30 | Request timeout (seconds) |
//! | `MFG_ENABLE_CORS` | true | Enable CORS |
//! | `MFG_CORS_ORIGINS` | * | Allowed origins |
//! | `MFG_CORS_METHODS` | * | Allowed methods |
//! | `MFG_CORS_HEADERS` | * | Allowed headers |
//! | `MFG_DEFAULT_PAGE_SIZE` | 20 | Default `_count` |
//! | `MFG_MAX_PAGE_SIZE` | 500 | Upper bound on `_count` |
//! | `MFG_PAGE_CACHE_SIZE` | 1000 | Retained page snapshots |
//!
//! # Example
//!
//! ```rust
//! use meridian_rest::ServerConfig;
//!
//! // Create from environment
//! let config = ServerConfig::from_env();
//!
//! // Or create programmatically
//! let config = ServerConfig {
//!     port: 3000,
//!     host: "0.0.0.0".to_string(),
//!     ..Default::default()
//! };
//! ```

use clap::Parser;

/// Server configuration for the federation gateway.
///
/// This struct can be constructed from environment variables using
/// [`ServerConfig::from_env`], from command line arguments using
/// [`ServerConfig::parse`], or programmatically.
#[derive(Debug, Clone, Parser)]
#[command(name = "mfg")]
#[command(about = "Meridian FHIR Federation Gateway")]
pub struct ServerConfig {
    /// Port to listen on.
    #[arg(short, long, env = "MFG_SERVER_PORT", default_value = "8080")]
    pub port: u16,

    /// Host address to bind to.
    #[arg(long, env = "MFG_SERVER_HOST", default_value = "127.0.0.1")]
    pub host: String,

    /// Log level (error, warn, info, debug, trace).
    #[arg(long, env = "MFG_LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Path to the federation topology YAML file.
    #[arg(long, env = "MFG_TOPOLOGY", default_value = "federation.yml")]
    pub topology: String,

    /// Base URL for the gateway (used in Location headers and Bundle links).
    #[arg(long, env = "MFG_BASE_URL", default_value = "http://localhost:8080")]
    pub base_url: String,

    /// Request timeout in seconds.
    #[arg(long, env = "MFG_REQUEST_TIMEOUT", default_value = "30")]
    pub request_timeout: u64,

    /// Enable CORS.
    #[arg(long, env = "MFG_ENABLE_CORS", default_value = "true")]
    pub enable_cors: bool,

    /// Allowed CORS origins (comma-separated, or * for all).
    #[arg(long, env = "MFG_CORS_ORIGINS", default_value = "*")]
    pub cors_origins: String,

    /// Allowed CORS methods (comma-separated, or * for all).
    #[arg(long, env = "MFG_CORS_METHODS", default_value = "*")]
    pub cors_methods: String,

    /// Allowed CORS headers (comma-separated, or * for all).
    #[arg(long, env = "MFG_CORS_HEADERS", default_value = "*")]
    pub cors_headers: String,

    /// Default page size for search results.
    #[arg(long, env = "MFG_DEFAULT_PAGE_SIZE", default_value = "20")]
    pub default_page_size: usize,

    /// Maximum page size for search results.
    #[arg(long, env = "MFG_MAX_PAGE_SIZE", default_value = "500")]
    pub max_page_size: usize,

    /// Number of search result snapshots retained for paging continuation.
    #[arg(long, env = "MFG_PAGE_CACHE_SIZE", default_value = "1000")]
    pub page_cache_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            host: "127.0.0.1".to_string(),
            log_level: "info".to_string(),
            topology: "federation.yml".to_string(),
            base_url: "http://localhost:8080".to_string(),
            request_timeout: 30,
            enable_cors: true,
            cors_origins: "*".to_string(),
            cors_methods: "*".to_string(),
            cors_headers: "*".to_string(),
            default_page_size: 20,
            max_page_size: 500,
            page_cache_size: 1000,
        }
    }
}

impl ServerConfig {
    /// Creates a new ServerConfig from environment variables.
    ///
    /// This is a convenience method that parses environment variables without
    /// requiring command line arguments.
    pub fn from_env() -> Self {
        Self::try_parse().unwrap_or_default()
    }

    /// Returns the socket address to bind to.
    pub fn socket_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Validates the configuration and returns errors if any.
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.port == 0 {
            errors.push("Port cannot be 0".to_string());
        }

        if self.request_timeout == 0 {
            errors.push("Request timeout cannot be 0".to_string());
        }

        if self.default_page_size == 0 {
            errors.push("Default page size cannot be 0".to_string());
        }

        if self.default_page_size > self.max_page_size {
            errors.push("Default page size cannot exceed max page size".to_string());
        }

        if self.page_cache_size == 0 {
            errors.push("Page cache size cannot be 0".to_string());
        }

        if errors.is_empty() { Ok(()) } else { Err(errors) }
    }

    /// Creates a configuration suitable for testing.
    ///
    /// Uses small page sizes and a short timeout so paging behavior is easy
    /// to exercise.
    pub fn for_testing() -> Self {
        Self {
            port: 0,
            host: "127.0.0.1".to_string(),
            log_level: "debug".to_string(),
            topology: "federation.yml".to_string(),
            base_url: "http://localhost:0".to_string(),
            request_timeout: 5,
            enable_cors: false,
            cors_origins: "*".to_string(),
            cors_methods: "*".to_string(),
            cors_headers: "*".to_string(),
            default_page_size: 10,
            max_page_size: 100,
            page_cache_size: 100,
        }
    }
}
