//! Linkwatch - batch URL reachability service
//!
//! Accepts batches of links over HTTP, probes each with a header-only
//! request, and tracks per-link outcomes under a task id. The whole task
//! map is snapshotted to a JSON file so progress survives restarts.

pub mod api;
pub mod checker;
pub mod error;
pub mod report;
pub mod server;
pub mod state;
pub mod store;

pub use error::{ApiError, ApiResult};
pub use state::AppState;
pub use store::{LinkStatus, Task, TaskStore};

use std::time::Duration;

/// Configuration for the linkwatch server
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Path of the JSON snapshot file
    pub state_file: String,
    /// Total timeout for a single probe
    pub probe_timeout: Duration,
    /// Ceiling on simultaneous probes per task; 0 means unbounded
    pub max_concurrent_probes: usize,
    /// How long to wait for in-flight requests on shutdown
    pub shutdown_grace: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            state_file: "state/storage.json".to_string(),
            probe_timeout: Duration::from_secs(10),
            max_concurrent_probes: 0,
            shutdown_grace: Duration::from_secs(30),
        }
    }
}

impl ServerConfig {
    /// Build a config from the environment, falling back to defaults.
    ///
    /// Recognized variables: `LINKWATCH_HOST`, `LINKWATCH_PORT`,
    /// `LINKWATCH_STATE_FILE`, `LINKWATCH_MAX_PROBES`.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(host) = std::env::var("LINKWATCH_HOST") {
            config.host = host;
        }
        if let Ok(port) = std::env::var("LINKWATCH_PORT") {
            if let Ok(port) = port.parse() {
                config.port = port;
            }
        }
        if let Ok(path) = std::env::var("LINKWATCH_STATE_FILE") {
            config.state_file = path;
        }
        if let Ok(max) = std::env::var("LINKWATCH_MAX_PROBES") {
            if let Ok(max) = max.parse() {
                config.max_concurrent_probes = max;
            }
        }
        config
    }
}
