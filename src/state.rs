//! Global application state shared across all handlers

use crate::checker::LinkChecker;
use crate::store::TaskStore;
use crate::ServerConfig;
use std::sync::Arc;

/// Built once at startup and injected into every handler via axum `State`.
#[derive(Clone)]
pub struct AppState {
    /// Authoritative task store for the process lifetime
    pub store: TaskStore,

    /// Probe engine writing results back into the store
    pub checker: Arc<LinkChecker>,
}

impl AppState {
    pub fn new(config: &ServerConfig) -> Result<Self, reqwest::Error> {
        let store = TaskStore::new(&config.state_file);
        let checker = Arc::new(LinkChecker::new(store.clone(), config)?);
        Ok(Self { store, checker })
    }
}
