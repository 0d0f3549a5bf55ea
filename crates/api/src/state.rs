use std::sync::Arc;

use datagen_events::NotificationHub;
use datagen_pipeline::JobRegistry;

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc`).
#[derive(Clone)]
pub struct AppState {
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// Owner of every analysis job and its runs.
    pub registry: Arc<JobRegistry>,
    /// Per-job subscriber channels (WebSocket clients).
    pub hub: Arc<NotificationHub>,
}

impl AppState {
    pub fn new(config: ServerConfig, registry: Arc<JobRegistry>) -> Self {
        let hub = Arc::clone(registry.hub());
        Self {
            config: Arc::new(config),
            registry,
            hub,
        }
    }
}
