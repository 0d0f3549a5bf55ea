use std::sync::Arc;
use std::time::Duration;

use datagen_events::NotificationHub;

/// Spawn a background task that queues a Ping on every subscriber channel
/// each `interval`.
///
/// The task runs until aborted through the returned `JoinHandle` during
/// shutdown.
pub fn start_heartbeat(hub: Arc<NotificationHub>, interval: Duration) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(interval);

        loop {
            interval.tick().await;
            let count = hub.connection_count().await;
            tracing::debug!(count, "WebSocket heartbeat ping");
            hub.ping_all().await;
        }
    })
}
