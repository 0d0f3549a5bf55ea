//! WebSocket transport for job subscriptions.
//!
//! Provides the HTTP upgrade handler that bridges a socket to a
//! [`NotificationHub`](datagen_events::NotificationHub) channel, and the
//! keepalive task.

mod handler;
mod heartbeat;

pub use handler::ws_handler;
pub use heartbeat::start_heartbeat;
