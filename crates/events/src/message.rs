//! Messages carried by subscriber channels.

use std::sync::Arc;

use datagen_core::job::Job;
use serde::Serialize;

/// Text frame a client sends to check liveness.
pub const HEARTBEAT_PING: &str = "ping";

/// Fixed reply to [`HEARTBEAT_PING`].
pub const HEARTBEAT_PONG: &str = "pong";

/// An item queued for delivery to one subscriber.
///
/// The transport (WebSocket handler) decides how each variant is framed.
#[derive(Debug, Clone)]
pub enum Outbound {
    /// Full current state of the subscribed job.
    Snapshot(Arc<Job>),
    /// Reply to a client heartbeat.
    Pong,
    /// Transport-level keepalive probe.
    Ping,
    /// The hub is dropping this channel; the transport should close.
    Close,
}

/// JSON envelope for snapshot frames: `{"type": "job_update", "data": {...}}`.
#[derive(Debug, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum ServerEvent<'a> {
    JobUpdate(&'a Job),
}

impl ServerEvent<'_> {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Whether an inbound text frame is a heartbeat request.
pub fn is_heartbeat(text: &str) -> bool {
    text.trim() == HEARTBEAT_PING
}
