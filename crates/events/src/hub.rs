//! Per-job subscriber registry with full-snapshot fan-out.
//!
//! [`NotificationHub`] is shared via `Arc<NotificationHub>`. Each subscriber
//! is a bounded [`mpsc::Sender`] registered under one job id; publishing a
//! job pushes an [`Outbound::Snapshot`] to every channel of that job, in
//! registration order.
//!
//! Sends never block: a channel that is closed or whose buffer is full is
//! dropped from the hub and the remaining subscribers are still served. The
//! transport notices the drop when its receiver drains and closes.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use datagen_core::job::Job;
use datagen_core::types::{JobId, Timestamp};
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, RwLock};

use crate::message::{is_heartbeat, Outbound};

/// Sending half of a subscriber channel.
pub type SubscriberChannel = mpsc::Sender<Outbound>;

/// Handle identifying one registered channel; returned by
/// [`NotificationHub::subscribe`] and used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(u64);

impl std::fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

struct Subscriber {
    id: SubscriberId,
    sender: SubscriberChannel,
    /// Kept for diagnostics.
    connected_at: Timestamp,
}

/// Tracks open subscriber channels per job and fans out snapshots.
pub struct NotificationHub {
    subscribers: RwLock<HashMap<JobId, Vec<Subscriber>>>,
    next_id: AtomicU64,
}

impl NotificationHub {
    /// Create an empty hub.
    pub fn new() -> Self {
        Self {
            subscribers: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Register `channel` for updates on `job_id`.
    ///
    /// When `snapshot` is given it is sent first, before the channel can see
    /// any publish. A missing snapshot is not an error: clients may subscribe
    /// to a job that does not exist yet. A channel that is already closed is
    /// not registered.
    pub async fn subscribe(
        &self,
        job_id: JobId,
        channel: SubscriberChannel,
        snapshot: Option<Arc<Job>>,
    ) -> SubscriberId {
        let id = SubscriberId(self.next_id.fetch_add(1, Ordering::Relaxed));

        if let Some(snapshot) = snapshot {
            if let Err(e) = channel.try_send(Outbound::Snapshot(snapshot)) {
                tracing::warn!(
                    job_id = %job_id,
                    subscriber = %id,
                    error = %e,
                    "Failed to send initial snapshot, subscriber not registered",
                );
                return id;
            }
        }

        let mut subscribers = self.subscribers.write().await;
        let list = subscribers.entry(job_id).or_default();
        list.push(Subscriber {
            id,
            sender: channel,
            connected_at: chrono::Utc::now(),
        });
        tracing::debug!(job_id = %job_id, subscriber = %id, count = list.len(), "Subscriber registered");
        id
    }

    /// Close `channel` without registering it, e.g. for a job that is
    /// gone. The returned id is never known to the hub.
    pub fn refuse(&self, job_id: JobId, channel: &SubscriberChannel) -> SubscriberId {
        let id = SubscriberId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let _ = channel.try_send(Outbound::Close);
        tracing::debug!(job_id = %job_id, subscriber = %id, "Subscriber refused");
        id
    }

    /// Remove a subscriber. Unknown or already-removed ids are ignored.
    pub async fn unsubscribe(&self, job_id: JobId, subscriber: SubscriberId) {
        let mut subscribers = self.subscribers.write().await;
        if let Some(list) = subscribers.get_mut(&job_id) {
            list.retain(|s| s.id != subscriber);
            if list.is_empty() {
                subscribers.remove(&job_id);
            }
        }
    }

    /// Send `snapshot` to every subscriber of `job_id`.
    ///
    /// Returns the number of channels that accepted the snapshot. Failed
    /// channels are removed; failures are logged and never surfaced.
    pub async fn publish(&self, job_id: JobId, snapshot: Arc<Job>) -> usize {
        // Copy the targets so subscribe/unsubscribe can proceed while we send.
        let targets: Vec<(SubscriberId, SubscriberChannel)> = {
            let subscribers = self.subscribers.read().await;
            match subscribers.get(&job_id) {
                Some(list) => list.iter().map(|s| (s.id, s.sender.clone())).collect(),
                None => return 0,
            }
        };

        let mut delivered = 0;
        let mut failed = Vec::new();
        for (id, sender) in targets {
            match sender.try_send(Outbound::Snapshot(Arc::clone(&snapshot))) {
                Ok(()) => delivered += 1,
                Err(TrySendError::Full(_)) => {
                    tracing::warn!(job_id = %job_id, subscriber = %id, "Subscriber buffer full, dropping subscriber");
                    failed.push(id);
                }
                Err(TrySendError::Closed(_)) => {
                    tracing::warn!(job_id = %job_id, subscriber = %id, "Subscriber channel closed, dropping subscriber");
                    failed.push(id);
                }
            }
        }

        if !failed.is_empty() {
            let mut subscribers = self.subscribers.write().await;
            if let Some(list) = subscribers.get_mut(&job_id) {
                list.retain(|s| !failed.contains(&s.id));
                if list.is_empty() {
                    subscribers.remove(&job_id);
                }
            }
        }

        tracing::trace!(job_id = %job_id, delivered, "Snapshot published");
        delivered
    }

    /// Answer a client heartbeat on `channel`.
    ///
    /// Returns `true` if `text` was a heartbeat (whether or not the reply
    /// could be queued). Never touches job state or other subscribers.
    pub fn answer_heartbeat(&self, channel: &SubscriberChannel, text: &str) -> bool {
        if !is_heartbeat(text) {
            return false;
        }
        if let Err(e) = channel.try_send(Outbound::Pong) {
            tracing::debug!(error = %e, "Failed to queue heartbeat reply");
        }
        true
    }

    /// Close and drop every channel of `job_id`. Returns how many were closed.
    pub async fn close_job(&self, job_id: JobId) -> usize {
        let removed = self.subscribers.write().await.remove(&job_id);
        let Some(list) = removed else {
            return 0;
        };
        for sub in &list {
            let _ = sub.sender.try_send(Outbound::Close);
        }
        tracing::debug!(job_id = %job_id, count = list.len(), "Closed job subscribers");
        list.len()
    }

    /// Number of channels registered for `job_id`.
    pub async fn subscriber_count(&self, job_id: JobId) -> usize {
        self.subscribers
            .read()
            .await
            .get(&job_id)
            .map_or(0, Vec::len)
    }

    /// Total number of registered channels across all jobs.
    pub async fn connection_count(&self) -> usize {
        self.subscribers.read().await.values().map(Vec::len).sum()
    }

    /// Age of the oldest registered channel, if any.
    pub async fn oldest_connection(&self) -> Option<Timestamp> {
        self.subscribers
            .read()
            .await
            .values()
            .flatten()
            .map(|s| s.connected_at)
            .min()
    }

    /// Queue a keepalive probe on every channel.
    ///
    /// Used by the heartbeat task; full buffers are skipped since the
    /// subscriber is evidently receiving traffic already.
    pub async fn ping_all(&self) {
        let subscribers = self.subscribers.read().await;
        for sub in subscribers.values().flatten() {
            let _ = sub.sender.try_send(Outbound::Ping);
        }
    }

    /// Send a Close to every channel, then clear the hub.
    ///
    /// Used during graceful shutdown.
    pub async fn shutdown_all(&self) {
        let mut subscribers = self.subscribers.write().await;
        let count: usize = subscribers.values().map(Vec::len).sum();
        for sub in subscribers.values().flatten() {
            let _ = sub.sender.try_send(Outbound::Close);
        }
        subscribers.clear();
        tracing::info!(count, "Closed all subscriber channels");
    }
}

impl Default for NotificationHub {
    fn default() -> Self {
        Self::new()
    }
}
