//! In-memory job registry.
//!
//! The registry owns every [`Job`] record and is the only place they change.
//! Records live behind a per-job `Mutex`; the map itself is behind an
//! `RwLock` that is held only long enough to look up, insert, or evict an
//! entry. Lock order is always entry first, then map.
//!
//! Each applied change is published through the [`NotificationHub`] while the
//! job's lock is still held, so subscribers see snapshots in update order.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use datagen_core::error::CoreError;
use datagen_core::job::{ApplyOutcome, Job, JobListQuery, JobUpdate, NewJob};
use datagen_core::types::JobId;
use datagen_events::{NotificationHub, SubscriberChannel, SubscriberId};
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::engine::{AnalysisEngine, AnalysisRequest, ProgressReporter};
use crate::supervisor::{self, RunOutcome};

/// Result of [`JobRegistry::cancel`].
#[derive(Debug, Clone)]
pub enum CancelOutcome {
    /// The job was running and is now cancelled.
    Cancelled(Job),
    /// The job was not running; nothing changed.
    NotRunning(Job),
}

impl CancelOutcome {
    pub fn job(&self) -> &Job {
        match self {
            Self::Cancelled(job) | Self::NotRunning(job) => job,
        }
    }

    pub fn into_job(self) -> Job {
        match self {
            Self::Cancelled(job) | Self::NotRunning(job) => job,
        }
    }
}

struct JobEntry {
    job: Job,
    /// Generation of the current run; reports from older runs are dropped.
    generation: u64,
    run_cancel: Option<CancellationToken>,
    run_task: Option<JoinHandle<RunOutcome>>,
    /// Set when the entry is evicted, for holders of a stale `Arc`.
    removed: bool,
}

/// Owns all job records and the engine runs that drive them.
pub struct JobRegistry {
    jobs: RwLock<HashMap<JobId, Arc<Mutex<JobEntry>>>>,
    hub: Arc<NotificationHub>,
    engine: Arc<dyn AnalysisEngine>,
}

impl JobRegistry {
    pub fn new(hub: Arc<NotificationHub>, engine: Arc<dyn AnalysisEngine>) -> Arc<Self> {
        Arc::new(Self {
            jobs: RwLock::new(HashMap::new()),
            hub,
            engine,
        })
    }

    pub fn hub(&self) -> &Arc<NotificationHub> {
        &self.hub
    }

    // -----------------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------------

    /// Create a `pending` job and launch its first run.
    ///
    /// Returns the initial snapshot; the run proceeds in the background.
    pub async fn create(self: &Arc<Self>, submission: NewJob) -> Result<Job, CoreError> {
        let job = Job::new(submission)?;
        let job_id = job.job_id();

        let entry = Arc::new(Mutex::new(JobEntry {
            job,
            generation: 0,
            run_cancel: None,
            run_task: None,
            removed: false,
        }));
        let mut guard = entry.lock().await;
        self.jobs.write().await.insert(job_id, Arc::clone(&entry));

        self.publish(&guard.job).await;
        self.launch(&mut guard);

        tracing::info!(
            job_id = %job_id,
            files = guard.job.files().len(),
            "Analysis job created",
        );
        Ok(guard.job.clone())
    }

    /// Fetch the current snapshot of a job.
    pub async fn get(&self, job_id: JobId) -> Result<Job, CoreError> {
        let entry = self.entry(job_id).await?;
        let guard = entry.lock().await;
        live(&guard, job_id)?;
        Ok(guard.job.clone())
    }

    /// List non-deleted jobs, newest first.
    pub async fn list(&self, query: &JobListQuery) -> Vec<Job> {
        let entries: Vec<_> = self.jobs.read().await.values().cloned().collect();

        let mut jobs = Vec::with_capacity(entries.len());
        for entry in entries {
            let guard = entry.lock().await;
            if !guard.removed && query.matches(&guard.job) {
                jobs.push(guard.job.clone());
            }
        }
        jobs.sort_by(|a, b| b.started_at().cmp(&a.started_at()));
        jobs.into_iter()
            .skip(query.offset())
            .take(query.limit())
            .collect()
    }

    /// Number of jobs currently held.
    pub async fn job_count(&self) -> usize {
        self.jobs.read().await.len()
    }

    /// Merge `update` into the job, regardless of which run it comes from.
    ///
    /// Used by external producers (the `PATCH` endpoint). Engine runs go
    /// through [`ProgressReporter`], which also filters superseded runs.
    pub async fn update(&self, job_id: JobId, update: JobUpdate) -> Result<Job, CoreError> {
        let entry = self.entry(job_id).await?;
        let mut guard = entry.lock().await;
        live(&guard, job_id)?;
        self.apply_locked(&mut guard, update).await
    }

    /// Apply an update on behalf of run `generation`.
    ///
    /// Returns `Ok(None)` when the run has been superseded by a restart.
    pub(crate) async fn update_run(
        &self,
        job_id: JobId,
        generation: u64,
        update: JobUpdate,
    ) -> Result<Option<Job>, CoreError> {
        self.apply_for_run(job_id, generation, update, false).await
    }

    /// Move the job to `running` on behalf of run `generation`.
    ///
    /// Skipped whole if the job went terminal before the run got going (an
    /// external `failed` report, say); the caller must then not start the
    /// engine.
    pub(crate) async fn start_run(
        &self,
        job_id: JobId,
        generation: u64,
        update: JobUpdate,
    ) -> Result<Option<Job>, CoreError> {
        self.apply_for_run(job_id, generation, update, true).await
    }

    /// Apply the terminal update of run `generation`.
    ///
    /// Unlike [`update_run`](Self::update_run), the update is dropped whole
    /// (messages included) if the job already reached a terminal status,
    /// e.g. because it was cancelled while the engine was still working.
    pub(crate) async fn finish_run(
        &self,
        job_id: JobId,
        generation: u64,
        update: JobUpdate,
    ) -> Result<Option<Job>, CoreError> {
        self.apply_for_run(job_id, generation, update, true).await
    }

    async fn apply_for_run(
        &self,
        job_id: JobId,
        generation: u64,
        update: JobUpdate,
        skip_if_terminal: bool,
    ) -> Result<Option<Job>, CoreError> {
        let entry = self.entry(job_id).await?;
        let mut guard = entry.lock().await;
        live(&guard, job_id)?;
        if guard.generation != generation {
            tracing::debug!(
                job_id = %job_id,
                run = generation,
                current = guard.generation,
                "Dropping update from superseded run",
            );
            return Ok(None);
        }
        if skip_if_terminal && guard.job.status().is_terminal() {
            tracing::debug!(
                job_id = %job_id,
                status = %guard.job.status(),
                "Job already terminal, discarding run update",
            );
            return Ok(Some(guard.job.clone()));
        }
        self.apply_locked(&mut guard, update).await.map(Some)
    }

    /// Cancel a running job.
    ///
    /// Jobs in any other status are left alone and reported as
    /// [`CancelOutcome::NotRunning`]. The engine is signalled through its
    /// cancellation token but never aborted.
    pub async fn cancel(&self, job_id: JobId) -> Result<CancelOutcome, CoreError> {
        let entry = self.entry(job_id).await?;
        let mut guard = entry.lock().await;
        live(&guard, job_id)?;

        if !guard.job.cancel(Utc::now()) {
            tracing::debug!(job_id = %job_id, status = %guard.job.status(), "Cancel ignored, job not running");
            return Ok(CancelOutcome::NotRunning(guard.job.clone()));
        }
        if let Some(token) = &guard.run_cancel {
            token.cancel();
        }
        self.publish(&guard.job).await;

        tracing::info!(job_id = %job_id, "Job cancelled");
        Ok(CancelOutcome::Cancelled(guard.job.clone()))
    }

    /// Reset a terminal job to `pending` and launch a new run with the
    /// original files, instructions and parameters.
    pub async fn restart(self: &Arc<Self>, job_id: JobId) -> Result<Job, CoreError> {
        let entry = self.entry(job_id).await?;
        let mut guard = entry.lock().await;
        live(&guard, job_id)?;

        guard.job.restart()?;
        self.publish(&guard.job).await;
        self.launch(&mut guard);

        tracing::info!(job_id = %job_id, run = guard.generation, "Job restarted");
        Ok(guard.job.clone())
    }

    /// Soft-delete a job: cancel it if running, publish the final snapshot
    /// with `deleted` set, close its subscribers and evict the record.
    pub async fn delete(&self, job_id: JobId) -> Result<Job, CoreError> {
        let entry = self.entry(job_id).await?;
        let mut guard = entry.lock().await;
        live(&guard, job_id)?;

        if guard.job.cancel(Utc::now()) {
            if let Some(token) = &guard.run_cancel {
                token.cancel();
            }
        }
        guard.job.mark_deleted();
        guard.removed = true;
        self.publish(&guard.job).await;

        self.jobs.write().await.remove(&job_id);
        let closed = self.hub.close_job(job_id).await;

        tracing::info!(job_id = %job_id, closed_subscribers = closed, "Job deleted");
        Ok(guard.job.clone())
    }

    // -----------------------------------------------------------------------
    // Subscriptions
    // -----------------------------------------------------------------------

    /// Register a subscriber channel for `job_id`.
    ///
    /// If the job exists its current snapshot is sent immediately. The job's
    /// lock is held meanwhile so no publish can slip in ahead of it.
    pub async fn subscribe(&self, job_id: JobId, channel: SubscriberChannel) -> SubscriberId {
        let Ok(entry) = self.entry(job_id).await else {
            return self.hub.subscribe(job_id, channel, None).await;
        };
        let guard = entry.lock().await;
        if guard.removed {
            // Deleted while we waited for the lock; its subscribers are
            // already closed.
            return self.hub.refuse(job_id, &channel);
        }
        self.hub
            .subscribe(job_id, channel, Some(Arc::new(guard.job.clone())))
            .await
    }

    pub async fn unsubscribe(&self, job_id: JobId, subscriber: SubscriberId) {
        self.hub.unsubscribe(job_id, subscriber).await;
    }

    // -----------------------------------------------------------------------
    // Run supervision
    // -----------------------------------------------------------------------

    /// Wait for the current run of `job_id` to finish.
    ///
    /// Returns `None` if the job is unknown or its run was already joined.
    pub async fn wait(&self, job_id: JobId) -> Option<RunOutcome> {
        let entry = self.entry(job_id).await.ok()?;
        let task = entry.lock().await.run_task.take()?;
        match task.await {
            Ok(outcome) => Some(outcome),
            Err(e) => {
                tracing::error!(job_id = %job_id, error = %e, "Run supervisor task failed");
                Some(RunOutcome::Abandoned)
            }
        }
    }

    /// Signal every run to stop and join the supervisors.
    ///
    /// Supervisors still running when `timeout` elapses are aborted, which
    /// also aborts their engine tasks.
    pub async fn shutdown(&self, timeout: Duration) {
        let entries: Vec<_> = self.jobs.read().await.values().cloned().collect();

        let mut tasks = Vec::new();
        for entry in entries {
            let mut guard = entry.lock().await;
            if let Some(token) = &guard.run_cancel {
                token.cancel();
            }
            if let Some(task) = guard.run_task.take() {
                tasks.push((guard.job.job_id(), task));
            }
        }

        let deadline = tokio::time::Instant::now() + timeout;
        let mut aborted = 0;
        for (job_id, mut task) in tasks {
            if tokio::time::timeout_at(deadline, &mut task).await.is_err() {
                tracing::warn!(job_id = %job_id, "Run did not stop in time, aborting");
                task.abort();
                aborted += 1;
            }
        }
        tracing::info!(aborted, "Job registry shut down");
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    async fn entry(&self, job_id: JobId) -> Result<Arc<Mutex<JobEntry>>, CoreError> {
        self.jobs
            .read()
            .await
            .get(&job_id)
            .cloned()
            .ok_or_else(|| CoreError::job_not_found(job_id))
    }

    async fn apply_locked(&self, entry: &mut JobEntry, update: JobUpdate) -> Result<Job, CoreError> {
        let job_id = entry.job.job_id();
        let outcome = entry.job.apply(update, Utc::now())?;
        match outcome {
            ApplyOutcome::Applied => {
                tracing::debug!(
                    job_id = %job_id,
                    status = %entry.job.status(),
                    progress = entry.job.progress(),
                    "Job updated",
                );
            }
            ApplyOutcome::MessagesOnly => {
                tracing::debug!(job_id = %job_id, "Late update on terminal job, messages appended only");
            }
            ApplyOutcome::Ignored => {
                tracing::trace!(job_id = %job_id, "Update had no effect");
            }
        }
        if outcome.changed() {
            self.publish(&entry.job).await;
        }
        Ok(entry.job.clone())
    }

    async fn publish(&self, job: &Job) {
        self.hub.publish(job.job_id(), Arc::new(job.clone())).await;
    }

    /// Start a new supervised run for the entry's job.
    ///
    /// A previous run still in flight is signalled and its supervisor
    /// aborted, taking the engine task with it. Anything it reports before
    /// the abort lands is dropped by generation.
    fn launch(self: &Arc<Self>, entry: &mut JobEntry) {
        entry.generation += 1;
        let job_id = entry.job.job_id();
        let cancel = CancellationToken::new();

        let request = AnalysisRequest {
            job_id,
            files: entry.job.files().to_vec(),
            instructions: entry.job.instructions().unwrap_or_default().to_string(),
            parameters: entry.job.parameters().clone(),
        };
        let reporter = ProgressReporter::new(Arc::clone(self), job_id, entry.generation, cancel.clone());
        let task = supervisor::spawn_run(Arc::clone(&self.engine), request, reporter);

        if let Some(previous) = entry.run_cancel.replace(cancel) {
            previous.cancel();
        }
        if let Some(previous) = entry.run_task.replace(task) {
            previous.abort();
        }
    }
}

/// Reject operations on an entry that was evicted after we looked it up.
fn live(entry: &JobEntry, job_id: JobId) -> Result<(), CoreError> {
    if entry.removed {
        return Err(CoreError::job_not_found(job_id));
    }
    Ok(())
}
