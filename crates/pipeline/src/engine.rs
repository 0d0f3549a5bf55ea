//! The analysis engine seam and the reporter handed to each run.

use std::sync::Arc;

use async_trait::async_trait;
use datagen_core::error::CoreError;
use datagen_core::job::{FileRef, JobUpdate, Message};
use datagen_core::result::AnalysisResult;
use datagen_core::types::{JobId, JsonObject};
use tokio_util::sync::CancellationToken;

use crate::registry::JobRegistry;

/// Everything an engine gets to know about the job it runs.
#[derive(Debug, Clone)]
pub struct AnalysisRequest {
    pub job_id: JobId,
    pub files: Vec<FileRef>,
    pub instructions: String,
    pub parameters: JsonObject,
}

/// A long-running analysis procedure.
///
/// Implementations report intermediate progress through the
/// [`ProgressReporter`] as often as they like and return the final result.
/// The caller applies the terminal update: `Ok` completes the job, `Err`
/// fails it with the error's display text. Engines must not rely on any
/// particular number of steps or timing.
#[async_trait]
pub trait AnalysisEngine: Send + Sync + 'static {
    async fn run(
        &self,
        request: AnalysisRequest,
        reporter: ProgressReporter,
    ) -> anyhow::Result<AnalysisResult>;
}

/// Handle through which one engine run updates its job.
///
/// Updates are tagged with the run generation; once the job is restarted
/// the old run's reports are dropped. A job that has been deleted swallows
/// reports silently.
#[derive(Clone)]
pub struct ProgressReporter {
    registry: Arc<JobRegistry>,
    job_id: JobId,
    generation: u64,
    cancel: CancellationToken,
}

impl ProgressReporter {
    pub(crate) fn new(
        registry: Arc<JobRegistry>,
        job_id: JobId,
        generation: u64,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            registry,
            job_id,
            generation,
            cancel,
        }
    }

    pub fn job_id(&self) -> JobId {
        self.job_id
    }

    /// Apply an arbitrary partial update.
    ///
    /// `Validation` and `InvalidState` errors are returned so the engine can
    /// decide what to do; a missing job is not an error.
    pub async fn update(&self, update: JobUpdate) -> Result<(), CoreError> {
        match self
            .registry
            .update_run(self.job_id, self.generation, update)
            .await
        {
            Ok(_) => Ok(()),
            Err(CoreError::NotFound { .. }) => {
                tracing::debug!(job_id = %self.job_id, "Job no longer exists, update dropped");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// Raise progress and log an agent message in one update.
    pub async fn progress(&self, progress: u32, content: impl Into<String>) -> Result<(), CoreError> {
        self.update(
            JobUpdate::default()
                .with_progress(progress)
                .with_message(Message::agent(content)),
        )
        .await
    }

    /// Append a single message.
    pub async fn message(&self, message: Message) -> Result<(), CoreError> {
        self.update(JobUpdate::default().with_message(message)).await
    }

    /// Set the label of the agent currently working on the job.
    pub async fn agent(&self, agent: impl Into<String>) -> Result<(), CoreError> {
        self.update(JobUpdate::default().with_agent(agent)).await
    }

    /// Whether the job was cancelled (or the server is shutting down).
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Resolves once the run is asked to stop.
    pub async fn cancelled(&self) {
        self.cancel.cancelled().await;
    }

    pub(crate) fn generation(&self) -> u64 {
        self.generation
    }

    pub(crate) fn registry(&self) -> &Arc<JobRegistry> {
        &self.registry
    }
}
