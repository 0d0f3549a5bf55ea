//! Analysis job record, status machine, and update merge rules.
//!
//! A [`Job`] is only mutated through [`Job::apply`], [`Job::cancel`],
//! [`Job::restart`] and [`Job::mark_deleted`]; its fields are private so the
//! invariants below hold for every holder of a `Job` value:
//!
//! - progress never decreases outside of a restart;
//! - once terminal, status and the other state fields are frozen;
//! - messages are append-only (restart re-seeds them);
//! - file references never change after creation.

use std::fmt;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::result::AnalysisResult;
use crate::types::{JobId, JsonObject, Timestamp};
use crate::validation;

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

/// Job execution status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    #[serde(alias = "queued")]
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl JobStatus {
    /// `completed`, `failed` and `cancelled` are terminal.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    /// Whether an update may move a job from `self` to `next`.
    ///
    /// Restart (terminal -> pending) is not an update and is not covered here.
    pub fn can_transition_to(self, next: JobStatus) -> bool {
        use JobStatus::*;
        matches!(
            (self, next),
            (Pending, Pending)
                | (Pending, Running)
                | (Pending, Failed)
                | (Running, Running)
                | (Running, Completed)
                | (Running, Failed)
                | (Running, Cancelled)
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Messages and files
// ---------------------------------------------------------------------------

/// Who authored a job message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    Human,
    Agent,
    System,
}

/// One entry of a job's message log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub timestamp: Timestamp,
    pub content: String,
    pub sender: Sender,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<JsonObject>,
}

impl Message {
    pub fn new(sender: Sender, content: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            content: content.into(),
            sender,
            metadata: None,
        }
    }

    pub fn human(content: impl Into<String>) -> Self {
        Self::new(Sender::Human, content)
    }

    pub fn agent(content: impl Into<String>) -> Self {
        Self::new(Sender::Agent, content)
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Sender::System, content)
    }
}

/// Reference to an uploaded input file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRef {
    pub name: String,
    pub size_bytes: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
}

// ---------------------------------------------------------------------------
// Submission and updates
// ---------------------------------------------------------------------------

/// Input for creating a job.
#[derive(Debug, Clone)]
pub struct NewJob {
    pub instructions: String,
    pub files: Vec<FileRef>,
    pub parameters: JsonObject,
}

impl NewJob {
    pub fn validate(&self) -> Result<(), CoreError> {
        validation::validate_instructions(&self.instructions)?;
        validation::validate_files(&self.files)
    }
}

/// Partial update to a job record.
///
/// Scalar fields overwrite, `messages` are appended. Built either by the
/// analysis engine through the builder methods or deserialized from the
/// `PATCH /analysis/{id}` body.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct JobUpdate {
    #[serde(default)]
    pub status: Option<JobStatus>,
    #[serde(default)]
    pub progress: Option<u32>,
    #[serde(default)]
    pub current_agent: Option<String>,
    #[serde(default)]
    pub messages: Vec<Message>,
    #[serde(default)]
    pub result: Option<AnalysisResult>,
    #[serde(default)]
    pub error: Option<String>,
    /// Only honoured when the update moves the job into a terminal status.
    #[serde(default)]
    pub completed_at: Option<Timestamp>,
}

impl JobUpdate {
    pub fn status(status: JobStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    pub fn with_progress(mut self, progress: u32) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn with_message(mut self, message: Message) -> Self {
        self.messages.push(message);
        self
    }

    pub fn with_agent(mut self, agent: impl Into<String>) -> Self {
        self.current_agent = Some(agent.into());
        self
    }

    pub fn with_result(mut self, result: AnalysisResult) -> Self {
        self.result = Some(result);
        self
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    /// True when the update carries nothing to merge.
    pub fn is_empty(&self) -> bool {
        self.status.is_none()
            && self.progress.is_none()
            && self.current_agent.is_none()
            && self.messages.is_empty()
            && self.result.is_none()
            && self.error.is_none()
            && self.completed_at.is_none()
    }

    pub fn validate(&self) -> Result<(), CoreError> {
        if let Some(progress) = self.progress {
            validation::validate_progress(progress)?;
        }
        if let Some(agent) = &self.current_agent {
            if agent.trim().is_empty() {
                return Err(CoreError::Validation(
                    "current_agent must not be empty".to_string(),
                ));
            }
        }
        Ok(())
    }
}

/// What [`Job::apply`] did with an update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// State fields and messages were merged.
    Applied,
    /// The job is terminal; only the messages were appended.
    MessagesOnly,
    /// Nothing to merge; the record is unchanged.
    Ignored,
}

impl ApplyOutcome {
    /// Whether the record changed and subscribers should see a new snapshot.
    pub fn changed(self) -> bool {
        !matches!(self, Self::Ignored)
    }
}

// ---------------------------------------------------------------------------
// Job
// ---------------------------------------------------------------------------

/// A tracked unit of analysis work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    job_id: JobId,
    status: JobStatus,
    progress: u8,
    /// Creation timestamp.
    started_at: Timestamp,
    completed_at: Option<Timestamp>,
    messages: Vec<Message>,
    result: Option<AnalysisResult>,
    error: Option<String>,
    files: Vec<FileRef>,
    current_agent: Option<String>,
    #[serde(default)]
    deleted: bool,
    #[serde(default)]
    parameters: JsonObject,
}

impl Job {
    /// Build a `pending` job from a validated submission.
    ///
    /// The instructions become the first (human) message.
    pub fn new(submission: NewJob) -> Result<Self, CoreError> {
        submission.validate()?;
        Ok(Self {
            job_id: JobId::new_v4(),
            status: JobStatus::Pending,
            progress: 0,
            started_at: Utc::now(),
            completed_at: None,
            messages: vec![Message::human(submission.instructions)],
            result: None,
            error: None,
            files: submission.files,
            current_agent: None,
            deleted: false,
            parameters: submission.parameters,
        })
    }

    pub fn job_id(&self) -> JobId {
        self.job_id
    }

    pub fn status(&self) -> JobStatus {
        self.status
    }

    pub fn progress(&self) -> u8 {
        self.progress
    }

    pub fn started_at(&self) -> Timestamp {
        self.started_at
    }

    pub fn completed_at(&self) -> Option<Timestamp> {
        self.completed_at
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn result(&self) -> Option<&AnalysisResult> {
        self.result.as_ref()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn files(&self) -> &[FileRef] {
        &self.files
    }

    pub fn current_agent(&self) -> Option<&str> {
        self.current_agent.as_deref()
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted
    }

    pub fn parameters(&self) -> &JsonObject {
        &self.parameters
    }

    /// The original instructions: content of the first human message.
    pub fn instructions(&self) -> Option<&str> {
        self.messages
            .iter()
            .find(|m| m.sender == Sender::Human)
            .map(|m| m.content.as_str())
    }

    /// Contents of all non-human messages, in order.
    pub fn logs(&self) -> Vec<String> {
        self.messages
            .iter()
            .filter(|m| m.sender != Sender::Human)
            .map(|m| m.content.clone())
            .collect()
    }

    /// Merge an update into the record.
    ///
    /// - Progress above 100 is a validation error; progress below the
    ///   current value is clamped to the current value.
    /// - A status change not allowed by [`JobStatus::can_transition_to`] is
    ///   rejected with `InvalidState` and nothing is merged.
    /// - On a terminal job only the messages are appended.
    pub fn apply(&mut self, update: JobUpdate, now: Timestamp) -> Result<ApplyOutcome, CoreError> {
        update.validate()?;

        if update.is_empty() {
            return Ok(ApplyOutcome::Ignored);
        }

        if self.status.is_terminal() {
            if update.messages.is_empty() {
                return Ok(ApplyOutcome::Ignored);
            }
            self.messages.extend(update.messages);
            return Ok(ApplyOutcome::MessagesOnly);
        }

        if let Some(next) = update.status {
            if !self.status.can_transition_to(next) {
                return Err(CoreError::InvalidState(format!(
                    "Cannot move job from {} to {next}",
                    self.status
                )));
            }
        }

        if let Some(next) = update.status {
            self.status = next;
            if next.is_terminal() {
                self.completed_at = Some(update.completed_at.unwrap_or(now));
            }
        }

        if let Some(progress) = update.progress {
            // Bounded by validate() above.
            let progress = progress as u8;
            self.progress = self.progress.max(progress);
        }
        if self.status == JobStatus::Completed {
            self.progress = 100;
        }

        if let Some(agent) = update.current_agent {
            self.current_agent = Some(agent);
        }
        if let Some(result) = update.result {
            self.result = Some(result);
        }
        if let Some(error) = update.error {
            self.error = Some(error);
        }
        self.messages.extend(update.messages);

        Ok(ApplyOutcome::Applied)
    }

    /// Cancel a running job.
    ///
    /// Returns `false` (and changes nothing) for any status other than
    /// `running`; cancellation is not retroactive.
    pub fn cancel(&mut self, now: Timestamp) -> bool {
        if self.status != JobStatus::Running {
            return false;
        }
        self.status = JobStatus::Cancelled;
        self.completed_at = Some(now);
        self.messages.push(Message::system("Job cancelled by user"));
        true
    }

    /// Reset a terminal job to `pending` for another run.
    ///
    /// Returns the original instructions recovered from the first human
    /// message.
    pub fn restart(&mut self) -> Result<String, CoreError> {
        if !self.status.is_terminal() {
            return Err(CoreError::InvalidState(format!(
                "Only completed, failed or cancelled jobs can be restarted (job is {})",
                self.status
            )));
        }
        let instructions = self
            .instructions()
            .map(str::to_owned)
            .ok_or_else(|| CoreError::Internal("Job has no human instructions".to_string()))?;

        self.status = JobStatus::Pending;
        self.progress = 0;
        self.completed_at = None;
        self.result = None;
        self.error = None;
        self.current_agent = None;
        self.messages = vec![Message::human(instructions.clone())];

        Ok(instructions)
    }

    pub fn mark_deleted(&mut self) {
        self.deleted = true;
    }
}

// ---------------------------------------------------------------------------
// Listing
// ---------------------------------------------------------------------------

/// Default page size for job listings.
pub const DEFAULT_LIST_LIMIT: usize = 10;

/// Hard cap on the page size for job listings.
pub const MAX_LIST_LIMIT: usize = 100;

/// Query parameters for `GET /api/v1/analysis`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct JobListQuery {
    /// Only return jobs in this status.
    pub status: Option<JobStatus>,
    /// Maximum number of results. Defaults to 10, capped at 100.
    pub limit: Option<usize>,
    /// Number of results to skip. Defaults to 0.
    pub offset: Option<usize>,
}

impl JobListQuery {
    pub fn limit(&self) -> usize {
        self.limit
            .unwrap_or(DEFAULT_LIST_LIMIT)
            .clamp(1, MAX_LIST_LIMIT)
    }

    pub fn offset(&self) -> usize {
        self.offset.unwrap_or(0)
    }

    pub fn matches(&self, job: &Job) -> bool {
        !job.is_deleted() && self.status.map_or(true, |s| job.status() == s)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
