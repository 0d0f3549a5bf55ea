//! Per-run supervisor.
//!
//! Every engine run is driven by one supervisor task that:
//!   1. moves the job to `running`,
//!   2. spawns the engine as a child task it owns,
//!   3. joins the child and applies exactly one terminal update, turning an
//!      engine error or panic into `failed`.
//!
//! A job that is already terminal when the run starts is left alone and the
//! engine is never spawned.
//!
//! The supervisor's `JoinHandle` is kept by the registry so completion is
//! observable; aborting the supervisor aborts the engine child as well.

use std::sync::Arc;

use datagen_core::error::CoreError;
use datagen_core::job::{Job, JobStatus, JobUpdate, Message};
use tokio::task::JoinHandle;
use tokio_util::task::AbortOnDropHandle;
use tracing::Instrument;

use crate::engine::{AnalysisEngine, AnalysisRequest, ProgressReporter};

/// Progress recorded when a run starts.
const START_PROGRESS: u32 = 5;

/// How a supervised run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    Completed,
    Failed(String),
    /// The job was cancelled while the engine was working; its result was
    /// discarded.
    Cancelled,
    /// A restart started a newer run before this one finished.
    Superseded,
    /// The job was deleted or had already ended before the engine started,
    /// or the supervisor itself died.
    Abandoned,
}

/// Spawn the supervisor for one run.
pub(crate) fn spawn_run(
    engine: Arc<dyn AnalysisEngine>,
    request: AnalysisRequest,
    reporter: ProgressReporter,
) -> JoinHandle<RunOutcome> {
    let span = tracing::info_span!(
        "analysis_run",
        job_id = %request.job_id,
        run = reporter.generation(),
    );
    tokio::spawn(supervise(engine, request, reporter).instrument(span))
}

async fn supervise(
    engine: Arc<dyn AnalysisEngine>,
    request: AnalysisRequest,
    reporter: ProgressReporter,
) -> RunOutcome {
    let start = JobUpdate::status(JobStatus::Running)
        .with_progress(START_PROGRESS)
        .with_message(Message::system("Starting analysis process"));
    match report(&reporter, start, Stage::Start).await {
        Ok(Some(job)) if job.status().is_terminal() => {
            tracing::info!(status = %job.status(), "Job already ended, engine not started");
            return RunOutcome::Abandoned;
        }
        Ok(Some(_)) => {}
        Ok(None) => return RunOutcome::Superseded,
        Err(outcome) => return outcome,
    }
    tracing::info!("Analysis run started");

    let engine_reporter = reporter.clone();
    let child = AbortOnDropHandle::new(tokio::spawn(
        async move { engine.run(request, engine_reporter).await }.in_current_span(),
    ));

    let terminal = match child.await {
        Ok(Ok(result)) => JobUpdate::status(JobStatus::Completed)
            .with_progress(100)
            .with_result(result)
            .with_message(Message::system("Analysis completed successfully")),
        Ok(Err(e)) => {
            let error = format!("{e:#}");
            tracing::warn!(error = %error, "Analysis engine returned an error");
            failed_update(error)
        }
        Err(e) => {
            let error = if e.is_panic() {
                "Analysis engine panicked".to_string()
            } else {
                "Analysis engine task was aborted".to_string()
            };
            tracing::error!(error = %e, "Analysis engine task did not finish");
            failed_update(error)
        }
    };

    match report(&reporter, terminal, Stage::Finish).await {
        Ok(Some(job)) => {
            let outcome = match job.status() {
                JobStatus::Completed => RunOutcome::Completed,
                JobStatus::Cancelled => RunOutcome::Cancelled,
                _ => RunOutcome::Failed(job.error().unwrap_or_default().to_string()),
            };
            tracing::info!(outcome = ?outcome, "Analysis run finished");
            outcome
        }
        Ok(None) => RunOutcome::Superseded,
        Err(outcome) => outcome,
    }
}

fn failed_update(error: String) -> JobUpdate {
    JobUpdate::status(JobStatus::Failed)
        .with_message(Message::system(format!("Analysis failed: {error}")))
        .with_error(error)
}

#[derive(Clone, Copy)]
enum Stage {
    Start,
    Finish,
}

/// Apply a lifecycle update for this run.
///
/// `Ok(None)` means the run was superseded; `Err` carries the outcome to
/// end the run with.
async fn report(
    reporter: &ProgressReporter,
    update: JobUpdate,
    stage: Stage,
) -> Result<Option<Job>, RunOutcome> {
    let registry = reporter.registry();
    let (job_id, generation) = (reporter.job_id(), reporter.generation());
    let applied = match stage {
        Stage::Start => registry.start_run(job_id, generation, update).await,
        Stage::Finish => registry.finish_run(job_id, generation, update).await,
    };
    match applied {
        Ok(job) => Ok(job),
        Err(CoreError::NotFound { .. }) => {
            tracing::debug!("Job removed, abandoning run");
            Err(RunOutcome::Abandoned)
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to apply lifecycle update");
            Err(RunOutcome::Failed(e.to_string()))
        }
    }
}
