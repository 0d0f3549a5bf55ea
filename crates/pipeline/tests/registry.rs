//! Tests for `JobRegistry` and the supervised engine runs.
//!
//! A scripted engine stands in for the analysis system. Runs can be held at
//! a gate (a semaphore) so tests control exactly when the engine proceeds,
//! and `JobRegistry::wait` joins a run to make the final state observable.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use assert_matches::assert_matches;
use async_trait::async_trait;
use chrono::Utc;
use datagen_core::error::CoreError;
use datagen_core::job::{FileRef, Job, JobListQuery, JobStatus, JobUpdate, Message, NewJob};
use datagen_core::result::AnalysisResult;
use datagen_core::types::{JobId, JsonObject};
use datagen_events::{NotificationHub, Outbound};
use datagen_pipeline::{
    AnalysisEngine, AnalysisRequest, CancelOutcome, JobRegistry, ProgressReporter, RunOutcome,
    SimulatedEngine,
};
use tokio::sync::{mpsc, Semaphore};

// ---------------------------------------------------------------------------
// Scripted engine
// ---------------------------------------------------------------------------

#[derive(Clone, Copy)]
enum Ending {
    Succeed,
    Fail(&'static str),
    /// Fail the first run, succeed on later ones.
    FailFirstRun(&'static str),
    Panic,
}

struct ScriptedEngine {
    steps: Vec<u32>,
    ending: Ending,
    gate: Option<Arc<Semaphore>>,
    honour_cancel: bool,
    runs: AtomicUsize,
    /// Run numbers that got through all their steps.
    finished: StdMutex<Vec<usize>>,
}

impl ScriptedEngine {
    fn new(steps: &[u32]) -> Self {
        Self {
            steps: steps.to_vec(),
            ending: Ending::Succeed,
            gate: None,
            honour_cancel: true,
            runs: AtomicUsize::new(0),
            finished: StdMutex::new(Vec::new()),
        }
    }

    fn ending(mut self, ending: Ending) -> Self {
        self.ending = ending;
        self
    }

    fn gated(mut self, gate: &Arc<Semaphore>, honour_cancel: bool) -> Self {
        self.gate = Some(Arc::clone(gate));
        self.honour_cancel = honour_cancel;
        self
    }

    fn finished(&self) -> Vec<usize> {
        self.finished.lock().unwrap().clone()
    }

    fn runs(&self) -> usize {
        self.runs.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AnalysisEngine for ScriptedEngine {
    async fn run(
        &self,
        request: AnalysisRequest,
        reporter: ProgressReporter,
    ) -> anyhow::Result<AnalysisResult> {
        let run = self.runs.fetch_add(1, Ordering::SeqCst) + 1;

        if let Some(gate) = &self.gate {
            if self.honour_cancel {
                tokio::select! {
                    biased;
                    () = reporter.cancelled() => anyhow::bail!("run {run} cancelled"),
                    permit = gate.acquire() => permit?.forget(),
                }
            } else {
                gate.acquire().await?.forget();
            }
        }

        for &progress in &self.steps {
            reporter
                .progress(progress, format!("run {run}: step {progress}"))
                .await?;
        }
        self.finished.lock().unwrap().push(run);

        match self.ending {
            Ending::Succeed => {}
            Ending::Fail(error) => anyhow::bail!(error),
            Ending::FailFirstRun(error) if run == 1 => anyhow::bail!(error),
            Ending::FailFirstRun(_) => {}
            Ending::Panic => panic!("engine exploded"),
        }

        let mut result = AnalysisResult::new(format!("run {run} done"), Utc::now());
        result.files = request.files.iter().map(|f| f.name.clone()).collect();
        Ok(result)
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn setup(engine: ScriptedEngine) -> (Arc<JobRegistry>, Arc<ScriptedEngine>) {
    let engine = Arc::new(engine);
    let registry = JobRegistry::new(
        Arc::new(NotificationHub::new()),
        Arc::clone(&engine) as Arc<dyn AnalysisEngine>,
    );
    (registry, engine)
}

fn submission(instructions: &str) -> NewJob {
    NewJob {
        instructions: instructions.to_string(),
        files: vec![FileRef {
            name: "sales.csv".to_string(),
            size_bytes: 1024,
            content_type: Some("text/csv".to_string()),
        }],
        parameters: JsonObject::new(),
    }
}

async fn wait_for_status(registry: &JobRegistry, job_id: JobId, status: JobStatus) -> Job {
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let job = registry.get(job_id).await.expect("job should exist");
            if job.status() == status {
                return job;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap_or_else(|_| panic!("job never reached {status}"))
}

async fn wait_until(mut condition: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition never became true");
}

fn drain_snapshots(rx: &mut mpsc::Receiver<Outbound>) -> Vec<Arc<Job>> {
    let mut snapshots = Vec::new();
    while let Ok(msg) = rx.try_recv() {
        if let Outbound::Snapshot(job) = msg {
            snapshots.push(job);
        }
    }
    snapshots
}

// ---------------------------------------------------------------------------
// Test: a run reports progress and ends completed
// ---------------------------------------------------------------------------

#[tokio::test]
async fn run_progresses_to_completion() {
    let (registry, _engine) = setup(ScriptedEngine::new(&[25, 60]));

    let created = registry.create(submission("find trends")).await.unwrap();
    assert_eq!(created.status(), JobStatus::Pending);
    assert_eq!(created.progress(), 0);

    let outcome = registry.wait(created.job_id()).await;
    assert_eq!(outcome, Some(RunOutcome::Completed));

    let job = registry.get(created.job_id()).await.unwrap();
    assert_eq!(job.status(), JobStatus::Completed);
    assert_eq!(job.progress(), 100);
    assert!(job.completed_at().is_some());
    assert_eq!(job.result().map(|r| r.files.clone()), Some(vec!["sales.csv".to_string()]));
    assert_eq!(
        job.logs(),
        vec![
            "Starting analysis process",
            "run 1: step 25",
            "run 1: step 60",
            "Analysis completed successfully",
        ]
    );
    assert_eq!(job.instructions(), Some("find trends"));
}

// ---------------------------------------------------------------------------
// Test: engine errors and panics end the job as failed
// ---------------------------------------------------------------------------

#[tokio::test]
async fn engine_error_fails_job() {
    let (registry, _engine) = setup(ScriptedEngine::new(&[40]).ending(Ending::Fail("disk on fire")));

    let id = registry.create(submission("x")).await.unwrap().job_id();
    let outcome = registry.wait(id).await;
    assert_matches!(outcome, Some(RunOutcome::Failed(ref e)) if e == "disk on fire");

    let job = registry.get(id).await.unwrap();
    assert_eq!(job.status(), JobStatus::Failed);
    assert_eq!(job.error(), Some("disk on fire"));
    assert_eq!(job.progress(), 40);
    assert_eq!(job.logs().last().map(String::as_str), Some("Analysis failed: disk on fire"));
}

#[tokio::test]
async fn engine_panic_fails_job() {
    let (registry, _engine) = setup(ScriptedEngine::new(&[]).ending(Ending::Panic));

    let id = registry.create(submission("x")).await.unwrap().job_id();
    assert_matches!(registry.wait(id).await, Some(RunOutcome::Failed(_)));

    let job = registry.get(id).await.unwrap();
    assert_eq!(job.status(), JobStatus::Failed);
    assert_eq!(job.error(), Some("Analysis engine panicked"));
}

// ---------------------------------------------------------------------------
// Test: jobs run concurrently without affecting each other
// ---------------------------------------------------------------------------

#[tokio::test]
async fn concurrent_jobs_are_isolated() {
    let gate = Arc::new(Semaphore::new(0));
    let (registry, _engine) = setup(ScriptedEngine::new(&[50]).gated(&gate, true));

    let a = registry.create(submission("job a")).await.unwrap().job_id();
    let b = registry.create(submission("job b")).await.unwrap().job_id();
    wait_for_status(&registry, a, JobStatus::Running).await;
    wait_for_status(&registry, b, JobStatus::Running).await;

    let (tx, mut rx) = mpsc::channel(64);
    registry.subscribe(a, tx).await;

    registry.cancel(b).await.unwrap();
    gate.add_permits(1);
    assert_eq!(registry.wait(a).await, Some(RunOutcome::Completed));
    assert_eq!(registry.wait(b).await, Some(RunOutcome::Cancelled));

    assert_eq!(registry.get(a).await.unwrap().status(), JobStatus::Completed);
    assert_eq!(registry.get(b).await.unwrap().status(), JobStatus::Cancelled);

    let snapshots = drain_snapshots(&mut rx);
    assert!(!snapshots.is_empty());
    assert!(snapshots.iter().all(|job| job.job_id() == a));
}

// ---------------------------------------------------------------------------
// Test: cancel
// ---------------------------------------------------------------------------

#[tokio::test]
async fn cancel_running_job_signals_engine() {
    let gate = Arc::new(Semaphore::new(0));
    let (registry, engine) = setup(ScriptedEngine::new(&[10]).gated(&gate, true));

    let id = registry.create(submission("x")).await.unwrap().job_id();
    wait_for_status(&registry, id, JobStatus::Running).await;

    let outcome = registry.cancel(id).await.unwrap();
    assert_matches!(outcome, CancelOutcome::Cancelled(ref job) if job.status() == JobStatus::Cancelled);

    assert_eq!(registry.wait(id).await, Some(RunOutcome::Cancelled));
    let job = registry.get(id).await.unwrap();
    assert_eq!(job.status(), JobStatus::Cancelled);
    assert!(job.error().is_none(), "engine error must not leak into a cancelled job");
    assert_eq!(job.logs().last().map(String::as_str), Some("Job cancelled by user"));
    assert!(engine.finished().is_empty());
}

#[tokio::test]
async fn cancel_completed_job_is_a_no_op() {
    let (registry, _engine) = setup(ScriptedEngine::new(&[]));

    let id = registry.create(submission("x")).await.unwrap().job_id();
    registry.wait(id).await;

    let outcome = registry.cancel(id).await.unwrap();
    assert_matches!(outcome, CancelOutcome::NotRunning(_));
    assert_eq!(outcome.job().status(), JobStatus::Completed);
    assert_eq!(registry.get(id).await.unwrap().status(), JobStatus::Completed);
}

#[tokio::test]
async fn cancel_unknown_job_is_not_found() {
    let (registry, _engine) = setup(ScriptedEngine::new(&[]));
    let err = registry.cancel(JobId::new_v4()).await;
    assert_matches!(err, Err(CoreError::NotFound { .. }));
}

// ---------------------------------------------------------------------------
// Test: late reports from an engine that ignores cancellation
// ---------------------------------------------------------------------------

#[tokio::test]
async fn late_updates_after_cancel_only_append_messages() {
    let gate = Arc::new(Semaphore::new(0));
    let (registry, engine) = setup(ScriptedEngine::new(&[80]).gated(&gate, false));

    let id = registry.create(submission("x")).await.unwrap().job_id();
    wait_for_status(&registry, id, JobStatus::Running).await;
    registry.cancel(id).await.unwrap();

    gate.add_permits(1);
    assert_eq!(registry.wait(id).await, Some(RunOutcome::Cancelled));
    assert_eq!(engine.finished(), vec![1]);

    let job = registry.get(id).await.unwrap();
    assert_eq!(job.status(), JobStatus::Cancelled);
    assert_eq!(job.progress(), 5);
    assert!(job.result().is_none());
    assert!(job.logs().contains(&"run 1: step 80".to_string()));
    assert!(!job.logs().contains(&"Analysis completed successfully".to_string()));
}

// ---------------------------------------------------------------------------
// Test: restart
// ---------------------------------------------------------------------------

#[tokio::test]
async fn restart_rejected_while_not_terminal() {
    let gate = Arc::new(Semaphore::new(0));
    let (registry, _engine) = setup(ScriptedEngine::new(&[]).gated(&gate, true));

    let id = registry.create(submission("x")).await.unwrap().job_id();
    wait_for_status(&registry, id, JobStatus::Running).await;

    assert_matches!(registry.restart(id).await, Err(CoreError::InvalidState(_)));
    assert_eq!(registry.get(id).await.unwrap().status(), JobStatus::Running);

    gate.add_permits(1);
    registry.wait(id).await;
}

#[tokio::test]
async fn restart_failed_job_runs_again() {
    let (registry, engine) =
        setup(ScriptedEngine::new(&[30]).ending(Ending::FailFirstRun("flaky input")));

    let id = registry.create(submission("retry me")).await.unwrap().job_id();
    assert_matches!(registry.wait(id).await, Some(RunOutcome::Failed(_)));

    let restarted = registry.restart(id).await.unwrap();
    assert_eq!(restarted.status(), JobStatus::Pending);
    assert_eq!(restarted.progress(), 0);
    assert!(restarted.error().is_none());
    assert_eq!(restarted.messages().len(), 1);
    assert_eq!(restarted.instructions(), Some("retry me"));

    assert_eq!(registry.wait(id).await, Some(RunOutcome::Completed));
    let job = registry.get(id).await.unwrap();
    assert_eq!(job.status(), JobStatus::Completed);
    assert!(job.error().is_none());
    assert_eq!(job.result().map(|r| r.summary.as_str()), Some("run 2 done"));
    assert_eq!(engine.finished(), vec![1, 2]);
}

#[tokio::test]
async fn restart_aborts_superseded_run() {
    let gate = Arc::new(Semaphore::new(0));
    let (registry, engine) = setup(ScriptedEngine::new(&[70]).gated(&gate, false));

    let id = registry.create(submission("x")).await.unwrap().job_id();
    wait_until(|| engine.runs() == 1).await;
    registry.cancel(id).await.unwrap();
    registry.restart(id).await.unwrap();
    wait_until(|| engine.runs() == 2).await;

    // Enough permits for both runs; only the new one is still around to
    // take one.
    gate.add_permits(2);
    assert_eq!(registry.wait(id).await, Some(RunOutcome::Completed));
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(engine.finished(), vec![2]);

    let job = registry.get(id).await.unwrap();
    assert_eq!(job.status(), JobStatus::Completed);
    assert!(job.logs().contains(&"run 2: step 70".to_string()));
    assert!(!job.logs().contains(&"run 1: step 70".to_string()));
}

#[tokio::test]
async fn shutdown_after_restart_leaves_no_stray_runs() {
    let gate = Arc::new(Semaphore::new(0));
    let (registry, engine) = setup(ScriptedEngine::new(&[10]).gated(&gate, false));

    let id = registry.create(submission("stubborn")).await.unwrap().job_id();
    wait_until(|| engine.runs() == 1).await;
    registry.cancel(id).await.unwrap();
    registry.restart(id).await.unwrap();
    wait_until(|| engine.runs() == 2).await;

    registry.shutdown(Duration::from_millis(50)).await;
    assert_eq!(registry.wait(id).await, None);

    // Neither the superseded run nor the current one can take a permit.
    tokio::time::sleep(Duration::from_millis(20)).await;
    gate.add_permits(2);
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(engine.finished().is_empty());
    assert_eq!(gate.available_permits(), 2);
}

// ---------------------------------------------------------------------------
// Test: a job that ends before its run starts never reaches the engine
// ---------------------------------------------------------------------------

#[tokio::test]
async fn run_skipped_when_job_failed_before_start() {
    let (registry, engine) = setup(ScriptedEngine::new(&[20]));

    let id = registry.create(submission("x")).await.unwrap().job_id();
    registry
        .update(id, JobUpdate::status(JobStatus::Failed).with_error("upstream rejected"))
        .await
        .unwrap();

    assert_eq!(registry.wait(id).await, Some(RunOutcome::Abandoned));
    assert_eq!(engine.runs(), 0);

    let job = registry.get(id).await.unwrap();
    assert_eq!(job.status(), JobStatus::Failed);
    assert_eq!(job.error(), Some("upstream rejected"));
    assert!(!job.logs().contains(&"Starting analysis process".to_string()));
}

// ---------------------------------------------------------------------------
// Test: external updates
// ---------------------------------------------------------------------------

#[tokio::test]
async fn external_update_validates_progress() {
    let gate = Arc::new(Semaphore::new(0));
    let (registry, _engine) = setup(ScriptedEngine::new(&[]).gated(&gate, true));

    let id = registry.create(submission("x")).await.unwrap().job_id();
    wait_for_status(&registry, id, JobStatus::Running).await;

    let err = registry
        .update(id, JobUpdate::default().with_progress(150))
        .await;
    assert_matches!(err, Err(CoreError::Validation(_)));

    let job = registry
        .update(
            id,
            JobUpdate::default()
                .with_progress(42)
                .with_message(Message::agent("external note")),
        )
        .await
        .unwrap();
    assert_eq!(job.progress(), 42);
    assert_eq!(job.logs().last().map(String::as_str), Some("external note"));

    gate.add_permits(1);
    registry.wait(id).await;
}

#[tokio::test]
async fn update_unknown_job_is_not_found() {
    let (registry, _engine) = setup(ScriptedEngine::new(&[]));
    let err = registry
        .update(JobId::new_v4(), JobUpdate::status(JobStatus::Running))
        .await;
    assert_matches!(err, Err(CoreError::NotFound { .. }));
}

// ---------------------------------------------------------------------------
// Test: delete
// ---------------------------------------------------------------------------

#[tokio::test]
async fn delete_running_job_closes_subscribers_and_swallows_reports() {
    let gate = Arc::new(Semaphore::new(0));
    let (registry, engine) = setup(ScriptedEngine::new(&[90]).gated(&gate, false));

    let id = registry.create(submission("x")).await.unwrap().job_id();
    wait_for_status(&registry, id, JobStatus::Running).await;

    let (tx, mut rx) = mpsc::channel(64);
    registry.subscribe(id, tx).await;

    let deleted = registry.delete(id).await.unwrap();
    assert!(deleted.is_deleted());
    assert_eq!(deleted.status(), JobStatus::Cancelled);

    assert_matches!(rx.recv().await, Some(Outbound::Snapshot(job)) if job.status() == JobStatus::Running);
    assert_matches!(rx.recv().await, Some(Outbound::Snapshot(job)) if job.is_deleted());
    assert_matches!(rx.recv().await, Some(Outbound::Close));
    assert_eq!(registry.hub().subscriber_count(id).await, 0);

    assert_matches!(registry.get(id).await, Err(CoreError::NotFound { .. }));
    assert_matches!(registry.delete(id).await, Err(CoreError::NotFound { .. }));
    assert_eq!(registry.job_count().await, 0);

    // The engine keeps reporting; its updates are silently dropped.
    gate.add_permits(1);
    wait_until(|| engine.finished() == vec![1]).await;
}

// ---------------------------------------------------------------------------
// Test: subscribers
// ---------------------------------------------------------------------------

#[tokio::test]
async fn subscriber_sees_non_decreasing_progress() {
    let gate = Arc::new(Semaphore::new(0));
    let (registry, _engine) = setup(ScriptedEngine::new(&[25, 60, 60, 90]).gated(&gate, true));

    let id = registry.create(submission("x")).await.unwrap().job_id();
    let (tx, mut rx) = mpsc::channel(64);
    registry.subscribe(id, tx).await;

    gate.add_permits(1);
    assert_eq!(registry.wait(id).await, Some(RunOutcome::Completed));

    let snapshots = drain_snapshots(&mut rx);
    let progress: Vec<u8> = snapshots.iter().map(|job| job.progress()).collect();
    assert!(progress.windows(2).all(|w| w[0] <= w[1]), "progress regressed: {progress:?}");
    let last = snapshots.last().expect("at least one snapshot");
    assert_eq!(last.status(), JobStatus::Completed);
    assert_eq!(last.progress(), 100);
}

#[tokio::test]
async fn subscribe_sends_exactly_one_snapshot() {
    let (registry, _engine) = setup(ScriptedEngine::new(&[]));

    let id = registry.create(submission("x")).await.unwrap().job_id();
    registry.wait(id).await;

    let (tx, mut rx) = mpsc::channel(8);
    let subscriber = registry.subscribe(id, tx).await;

    assert_matches!(rx.recv().await, Some(Outbound::Snapshot(job)) if job.job_id() == id);
    assert!(rx.try_recv().is_err());

    registry.unsubscribe(id, subscriber).await;
    assert_eq!(registry.hub().subscriber_count(id).await, 0);
}

#[tokio::test]
async fn subscribe_to_unknown_job_sends_nothing() {
    let (registry, _engine) = setup(ScriptedEngine::new(&[]));

    let (tx, mut rx) = mpsc::channel(8);
    let id = JobId::new_v4();
    registry.subscribe(id, tx).await;

    assert!(rx.try_recv().is_err());
    assert_eq!(registry.hub().subscriber_count(id).await, 1);
}

// ---------------------------------------------------------------------------
// Test: listing
// ---------------------------------------------------------------------------

#[tokio::test]
async fn list_filters_and_pages_newest_first() {
    let (registry, _engine) = setup(ScriptedEngine::new(&[]));

    let mut ids = Vec::new();
    for i in 0..3 {
        let id = registry.create(submission(&format!("job {i}"))).await.unwrap().job_id();
        registry.wait(id).await;
        ids.push(id);
        tokio::time::sleep(Duration::from_millis(2)).await;
    }
    registry.delete(ids[0]).await.unwrap();

    let all = registry.list(&JobListQuery::default()).await;
    let listed: Vec<JobId> = all.iter().map(Job::job_id).collect();
    assert_eq!(listed, vec![ids[2], ids[1]]);

    let page = registry
        .list(&JobListQuery {
            limit: Some(1),
            offset: Some(1),
            ..Default::default()
        })
        .await;
    assert_eq!(page.len(), 1);
    assert_eq!(page[0].job_id(), ids[1]);

    let failed = registry
        .list(&JobListQuery {
            status: Some(JobStatus::Failed),
            ..Default::default()
        })
        .await;
    assert!(failed.is_empty());
}

// ---------------------------------------------------------------------------
// Test: shutdown
// ---------------------------------------------------------------------------

#[tokio::test]
async fn shutdown_stops_cooperative_runs() {
    let gate = Arc::new(Semaphore::new(0));
    let (registry, _engine) = setup(ScriptedEngine::new(&[]).gated(&gate, true));

    let a = registry.create(submission("a")).await.unwrap().job_id();
    let b = registry.create(submission("b")).await.unwrap().job_id();
    wait_for_status(&registry, a, JobStatus::Running).await;
    wait_for_status(&registry, b, JobStatus::Running).await;

    registry.shutdown(Duration::from_secs(2)).await;

    for id in [a, b] {
        assert!(registry.get(id).await.unwrap().status().is_terminal());
        assert_eq!(registry.wait(id).await, None);
    }
}

#[tokio::test]
async fn shutdown_aborts_runs_that_ignore_cancellation() {
    let gate = Arc::new(Semaphore::new(0));
    let (registry, engine) = setup(ScriptedEngine::new(&[50]).gated(&gate, false));

    let id = registry.create(submission("stubborn")).await.unwrap().job_id();
    wait_for_status(&registry, id, JobStatus::Running).await;

    registry.shutdown(Duration::from_millis(50)).await;

    // The engine was aborted along with its supervisor.
    tokio::time::sleep(Duration::from_millis(20)).await;
    gate.add_permits(1);
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(engine.finished().is_empty());
    assert_eq!(registry.get(id).await.unwrap().status(), JobStatus::Running);
}

// ---------------------------------------------------------------------------
// Test: the simulated engine
// ---------------------------------------------------------------------------

fn simulated_registry(step_delay: Duration) -> Arc<JobRegistry> {
    JobRegistry::new(
        Arc::new(NotificationHub::new()),
        Arc::new(SimulatedEngine::new(step_delay)),
    )
}

#[tokio::test(start_paused = true)]
async fn simulated_engine_walks_all_steps() {
    let registry = simulated_registry(Duration::from_secs(2));

    let id = registry.create(submission("full run")).await.unwrap().job_id();
    assert_eq!(registry.wait(id).await, Some(RunOutcome::Completed));

    let job = registry.get(id).await.unwrap();
    assert_eq!(job.status(), JobStatus::Completed);
    assert_eq!(job.current_agent(), Some("reporter"));
    assert_eq!(job.logs().len(), 7);
    assert_eq!(job.logs()[1], "Data loading: Loading and parsing input files");

    let result = job.result().expect("result present");
    assert_eq!(result.files, vec!["sales.csv".to_string()]);
    assert_eq!(result.visualizations.len(), 1);
    assert_eq!(result.report_sections.len(), 2);
}

#[tokio::test(start_paused = true)]
async fn simulated_engine_stops_on_cancel() {
    let registry = simulated_registry(Duration::from_secs(3600));

    let id = registry.create(submission("long run")).await.unwrap().job_id();
    wait_for_status(&registry, id, JobStatus::Running).await;
    registry.cancel(id).await.unwrap();

    assert_eq!(registry.wait(id).await, Some(RunOutcome::Cancelled));
    let job = registry.get(id).await.unwrap();
    assert_eq!(job.status(), JobStatus::Cancelled);
    assert!(job.result().is_none());
}
