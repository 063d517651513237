//! Deferred execution of `.queued` event scripts
//!
//! The engine hands a [`ScriptJob`] to a [`QueueSubmitter`] and moves on.
//! [`TokioScriptQueue`] is the in-process reference queue: a channel feeding
//! a worker loop that runs at most `workers` jobs at a time. A delayed job
//! waits out its delay before taking a worker slot. Each job looks
//! its script up again and runs it against the event snapshot captured at
//! submission, so it can never touch the original event.

use crate::store::ScriptResolver;
use chrono::{DateTime, Utc};
use hookscript_config::QueueSettings;
use hookscript_core::{Error, EventEnvelope, Result, ScriptMap, ServiceEvent};
use hookscript_scripting::ScriptExecutor;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Semaphore};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Job kind for deferred service event scripts
pub const SERVICE_EVENT_SCRIPT_JOB: &str = "service-event-script";

/// Where and when a job should run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueuePlacement {
    /// Delay before the job may start
    pub delay: Option<Duration>,
    /// Target queue name
    pub queue: Option<String>,
    /// Target connection name
    pub connection: Option<String>,
}

impl QueuePlacement {
    /// Read `QUEUED_DELAY`, `QUEUED_QUEUE` and `QUEUED_CONNECTION` from a
    /// script configuration, ignoring key case
    pub fn from_config(config: &ScriptMap) -> Self {
        let mut placement = Self::default();

        for (key, value) in config {
            match key.to_ascii_uppercase().as_str() {
                "QUEUED_DELAY" => placement.delay = parse_delay(value),
                "QUEUED_QUEUE" => placement.queue = non_empty_string(value),
                "QUEUED_CONNECTION" => placement.connection = non_empty_string(value),
                _ => {}
            }
        }

        placement
    }
}

fn parse_delay(value: &Value) -> Option<Duration> {
    let secs = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }?;

    if secs.is_nan() || secs <= 0.0 {
        return None;
    }

    match Duration::try_from_secs_f64(secs) {
        Ok(delay) => Some(delay),
        Err(_) => {
            warn!(delay = secs, "QUEUED_DELAY out of range, running without delay");
            None
        }
    }
}

fn non_empty_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// A deferred script execution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScriptJob {
    /// Job id
    pub id: Uuid,
    /// Job kind
    pub kind: String,
    /// Name of the `.queued` script to run
    pub name: String,
    /// Snapshot of the event at submission
    pub event: EventEnvelope,
    /// Configuration of the queued script at submission
    pub config: ScriptMap,
    /// Queue placement derived from the configuration
    pub placement: QueuePlacement,
    /// Submission time
    pub submitted_at: DateTime<Utc>,
}

impl ScriptJob {
    /// Create a job for a service event
    pub fn service_event(name: impl Into<String>, event: &ServiceEvent, config: ScriptMap) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind: SERVICE_EVENT_SCRIPT_JOB.to_string(),
            name: name.into(),
            event: event.make_data(),
            placement: QueuePlacement::from_config(&config),
            config,
            submitted_at: Utc::now(),
        }
    }
}

/// Accepts jobs for asynchronous execution
///
/// Submission is fire-and-forget: the caller never observes the outcome.
pub trait QueueSubmitter: Send + Sync {
    /// Enqueue a job
    fn submit(&self, job: ScriptJob);
}

/// Receives deferred job failures
pub trait FailureSink: Send + Sync {
    /// Record a failed job
    fn record(&self, job: &ScriptJob, error: &Error);
}

/// A recorded deferred job failure
#[derive(Debug, Clone, PartialEq)]
pub struct FailedJob {
    /// Job id
    pub job_id: Uuid,
    /// Script name
    pub name: String,
    /// Queue the job ran on
    pub queue: Option<String>,
    /// Failure message
    pub error: String,
    /// When the failure was recorded
    pub failed_at: DateTime<Utc>,
}

/// Logs failures and keeps them in memory
#[derive(Debug, Default)]
pub struct CollectingFailureSink {
    failures: Mutex<Vec<FailedJob>>,
}

impl CollectingFailureSink {
    /// Create an empty sink
    pub fn new() -> Self {
        Self::default()
    }

    /// Recorded failures, oldest first
    pub fn failures(&self) -> Vec<FailedJob> {
        self.failures.lock().clone()
    }

    /// Number of recorded failures
    pub fn len(&self) -> usize {
        self.failures.lock().len()
    }

    /// Whether no failures were recorded
    pub fn is_empty(&self) -> bool {
        self.failures.lock().is_empty()
    }
}

impl FailureSink for CollectingFailureSink {
    fn record(&self, job: &ScriptJob, error: &Error) {
        error!(
            job_id = %job.id,
            script = %job.name,
            queue = job.placement.queue.as_deref().unwrap_or_default(),
            error = %error,
            "Deferred script job failed"
        );

        self.failures.lock().push(FailedJob {
            job_id: job.id,
            name: job.name.clone(),
            queue: job.placement.queue.clone(),
            error: error.to_string(),
            failed_at: Utc::now(),
        });
    }
}

/// Runs deferred jobs: fresh lookup, then execute against the snapshot
#[derive(Clone)]
pub struct JobRunner {
    scripts: ScriptResolver,
    executor: Arc<dyn ScriptExecutor>,
}

impl std::fmt::Debug for JobRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobRunner")
            .field("scripts", &self.scripts)
            .finish()
    }
}

impl JobRunner {
    /// Create a runner
    pub fn new(scripts: ScriptResolver, executor: Arc<dyn ScriptExecutor>) -> Self {
        Self { scripts, executor }
    }

    /// Run one job
    ///
    /// A script deactivated since submission is skipped.
    pub async fn run(&self, job: &ScriptJob) -> Result<Option<Value>> {
        let Some(script) = self.scripts.resolve(&job.name).await? else {
            debug!(job_id = %job.id, script = %job.name, "Queued script no longer active, skipping");
            return Ok(None);
        };

        self.executor
            .execute(
                &script.name,
                &script.content,
                &script.script_type,
                &script.config,
                &job.event,
            )
            .await
    }
}

/// Marks one submitted job finished when dropped, including on panic
struct PendingGuard(Arc<AtomicUsize>);

impl Drop for PendingGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::AcqRel);
    }
}

/// In-process queue backed by a Tokio channel and worker loop
pub struct TokioScriptQueue {
    sender: Mutex<Option<mpsc::UnboundedSender<ScriptJob>>>,
    default_queue: String,
    failures: Arc<dyn FailureSink>,
    /// Jobs submitted but not yet finished
    pending: Arc<AtomicUsize>,
    submitted: AtomicU64,
}

impl std::fmt::Debug for TokioScriptQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokioScriptQueue")
            .field("default_queue", &self.default_queue)
            .field("pending", &self.pending())
            .field("submitted", &self.submitted())
            .finish()
    }
}

impl TokioScriptQueue {
    /// Start the queue and its worker loop
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start(
        runner: JobRunner,
        settings: &QueueSettings,
        failures: Arc<dyn FailureSink>,
    ) -> Arc<Self> {
        let (tx, rx) = mpsc::unbounded_channel();
        let pending = Arc::new(AtomicUsize::new(0));
        let workers = settings.workers.max(1);

        tokio::spawn(Self::work(
            rx,
            runner,
            Arc::clone(&failures),
            Arc::clone(&pending),
            workers,
        ));

        info!(
            default_queue = %settings.default_queue,
            workers,
            "Script queue started"
        );

        Arc::new(Self {
            sender: Mutex::new(Some(tx)),
            default_queue: settings.default_queue.clone(),
            failures,
            pending,
            submitted: AtomicU64::new(0),
        })
    }

    async fn work(
        mut rx: mpsc::UnboundedReceiver<ScriptJob>,
        runner: JobRunner,
        failures: Arc<dyn FailureSink>,
        pending: Arc<AtomicUsize>,
        workers: usize,
    ) {
        let slots = Arc::new(Semaphore::new(workers));

        while let Some(job) = rx.recv().await {
            let slots = Arc::clone(&slots);
            let runner = runner.clone();
            let failures = Arc::clone(&failures);
            let finished = PendingGuard(Arc::clone(&pending));

            tokio::spawn(async move {
                let _finished = finished;

                if let Some(delay) = job.placement.delay {
                    tokio::time::sleep(delay).await;
                }

                let Ok(_permit) = slots.acquire_owned().await else {
                    return;
                };

                match runner.run(&job).await {
                    Ok(_) => debug!(job_id = %job.id, script = %job.name, "Deferred script job completed"),
                    Err(e) => failures.record(&job, &e),
                }
            });
        }

        debug!("Script queue worker loop finished");
    }

    /// Jobs submitted but not yet finished
    pub fn pending(&self) -> usize {
        self.pending.load(Ordering::Acquire)
    }

    /// Total jobs accepted
    pub fn submitted(&self) -> u64 {
        self.submitted.load(Ordering::Relaxed)
    }

    /// Whether the queue still accepts jobs
    pub fn is_open(&self) -> bool {
        self.sender.lock().is_some()
    }

    /// Stop accepting jobs and wait for in-flight jobs until `timeout`
    ///
    /// Returns the number of jobs still unfinished when waiting stopped.
    pub async fn shutdown(&self, timeout: Duration) -> usize {
        self.sender.lock().take();

        let start = tokio::time::Instant::now();
        info!(
            timeout_secs = timeout.as_secs(),
            "Waiting for deferred script jobs to complete"
        );

        loop {
            let pending = self.pending();

            if pending == 0 {
                info!("All deferred script jobs completed");
                return 0;
            }

            if start.elapsed() >= timeout {
                warn!(pending_jobs = pending, "Queue shutdown timeout reached");
                return pending;
            }

            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }
}

impl QueueSubmitter for TokioScriptQueue {
    fn submit(&self, mut job: ScriptJob) {
        job.placement
            .queue
            .get_or_insert_with(|| self.default_queue.clone());

        let sender = self.sender.lock();
        let Some(sender) = sender.as_ref() else {
            self.failures
                .record(&job, &Error::Queue("script queue is shut down".to_string()));
            return;
        };

        self.pending.fetch_add(1, Ordering::AcqRel);
        let (id, name, queue) = (job.id, job.name.clone(), job.placement.queue.clone());

        match sender.send(job) {
            Ok(()) => {
                self.submitted.fetch_add(1, Ordering::Relaxed);
                debug!(
                    job_id = %id,
                    script = %name,
                    queue = queue.as_deref().unwrap_or_default(),
                    "Script job queued"
                );
            }
            Err(mpsc::error::SendError(job)) => {
                self.pending.fetch_sub(1, Ordering::AcqRel);
                self.failures
                    .record(&job, &Error::Queue("script queue worker stopped".to_string()));
            }
        }
    }
}
