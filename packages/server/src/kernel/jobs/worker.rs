//! Analysis worker service.
//!
//! A pool of `concurrency` loops shares one [`TaskQueue`]. Each loop:
//!
//! ```text
//! loop
//!     │
//!     ├─► dequeue(poll_timeout)   (the only point where shutdown is observed)
//!     ├─► spawn process_report(task)
//!     │       └─► panics stay inside the spawned task; the report is failed
//!     │           if still processing
//!     └─► log the outcome
//! ```
//!
//! `stop()` lets every in-flight task finish, then discards whatever is
//! still queued.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::queue::TaskQueue;
use super::task::AnalysisTask;
use crate::common::ReportId;
use crate::domains::analysis::activities::{fail_abandoned_report, process_report, ABORTED_MESSAGE};
use crate::domains::analysis::{AnalysisError, ProcessOutcome};
use crate::kernel::WorkerDeps;

/// Configuration for the analysis worker.
#[derive(Debug, Clone)]
pub struct AnalysisWorkerConfig {
    /// How long a loop waits on an empty queue before re-checking for shutdown
    pub poll_timeout: Duration,
    /// Number of loops draining the queue
    pub concurrency: usize,
    /// Worker ID for this instance
    pub worker_id: String,
}

impl Default for AnalysisWorkerConfig {
    fn default() -> Self {
        Self {
            poll_timeout: Duration::from_secs(1),
            concurrency: 1,
            worker_id: format!("worker-{}", Uuid::new_v4()),
        }
    }
}

impl AnalysisWorkerConfig {
    /// Create a new config with a specific worker ID.
    pub fn with_worker_id(worker_id: impl Into<String>) -> Self {
        Self {
            worker_id: worker_id.into(),
            ..Default::default()
        }
    }
}

struct RunningLoops {
    shutdown: CancellationToken,
    handles: Vec<JoinHandle<()>>,
}

/// Background analysis worker, constructed once by the composition root and
/// shared with whatever enqueues reports.
pub struct AnalysisWorker {
    deps: WorkerDeps,
    queue: Arc<TaskQueue>,
    config: AnalysisWorkerConfig,
    running: Mutex<Option<RunningLoops>>,
}

impl AnalysisWorker {
    pub fn new(deps: WorkerDeps) -> Self {
        Self::with_config(deps, AnalysisWorkerConfig::default())
    }

    pub fn with_config(deps: WorkerDeps, config: AnalysisWorkerConfig) -> Self {
        Self {
            deps,
            queue: Arc::new(TaskQueue::new()),
            config,
            running: Mutex::new(None),
        }
    }

    /// Queue a report for analysis. The report must already exist as `pending`.
    pub fn enqueue(&self, report_id: ReportId) {
        self.queue.enqueue(AnalysisTask::new(report_id));
        debug!(report_id = %report_id, queued = self.queue.len(), "analysis task queued");
    }

    /// Number of tasks waiting to be dequeued.
    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    pub fn is_running(&self) -> bool {
        self.lock_running().is_some()
    }

    /// Spawn the worker loops. Returns `false` if they were already running.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start(&self) -> bool {
        let mut running = self.lock_running();
        if running.is_some() {
            debug!(worker_id = %self.config.worker_id, "analysis worker already running");
            return false;
        }

        let shutdown = CancellationToken::new();
        let concurrency = self.config.concurrency.max(1);
        let handles = (0..concurrency)
            .map(|slot| {
                tokio::spawn(run_loop(
                    slot,
                    self.config.clone(),
                    self.deps.clone(),
                    self.queue.clone(),
                    shutdown.clone(),
                ))
            })
            .collect();

        *running = Some(RunningLoops { shutdown, handles });

        info!(
            worker_id = %self.config.worker_id,
            concurrency,
            poll_timeout_ms = self.config.poll_timeout.as_millis() as u64,
            "analysis worker started"
        );
        true
    }

    /// Stop the loops. In-flight tasks run to completion; queued tasks are
    /// discarded. No-op when not running.
    pub async fn stop(&self) {
        let running = self.lock_running().take();
        let Some(RunningLoops { shutdown, handles }) = running else {
            return;
        };

        shutdown.cancel();
        for result in futures::future::join_all(handles).await {
            if let Err(e) = result {
                error!(worker_id = %self.config.worker_id, error = %e, "worker loop ended abnormally");
            }
        }

        let discarded = self.queue.clear().await;
        if discarded > 0 {
            warn!(worker_id = %self.config.worker_id, count = discarded, "discarded queued analysis tasks on stop");
        }

        info!(worker_id = %self.config.worker_id, "analysis worker stopped");
    }

    fn lock_running(&self) -> std::sync::MutexGuard<'_, Option<RunningLoops>> {
        self.running.lock().unwrap_or_else(|e| e.into_inner())
    }
}

async fn run_loop(
    slot: usize,
    config: AnalysisWorkerConfig,
    deps: WorkerDeps,
    queue: Arc<TaskQueue>,
    shutdown: CancellationToken,
) {
    debug!(worker_id = %config.worker_id, slot, "worker loop starting");

    loop {
        let task = tokio::select! {
            biased;
            _ = shutdown.cancelled() => break,
            task = queue.dequeue(config.poll_timeout) => task,
        };

        let Some(task) = task else {
            continue;
        };

        run_task(&config.worker_id, task, deps.clone()).await;
    }

    debug!(worker_id = %config.worker_id, slot, "worker loop exiting");
}

/// Runs one task to completion in its own Tokio task so that a panic in the
/// pipeline is contained to that task. A report left in `processing` by a
/// panic is failed here.
async fn run_task(worker_id: &str, task: AnalysisTask, deps: WorkerDeps) {
    let report_id = task.report_id;
    let waited_ms = (chrono::Utc::now() - task.queued_at).num_milliseconds();
    debug!(worker_id, report_id = %report_id, waited_ms, "analysis task dequeued");

    let task_deps = deps.clone();
    let handle = tokio::spawn(async move { process_report(report_id, &task_deps).await });

    match handle.await {
        Ok(Ok(ProcessOutcome::Completed)) => {}
        Ok(Ok(ProcessOutcome::Skipped(status))) => {
            debug!(worker_id, report_id = %report_id, status = %status, "analysis task skipped");
        }
        Ok(Err(e @ (AnalysisError::ReportNotFound(_) | AnalysisError::DomainNotFound { .. }))) => {
            warn!(worker_id, report_id = %report_id, error = %e, "analysis task dropped");
        }
        Ok(Err(e)) => {
            error!(worker_id, report_id = %report_id, error = %e, "analysis task failed");
        }
        Err(e) if e.is_panic() => {
            error!(worker_id, report_id = %report_id, error = %e, "analysis task panicked");
            if let Err(e) = fail_abandoned_report(report_id, &deps, ABORTED_MESSAGE).await {
                error!(worker_id, report_id = %report_id, error = %e, "could not fail panicked report");
            }
        }
        Err(e) => {
            error!(worker_id, report_id = %report_id, error = %e, "analysis task cancelled");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel::test_dependencies::TestDependencies;

    #[test]
    fn test_config_defaults() {
        let config = AnalysisWorkerConfig::default();
        assert_eq!(config.concurrency, 1);
        assert_eq!(config.poll_timeout, Duration::from_secs(1));
        assert!(config.worker_id.starts_with("worker-"));
    }

    #[test]
    fn test_config_with_worker_id() {
        let config = AnalysisWorkerConfig::with_worker_id("my-worker");
        assert_eq!(config.worker_id, "my-worker");
    }

    #[tokio::test]
    async fn start_is_idempotent() {
        let worker = AnalysisWorker::new(TestDependencies::new().worker_deps());

        assert!(worker.start());
        assert!(!worker.start());
        assert!(worker.is_running());

        worker.stop().await;
        assert!(!worker.is_running());
    }

    #[tokio::test]
    async fn stop_without_start_is_noop() {
        let worker = AnalysisWorker::new(TestDependencies::new().worker_deps());
        worker.stop().await;
        assert!(!worker.is_running());
    }

    #[tokio::test]
    async fn enqueue_before_start_waits_in_queue() {
        let worker = AnalysisWorker::new(TestDependencies::new().worker_deps());
        worker.enqueue(ReportId::new());
        worker.enqueue(ReportId::new());

        assert_eq!(worker.queued(), 2);
    }
}
