//! Capacity-bounded FIFO job queue with a single-consumer worker loop

use std::collections::VecDeque;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use futures::FutureExt;
use tokio::sync::{Mutex, Notify, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::queue::job::{Job, JobPayload, JobStatus, QueueStats};

/// Configuration for the job queue
#[derive(Debug, Clone)]
pub struct QueueConfig {
    /// Maximum number of jobs waiting for dispatch. Admission beyond this is
    /// refused immediately, never blocked.
    pub max_size: usize,
    /// Bounded poll used by the worker loop so a stop signal is observed
    /// promptly instead of blocking on an empty queue
    pub worker_poll_ms: u64,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            max_size: 10,
            worker_poll_ms: 1000,
        }
    }
}

/// Strategy invoked by the worker loop for each dequeued job.
///
/// A processor that finishes its work must call [`JobQueue::complete_job`]
/// itself; the loop does not infer success. A returned error is recorded as
/// the job's failure.
#[async_trait]
pub trait JobProcessor: Send + Sync {
    async fn process(&self, job: Job, queue: JobQueue) -> Result<()>;
}

struct QueueInner {
    config: QueueConfig,
    processor: Option<Arc<dyn JobProcessor>>,
    /// Ids of admitted-not-yet-dispatched jobs, FIFO
    pending: Mutex<VecDeque<Uuid>>,
    /// Lookup table of every tracked job
    jobs: DashMap<Uuid, Job>,
    current_job: parking_lot::RwLock<Option<Uuid>>,
    notify: Notify,
    running: AtomicBool,
    worker: RwLock<Option<JoinHandle<()>>>,
}

/// Capacity-bounded job queue. Cheap to clone; clones share state.
#[derive(Clone)]
pub struct JobQueue {
    inner: Arc<QueueInner>,
}

impl JobQueue {
    /// Create a queue with default configuration
    pub fn new(processor: Arc<dyn JobProcessor>) -> Self {
        Self::with_config(QueueConfig::default(), Some(processor))
    }

    /// Create a queue with custom configuration. A queue constructed without
    /// a processor fails every dispatched job with a configuration error.
    pub fn with_config(config: QueueConfig, processor: Option<Arc<dyn JobProcessor>>) -> Self {
        Self {
            inner: Arc::new(QueueInner {
                config,
                processor,
                pending: Mutex::new(VecDeque::new()),
                jobs: DashMap::new(),
                current_job: parking_lot::RwLock::new(None),
                notify: Notify::new(),
                running: AtomicBool::new(false),
                worker: RwLock::new(None),
            }),
        }
    }

    /// Admit a new job. Refuses with `CapacityExceeded` when the pending set
    /// is at capacity; no job record is created in that case.
    pub async fn submit(&self, payload: JobPayload) -> Result<Job> {
        let job = {
            let mut pending = self.inner.pending.lock().await;
            if pending.len() >= self.inner.config.max_size {
                return Err(AppError::CapacityExceeded(format!(
                    "queue is full (max {} jobs)",
                    self.inner.config.max_size
                )));
            }

            let job = Job::new(payload, pending.len() + 1);
            pending.push_back(job.id);
            self.inner.jobs.insert(job.id, job.clone());
            info!(job_id = %job.id, queue_size = pending.len(), "job submitted");
            job
        };

        self.ensure_worker().await;
        self.inner.notify.notify_one();
        Ok(job)
    }

    /// Get a snapshot of a tracked job
    pub fn get_job(&self, job_id: Uuid) -> Option<Job> {
        self.inner.jobs.get(&job_id).map(|j| j.clone())
    }

    /// Aggregate counts for monitoring
    pub async fn queue_status(&self) -> QueueStats {
        let queue_size = self.inner.pending.lock().await.len();

        let mut queued = 0;
        let mut processing = 0;
        let mut completed = 0;
        let mut failed = 0;
        let mut cancelled = 0;
        for entry in self.inner.jobs.iter() {
            match entry.status {
                JobStatus::Queued => queued += 1,
                JobStatus::Processing => processing += 1,
                JobStatus::Completed => completed += 1,
                JobStatus::Failed => failed += 1,
                JobStatus::Cancelled => cancelled += 1,
            }
        }

        QueueStats {
            max_queue_size: self.inner.config.max_size,
            queue_size,
            queued_count: queued,
            processing_count: processing,
            completed_count: completed,
            failed_count: failed,
            cancelled_count: cancelled,
            current_job_id: *self.inner.current_job.read(),
            total_jobs: self.inner.jobs.len(),
        }
    }

    /// Mark a job completed. No-op for unknown ids.
    pub fn complete_job(&self, job_id: Uuid, result_path: String, result_seed: i64) {
        if let Some(mut job) = self.inner.jobs.get_mut(&job_id) {
            if job.status.is_terminal() {
                // Double-completion anomaly: callers must reach a terminal
                // transition exactly once. The terminal fields are overwritten.
                warn!(job_id = %job_id, status = ?job.status, "terminal job completed again");
            }
            job.status = JobStatus::Completed;
            job.completed_at = Some(Utc::now());
            job.result_path = Some(result_path);
            job.result_seed = Some(result_seed);
            drop(job);

            self.clear_current(job_id);
            info!(job_id = %job_id, "job completed");
        }
    }

    /// Mark a job failed. No-op for unknown ids.
    pub fn fail_job(&self, job_id: Uuid, error: &str) {
        if let Some(mut job) = self.inner.jobs.get_mut(&job_id) {
            if job.status.is_terminal() {
                warn!(job_id = %job_id, status = ?job.status, "terminal job failed again");
            }
            job.status = JobStatus::Failed;
            job.completed_at = Some(Utc::now());
            job.error = Some(error.to_string());
            drop(job);

            self.clear_current(job_id);
            warn!(job_id = %job_id, error = %error, "job failed");
        }
    }

    /// Remove terminal jobs whose completion age exceeds `older_than`.
    /// Queued and processing jobs are never removed regardless of age.
    pub fn reap_expired(&self, older_than: chrono::Duration) -> usize {
        let now = Utc::now();
        let expired: Vec<Uuid> = self
            .inner
            .jobs
            .iter()
            .filter(|entry| {
                entry.status.is_terminal()
                    && entry
                        .completed_at
                        .map(|done| now - done > older_than)
                        .unwrap_or(false)
            })
            .map(|entry| entry.id)
            .collect();

        for job_id in &expired {
            self.inner.jobs.remove(job_id);
            debug!(job_id = %job_id, "reaped expired job");
        }

        expired.len()
    }

    /// Stop the worker loop cooperatively. The current iteration finishes;
    /// queued jobs are abandoned in `Queued` state, not auto-failed.
    pub async fn stop(&self) {
        self.inner.running.store(false, Ordering::SeqCst);
        self.inner.notify.notify_waiters();
        if let Some(handle) = self.inner.worker.write().await.take() {
            let _ = handle.await;
        }
        info!("job queue stopped");
    }

    /// Start the worker lazily; restart it if a previous one has exited
    async fn ensure_worker(&self) {
        let mut slot = self.inner.worker.write().await;
        if slot.as_ref().map(|h| !h.is_finished()).unwrap_or(false) {
            return;
        }

        self.inner.running.store(true, Ordering::SeqCst);
        let queue = self.clone();
        *slot = Some(tokio::spawn(async move {
            queue.run_worker().await;
        }));
    }

    async fn run_worker(self) {
        debug!("worker started");
        let poll = Duration::from_millis(self.inner.config.worker_poll_ms);

        while self.inner.running.load(Ordering::SeqCst) {
            let next = self.inner.pending.lock().await.pop_front();
            let Some(job_id) = next else {
                let _ = tokio::time::timeout(poll, self.inner.notify.notified()).await;
                continue;
            };

            // A failure in dispatch bookkeeping must not terminate the loop
            self.dispatch(job_id).await;
        }
        debug!("worker stopped");
    }

    async fn dispatch(&self, job_id: Uuid) {
        let job = match self.inner.jobs.get_mut(&job_id) {
            Some(mut entry) => {
                entry.status = JobStatus::Processing;
                entry.started_at = Some(Utc::now());
                entry.clone()
            }
            None => {
                error!(job_id = %job_id, "dequeued job missing from lookup table");
                return;
            }
        };

        *self.inner.current_job.write() = Some(job_id);
        self.recompute_positions();
        info!(job_id = %job_id, "processing job");

        match &self.inner.processor {
            Some(processor) => {
                // A panicking processor must not kill the loop or strand the
                // job in Processing; the panic becomes the job's failure
                let outcome = AssertUnwindSafe(processor.process(job, self.clone()))
                    .catch_unwind()
                    .await;
                match outcome {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => self.fail_job(job_id, &e.to_string()),
                    Err(panic) => {
                        let message = panic_message(panic.as_ref());
                        error!(job_id = %job_id, message = %message, "job processor panicked");
                        self.fail_job(job_id, &format!("job processor panicked: {}", message));
                    }
                }
            }
            None => {
                let e = AppError::ConfigurationError("no job processor configured".to_string());
                error!(job_id = %job_id, "{}", e);
                self.fail_job(job_id, &e.to_string());
            }
        }
    }

    /// Reassign positions 1..N over the still-queued set, ordered by
    /// admission time
    fn recompute_positions(&self) {
        let mut queued: Vec<(Uuid, chrono::DateTime<Utc>)> = self
            .inner
            .jobs
            .iter()
            .filter(|entry| entry.status == JobStatus::Queued)
            .map(|entry| (entry.id, entry.created_at))
            .collect();
        queued.sort_by_key(|(_, created_at)| *created_at);

        for (index, (job_id, _)) in queued.iter().enumerate() {
            if let Some(mut job) = self.inner.jobs.get_mut(job_id) {
                job.position = index + 1;
            }
        }
    }

    fn clear_current(&self, job_id: Uuid) {
        let mut current = self.inner.current_job.write();
        if *current == Some(job_id) {
            *current = None;
        }
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
