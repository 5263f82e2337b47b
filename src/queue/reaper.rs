//! Periodic sweep removing retained terminal jobs after a retention window

use std::time::Duration;

use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::queue::job_queue::JobQueue;

/// Configuration for the stale-job reaper
#[derive(Debug, Clone)]
pub struct ReaperConfig {
    /// Seconds between sweeps
    pub interval_secs: u64,
    /// Age a terminal job must exceed before removal
    pub retention_secs: u64,
}

impl Default for ReaperConfig {
    fn default() -> Self {
        Self {
            interval_secs: 300,
            retention_secs: 3600,
        }
    }
}

/// Background task that bounds memory growth of the job lookup table.
/// Removed jobs are gone: status queries after reaping return not-found.
pub struct JobReaper {
    queue: JobQueue,
    config: ReaperConfig,
    task: RwLock<Option<JoinHandle<()>>>,
}

impl JobReaper {
    pub fn new(queue: JobQueue, config: ReaperConfig) -> Self {
        Self {
            queue,
            config,
            task: RwLock::new(None),
        }
    }

    /// Start the periodic sweep task
    pub async fn start(&self) {
        let queue = self.queue.clone();
        let interval = Duration::from_secs(self.config.interval_secs);
        let retention = chrono::Duration::seconds(self.config.retention_secs as i64);

        let handle = tokio::spawn(async move {
            loop {
                tokio::time::sleep(interval).await;

                let removed = queue.reap_expired(retention);
                if removed > 0 {
                    info!(removed, "reaper removed expired jobs");
                }
            }
        });

        let mut slot = self.task.write().await;
        if let Some(old) = slot.take() {
            warn!("reaper already started, replacing sweep task");
            old.abort();
        }
        *slot = Some(handle);
        info!(
            interval_secs = self.config.interval_secs,
            retention_secs = self.config.retention_secs,
            "started job reaper"
        );
    }

    /// Stop the sweep task
    pub async fn stop(&self) {
        if let Some(handle) = self.task.write().await.take() {
            handle.abort();
            info!("stopped job reaper");
        }
    }
}
