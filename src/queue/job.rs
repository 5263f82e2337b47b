//! Job record: immutable identity plus mutable lifecycle state

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle state of a job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Queued,
    Processing,
    Completed,
    Failed,
    /// Reachable terminal state, no transition currently produces it
    Cancelled,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled)
    }
}

/// Request fields captured at admission time
#[derive(Debug, Clone)]
pub struct JobPayload {
    pub instruction: String,
    pub image_data: Vec<u8>,
    pub variant: Option<String>,
    pub seed: Option<i64>,
    pub style_prompt: Option<String>,
}

/// One admitted unit of work, tracked from admission through a terminal outcome
#[derive(Debug, Clone)]
pub struct Job {
    pub id: Uuid,
    pub instruction: String,
    pub image_data: Vec<u8>,
    pub variant: Option<String>,
    pub seed: Option<i64>,
    pub style_prompt: Option<String>,
    pub status: JobStatus,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub result_path: Option<String>,
    pub result_seed: Option<i64>,
    pub error: Option<String>,
    /// Position in the queued set, meaningful only while `Queued` (head = 1)
    pub position: usize,
}

impl Job {
    /// Construct a freshly admitted job
    pub fn new(payload: JobPayload, position: usize) -> Self {
        Self {
            id: Uuid::new_v4(),
            instruction: payload.instruction,
            image_data: payload.image_data,
            variant: payload.variant,
            seed: payload.seed,
            style_prompt: payload.style_prompt,
            status: JobStatus::Queued,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
            result_path: None,
            result_seed: None,
            error: None,
            position,
        }
    }

    /// Short projection returned at submission time
    pub fn summary(&self, estimated_wait_secs: u64) -> JobSummary {
        JobSummary {
            id: self.id,
            status: self.status,
            position: self.position,
            estimated_wait_secs,
        }
    }

    /// Full projection for status polling. Raw image bytes are never exposed.
    pub fn detail(&self) -> JobDetail {
        JobDetail {
            id: self.id,
            status: self.status,
            position: if self.status == JobStatus::Queued {
                Some(self.position)
            } else {
                None
            },
            created_at: self.created_at,
            started_at: self.started_at,
            completed_at: self.completed_at,
            result_path: self.result_path.clone(),
            result_seed: self.result_seed,
            error: self.error.clone(),
            instruction: self.instruction.clone(),
            variant: self.variant.clone(),
            seed: self.seed,
            style_prompt: self.style_prompt.clone(),
        }
    }
}

/// Submission response projection
#[derive(Debug, Clone, Serialize)]
pub struct JobSummary {
    pub id: Uuid,
    pub status: JobStatus,
    pub position: usize,
    pub estimated_wait_secs: u64,
}

/// Status polling projection
#[derive(Debug, Clone, Serialize)]
pub struct JobDetail {
    pub id: Uuid,
    pub status: JobStatus,
    pub position: Option<usize>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub result_path: Option<String>,
    pub result_seed: Option<i64>,
    pub error: Option<String>,
    pub instruction: String,
    pub variant: Option<String>,
    pub seed: Option<i64>,
    pub style_prompt: Option<String>,
}

/// Aggregate counts for monitoring
#[derive(Debug, Clone, Serialize)]
pub struct QueueStats {
    pub max_queue_size: usize,
    pub queue_size: usize,
    pub queued_count: usize,
    pub processing_count: usize,
    pub completed_count: usize,
    pub failed_count: usize,
    pub cancelled_count: usize,
    pub current_job_id: Option<Uuid>,
    pub total_jobs: usize,
}
