//! Job admission, lifecycle tracking, and reaping

pub mod job;
pub mod job_queue;
pub mod reaper;

pub use job::{Job, JobDetail, JobPayload, JobStatus, JobSummary, QueueStats};
pub use job_queue::{JobProcessor, JobQueue, QueueConfig};
pub use reaper::{JobReaper, ReaperConfig};
