//! Image Edit Serving Layer
//!
//! Admission control and job scheduling in front of a single shared
//! image-edit pipeline: a capacity-bounded FIFO queue, a single-flight
//! worker loop, a stale-job reaper, and a resource gate that serializes
//! variant loads and generations.

pub mod api;
pub mod config;
pub mod error;
pub mod filter;
pub mod image;
pub mod middleware;
pub mod pipeline;
pub mod processing;
pub mod queue;
pub mod storage;

pub use error::{AppError, Result};

use std::sync::Arc;

use filter::PromptFilter;
use image::ImagePolicy;
use pipeline::manager::PipelineManager;
use queue::job_queue::JobQueue;

/// Application state shared across all handlers
pub struct AppState {
    pub settings: config::Settings,
    pub job_queue: JobQueue,
    pub pipeline_manager: Arc<PipelineManager>,
    pub prompt_filter: PromptFilter,
    pub image_policy: ImagePolicy,
}
