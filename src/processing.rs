//! Bridges the worker loop to the resource gate and the output store

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use crate::error::{AppError, Result};
use crate::pipeline::manager::PipelineManager;
use crate::pipeline::traits::EditRequest;
use crate::queue::job::Job;
use crate::queue::job_queue::{JobProcessor, JobQueue};
use crate::storage::OutputStore;

/// Default processor wired into the worker loop: loads the requested variant
/// if needed, runs the generation under a deadline, persists the artifact,
/// and records the terminal transition.
pub struct EditJobProcessor {
    gate: Arc<PipelineManager>,
    store: Arc<OutputStore>,
    default_variant: String,
    generation_timeout: Duration,
}

impl EditJobProcessor {
    pub fn new(
        gate: Arc<PipelineManager>,
        store: Arc<OutputStore>,
        default_variant: String,
        generation_timeout: Duration,
    ) -> Self {
        Self {
            gate,
            store,
            default_variant,
            generation_timeout,
        }
    }
}

#[async_trait]
impl JobProcessor for EditJobProcessor {
    async fn process(&self, job: Job, queue: JobQueue) -> Result<()> {
        let variant = job
            .variant
            .clone()
            .unwrap_or_else(|| self.default_variant.clone());

        // Explicit opportunistic reload: the gate never loads on behalf of a
        // generate call, so the requested variant is loaded here. Idempotent
        // when it is already current.
        self.gate.load_variant(&variant).await?;

        let request = EditRequest {
            image_data: job.image_data.clone(),
            instruction: job.instruction.clone(),
            seed: job.seed,
            style_prompt: job.style_prompt.clone(),
        };

        let output = match tokio::time::timeout(
            self.generation_timeout,
            self.gate.generate(&variant, request),
        )
        .await
        {
            Ok(result) => result?,
            Err(_) => {
                return Err(AppError::Timeout(format!(
                    "generation exceeded {}s deadline",
                    self.generation_timeout.as_secs()
                )))
            }
        };

        let path = self.store.save_png(&output.image_data).await?;
        debug!(job_id = %job.id, path = %path, "artifact stored");

        queue.complete_job(job.id, path, output.seed);
        Ok(())
    }
}
