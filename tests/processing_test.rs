//! End-to-end tests for the production job processor: variant loading,
//! generation deadlines, and artifact persistence

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use img_edit_serving::error::Result;
use img_edit_serving::pipeline::manager::PipelineManager;
use img_edit_serving::pipeline::traits::{EditOutput, EditPipeline, EditRequest};
use img_edit_serving::pipeline::variants::VariantSpec;
use img_edit_serving::processing::EditJobProcessor;
use img_edit_serving::queue::job::{JobPayload, JobStatus};
use img_edit_serving::queue::job_queue::{JobQueue, QueueConfig};
use img_edit_serving::storage::OutputStore;
use parking_lot::Mutex;
use uuid::Uuid;

/// Records every loaded variant; generation either echoes the seed or
/// never returns, depending on `stall`
struct RecordingPipeline {
    loaded: Mutex<Vec<String>>,
    stall: bool,
}

impl RecordingPipeline {
    fn new() -> Self {
        Self {
            loaded: Mutex::new(Vec::new()),
            stall: false,
        }
    }

    fn stalling() -> Self {
        Self {
            loaded: Mutex::new(Vec::new()),
            stall: true,
        }
    }
}

#[async_trait]
impl EditPipeline for RecordingPipeline {
    async fn load(&self, variant: &VariantSpec) -> Result<()> {
        self.loaded.lock().push(variant.key.clone());
        Ok(())
    }

    async fn generate(&self, _variant: &VariantSpec, request: EditRequest) -> Result<EditOutput> {
        if self.stall {
            std::future::pending::<()>().await;
        }
        Ok(EditOutput {
            image_data: vec![0xAB, 0xCD],
            seed: request.seed.unwrap_or(-1),
        })
    }
}

fn payload(variant: Option<&str>, seed: Option<i64>) -> JobPayload {
    JobPayload {
        instruction: "add a red hat".to_string(),
        image_data: vec![1, 2, 3],
        variant: variant.map(str::to_string),
        seed,
        style_prompt: None,
    }
}

fn queue_with(
    pipeline: Arc<RecordingPipeline>,
    timeout: Duration,
) -> (JobQueue, Arc<PipelineManager>, tempfile::TempDir) {
    let gate = Arc::new(PipelineManager::new(pipeline));
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(OutputStore::new(dir.path()));
    let processor = Arc::new(EditJobProcessor::new(
        gate.clone(),
        store,
        "4-step".to_string(),
        timeout,
    ));
    let queue = JobQueue::with_config(
        QueueConfig {
            max_size: 10,
            worker_poll_ms: 50,
        },
        Some(processor),
    );
    (queue, gate, dir)
}

async fn wait_for_terminal(queue: &JobQueue, id: Uuid) -> JobStatus {
    for _ in 0..200 {
        if let Some(job) = queue.get_job(id) {
            if job.status.is_terminal() {
                return job.status;
            }
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("job never reached a terminal state");
}

#[tokio::test]
async fn test_processor_loads_requested_variant_and_stores_artifact() {
    let pipeline = Arc::new(RecordingPipeline::new());
    let (queue, gate, dir) = queue_with(pipeline.clone(), Duration::from_secs(30));

    let job = queue.submit(payload(Some("8-step"), Some(42))).await.unwrap();
    assert_eq!(wait_for_terminal(&queue, job.id).await, JobStatus::Completed);

    let done = queue.get_job(job.id).unwrap();
    assert_eq!(done.result_seed, Some(42));
    let path = done.result_path.unwrap();
    assert!(path.ends_with(".png"));
    assert_eq!(tokio::fs::read(&path).await.unwrap(), vec![0xAB, 0xCD]);

    assert_eq!(*pipeline.loaded.lock(), vec!["8-step".to_string()]);
    assert_eq!(gate.current_variant().as_deref(), Some("8-step"));
    drop(dir);
}

#[tokio::test]
async fn test_processor_falls_back_to_default_variant() {
    let pipeline = Arc::new(RecordingPipeline::new());
    let (queue, gate, _dir) = queue_with(pipeline.clone(), Duration::from_secs(30));

    let job = queue.submit(payload(None, None)).await.unwrap();
    assert_eq!(wait_for_terminal(&queue, job.id).await, JobStatus::Completed);

    assert_eq!(*pipeline.loaded.lock(), vec!["4-step".to_string()]);
    assert_eq!(gate.current_variant().as_deref(), Some("4-step"));
}

#[tokio::test]
async fn test_processor_reloads_when_jobs_request_different_variants() {
    let pipeline = Arc::new(RecordingPipeline::new());
    let (queue, _gate, _dir) = queue_with(pipeline.clone(), Duration::from_secs(30));

    let first = queue.submit(payload(Some("4-step"), None)).await.unwrap();
    assert_eq!(wait_for_terminal(&queue, first.id).await, JobStatus::Completed);
    let second = queue.submit(payload(Some("40-step"), None)).await.unwrap();
    assert_eq!(wait_for_terminal(&queue, second.id).await, JobStatus::Completed);

    assert_eq!(
        *pipeline.loaded.lock(),
        vec!["4-step".to_string(), "40-step".to_string()]
    );
}

#[tokio::test]
async fn test_generation_deadline_fails_the_job() {
    let pipeline = Arc::new(RecordingPipeline::stalling());
    let (queue, gate, _dir) = queue_with(pipeline, Duration::from_millis(100));

    let job = queue.submit(payload(None, None)).await.unwrap();
    assert_eq!(wait_for_terminal(&queue, job.id).await, JobStatus::Failed);

    let failed = queue.get_job(job.id).unwrap();
    assert!(failed.error.unwrap().contains("deadline"));
    assert!(failed.result_path.is_none());
    assert_eq!(queue.queue_status().await.current_job_id, None);

    // The abandoned generation released the gate's busy flag with it
    for _ in 0..100 {
        if !gate.is_generating() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(!gate.is_generating());
}

#[tokio::test]
async fn test_unknown_variant_in_job_fails_it() {
    let pipeline = Arc::new(RecordingPipeline::new());
    let (queue, _gate, _dir) = queue_with(pipeline.clone(), Duration::from_secs(30));

    let job = queue.submit(payload(Some("2-step"), None)).await.unwrap();
    assert_eq!(wait_for_terminal(&queue, job.id).await, JobStatus::Failed);

    let failed = queue.get_job(job.id).unwrap();
    assert!(failed.error.unwrap().contains("2-step"));
    assert!(pipeline.loaded.lock().is_empty());
}
