//! Main entry point for the image edit serving layer

use std::sync::Arc;
use std::time::Duration;

use img_edit_serving::{
    api,
    config::Settings,
    filter::{FilterConfig, PromptFilter},
    image::ImagePolicy,
    pipeline::{http::HttpEditPipeline, manager::PipelineManager},
    processing::EditJobProcessor,
    queue::{job_queue::{JobQueue, QueueConfig}, reaper::{JobReaper, ReaperConfig}},
    storage::OutputStore,
    AppState,
};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Load configuration
    let settings = Settings::load()?;
    settings.validate()?;

    // Initialize logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(settings.logging.level.clone()));

    if settings.logging.format == "json" {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer())
            .init();
    }

    info!("Starting image edit serving layer");
    info!(
        "Loaded configuration: server={}:{} pipeline={}",
        settings.server.host, settings.server.port, settings.pipeline.endpoint
    );

    // External collaborators
    let edit_pipeline = Arc::new(HttpEditPipeline::new(settings.pipeline.endpoint.clone())?);
    let pipeline_manager = Arc::new(PipelineManager::new(edit_pipeline));
    let store = Arc::new(OutputStore::new(settings.storage.base_path.clone()));
    store.ensure_dir().await?;

    // Job queue with the default processor wired in
    let processor = Arc::new(EditJobProcessor::new(
        pipeline_manager.clone(),
        store,
        settings.pipeline.default_variant.clone(),
        Duration::from_secs(settings.pipeline.generation_timeout_secs),
    ));
    let job_queue = JobQueue::with_config(
        QueueConfig {
            max_size: settings.queue.max_size,
            worker_poll_ms: settings.queue.worker_poll_ms,
        },
        Some(processor),
    );

    // Stale-job reaper
    let reaper = JobReaper::new(
        job_queue.clone(),
        ReaperConfig {
            interval_secs: settings.queue.reap_interval_secs,
            retention_secs: settings.queue.retention_secs,
        },
    );
    reaper.start().await;

    let prompt_filter = PromptFilter::new(FilterConfig {
        enabled: settings.prompt_filter.enabled,
        blocked_terms: settings.prompt_filter.blocked_terms.clone(),
    })?;
    let image_policy = ImagePolicy {
        max_bytes: settings.image.max_bytes,
        max_dimension: settings.image.max_dimension,
    };

    let addr = format!("{}:{}", settings.server.host, settings.server.port);

    // Create application state
    let app_state = Arc::new(AppState {
        settings,
        job_queue: job_queue.clone(),
        pipeline_manager,
        prompt_filter,
        image_policy,
    });

    // Build the router
    let app = api::routes::create_router(app_state);

    info!("Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Shutting down");
    job_queue.stop().await;
    reaper.stop().await;

    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}
