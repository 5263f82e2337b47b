//! HTTP surface over the job queue and the resource gate

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::image;
use crate::middleware::auth::ApiKeyLayer;
use crate::queue::job::JobPayload;
use crate::AppState;

/// Build the application router
pub fn create_router(state: Arc<AppState>) -> Router {
    let body_limit = state.image_policy.max_bytes + 1024 * 1024;

    let mut router = Router::new()
        .route("/", get(service_info))
        .route("/api/v1/health", get(health))
        .route("/api/v1/models", get(list_models))
        .route("/api/v1/queue", get(queue_stats))
        .route("/api/v1/jobs/:id", get(job_status))
        .route("/api/v1/edit", post(submit_edit))
        .route("/api/v1/warmup", post(warmup))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    if state.settings.auth.enabled {
        router = router.layer(ApiKeyLayer::new(state.settings.auth.api_keys.clone()));
    }

    router.with_state(state)
}

async fn service_info() -> impl IntoResponse {
    Json(json!({
        "service": "img-edit-serving",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "edit": "POST /api/v1/edit",
            "job_status": "GET /api/v1/jobs/{id}",
            "queue": "GET /api/v1/queue",
            "models": "GET /api/v1/models",
            "warmup": "POST /api/v1/warmup",
            "health": "GET /api/v1/health"
        }
    }))
}

async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let gate = &state.pipeline_manager;
    Json(json!({
        "status": "healthy",
        "current_variant": gate.current_variant(),
        "variant_loaded": gate.is_loaded(),
        "is_loading": gate.is_loading(),
        "is_generating": gate.is_generating(),
    }))
}

async fn list_models(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let variants: BTreeMap<&str, _> = state
        .pipeline_manager
        .catalog()
        .all()
        .iter()
        .map(|spec| (spec.key.as_str(), spec))
        .collect();

    Json(json!({
        "variants": variants,
        "note": "switching variants between jobs requires a full pipeline reload",
    }))
}

async fn queue_stats(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.job_queue.queue_status().await)
}

async fn job_status(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse> {
    let job_id = Uuid::parse_str(&id)
        .map_err(|_| AppError::NotFound(format!("unknown job id '{}'", id)))?;

    let job = state
        .job_queue
        .get_job(job_id)
        .ok_or_else(|| AppError::NotFound(format!("unknown job id '{}'", id)))?;

    Ok(Json(job.detail()))
}

async fn submit_edit(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse> {
    let mut instruction: Option<String> = None;
    let mut image_data: Option<Vec<u8>> = None;
    let mut variant: Option<String> = None;
    let mut seed: Option<i64> = None;
    let mut style_prompt: Option<String> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::InvalidRequest(format!("malformed multipart body: {}", e)))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "image" => {
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::InvalidRequest(format!("failed to read image: {}", e)))?;
                image_data = Some(bytes.to_vec());
            }
            "instruction" => instruction = Some(read_text(field).await?),
            "variant" | "model" => variant = Some(read_text(field).await?),
            "seed" => {
                let text = read_text(field).await?;
                seed = Some(text.parse::<i64>().map_err(|_| {
                    AppError::InvalidRequest(format!("seed '{}' is not an integer", text))
                })?);
            }
            "style_prompt" | "system_prompt" => style_prompt = Some(read_text(field).await?),
            _ => {}
        }
    }

    let instruction = instruction
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| AppError::InvalidRequest("missing 'instruction' field".to_string()))?;
    let image_data = image_data
        .filter(|b| !b.is_empty())
        .ok_or_else(|| AppError::InvalidRequest("missing 'image' field".to_string()))?;

    let variant_key = variant
        .clone()
        .unwrap_or_else(|| state.settings.pipeline.default_variant.clone());
    let spec = state
        .pipeline_manager
        .catalog()
        .get(&variant_key)
        .ok_or_else(|| {
            AppError::InvalidRequest(format!(
                "unknown variant '{}', expected one of {:?}",
                variant_key,
                state.pipeline_manager.catalog().keys()
            ))
        })?;
    let estimated_secs = spec.estimated_secs;

    state
        .prompt_filter
        .check(&instruction, style_prompt.as_deref())?;
    image::validate(&image_data, &state.image_policy)?;

    let job = state
        .job_queue
        .submit(JobPayload {
            instruction,
            image_data,
            variant,
            seed,
            style_prompt,
        })
        .await?;

    let estimated_wait = job.position as u64 * estimated_secs;
    Ok((StatusCode::ACCEPTED, Json(job.summary(estimated_wait))))
}

#[derive(Debug, Deserialize)]
struct WarmupQuery {
    variant: Option<String>,
}

async fn warmup(
    State(state): State<Arc<AppState>>,
    Query(query): Query<WarmupQuery>,
) -> Result<impl IntoResponse> {
    let variant = query
        .variant
        .unwrap_or_else(|| state.settings.pipeline.default_variant.clone());

    // Callers get an explicit busy signal rather than queueing behind the gate
    if state.pipeline_manager.is_busy() {
        return Err(AppError::Conflict(
            "pipeline is busy loading or generating".to_string(),
        ));
    }

    let load_timeout = Duration::from_secs(state.settings.pipeline.load_timeout_secs);
    let started = Instant::now();

    match tokio::time::timeout(load_timeout, state.pipeline_manager.load_variant(&variant)).await {
        Ok(result) => result?,
        Err(_) => {
            return Err(AppError::Timeout(format!(
                "loading '{}' exceeded {}s deadline",
                variant,
                load_timeout.as_secs()
            )))
        }
    }

    Ok(Json(json!({
        "status": "ok",
        "variant": variant,
        "load_time_secs": started.elapsed().as_secs_f64(),
    })))
}

async fn read_text(field: axum::extract::multipart::Field<'_>) -> Result<String> {
    field
        .text()
        .await
        .map_err(|e| AppError::InvalidRequest(format!("failed to read field: {}", e)))
}
