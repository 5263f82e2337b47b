//! API key authentication middleware (`X-API-Key` header)

use axum::{
    body::Body,
    http::Request,
    response::{IntoResponse, Response},
};
use futures::future::BoxFuture;
use std::{
    collections::HashSet,
    sync::Arc,
    task::{Context, Poll},
};
use tower::{Layer, Service};
use tracing::warn;

use crate::error::AppError;

const API_KEY_HEADER: &str = "x-api-key";

/// Paths that stay reachable without a key
const OPEN_PATHS: &[&str] = &["/", "/api/v1/health"];

/// Authentication layer
#[derive(Clone)]
pub struct ApiKeyLayer {
    api_keys: Arc<HashSet<String>>,
}

impl ApiKeyLayer {
    pub fn new(api_keys: Vec<String>) -> Self {
        Self {
            api_keys: Arc::new(api_keys.into_iter().collect()),
        }
    }
}

impl<S> Layer<S> for ApiKeyLayer {
    type Service = ApiKeyMiddleware<S>;

    fn layer(&self, inner: S) -> Self::Service {
        ApiKeyMiddleware {
            inner,
            api_keys: self.api_keys.clone(),
        }
    }
}

/// Authentication middleware service
#[derive(Clone)]
pub struct ApiKeyMiddleware<S> {
    inner: S,
    api_keys: Arc<HashSet<String>>,
}

impl<S> Service<Request<Body>> for ApiKeyMiddleware<S>
where
    S: Service<Request<Body>, Response = Response> + Send + Clone + 'static,
    S::Future: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, request: Request<Body>) -> Self::Future {
        let path = request.uri().path();
        if OPEN_PATHS.contains(&path) {
            let future = self.inner.call(request);
            return Box::pin(async move { future.await });
        }

        // If no API keys are configured, allow all requests
        if self.api_keys.is_empty() {
            let future = self.inner.call(request);
            return Box::pin(async move { future.await });
        }

        let api_key = request
            .headers()
            .get(API_KEY_HEADER)
            .and_then(|h| h.to_str().ok())
            .map(str::to_string);

        match api_key {
            Some(key) if self.api_keys.contains(&key) => {
                let future = self.inner.call(request);
                Box::pin(async move { future.await })
            }
            Some(_) => {
                warn!("invalid API key provided");
                Box::pin(async move {
                    Ok(AppError::AuthenticationFailed("invalid API key".to_string())
                        .into_response())
                })
            }
            None => {
                warn!("no API key provided");
                Box::pin(async move {
                    Ok(AppError::AuthenticationFailed(
                        "API key required, provide via the X-API-Key header".to_string(),
                    )
                    .into_response())
                })
            }
        }
    }
}
