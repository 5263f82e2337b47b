//! API key middleware tests over a minimal router

use axum::{
    body::Body,
    http::{Request, StatusCode},
    routing::get,
    Router,
};
use img_edit_serving::middleware::auth::ApiKeyLayer;
use tower::ServiceExt;

fn protected_app(keys: Vec<String>) -> Router {
    Router::new()
        .route("/", get(|| async { "root" }))
        .route("/api/v1/health", get(|| async { "ok" }))
        .route("/api/v1/queue", get(|| async { "stats" }))
        .layer(ApiKeyLayer::new(keys))
}

fn get_request(path: &str, key: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().uri(path);
    if let Some(key) = key {
        builder = builder.header("x-api-key", key);
    }
    builder.body(Body::empty()).unwrap()
}

#[tokio::test]
async fn test_valid_key_is_accepted() {
    let app = protected_app(vec!["secret".to_string()]);
    let response = app
        .oneshot(get_request("/api/v1/queue", Some("secret")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_invalid_key_is_rejected() {
    let app = protected_app(vec!["secret".to_string()]);
    let response = app
        .oneshot(get_request("/api/v1/queue", Some("wrong")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_missing_key_is_rejected() {
    let app = protected_app(vec!["secret".to_string()]);
    let response = app.oneshot(get_request("/api/v1/queue", None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["error"]["type"], "authentication_error");
    assert_eq!(json["error"]["code"], "invalid_api_key");
}

#[tokio::test]
async fn test_health_and_root_bypass_auth() {
    let app = protected_app(vec!["secret".to_string()]);
    let response = app
        .clone()
        .oneshot(get_request("/api/v1/health", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app.oneshot(get_request("/", None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_empty_key_set_allows_everything() {
    let app = protected_app(vec![]);
    let response = app.oneshot(get_request("/api/v1/queue", None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}
