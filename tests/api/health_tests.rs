//! Health, metrics and fallback routing

use axum::http::StatusCode;
use pretty_assertions::assert_eq;
use serde_json::Value;

use crate::common::TestApp;

#[tokio::test]
async fn test_health_check_returns_ok() {
    let app = TestApp::new();

    let response = app.server.get("/health").await;

    assert_eq!(response.status_code(), StatusCode::OK);
    let body: Value = response.json();
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
    assert_eq!(body["gateway"]["active_connections"], 0);
    assert!(body.get("dependencies").is_none());
}

#[tokio::test]
async fn test_liveness() {
    let app = TestApp::new();

    let response = app.server.get("/health/live").await;

    assert_eq!(response.status_code(), StatusCode::OK);
    assert_eq!(response.json::<Value>()["status"], "alive");
}

#[tokio::test]
async fn test_readiness_reports_unreachable_database() {
    let app = TestApp::new();

    let response = app.server.get("/health/ready").await;

    assert_eq!(response.status_code(), StatusCode::SERVICE_UNAVAILABLE);
    let body: Value = response.json();
    assert_eq!(body["status"], "unhealthy");
    assert_eq!(body["dependencies"]["database"]["status"], "unhealthy");
    assert!(body["dependencies"].get("redis").is_none());
    assert_eq!(body["gateway"]["relay"], "noop");
    assert_eq!(body["gateway"]["presence"], "local");
    assert_eq!(body["gateway"]["instance_id"], app.state.gateway.instance_id());
}

#[tokio::test]
async fn test_metrics_exposes_http_counters() {
    let app = TestApp::new();
    app.server.get("/health").await;

    let response = app.server.get("/metrics").await;

    assert_eq!(response.status_code(), StatusCode::OK);
    assert!(response.text().contains("campus_chat_http_requests_total"));
}

#[tokio::test]
async fn test_unknown_route_is_json_404() {
    let app = TestApp::new();

    let response = app.server.get("/does/not/exist").await;

    assert_eq!(response.status_code(), StatusCode::NOT_FOUND);
    assert_eq!(response.json::<Value>()["code"], 10001);
}
