//! Presence endpoint backed by the in-process store

use axum::http::StatusCode;
use pretty_assertions::assert_eq;
use serde_json::{json, Value};

use campus_chat::application::presence::PresenceStore;

use crate::common::{student_token, TestApp};

#[tokio::test]
async fn test_offline_user() {
    let app = TestApp::new();

    let response = app
        .server
        .get("/api/v1/presence/314")
        .authorization_bearer(student_token())
        .await;

    assert_eq!(response.status_code(), StatusCode::OK);
    assert_eq!(
        response.json::<Value>(),
        json!({ "user_id": "314", "online": false })
    );
}

#[tokio::test]
async fn test_online_user() {
    let app = TestApp::new();
    app.state.presence.mark_online(271).await.unwrap();

    let response = app
        .server
        .get("/api/v1/presence/271")
        .authorization_bearer(student_token())
        .await;

    assert_eq!(response.json::<Value>()["online"], true);
}

#[tokio::test]
async fn test_local_session_counts_as_online() {
    let app = TestApp::new();
    let (tx, _rx) = tokio::sync::mpsc::unbounded_channel();
    app.state.gateway.register_session("s-1".into(), 828, 1, tx);

    let response = app
        .server
        .get("/api/v1/presence/828")
        .authorization_bearer(student_token())
        .await;

    assert_eq!(response.json::<Value>()["online"], true);
}
