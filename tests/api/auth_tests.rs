//! Bearer authentication on the REST API

use axum::http::StatusCode;
use pretty_assertions::assert_eq;
use serde_json::Value;

use crate::common::{random_user_id, student_token, token_with_expiry, TestApp};

#[tokio::test]
async fn test_missing_token_is_unauthorized() {
    let app = TestApp::new();

    let response = app.server.get("/api/v1/rooms").await;

    assert_eq!(response.status_code(), StatusCode::UNAUTHORIZED);
    let body: Value = response.json();
    assert_eq!(body["code"], 10003);
    assert_eq!(body["message"], "Missing authorization header");
}

#[tokio::test]
async fn test_garbage_token_is_unauthorized() {
    let app = TestApp::new();

    let response = app
        .server
        .get("/api/v1/notifications")
        .authorization_bearer("not.a.jwt")
        .await;

    assert_eq!(response.status_code(), StatusCode::UNAUTHORIZED);
    assert_eq!(response.json::<Value>()["message"], "Invalid token");
}

#[tokio::test]
async fn test_expired_token_is_unauthorized() {
    let app = TestApp::new();
    let token = token_with_expiry(random_user_id(), &["student"], -3600);

    let response = app
        .server
        .get("/api/v1/rooms")
        .authorization_bearer(token)
        .await;

    assert_eq!(response.status_code(), StatusCode::UNAUTHORIZED);
    assert_eq!(response.json::<Value>()["message"], "Token expired");
}

#[tokio::test]
async fn test_token_signed_with_other_secret_is_rejected() {
    use jsonwebtoken::{encode, EncodingKey, Header};

    let app = TestApp::new();
    let now = chrono::Utc::now().timestamp();
    let claims = campus_chat::presentation::middleware::Claims {
        sub: "5".into(),
        exp: now + 600,
        iat: now,
        tenant_id: 1,
        roles: vec!["admin".into()],
        name: None,
        iss: None,
    };
    let forged = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(b"somebody-elses-secret-that-is-long-enough"),
    )
    .unwrap();

    let response = app
        .server
        .get("/api/v1/rooms")
        .authorization_bearer(forged)
        .await;

    assert_eq!(response.status_code(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_non_numeric_path_id_is_bad_request() {
    let app = TestApp::new();

    let response = app
        .server
        .get("/api/v1/rooms/general")
        .authorization_bearer(student_token())
        .await;

    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
    assert_eq!(response.json::<Value>()["message"], "Invalid ID in path");
}
