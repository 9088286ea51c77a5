//! Room and message endpoints: checks that run before storage

use axum::http::StatusCode;
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use test_case::test_case;

use crate::common::{instructor_token, student_token, TestApp};

#[tokio::test]
async fn test_create_room_validates_name() {
    let app = TestApp::new();

    let response = app
        .server
        .post("/api/v1/rooms")
        .authorization_bearer(student_token())
        .json(&json!({ "name": "" }))
        .await;

    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert_eq!(body["code"], 10007);
    assert_eq!(body["errors"][0]["field"], "name");
}

#[tokio::test]
async fn test_student_cannot_create_course_room() {
    let app = TestApp::new();

    let response = app
        .server
        .post("/api/v1/rooms")
        .authorization_bearer(student_token())
        .json(&json!({ "name": "Linear Algebra", "type": "course" }))
        .await;

    assert_eq!(response.status_code(), StatusCode::FORBIDDEN);
    assert_eq!(response.json::<Value>()["code"], 10004);
}

#[test_case(json!([]) ; "no peer")]
#[test_case(json!(["11", "12"]) ; "two peers")]
#[tokio::test]
async fn test_direct_room_needs_one_peer(member_ids: Value) {
    let app = TestApp::new();

    let response = app
        .server
        .post("/api/v1/rooms")
        .authorization_bearer(instructor_token())
        .json(&json!({ "name": "DM", "type": "direct", "member_ids": member_ids }))
        .await;

    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_unknown_room_type_is_rejected() {
    let app = TestApp::new();

    let response = app
        .server
        .post("/api/v1/rooms")
        .authorization_bearer(student_token())
        .json(&json!({ "name": "Hall", "type": "auditorium" }))
        .await;

    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
    assert_eq!(response.json::<Value>()["code"], 10002);
}

#[tokio::test]
async fn test_send_message_validates_content_length() {
    let app = TestApp::new();

    let response = app
        .server
        .post("/api/v1/rooms/42/messages")
        .authorization_bearer(student_token())
        .json(&json!({ "content": "x".repeat(2001) }))
        .await;

    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
    assert_eq!(response.json::<Value>()["errors"][0]["field"], "content");
}

// Out-of-range limits are capped by the service, so the request gets past
// query validation and fails only on the unreachable database.
#[test_case("500" ; "above the page size")]
#[test_case("0" ; "zero")]
#[tokio::test]
async fn test_message_history_limit_is_not_rejected(limit: &str) {
    let app = TestApp::new();

    let response = app
        .server
        .get(&format!("/api/v1/rooms/42/messages?limit={limit}"))
        .authorization_bearer(student_token())
        .await;

    assert_eq!(response.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(response.json::<Value>()["message"], "Internal server error");
}

#[tokio::test]
async fn test_message_history_limit_must_be_numeric() {
    let app = TestApp::new();

    let response = app
        .server
        .get("/api/v1/rooms/42/messages?limit=lots")
        .authorization_bearer(student_token())
        .await;

    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
}
