//! Notification endpoints: role checks and validation

use axum::http::StatusCode;
use pretty_assertions::assert_eq;
use serde_json::{json, Value};

use crate::common::{instructor_token, student_token, TestApp};

fn notification_body() -> Value {
    json!({
        "user_id": "9001",
        "kind": "assignment_due",
        "title": "Homework 3 is due tomorrow",
        "body": "Submit before 23:59.",
        "link": "/courses/12/assignments/3"
    })
}

#[tokio::test]
async fn test_student_cannot_notify() {
    let app = TestApp::new();

    let response = app
        .server
        .post("/api/v1/notifications")
        .authorization_bearer(student_token())
        .json(&notification_body())
        .await;

    assert_eq!(response.status_code(), StatusCode::FORBIDDEN);
    assert_eq!(response.json::<Value>()["code"], 10004);
}

#[tokio::test]
async fn test_notify_validates_title() {
    let app = TestApp::new();
    let mut body = notification_body();
    body["title"] = json!("");

    let response = app
        .server
        .post("/api/v1/notifications")
        .authorization_bearer(instructor_token())
        .json(&body)
        .await;

    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
    assert_eq!(response.json::<Value>()["errors"][0]["field"], "title");
}

#[tokio::test]
async fn test_notify_requires_recipient() {
    let app = TestApp::new();
    let mut body = notification_body();
    body.as_object_mut().unwrap().remove("user_id");

    let response = app
        .server
        .post("/api/v1/notifications")
        .authorization_bearer(instructor_token())
        .json(&body)
        .await;

    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_list_limit_is_capped_not_rejected() {
    let app = TestApp::new();

    let response = app
        .server
        .get("/api/v1/notifications?limit=1000")
        .authorization_bearer(student_token())
        .await;

    // Reaches storage, which is unreachable in this harness
    assert_eq!(response.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
}
