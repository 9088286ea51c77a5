//! Request DTOs
//!
//! Data structures for API request bodies and query strings.

use serde::Deserialize;
use validator::Validate;

use crate::domain::RoomType;
use crate::shared::snowflake::serde_id;

/// Create room request
#[derive(Debug, Deserialize, Validate)]
pub struct CreateRoomRequest {
    #[validate(length(min = 1, max = 100, message = "Name must be 1-100 characters"))]
    pub name: String,

    #[validate(length(max = 500, message = "Description must be at most 500 characters"))]
    pub description: Option<String>,

    #[serde(rename = "type", default)]
    pub room_type: RoomType,

    #[serde(default, deserialize_with = "serde_id::vec::deserialize")]
    #[validate(length(max = 500, message = "At most 500 initial members"))]
    pub member_ids: Vec<i64>,
}

/// Add member request
#[derive(Debug, Deserialize, Validate)]
pub struct AddMemberRequest {
    #[serde(with = "serde_id")]
    pub user_id: i64,
}

/// Send message request
#[derive(Debug, Deserialize, Validate)]
pub struct SendMessageRequest {
    #[validate(length(min = 1, max = 2000, message = "Content must be 1-2000 characters"))]
    pub content: String,

    #[serde(default, with = "serde_id::option")]
    pub reply_to_id: Option<i64>,
}

/// Message history query parameters
#[derive(Debug, Default, Deserialize, Validate)]
pub struct MessageQueryParams {
    #[serde(default, with = "serde_id::option")]
    pub before: Option<i64>,

    /// Clamped to 1..=100 by the service
    pub limit: Option<i32>,
}

/// Create notification request
#[derive(Debug, Deserialize, Validate)]
pub struct CreateNotificationRequest {
    #[serde(with = "serde_id")]
    pub user_id: i64,

    #[validate(length(min = 1, max = 64, message = "Kind must be 1-64 characters"))]
    pub kind: String,

    #[validate(length(min = 1, max = 200, message = "Title must be 1-200 characters"))]
    pub title: String,

    #[validate(length(min = 1, max = 5000, message = "Body must be 1-5000 characters"))]
    pub body: String,

    #[validate(length(max = 2048, message = "Link must be at most 2048 characters"))]
    pub link: Option<String>,
}

/// Notification listing query parameters
#[derive(Debug, Default, Deserialize, Validate)]
pub struct NotificationQueryParams {
    #[serde(default)]
    pub unread_only: bool,

    pub limit: Option<i32>,
}
