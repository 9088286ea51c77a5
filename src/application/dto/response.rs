//! Response DTOs
//!
//! Wire shapes shared by HTTP responses and gateway event payloads.
//! IDs are serialized as strings.

use serde::{Deserialize, Serialize};

use crate::domain::{ChatMessage, ChatRoom, Notification, RoomType};
use crate::shared::snowflake::serde_id;

/// Room response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoomDto {
    #[serde(with = "serde_id")]
    pub id: i64,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "type")]
    pub room_type: RoomType,
    #[serde(with = "serde_id")]
    pub owner_id: i64,
    pub created_at: String,
    pub updated_at: String,
}

impl From<ChatRoom> for RoomDto {
    fn from(room: ChatRoom) -> Self {
        Self {
            id: room.id,
            name: room.name,
            description: room.description,
            room_type: room.room_type,
            owner_id: room.owner_id,
            created_at: room.created_at.to_rfc3339(),
            updated_at: room.updated_at.to_rfc3339(),
        }
    }
}

/// Room detail including its member list
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoomDetailDto {
    #[serde(flatten)]
    pub room: RoomDto,
    pub member_ids: Vec<String>,
}

/// Message response, also the `message:new` payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageDto {
    #[serde(with = "serde_id")]
    pub id: i64,
    #[serde(with = "serde_id")]
    pub room_id: i64,
    #[serde(with = "serde_id")]
    pub sender_id: i64,
    pub content: String,
    #[serde(
        default,
        with = "serde_id::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub reply_to_id: Option<i64>,
    pub created_at: String,
}

impl From<ChatMessage> for MessageDto {
    fn from(message: ChatMessage) -> Self {
        Self {
            id: message.id,
            room_id: message.room_id,
            sender_id: message.sender_id,
            content: message.content,
            reply_to_id: message.reply_to_id,
            created_at: message.created_at.to_rfc3339(),
        }
    }
}

/// Notification response, also the `notification:new` payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationDto {
    #[serde(with = "serde_id")]
    pub id: i64,
    pub kind: String,
    pub title: String,
    pub body: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    pub is_read: bool,
    pub created_at: String,
}

impl From<Notification> for NotificationDto {
    fn from(notification: Notification) -> Self {
        Self {
            id: notification.id,
            kind: notification.kind,
            title: notification.title,
            body: notification.body,
            link: notification.link,
            is_read: notification.is_read,
            created_at: notification.created_at.to_rfc3339(),
        }
    }
}

/// Presence of a single user
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PresenceResponse {
    #[serde(with = "serde_id")]
    pub user_id: i64,
    pub online: bool,
}

/// Online members of a room
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoomPresenceResponse {
    #[serde(with = "serde_id")]
    pub room_id: i64,
    pub online_user_ids: Vec<String>,
}

/// Unread notification counter
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnreadCountResponse {
    pub unread: i64,
}

/// Result of a bulk read marker
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MarkAllReadResponse {
    pub updated: u64,
}
