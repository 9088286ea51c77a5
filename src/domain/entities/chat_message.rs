//! Chat message entity and repository trait.
//!
//! Maps to the `chat_messages` table.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::shared::error::AppError;

/// Maximum message length in characters.
pub const MAX_MESSAGE_LENGTH: usize = 2000;

/// A message posted in a room.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Snowflake ID (primary key)
    pub id: i64,

    pub room_id: i64,

    pub sender_id: i64,

    /// Message content (1 to 2000 characters)
    pub content: String,

    /// Message being replied to, in the same room
    pub reply_to_id: Option<i64>,

    pub is_deleted: bool,

    pub deleted_at: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

impl ChatMessage {
    pub fn is_reply(&self) -> bool {
        self.reply_to_id.is_some()
    }

    /// Get the content length in characters.
    pub fn content_length(&self) -> usize {
        self.content.chars().count()
    }
}

/// Repository trait for message data access.
///
/// Lookups never return soft-deleted messages.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MessageRepository: Send + Sync {
    async fn find_by_id(&self, id: i64) -> Result<Option<ChatMessage>, AppError>;

    /// Newest-first page of a room's messages.
    ///
    /// - `before`: only messages with an ID lower than this cursor
    /// - `limit`: maximum number of messages to return
    async fn find_by_room(
        &self,
        room_id: i64,
        before: Option<i64>,
        limit: i32,
    ) -> Result<Vec<ChatMessage>, AppError>;

    async fn create(&self, message: &ChatMessage) -> Result<ChatMessage, AppError>;

    async fn soft_delete(&self, id: i64) -> Result<(), AppError>;
}
