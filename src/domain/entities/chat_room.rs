//! Chat room entity and repository trait.
//!
//! Maps to the `chat_rooms` and `room_members` tables.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::shared::error::AppError;

/// Room kinds matching the PostgreSQL ENUM `room_type`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RoomType {
    /// One-to-one conversation
    Direct,
    /// Ad-hoc group conversation
    #[default]
    Group,
    /// Room attached to a course, managed by staff
    Course,
}

impl RoomType {
    /// Convert from database string representation.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "direct" => Some(Self::Direct),
            "group" => Some(Self::Group),
            "course" => Some(Self::Course),
            _ => None,
        }
    }

    /// Convert to database string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Direct => "direct",
            Self::Group => "group",
            Self::Course => "course",
        }
    }
}

impl std::fmt::Display for RoomType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A chat room scoped to a tenant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatRoom {
    pub id: i64,
    pub tenant_id: i64,
    pub name: String,
    pub description: Option<String>,
    pub room_type: RoomType,
    pub owner_id: i64,
    pub is_deleted: bool,
    pub deleted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ChatRoom {
    pub fn is_owner(&self, user_id: i64) -> bool {
        self.owner_id == user_id
    }

    /// Whether the room is visible from the given tenant.
    pub fn is_visible_to(&self, tenant_id: i64) -> bool {
        !self.is_deleted && self.tenant_id == tenant_id
    }
}

/// A user's membership in a room.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoomMember {
    pub room_id: i64,
    pub user_id: i64,
    pub joined_at: DateTime<Utc>,
}

/// Repository trait for rooms and their membership.
///
/// Lookups never return soft-deleted rooms.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RoomRepository: Send + Sync {
    async fn find_by_id(&self, id: i64) -> Result<Option<ChatRoom>, AppError>;

    /// Live rooms in a tenant that the user belongs to, most recently updated first.
    async fn find_by_member(&self, tenant_id: i64, user_id: i64) -> Result<Vec<ChatRoom>, AppError>;

    /// Insert a room together with its initial members.
    async fn create(&self, room: &ChatRoom, member_ids: &[i64]) -> Result<ChatRoom, AppError>;

    async fn soft_delete(&self, id: i64) -> Result<(), AppError>;

    /// Returns false when the user was already a member.
    async fn add_member(&self, room_id: i64, user_id: i64) -> Result<bool, AppError>;

    /// Returns false when the user was not a member.
    async fn remove_member(&self, room_id: i64, user_id: i64) -> Result<bool, AppError>;

    async fn is_member(&self, room_id: i64, user_id: i64) -> Result<bool, AppError>;

    async fn find_members(&self, room_id: i64) -> Result<Vec<RoomMember>, AppError>;
}
