//! Notification entity and repository trait.
//!
//! Maps to the `notifications` table.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::shared::error::AppError;

/// A notification addressed to a single user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub id: i64,
    pub tenant_id: i64,
    pub user_id: i64,
    /// Free-form category, e.g. `course.enrolled` or `ticket.replied`
    pub kind: String,
    pub title: String,
    pub body: String,
    pub link: Option<String>,
    pub is_read: bool,
    pub read_at: Option<DateTime<Utc>>,
    pub is_deleted: bool,
    pub deleted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Notification {
    pub fn belongs_to(&self, tenant_id: i64, user_id: i64) -> bool {
        !self.is_deleted && self.tenant_id == tenant_id && self.user_id == user_id
    }
}

/// Repository trait for notification data access.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait NotificationRepository: Send + Sync {
    async fn find_by_id(&self, id: i64) -> Result<Option<Notification>, AppError>;

    /// Newest-first listing of a user's live notifications.
    async fn find_by_user(
        &self,
        tenant_id: i64,
        user_id: i64,
        unread_only: bool,
        limit: i32,
    ) -> Result<Vec<Notification>, AppError>;

    async fn create(&self, notification: &Notification) -> Result<Notification, AppError>;

    async fn mark_read(&self, id: i64) -> Result<(), AppError>;

    /// Returns the number of notifications that changed state.
    async fn mark_all_read(&self, tenant_id: i64, user_id: i64) -> Result<u64, AppError>;

    async fn soft_delete(&self, id: i64) -> Result<(), AppError>;

    async fn count_unread(&self, tenant_id: i64, user_id: i64) -> Result<i64, AppError>;
}
