//! Presence Tracking
//!
//! Counts live sessions per user so that online/offline transitions are
//! announced exactly once, even when a user has several tabs or devices
//! connected to different gateway instances.

use async_trait::async_trait;

use crate::shared::error::AppError;

#[async_trait]
pub trait PresenceStore: Send + Sync {
    /// Record a new session. Returns true when the user just came online.
    async fn mark_online(&self, user_id: i64) -> Result<bool, AppError>;

    /// Record a closed session. Returns true when the user just went offline.
    async fn mark_offline(&self, user_id: i64) -> Result<bool, AppError>;

    /// Keep the user's presence alive (heartbeat).
    async fn refresh(&self, user_id: i64) -> Result<(), AppError>;

    async fn is_online(&self, user_id: i64) -> Result<bool, AppError>;

    /// Subset of `user_ids` that is online, in input order.
    async fn filter_online(&self, user_ids: &[i64]) -> Result<Vec<i64>, AppError>;

    fn name(&self) -> &'static str;
}
