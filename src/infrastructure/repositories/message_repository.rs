//! Message Repository Implementation
//!
//! PostgreSQL implementation of message storage with cursor-based pagination.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::domain::{ChatMessage, MessageRepository};
use crate::shared::error::AppError;

/// PostgreSQL message repository implementation.
pub struct PgMessageRepository {
    pool: PgPool,
}

impl PgMessageRepository {
    /// Creates a new PgMessageRepository with the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Internal row type for message queries.
/// Maps to the chat_messages table schema defined in the migration.
#[derive(Debug, sqlx::FromRow)]
struct MessageRow {
    id: i64,
    room_id: i64,
    sender_id: i64,
    content: String,
    reply_to_id: Option<i64>,
    is_deleted: bool,
    deleted_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl MessageRow {
    fn into_message(self) -> ChatMessage {
        ChatMessage {
            id: self.id,
            room_id: self.room_id,
            sender_id: self.sender_id,
            content: self.content,
            reply_to_id: self.reply_to_id,
            is_deleted: self.is_deleted,
            deleted_at: self.deleted_at,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

#[async_trait]
impl MessageRepository for PgMessageRepository {
    async fn find_by_id(&self, id: i64) -> Result<Option<ChatMessage>, AppError> {
        let row = sqlx::query_as::<_, MessageRow>(
            r#"
            SELECT id, room_id, sender_id, content, reply_to_id,
                   is_deleted, deleted_at, created_at, updated_at
            FROM chat_messages
            WHERE id = $1 AND NOT is_deleted
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| r.into_message()))
    }

    /// Keyset pagination, newest first. Snowflake IDs sort by creation time.
    async fn find_by_room(
        &self,
        room_id: i64,
        before: Option<i64>,
        limit: i32,
    ) -> Result<Vec<ChatMessage>, AppError> {
        let limit = limit.clamp(1, 100);

        let rows = match before {
            Some(before_id) => {
                sqlx::query_as::<_, MessageRow>(
                    r#"
                    SELECT id, room_id, sender_id, content, reply_to_id,
                           is_deleted, deleted_at, created_at, updated_at
                    FROM chat_messages
                    WHERE room_id = $1 AND id < $2 AND NOT is_deleted
                    ORDER BY id DESC
                    LIMIT $3
                    "#,
                )
                .bind(room_id)
                .bind(before_id)
                .bind(limit)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as::<_, MessageRow>(
                    r#"
                    SELECT id, room_id, sender_id, content, reply_to_id,
                           is_deleted, deleted_at, created_at, updated_at
                    FROM chat_messages
                    WHERE room_id = $1 AND NOT is_deleted
                    ORDER BY id DESC
                    LIMIT $2
                    "#,
                )
                .bind(room_id)
                .bind(limit)
                .fetch_all(&self.pool)
                .await?
            }
        };

        Ok(rows.into_iter().map(|r| r.into_message()).collect())
    }

    async fn create(&self, message: &ChatMessage) -> Result<ChatMessage, AppError> {
        let row = sqlx::query_as::<_, MessageRow>(
            r#"
            INSERT INTO chat_messages (id, room_id, sender_id, content, reply_to_id, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $6)
            RETURNING id, room_id, sender_id, content, reply_to_id,
                      is_deleted, deleted_at, created_at, updated_at
            "#,
        )
        .bind(message.id)
        .bind(message.room_id)
        .bind(message.sender_id)
        .bind(&message.content)
        .bind(message.reply_to_id)
        .bind(message.created_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db_err) if db_err.is_foreign_key_violation() => {
                AppError::NotFound("Room or replied message not found".to_string())
            }
            _ => AppError::Database(e),
        })?;

        Ok(row.into_message())
    }

    async fn soft_delete(&self, id: i64) -> Result<(), AppError> {
        let result = sqlx::query(
            r#"
            UPDATE chat_messages
            SET is_deleted = TRUE, deleted_at = NOW(), updated_at = NOW()
            WHERE id = $1 AND NOT is_deleted
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Message {} not found", id)));
        }

        Ok(())
    }
}
