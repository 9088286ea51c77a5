//! Room Repository Implementation
//!
//! PostgreSQL implementation of room and membership operations.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::domain::{ChatRoom, RoomMember, RoomRepository, RoomType};
use crate::shared::error::AppError;

/// PostgreSQL room repository implementation.
pub struct PgRoomRepository {
    pool: PgPool,
}

impl PgRoomRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Internal row type for room queries.
#[derive(Debug, sqlx::FromRow)]
struct RoomRow {
    id: i64,
    tenant_id: i64,
    name: String,
    description: Option<String>,
    room_type: String, // PostgreSQL enum maps to string
    owner_id: i64,
    is_deleted: bool,
    deleted_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<RoomRow> for ChatRoom {
    type Error = AppError;

    fn try_from(row: RoomRow) -> Result<Self, Self::Error> {
        let room_type = RoomType::parse(&row.room_type).ok_or_else(|| {
            AppError::Internal(format!(
                "room {} has unknown room_type '{}'",
                row.id, row.room_type
            ))
        })?;

        Ok(ChatRoom {
            id: row.id,
            tenant_id: row.tenant_id,
            name: row.name,
            description: row.description,
            room_type,
            owner_id: row.owner_id,
            is_deleted: row.is_deleted,
            deleted_at: row.deleted_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct MemberRow {
    room_id: i64,
    user_id: i64,
    joined_at: DateTime<Utc>,
}

#[async_trait]
impl RoomRepository for PgRoomRepository {
    async fn find_by_id(&self, id: i64) -> Result<Option<ChatRoom>, AppError> {
        let row = sqlx::query_as::<_, RoomRow>(
            r#"
            SELECT id, tenant_id, name, description, room_type::text AS room_type,
                   owner_id, is_deleted, deleted_at, created_at, updated_at
            FROM chat_rooms
            WHERE id = $1 AND NOT is_deleted
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(ChatRoom::try_from).transpose()
    }

    async fn find_by_member(&self, tenant_id: i64, user_id: i64) -> Result<Vec<ChatRoom>, AppError> {
        let rows = sqlx::query_as::<_, RoomRow>(
            r#"
            SELECT r.id, r.tenant_id, r.name, r.description, r.room_type::text AS room_type,
                   r.owner_id, r.is_deleted, r.deleted_at, r.created_at, r.updated_at
            FROM chat_rooms r
            INNER JOIN room_members m ON m.room_id = r.id
            WHERE r.tenant_id = $1 AND m.user_id = $2 AND NOT r.is_deleted
            ORDER BY r.updated_at DESC
            "#,
        )
        .bind(tenant_id)
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(ChatRoom::try_from).collect()
    }

    /// Create a room and its initial members in one transaction.
    async fn create(&self, room: &ChatRoom, member_ids: &[i64]) -> Result<ChatRoom, AppError> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query_as::<_, RoomRow>(
            r#"
            INSERT INTO chat_rooms (id, tenant_id, name, description, room_type, owner_id, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5::room_type, $6, $7, $7)
            RETURNING id, tenant_id, name, description, room_type::text AS room_type,
                      owner_id, is_deleted, deleted_at, created_at, updated_at
            "#,
        )
        .bind(room.id)
        .bind(room.tenant_id)
        .bind(&room.name)
        .bind(&room.description)
        .bind(room.room_type.as_str())
        .bind(room.owner_id)
        .bind(room.created_at)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                AppError::Conflict("Room with this ID already exists".to_string())
            }
            _ => AppError::Database(e),
        })?;

        sqlx::query(
            r#"
            INSERT INTO room_members (room_id, user_id)
            SELECT $1, UNNEST($2::BIGINT[])
            ON CONFLICT (room_id, user_id) DO NOTHING
            "#,
        )
        .bind(room.id)
        .bind(member_ids)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        ChatRoom::try_from(row)
    }

    async fn soft_delete(&self, id: i64) -> Result<(), AppError> {
        let result = sqlx::query(
            r#"
            UPDATE chat_rooms
            SET is_deleted = TRUE, deleted_at = NOW(), updated_at = NOW()
            WHERE id = $1 AND NOT is_deleted
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Room {} not found", id)));
        }

        Ok(())
    }

    async fn add_member(&self, room_id: i64, user_id: i64) -> Result<bool, AppError> {
        let result = sqlx::query(
            r#"
            INSERT INTO room_members (room_id, user_id)
            VALUES ($1, $2)
            ON CONFLICT (room_id, user_id) DO NOTHING
            "#,
        )
        .bind(room_id)
        .bind(user_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn remove_member(&self, room_id: i64, user_id: i64) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM room_members WHERE room_id = $1 AND user_id = $2")
            .bind(room_id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn is_member(&self, room_id: i64, user_id: i64) -> Result<bool, AppError> {
        let exists: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM room_members WHERE room_id = $1 AND user_id = $2
            )
            "#,
        )
        .bind(room_id)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
    }

    async fn find_members(&self, room_id: i64) -> Result<Vec<RoomMember>, AppError> {
        let rows = sqlx::query_as::<_, MemberRow>(
            r#"
            SELECT room_id, user_id, joined_at
            FROM room_members
            WHERE room_id = $1
            ORDER BY joined_at ASC, user_id ASC
            "#,
        )
        .bind(room_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|r| RoomMember {
                room_id: r.room_id,
                user_id: r.user_id,
                joined_at: r.joined_at,
            })
            .collect())
    }
}
