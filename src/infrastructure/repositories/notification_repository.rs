//! Notification Repository Implementation

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::domain::{Notification, NotificationRepository};
use crate::shared::error::AppError;

/// PostgreSQL notification repository implementation.
pub struct PgNotificationRepository {
    pool: PgPool,
}

impl PgNotificationRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct NotificationRow {
    id: i64,
    tenant_id: i64,
    user_id: i64,
    kind: String,
    title: String,
    body: String,
    link: Option<String>,
    is_read: bool,
    read_at: Option<DateTime<Utc>>,
    is_deleted: bool,
    deleted_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<NotificationRow> for Notification {
    fn from(row: NotificationRow) -> Self {
        Notification {
            id: row.id,
            tenant_id: row.tenant_id,
            user_id: row.user_id,
            kind: row.kind,
            title: row.title,
            body: row.body,
            link: row.link,
            is_read: row.is_read,
            read_at: row.read_at,
            is_deleted: row.is_deleted,
            deleted_at: row.deleted_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

const COLUMNS: &str = "id, tenant_id, user_id, kind, title, body, link, is_read, read_at, \
                       is_deleted, deleted_at, created_at, updated_at";

#[async_trait]
impl NotificationRepository for PgNotificationRepository {
    async fn find_by_id(&self, id: i64) -> Result<Option<Notification>, AppError> {
        let row = sqlx::query_as::<_, NotificationRow>(&format!(
            "SELECT {COLUMNS} FROM notifications WHERE id = $1 AND NOT is_deleted"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Notification::from))
    }

    async fn find_by_user(
        &self,
        tenant_id: i64,
        user_id: i64,
        unread_only: bool,
        limit: i32,
    ) -> Result<Vec<Notification>, AppError> {
        let rows = sqlx::query_as::<_, NotificationRow>(&format!(
            r#"
            SELECT {COLUMNS}
            FROM notifications
            WHERE tenant_id = $1 AND user_id = $2 AND NOT is_deleted
              AND ($3 = FALSE OR NOT is_read)
            ORDER BY id DESC
            LIMIT $4
            "#
        ))
        .bind(tenant_id)
        .bind(user_id)
        .bind(unread_only)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Notification::from).collect())
    }

    async fn create(&self, notification: &Notification) -> Result<Notification, AppError> {
        let row = sqlx::query_as::<_, NotificationRow>(&format!(
            r#"
            INSERT INTO notifications (id, tenant_id, user_id, kind, title, body, link, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $8)
            RETURNING {COLUMNS}
            "#
        ))
        .bind(notification.id)
        .bind(notification.tenant_id)
        .bind(notification.user_id)
        .bind(&notification.kind)
        .bind(&notification.title)
        .bind(&notification.body)
        .bind(&notification.link)
        .bind(notification.created_at)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.into())
    }

    async fn mark_read(&self, id: i64) -> Result<(), AppError> {
        sqlx::query(
            r#"
            UPDATE notifications
            SET is_read = TRUE, read_at = NOW(), updated_at = NOW()
            WHERE id = $1 AND NOT is_read AND NOT is_deleted
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn mark_all_read(&self, tenant_id: i64, user_id: i64) -> Result<u64, AppError> {
        let result = sqlx::query(
            r#"
            UPDATE notifications
            SET is_read = TRUE, read_at = NOW(), updated_at = NOW()
            WHERE tenant_id = $1 AND user_id = $2 AND NOT is_read AND NOT is_deleted
            "#,
        )
        .bind(tenant_id)
        .bind(user_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    async fn soft_delete(&self, id: i64) -> Result<(), AppError> {
        let result = sqlx::query(
            r#"
            UPDATE notifications
            SET is_deleted = TRUE, deleted_at = NOW(), updated_at = NOW()
            WHERE id = $1 AND NOT is_deleted
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Notification {} not found", id)));
        }

        Ok(())
    }

    async fn count_unread(&self, tenant_id: i64, user_id: i64) -> Result<i64, AppError> {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*)
            FROM notifications
            WHERE tenant_id = $1 AND user_id = $2 AND NOT is_read AND NOT is_deleted
            "#,
        )
        .bind(tenant_id)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }
}
