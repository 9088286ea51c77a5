//! Notification Service
//!
//! Stores per-user notifications and pushes them to the recipient's live
//! sessions.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;

use crate::application::dto::NotificationDto;
use crate::application::events::{EventPublisher, RoutedEvent, ServerEvent, Target};
use crate::domain::{Actor, Notification, NotificationRepository};
use crate::shared::error::AppError;
use crate::shared::snowflake::SnowflakeGenerator;

const DEFAULT_PAGE_SIZE: i32 = 50;
const MAX_PAGE_SIZE: i32 = 100;

/// Notification service trait
#[async_trait]
pub trait NotificationService: Send + Sync {
    /// Store a notification for `request.user_id` and push it live.
    async fn notify(&self, actor: &Actor, request: CreateNotificationDto) -> Result<NotificationDto, NotificationError>;

    async fn list(&self, actor: &Actor, query: NotificationQueryDto) -> Result<Vec<NotificationDto>, NotificationError>;

    async fn unread_count(&self, actor: &Actor) -> Result<i64, NotificationError>;

    async fn mark_read(&self, actor: &Actor, notification_id: i64) -> Result<(), NotificationError>;

    async fn mark_all_read(&self, actor: &Actor) -> Result<u64, NotificationError>;

    async fn delete(&self, actor: &Actor, notification_id: i64) -> Result<(), NotificationError>;
}

/// Create notification request
#[derive(Debug, Clone)]
pub struct CreateNotificationDto {
    pub user_id: i64,
    pub kind: String,
    pub title: String,
    pub body: String,
    pub link: Option<String>,
}

/// Notification query parameters
#[derive(Debug, Clone, Default)]
pub struct NotificationQueryDto {
    pub unread_only: bool,
    pub limit: Option<i32>,
}

/// Notification service errors
#[derive(Debug, thiserror::Error)]
pub enum NotificationError {
    #[error("Notification not found")]
    NotFound,

    #[error("Permission denied")]
    Forbidden,

    #[error(transparent)]
    Repository(#[from] AppError),
}

impl From<NotificationError> for AppError {
    fn from(err: NotificationError) -> Self {
        match err {
            NotificationError::NotFound => AppError::NotFound(err.to_string()),
            NotificationError::Forbidden => AppError::Forbidden(err.to_string()),
            NotificationError::Repository(inner) => inner,
        }
    }
}

/// NotificationService implementation
pub struct NotificationServiceImpl<N>
where
    N: NotificationRepository,
{
    repo: Arc<N>,
    events: Arc<dyn EventPublisher>,
    id_generator: Arc<SnowflakeGenerator>,
}

impl<N> NotificationServiceImpl<N>
where
    N: NotificationRepository,
{
    pub fn new(
        repo: Arc<N>,
        events: Arc<dyn EventPublisher>,
        id_generator: Arc<SnowflakeGenerator>,
    ) -> Self {
        Self {
            repo,
            events,
            id_generator,
        }
    }

    async fn load_own(&self, actor: &Actor, notification_id: i64) -> Result<Notification, NotificationError> {
        self.repo
            .find_by_id(notification_id)
            .await?
            .filter(|n| n.belongs_to(actor.tenant_id, actor.user_id))
            .ok_or(NotificationError::NotFound)
    }
}

#[async_trait]
impl<N> NotificationService for NotificationServiceImpl<N>
where
    N: NotificationRepository + 'static,
{
    async fn notify(&self, actor: &Actor, request: CreateNotificationDto) -> Result<NotificationDto, NotificationError> {
        if !actor.is_staff() {
            return Err(NotificationError::Forbidden);
        }

        let now = Utc::now();
        let notification = Notification {
            id: self.id_generator.generate(),
            tenant_id: actor.tenant_id,
            user_id: request.user_id,
            kind: request.kind,
            title: request.title,
            body: request.body,
            link: request.link,
            is_read: false,
            read_at: None,
            is_deleted: false,
            deleted_at: None,
            created_at: now,
            updated_at: now,
        };

        let created = NotificationDto::from(self.repo.create(&notification).await?);

        tracing::debug!(
            notification_id = created.id,
            recipient = request.user_id,
            kind = %created.kind,
            "Notification stored"
        );

        self.events.publish(RoutedEvent::new(
            Target::User(request.user_id),
            ServerEvent::NotificationNew(created.clone()),
        ));

        Ok(created)
    }

    async fn list(&self, actor: &Actor, query: NotificationQueryDto) -> Result<Vec<NotificationDto>, NotificationError> {
        let limit = query
            .limit
            .unwrap_or(DEFAULT_PAGE_SIZE)
            .clamp(1, MAX_PAGE_SIZE);

        let notifications = self
            .repo
            .find_by_user(actor.tenant_id, actor.user_id, query.unread_only, limit)
            .await?;

        Ok(notifications.into_iter().map(NotificationDto::from).collect())
    }

    async fn unread_count(&self, actor: &Actor) -> Result<i64, NotificationError> {
        Ok(self.repo.count_unread(actor.tenant_id, actor.user_id).await?)
    }

    async fn mark_read(&self, actor: &Actor, notification_id: i64) -> Result<(), NotificationError> {
        let notification = self.load_own(actor, notification_id).await?;
        if !notification.is_read {
            self.repo.mark_read(notification_id).await?;
        }
        Ok(())
    }

    async fn mark_all_read(&self, actor: &Actor) -> Result<u64, NotificationError> {
        Ok(self.repo.mark_all_read(actor.tenant_id, actor.user_id).await?)
    }

    async fn delete(&self, actor: &Actor, notification_id: i64) -> Result<(), NotificationError> {
        self.load_own(actor, notification_id).await?;
        self.repo.soft_delete(notification_id).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::events::MockEventPublisher;
    use crate::domain::{MockNotificationRepository, Roles};
    use crate::shared::snowflake::PLATFORM_EPOCH;
    use mockall::predicate::eq;

    fn actor(user_id: i64, roles: &[&str]) -> Actor {
        Actor::new(user_id, 1, Roles::new(roles.iter().copied()))
    }

    fn stored(id: i64, user_id: i64, is_read: bool) -> Notification {
        let now = Utc::now();
        Notification {
            id,
            tenant_id: 1,
            user_id,
            kind: "course.graded".into(),
            title: "Quiz graded".into(),
            body: "You scored 9/10".into(),
            link: None,
            is_read,
            read_at: None,
            is_deleted: false,
            deleted_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn service(
        repo: MockNotificationRepository,
        events: MockEventPublisher,
    ) -> NotificationServiceImpl<MockNotificationRepository> {
        NotificationServiceImpl::new(
            Arc::new(repo),
            Arc::new(events),
            Arc::new(SnowflakeGenerator::new(1, PLATFORM_EPOCH)),
        )
    }

    fn request(user_id: i64) -> CreateNotificationDto {
        CreateNotificationDto {
            user_id,
            kind: "course.graded".into(),
            title: "Quiz graded".into(),
            body: "You scored 9/10".into(),
            link: Some("/courses/3/quizzes/1".into()),
        }
    }

    #[tokio::test]
    async fn test_notify_pushes_to_recipient() {
        let mut repo = MockNotificationRepository::new();
        repo.expect_create()
            .times(1)
            .withf(|n| n.user_id == 42 && n.tenant_id == 1 && !n.is_read)
            .returning(|n| Ok(Notification::clone(n)));

        let mut events = MockEventPublisher::new();
        events
            .expect_publish()
            .times(1)
            .withf(|routed| {
                routed.target == Target::User(42)
                    && matches!(&routed.event, ServerEvent::NotificationNew(n) if n.title == "Quiz graded")
            })
            .return_const(());

        let created = service(repo, events)
            .notify(&actor(7, &["instructor"]), request(42))
            .await
            .unwrap();

        assert_eq!(created.link.as_deref(), Some("/courses/3/quizzes/1"));
    }

    #[tokio::test]
    async fn test_students_cannot_notify() {
        let mut repo = MockNotificationRepository::new();
        repo.expect_create().never();

        let result = service(repo, MockEventPublisher::new())
            .notify(&actor(7, &["student"]), request(42))
            .await;

        assert!(matches!(result, Err(NotificationError::Forbidden)));
    }

    #[tokio::test]
    async fn test_cannot_touch_someone_elses_notification() {
        let mut repo = MockNotificationRepository::new();
        repo.expect_find_by_id()
            .returning(|id| Ok(Some(stored(id, 99, false))));
        repo.expect_mark_read().never();
        repo.expect_soft_delete().never();

        let svc = service(repo, MockEventPublisher::new());
        assert!(matches!(
            svc.mark_read(&actor(7, &[]), 5).await,
            Err(NotificationError::NotFound)
        ));
        assert!(matches!(
            svc.delete(&actor(7, &[]), 5).await,
            Err(NotificationError::NotFound)
        ));
    }

    #[tokio::test]
    async fn test_mark_read_skips_already_read() {
        let mut repo = MockNotificationRepository::new();
        repo.expect_find_by_id()
            .returning(|id| Ok(Some(stored(id, 7, true))));
        repo.expect_mark_read().never();

        service(repo, MockEventPublisher::new())
            .mark_read(&actor(7, &[]), 5)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_list_clamps_limit_and_passes_filter() {
        let mut repo = MockNotificationRepository::new();
        repo.expect_find_by_user()
            .with(eq(1), eq(7), eq(true), eq(1))
            .returning(|_, user_id, _, _| Ok(vec![stored(3, user_id, false)]));

        let listed = service(repo, MockEventPublisher::new())
            .list(
                &actor(7, &[]),
                NotificationQueryDto {
                    unread_only: true,
                    limit: Some(0),
                },
            )
            .await
            .unwrap();

        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, 3);
    }
}
