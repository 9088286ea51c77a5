//! Notification Handlers
//!
//! Every route works on the caller's own notifications, except `notify`
//! which staff use to address another user.

use axum::{extract::State, http::StatusCode, Json};

use crate::application::dto::{
    CreateNotificationRequest, MarkAllReadResponse, NotificationDto, NotificationQueryParams,
    UnreadCountResponse,
};
use crate::application::services::{
    CreateNotificationDto, NotificationQueryDto, NotificationService,
};
use crate::presentation::http::extractors::{Ids, ValidatedJson, ValidatedQuery};
use crate::presentation::middleware::AuthUser;
use crate::shared::error::AppError;
use crate::startup::AppState;

pub async fn list_notifications(
    State(state): State<AppState>,
    auth: AuthUser,
    ValidatedQuery(query): ValidatedQuery<NotificationQueryParams>,
) -> Result<Json<Vec<NotificationDto>>, AppError> {
    let notifications = state
        .notification_service()
        .list(
            &auth.actor(),
            NotificationQueryDto {
                unread_only: query.unread_only,
                limit: query.limit,
            },
        )
        .await?;

    Ok(Json(notifications))
}

/// Send a notification to a user (admin or instructor)
pub async fn create_notification(
    State(state): State<AppState>,
    auth: AuthUser,
    ValidatedJson(body): ValidatedJson<CreateNotificationRequest>,
) -> Result<(StatusCode, Json<NotificationDto>), AppError> {
    let recipient = body.user_id;
    let notification = state
        .notification_service()
        .notify(
            &auth.actor(),
            CreateNotificationDto {
                user_id: body.user_id,
                kind: body.kind,
                title: body.title,
                body: body.body,
                link: body.link,
            },
        )
        .await?;

    tracing::info!(
        notification_id = notification.id,
        recipient,
        sender = auth.user_id,
        "Notification sent"
    );
    Ok((StatusCode::CREATED, Json(notification)))
}

pub async fn unread_count(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<UnreadCountResponse>, AppError> {
    let unread = state.notification_service().unread_count(&auth.actor()).await?;
    Ok(Json(UnreadCountResponse { unread }))
}

pub async fn mark_all_read(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<MarkAllReadResponse>, AppError> {
    let updated = state.notification_service().mark_all_read(&auth.actor()).await?;
    Ok(Json(MarkAllReadResponse { updated }))
}

pub async fn mark_read(
    State(state): State<AppState>,
    auth: AuthUser,
    Ids(notification_id): Ids<i64>,
) -> Result<StatusCode, AppError> {
    state
        .notification_service()
        .mark_read(&auth.actor(), notification_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn delete_notification(
    State(state): State<AppState>,
    auth: AuthUser,
    Ids(notification_id): Ids<i64>,
) -> Result<StatusCode, AppError> {
    state
        .notification_service()
        .delete(&auth.actor(), notification_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
