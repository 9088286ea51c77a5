//! Message Handlers

use axum::{extract::State, http::StatusCode, Json};

use crate::application::dto::{MessageDto, MessageQueryParams, SendMessageRequest};
use crate::application::services::{ChatService, CreateMessageDto, MessageQueryDto};
use crate::infrastructure::metrics;
use crate::presentation::http::extractors::{Ids, ValidatedJson, ValidatedQuery};
use crate::presentation::middleware::AuthUser;
use crate::shared::error::AppError;
use crate::startup::AppState;

/// Message history, newest first. Page backwards with `before`.
pub async fn get_messages(
    State(state): State<AppState>,
    auth: AuthUser,
    Ids(room_id): Ids<i64>,
    ValidatedQuery(query): ValidatedQuery<MessageQueryParams>,
) -> Result<Json<Vec<MessageDto>>, AppError> {
    let messages = state
        .chat_service()
        .get_messages(
            &auth.actor(),
            room_id,
            MessageQueryDto {
                before: query.before,
                limit: query.limit,
            },
        )
        .await?;

    Ok(Json(messages))
}

/// Post a message; room members receive it as `message:new`
pub async fn send_message(
    State(state): State<AppState>,
    auth: AuthUser,
    Ids(room_id): Ids<i64>,
    ValidatedJson(body): ValidatedJson<SendMessageRequest>,
) -> Result<(StatusCode, Json<MessageDto>), AppError> {
    let message = state
        .chat_service()
        .send_message(
            &auth.actor(),
            room_id,
            CreateMessageDto {
                content: body.content,
                reply_to_id: body.reply_to_id,
            },
        )
        .await?;

    metrics::record_message_sent("http");
    Ok((StatusCode::CREATED, Json(message)))
}

pub async fn delete_message(
    State(state): State<AppState>,
    auth: AuthUser,
    Ids((room_id, message_id)): Ids<(i64, i64)>,
) -> Result<StatusCode, AppError> {
    state
        .chat_service()
        .delete_message(&auth.actor(), room_id, message_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
