//! Room Handlers
//!
//! Room lifecycle and membership management.

use axum::{extract::State, http::StatusCode, Json};

use crate::application::dto::{AddMemberRequest, CreateRoomRequest, RoomDetailDto, RoomDto};
use crate::application::services::{ChatService, CreateRoomDto};
use crate::presentation::http::extractors::{Ids, ValidatedJson};
use crate::presentation::middleware::AuthUser;
use crate::shared::error::AppError;
use crate::startup::AppState;

/// List rooms the caller belongs to
pub async fn list_rooms(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<Vec<RoomDto>>, AppError> {
    let rooms = state.chat_service().list_rooms(&auth.actor()).await?;
    Ok(Json(rooms))
}

/// Create a room; the caller becomes its owner
pub async fn create_room(
    State(state): State<AppState>,
    auth: AuthUser,
    ValidatedJson(body): ValidatedJson<CreateRoomRequest>,
) -> Result<(StatusCode, Json<RoomDto>), AppError> {
    let room = state
        .chat_service()
        .create_room(
            &auth.actor(),
            CreateRoomDto {
                name: body.name,
                description: body.description,
                room_type: body.room_type,
                member_ids: body.member_ids,
            },
        )
        .await?;

    Ok((StatusCode::CREATED, Json(room)))
}

pub async fn get_room(
    State(state): State<AppState>,
    auth: AuthUser,
    Ids(room_id): Ids<i64>,
) -> Result<Json<RoomDetailDto>, AppError> {
    let room = state.chat_service().get_room(&auth.actor(), room_id).await?;
    Ok(Json(room))
}

pub async fn delete_room(
    State(state): State<AppState>,
    auth: AuthUser,
    Ids(room_id): Ids<i64>,
) -> Result<StatusCode, AppError> {
    state.chat_service().delete_room(&auth.actor(), room_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn add_member(
    State(state): State<AppState>,
    auth: AuthUser,
    Ids(room_id): Ids<i64>,
    ValidatedJson(body): ValidatedJson<AddMemberRequest>,
) -> Result<StatusCode, AppError> {
    state
        .chat_service()
        .add_member(&auth.actor(), room_id, body.user_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Remove a member; members may remove themselves
pub async fn remove_member(
    State(state): State<AppState>,
    auth: AuthUser,
    Ids((room_id, user_id)): Ids<(i64, i64)>,
) -> Result<StatusCode, AppError> {
    state
        .chat_service()
        .remove_member(&auth.actor(), room_id, user_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
