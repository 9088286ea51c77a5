//! Presence Handlers
//!
//! Sessions held by this instance answer first; the presence store covers
//! users connected elsewhere.

use std::collections::HashSet;

use axum::{extract::State, Json};

use crate::application::dto::{PresenceResponse, RoomPresenceResponse};
use crate::application::services::ChatService;
use crate::presentation::http::extractors::Ids;
use crate::presentation::middleware::AuthUser;
use crate::shared::error::AppError;
use crate::startup::AppState;

/// Online members of a room. Requires membership.
pub async fn room_presence(
    State(state): State<AppState>,
    auth: AuthUser,
    Ids(room_id): Ids<i64>,
) -> Result<Json<RoomPresenceResponse>, AppError> {
    let member_ids = state.chat_service().member_ids(&auth.actor(), room_id).await?;

    let local: HashSet<i64> = state.gateway.online_users_in_room(room_id).into_iter().collect();
    let unresolved: Vec<i64> = member_ids
        .iter()
        .copied()
        .filter(|id| !local.contains(id))
        .collect();
    let elsewhere: HashSet<i64> = state
        .presence
        .filter_online(&unresolved)
        .await?
        .into_iter()
        .collect();

    let online_user_ids = member_ids
        .into_iter()
        .filter(|id| local.contains(id) || elsewhere.contains(id))
        .map(|id| id.to_string())
        .collect();

    Ok(Json(RoomPresenceResponse {
        room_id,
        online_user_ids,
    }))
}

pub async fn user_presence(
    State(state): State<AppState>,
    _auth: AuthUser,
    Ids(user_id): Ids<i64>,
) -> Result<Json<PresenceResponse>, AppError> {
    let online = state.gateway.is_user_online(user_id) || state.presence.is_online(user_id).await?;
    Ok(Json(PresenceResponse { user_id, online }))
}
