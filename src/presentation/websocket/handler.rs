//! WebSocket Connection Handler
//!
//! Authenticates the upgrade request, then runs one reader loop per socket
//! with a dedicated writer task fed by the session's queue.

use std::time::Duration;

use axum::{
    extract::{
        ws::{Message, WebSocket},
        Query, State, WebSocketUpgrade,
    },
    http::HeaderMap,
    response::Response,
};
use futures::{SinkExt, Stream, StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;
use tokio::time::interval;
use uuid::Uuid;

use super::gateway::Gateway;
use super::messages::{ClientEvent, ClientFrame, ProtocolError, RoomRef, SendMessagePayload};
use super::session::SessionState;
use crate::application::events::{
    AckPayload, HelloPayload, PresencePayload, PresenceStatus, RoomMembershipPayload,
    RoutedEvent, ServerEvent, Target, TypingPayload,
};
use crate::application::presence::PresenceStore;
use crate::application::services::{ChatError, ChatService, CreateMessageDto};
use crate::infrastructure::metrics;
use crate::presentation::middleware::{bearer_token, AuthUser};
use crate::shared::error::AppError;
use crate::startup::AppState;

const WRITER_DRAIN_TIMEOUT: Duration = Duration::from_secs(1);

#[derive(Debug, Deserialize)]
pub struct GatewayQuery {
    pub token: Option<String>,
}

/// WebSocket upgrade handler
///
/// The token comes from `?token=` (browsers cannot set headers on a
/// WebSocket) or from `Authorization: Bearer`.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Query(query): Query<GatewayQuery>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    let auth_user = match query.token.as_deref() {
        Some(token) => state.verifier.verify(token)?,
        None => state.verifier.verify(&bearer_token(&headers)?)?,
    };

    let ws_settings = &state.settings.websocket;
    Ok(ws
        .max_message_size(ws_settings.max_message_size)
        .max_frame_size(ws_settings.max_frame_size)
        .on_upgrade(move |socket| handle_socket(socket, state, auth_user)))
}

/// Everything a client event may touch
pub struct EventContext<'a> {
    pub gateway: &'a Gateway,
    pub chat: &'a dyn ChatService,
    pub presence: &'a dyn PresenceStore,
}

/// Handle individual WebSocket connection
async fn handle_socket(socket: WebSocket, state: AppState, auth_user: AuthUser) {
    let session_id = Uuid::new_v4().to_string();
    let timeout_ms = state.settings.websocket.heartbeat_timeout_ms();
    let mut session = SessionState::new(session_id.clone(), auth_user.actor(), timeout_ms);

    let (mut sink, stream) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<ServerEvent>();

    // Queued before registration so it is always the first frame.
    let _ = tx.send(ServerEvent::Hello(HelloPayload {
        session_id: session_id.clone(),
        heartbeat_interval: state.gateway.heartbeat_interval(),
    }));

    let writer = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            let text = match serde_json::to_string(&event) {
                Ok(t) => t,
                Err(e) => {
                    tracing::error!(error = %e, event = event.event_name(), "Failed to serialize event");
                    continue;
                }
            };
            if sink.send(Message::Text(text.into())).await.is_err() {
                break;
            }
        }
        let _ = sink.close().await;
    });

    let first_local = state.gateway.register_session(
        session_id.clone(),
        session.user_id(),
        session.tenant_id(),
        tx,
    );

    let chat = state.chat_service();
    let ctx = EventContext {
        gateway: &state.gateway,
        chat: &chat,
        presence: state.presence.as_ref(),
    };

    announce_presence(&ctx, &session, PresenceStatus::Online).await;

    tracing::info!(
        user_id = session.user_id(),
        tenant_id = session.tenant_id(),
        session_id = %session_id,
        first_local,
        "User connected"
    );

    let heartbeat_period = Duration::from_millis(state.gateway.heartbeat_interval());
    let reason = run_session(stream, &mut session, &ctx, heartbeat_period).await;
    tracing::debug!(session_id = %session_id, ?reason, "Session loop ended");

    disconnect(&ctx, &session).await;

    if tokio::time::timeout(WRITER_DRAIN_TIMEOUT, writer).await.is_err() {
        tracing::debug!(session_id = %session_id, "Writer did not drain in time");
    }
}

/// Why the reader loop stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    ClientClosed,
    HeartbeatTimeout,
    TransportError,
}

/// Read client frames until the peer goes away or stops sending heartbeats.
///
/// Liveness is checked every `heartbeat_period`.
pub async fn run_session<S>(
    mut stream: S,
    session: &mut SessionState,
    ctx: &EventContext<'_>,
    heartbeat_period: Duration,
) -> CloseReason
where
    S: Stream<Item = Result<Message, axum::Error>> + Unpin,
{
    let mut heartbeat_check = interval(heartbeat_period);
    heartbeat_check.tick().await;

    loop {
        tokio::select! {
            msg = stream.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        handle_frame(text.as_str(), session, ctx).await;
                    }
                    Some(Ok(Message::Binary(_))) => {
                        ctx.gateway.send_to_session(
                            &session.session_id,
                            ServerEvent::error("unsupported_frame", "Binary frames are not supported"),
                        );
                    }
                    Some(Ok(Message::Close(_))) | None => return CloseReason::ClientClosed,
                    Some(Ok(_)) => {
                        // Ping/Pong frames are answered by axum
                    }
                    Some(Err(e)) => {
                        tracing::debug!(session_id = %session.session_id, error = %e, "WebSocket error");
                        return CloseReason::TransportError;
                    }
                }
            }

            _ = heartbeat_check.tick() => {
                if !session.is_alive() {
                    tracing::info!(session_id = %session.session_id, "Heartbeat timeout, closing connection");
                    return CloseReason::HeartbeatTimeout;
                }
            }
        }
    }
}

/// Unregister the session and tell its rooms and tenant.
pub async fn disconnect(ctx: &EventContext<'_>, session: &SessionState) {
    let Some(departure) = ctx.gateway.unregister_session(&session.session_id) else {
        return;
    };

    tracing::info!(
        user_id = departure.user_id,
        session_id = %session.session_id,
        rooms = departure.rooms.len(),
        last_local = departure.last_local_session,
        "User disconnected"
    );

    for room_id in departure.typing_rooms {
        ctx.gateway.dispatch(RoutedEvent::new(
            Target::Room(room_id),
            ServerEvent::TypingStop(TypingPayload {
                room_id,
                user_id: departure.user_id,
            }),
        ));
    }

    for room_id in departure.rooms {
        ctx.gateway.dispatch(RoutedEvent::new(
            Target::Room(room_id),
            ServerEvent::RoomLeft(RoomMembershipPayload {
                room_id,
                user_id: departure.user_id,
            }),
        ));
    }

    announce_presence(ctx, session, PresenceStatus::Offline).await;
}

/// Update the presence store and broadcast on online/offline transitions.
async fn announce_presence(ctx: &EventContext<'_>, session: &SessionState, status: PresenceStatus) {
    let user_id = session.user_id();
    let transition = match status {
        PresenceStatus::Online => ctx.presence.mark_online(user_id).await,
        PresenceStatus::Offline => ctx.presence.mark_offline(user_id).await,
    };

    match transition {
        Ok(true) => ctx.gateway.dispatch(
            RoutedEvent::new(
                Target::Tenant(session.tenant_id()),
                ServerEvent::PresenceUpdate(PresencePayload { user_id, status }),
            )
            .excluding(session.session_id.clone()),
        ),
        Ok(false) => {}
        Err(e) => tracing::warn!(
            user_id,
            store = ctx.presence.name(),
            error = %e,
            "Presence update failed"
        ),
    }
}

/// Failure of a single client event. The connection stays open.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error(transparent)]
    Chat(#[from] ChatError),

    #[error("Join the room first")]
    NotJoined,

    #[error("Already joined")]
    AlreadyJoined,
}

impl GatewayError {
    pub fn code(&self) -> &'static str {
        match self {
            GatewayError::Protocol(e) => e.code(),
            GatewayError::Chat(e) => e.code(),
            GatewayError::NotJoined => "not_joined",
            GatewayError::AlreadyJoined => "already_joined",
        }
    }

    /// Client-facing text; storage failures are not described.
    pub fn client_message(&self) -> String {
        match self {
            GatewayError::Chat(ChatError::Repository(_)) => "Internal server error".to_string(),
            other => other.to_string(),
        }
    }
}

/// Parse and run one text frame, replying to the sending session.
pub async fn handle_frame(text: &str, session: &mut SessionState, ctx: &EventContext<'_>) {
    let frame = match ClientFrame::parse(text) {
        Ok(frame) => frame,
        Err(e) => {
            metrics::record_client_event("malformed", false);
            ctx.gateway.send_to_session(
                &session.session_id,
                ServerEvent::error(e.code(), e.to_string()),
            );
            return;
        }
    };

    let ack = frame.ack;
    let (name, result) = match frame.event {
        Ok(event) => (event.name(), handle_client_event(event, session, ctx).await),
        Err(e) => ("unknown", Err(GatewayError::from(e))),
    };

    metrics::record_client_event(name, result.is_ok());

    let reply = match (ack, result) {
        (Some(ack), Ok(data)) => Some(ServerEvent::Ack(AckPayload {
            ack,
            ok: true,
            data,
            error: None,
        })),
        (None, Ok(_)) => None,
        (Some(ack), Err(e)) => {
            log_failure(name, session, &e);
            Some(ServerEvent::Ack(AckPayload {
                ack,
                ok: false,
                data: None,
                error: Some(e.client_message()),
            }))
        }
        (None, Err(e)) => {
            log_failure(name, session, &e);
            Some(ServerEvent::error(e.code(), e.client_message()))
        }
    };

    if let Some(reply) = reply {
        ctx.gateway.send_to_session(&session.session_id, reply);
    }
}

fn log_failure(event: &str, session: &SessionState, error: &GatewayError) {
    match error {
        GatewayError::Chat(ChatError::Repository(e)) => tracing::error!(
            event,
            session_id = %session.session_id,
            error = %e,
            "Client event failed"
        ),
        e => tracing::debug!(
            event,
            session_id = %session.session_id,
            code = e.code(),
            "Client event rejected"
        ),
    }
}

/// Run one client event. Returns the ack payload on success.
pub async fn handle_client_event(
    event: ClientEvent,
    session: &mut SessionState,
    ctx: &EventContext<'_>,
) -> Result<Option<serde_json::Value>, GatewayError> {
    let session_id = session.session_id.clone();
    let user_id = session.user_id();

    match event {
        ClientEvent::Ping => {
            session.heartbeat();
            if let Err(e) = ctx.presence.refresh(user_id).await {
                tracing::warn!(user_id, error = %e, "Presence refresh failed");
            }
            ctx.gateway.send_to_session(&session_id, ServerEvent::Pong);
            Ok(None)
        }

        ClientEvent::RoomJoin(RoomRef { room_id }) => {
            let room = ctx.chat.authorize_join(&session.actor, room_id).await?;
            if !ctx.gateway.join_room(&session_id, room_id) {
                return Err(GatewayError::AlreadyJoined);
            }

            ctx.gateway.dispatch(RoutedEvent::new(
                Target::Room(room_id),
                ServerEvent::RoomJoined(RoomMembershipPayload { room_id, user_id }),
            ));
            Ok(serde_json::to_value(room).ok())
        }

        ClientEvent::RoomLeave(RoomRef { room_id }) => {
            stop_typing(ctx.gateway, &session_id, room_id, user_id);
            if !ctx.gateway.leave_room(&session_id, room_id) {
                return Err(GatewayError::NotJoined);
            }

            ctx.gateway.dispatch(RoutedEvent::new(
                Target::Room(room_id),
                ServerEvent::RoomLeft(RoomMembershipPayload { room_id, user_id }),
            ));
            Ok(None)
        }

        ClientEvent::MessageSend(SendMessagePayload {
            room_id,
            content,
            reply_to_id,
        }) => {
            let message = ctx
                .chat
                .send_message(
                    &session.actor,
                    room_id,
                    CreateMessageDto {
                        content,
                        reply_to_id,
                    },
                )
                .await?;

            metrics::record_message_sent("gateway");
            stop_typing(ctx.gateway, &session_id, room_id, user_id);
            Ok(serde_json::to_value(message).ok())
        }

        ClientEvent::TypingStart(RoomRef { room_id }) => {
            if !ctx.gateway.is_in_room(&session_id, room_id) {
                return Err(GatewayError::NotJoined);
            }
            if ctx.gateway.set_typing(&session_id, room_id, true) {
                ctx.gateway.dispatch(
                    RoutedEvent::new(
                        Target::Room(room_id),
                        ServerEvent::TypingStart(TypingPayload { room_id, user_id }),
                    )
                    .excluding(session_id),
                );
            }
            Ok(None)
        }

        ClientEvent::TypingStop(RoomRef { room_id }) => {
            if !ctx.gateway.is_in_room(&session_id, room_id) {
                return Err(GatewayError::NotJoined);
            }
            stop_typing(ctx.gateway, &session_id, room_id, user_id);
            Ok(None)
        }
    }
}

/// Clear the typing flag and announce it if it was set.
fn stop_typing(gateway: &Gateway, session_id: &str, room_id: i64, user_id: i64) {
    if gateway.set_typing(session_id, room_id, false) {
        gateway.dispatch(
            RoutedEvent::new(
                Target::Room(room_id),
                ServerEvent::TypingStop(TypingPayload { room_id, user_id }),
            )
            .excluding(session_id),
        );
    }
}
