//! Real-time Events
//!
//! Server-to-client event vocabulary and the routing envelope used to fan
//! events out to connected sessions, locally and across instances.

use serde::{Deserialize, Serialize};

use super::dto::{MessageDto, NotificationDto};
use crate::shared::snowflake::serde_id;

/// Events pushed to gateway clients.
///
/// Serialized as `{"event": "<name>", "data": {...}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum ServerEvent {
    #[serde(rename = "hello")]
    Hello(HelloPayload),
    #[serde(rename = "pong")]
    Pong,
    #[serde(rename = "ack")]
    Ack(AckPayload),
    #[serde(rename = "error")]
    Error(ErrorPayload),

    #[serde(rename = "room:joined")]
    RoomJoined(RoomMembershipPayload),
    #[serde(rename = "room:left")]
    RoomLeft(RoomMembershipPayload),
    #[serde(rename = "room:deleted")]
    RoomDeleted(RoomDeletedPayload),

    #[serde(rename = "message:new")]
    MessageNew(MessageDto),
    #[serde(rename = "message:deleted")]
    MessageDeleted(MessageDeletedPayload),

    #[serde(rename = "typing:start")]
    TypingStart(TypingPayload),
    #[serde(rename = "typing:stop")]
    TypingStop(TypingPayload),

    #[serde(rename = "presence:update")]
    PresenceUpdate(PresencePayload),

    #[serde(rename = "notification:new")]
    NotificationNew(NotificationDto),
}

impl ServerEvent {
    /// Get the event name as sent on the wire
    pub fn event_name(&self) -> &'static str {
        match self {
            ServerEvent::Hello(_) => "hello",
            ServerEvent::Pong => "pong",
            ServerEvent::Ack(_) => "ack",
            ServerEvent::Error(_) => "error",
            ServerEvent::RoomJoined(_) => "room:joined",
            ServerEvent::RoomLeft(_) => "room:left",
            ServerEvent::RoomDeleted(_) => "room:deleted",
            ServerEvent::MessageNew(_) => "message:new",
            ServerEvent::MessageDeleted(_) => "message:deleted",
            ServerEvent::TypingStart(_) => "typing:start",
            ServerEvent::TypingStop(_) => "typing:stop",
            ServerEvent::PresenceUpdate(_) => "presence:update",
            ServerEvent::NotificationNew(_) => "notification:new",
        }
    }

    pub fn error(code: &str, message: impl Into<String>) -> Self {
        ServerEvent::Error(ErrorPayload {
            code: code.to_string(),
            message: message.into(),
        })
    }
}

/// Sent once right after the socket is accepted
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HelloPayload {
    pub session_id: String,
    pub heartbeat_interval: u64,
}

/// Reply to a client frame that carried an `ack` number
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AckPayload {
    pub ack: u64,
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorPayload {
    pub code: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomMembershipPayload {
    #[serde(with = "serde_id")]
    pub room_id: i64,
    #[serde(with = "serde_id")]
    pub user_id: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomDeletedPayload {
    #[serde(with = "serde_id")]
    pub room_id: i64,
    #[serde(with = "serde_id")]
    pub deleted_by: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageDeletedPayload {
    #[serde(with = "serde_id")]
    pub id: i64,
    #[serde(with = "serde_id")]
    pub room_id: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypingPayload {
    #[serde(with = "serde_id")]
    pub room_id: i64,
    #[serde(with = "serde_id")]
    pub user_id: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PresenceStatus {
    Online,
    Offline,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresencePayload {
    #[serde(with = "serde_id")]
    pub user_id: i64,
    pub status: PresenceStatus,
}

/// Who should receive an event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum Target {
    /// Every session that joined the room
    Room(i64),
    /// Every session of the user
    User(i64),
    /// Every session of the tenant
    Tenant(i64),
}

/// Event wrapper with routing information
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutedEvent {
    pub target: Target,
    pub event: ServerEvent,
    /// Session that must not receive the event (the originator)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exclude_session: Option<String>,
    /// Gateway instance that first published the event
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin: Option<String>,
    /// Subscriptions to drop once the event has been delivered
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub evict: Option<Eviction>,
}

/// Subscription revocation carried alongside an event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "scope", rename_all = "snake_case")]
pub enum Eviction {
    /// One user's sessions leave the room
    User { user_id: i64, room_id: i64 },
    /// Every session leaves the room
    Room { room_id: i64 },
}

impl RoutedEvent {
    pub fn new(target: Target, event: ServerEvent) -> Self {
        Self {
            target,
            event,
            exclude_session: None,
            origin: None,
            evict: None,
        }
    }

    pub fn excluding(mut self, session_id: impl Into<String>) -> Self {
        self.exclude_session = Some(session_id.into());
        self
    }

    pub fn evicting(mut self, user_id: i64, room_id: i64) -> Self {
        self.evict = Some(Eviction::User { user_id, room_id });
        self
    }

    pub fn closing_room(mut self, room_id: i64) -> Self {
        self.evict = Some(Eviction::Room { room_id });
        self
    }
}

/// Sink for events produced by application services.
#[cfg_attr(test, mockall::automock)]
pub trait EventPublisher: Send + Sync {
    fn publish(&self, event: RoutedEvent);
}

/// Carries events to the other gateway instances.
///
/// `forward` must not block; implementations queue and publish in the
/// background.
pub trait EventRelay: Send + Sync {
    fn forward(&self, event: &RoutedEvent);

    fn name(&self) -> &'static str;
}

/// Receives events relayed from other gateway instances.
pub trait RemoteSink: Send + Sync {
    /// Deliver to local sessions only. Must never forward back to the relay.
    fn deliver_remote(&self, event: RoutedEvent);
}

/// Relay for single-instance deployments.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopRelay;

impl EventRelay for NoopRelay {
    fn forward(&self, _event: &RoutedEvent) {}

    fn name(&self) -> &'static str {
        "noop"
    }
}
