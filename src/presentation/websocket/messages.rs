//! WebSocket Message Types
//!
//! Client frames are `{"event": "...", "data": {...}, "ack": n}`. Server
//! frames are [`ServerEvent`](crate::application::events::ServerEvent).

use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::shared::snowflake::serde_id;

/// Incoming gateway frame before the payload is interpreted
#[derive(Debug, Deserialize)]
pub struct GatewayReceive {
    pub event: String,
    #[serde(default)]
    pub data: serde_json::Value,
    #[serde(default)]
    pub ack: Option<u64>,
}

/// Parsed client event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientEvent {
    Ping,
    RoomJoin(RoomRef),
    RoomLeave(RoomRef),
    MessageSend(SendMessagePayload),
    TypingStart(RoomRef),
    TypingStop(RoomRef),
}

impl ClientEvent {
    pub fn name(&self) -> &'static str {
        match self {
            ClientEvent::Ping => "ping",
            ClientEvent::RoomJoin(_) => "room:join",
            ClientEvent::RoomLeave(_) => "room:leave",
            ClientEvent::MessageSend(_) => "message:send",
            ClientEvent::TypingStart(_) => "typing:start",
            ClientEvent::TypingStop(_) => "typing:stop",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct RoomRef {
    #[serde(with = "serde_id")]
    pub room_id: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SendMessagePayload {
    #[serde(with = "serde_id")]
    pub room_id: i64,
    pub content: String,
    #[serde(default, with = "serde_id::option")]
    pub reply_to_id: Option<i64>,
}

/// Why a frame could not be turned into a [`ClientEvent`]
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("Frame is not valid JSON: {0}")]
    Malformed(String),

    #[error("Unknown event: {0}")]
    UnknownEvent(String),

    #[error("Invalid data for {event}: {reason}")]
    InvalidData { event: &'static str, reason: String },
}

impl ProtocolError {
    pub fn code(&self) -> &'static str {
        match self {
            ProtocolError::Malformed(_) => "malformed_frame",
            ProtocolError::UnknownEvent(_) => "unknown_event",
            ProtocolError::InvalidData { .. } => "invalid_data",
        }
    }
}

/// A decoded frame. `ack` survives even when the event itself is invalid so
/// the client still gets a correlated failure.
#[derive(Debug)]
pub struct ClientFrame {
    pub ack: Option<u64>,
    pub event: Result<ClientEvent, ProtocolError>,
}

impl ClientFrame {
    pub fn parse(text: &str) -> Result<Self, ProtocolError> {
        let raw: GatewayReceive =
            serde_json::from_str(text).map_err(|e| ProtocolError::Malformed(e.to_string()))?;

        Ok(Self {
            ack: raw.ack,
            event: ClientEvent::from_parts(&raw.event, raw.data),
        })
    }
}

impl ClientEvent {
    pub fn from_parts(event: &str, data: serde_json::Value) -> Result<Self, ProtocolError> {
        match event {
            "ping" => Ok(ClientEvent::Ping),
            "room:join" => payload("room:join", data).map(ClientEvent::RoomJoin),
            "room:leave" => payload("room:leave", data).map(ClientEvent::RoomLeave),
            "message:send" => payload("message:send", data).map(ClientEvent::MessageSend),
            "typing:start" => payload("typing:start", data).map(ClientEvent::TypingStart),
            "typing:stop" => payload("typing:stop", data).map(ClientEvent::TypingStop),
            other => Err(ProtocolError::UnknownEvent(other.to_string())),
        }
    }
}

fn payload<T: DeserializeOwned>(event: &'static str, data: serde_json::Value) -> Result<T, ProtocolError> {
    serde_json::from_value(data).map_err(|e| ProtocolError::InvalidData {
        event,
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_message_send_with_string_ids() {
        let frame = ClientFrame::parse(
            r#"{"event":"message:send","data":{"room_id":"12","content":"hi","reply_to_id":"7"},"ack":3}"#,
        )
        .unwrap();

        assert_eq!(frame.ack, Some(3));
        assert_eq!(
            frame.event.unwrap(),
            ClientEvent::MessageSend(SendMessagePayload {
                room_id: 12,
                content: "hi".into(),
                reply_to_id: Some(7),
            })
        );
    }

    #[test]
    fn test_parse_accepts_numeric_ids_and_missing_data() {
        let join = ClientFrame::parse(r#"{"event":"room:join","data":{"room_id":5}}"#).unwrap();
        assert_eq!(join.event.unwrap(), ClientEvent::RoomJoin(RoomRef { room_id: 5 }));

        let ping = ClientFrame::parse(r#"{"event":"ping"}"#).unwrap();
        assert_eq!(ping.event.unwrap(), ClientEvent::Ping);
    }

    #[test]
    fn test_unknown_event_keeps_ack() {
        let frame = ClientFrame::parse(r#"{"event":"room:explode","ack":9}"#).unwrap();
        assert_eq!(frame.ack, Some(9));
        let err = frame.event.unwrap_err();
        assert_eq!(err.code(), "unknown_event");
    }

    #[test]
    fn test_invalid_payload_is_reported() {
        let frame = ClientFrame::parse(r#"{"event":"typing:start","data":{}}"#).unwrap();
        assert!(matches!(
            frame.event,
            Err(ProtocolError::InvalidData { event: "typing:start", .. })
        ));
    }

    #[test]
    fn test_non_json_is_malformed() {
        let err = ClientFrame::parse("hello?").unwrap_err();
        assert_eq!(err.code(), "malformed_frame");
    }
}
