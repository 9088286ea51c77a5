//! Redis pub/sub relay.
//!
//! Every gateway instance publishes its routed events on one shared channel
//! and subscribes to the same channel. Events carry the publishing
//! instance's id as `origin`; an instance ignores its own echoes.

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::application::events::{EventRelay, RemoteSink, RoutedEvent};

const RESUBSCRIBE_DELAY: Duration = Duration::from_secs(2);

/// Publishing half of the relay.
///
/// `forward` only enqueues; a background task owns the Redis connection.
pub struct RedisRelay {
    instance_id: String,
    queue: mpsc::UnboundedSender<String>,
}

impl RedisRelay {
    /// Spawn the publisher task and return the relay handle.
    pub fn start(conn: ConnectionManager, channel: String, instance_id: String) -> Self {
        let (queue, mut rx) = mpsc::unbounded_channel::<String>();

        tokio::spawn(async move {
            let mut conn = conn;
            while let Some(payload) = rx.recv().await {
                let result: redis::RedisResult<i64> = conn.publish(&channel, payload).await;
                if let Err(e) = result {
                    warn!(error = %e, channel = %channel, "Failed to publish relayed event");
                }
            }
            debug!("Relay publisher stopped");
        });

        Self { instance_id, queue }
    }
}

impl EventRelay for RedisRelay {
    fn forward(&self, event: &RoutedEvent) {
        let payload = match encode(event, &self.instance_id) {
            Ok(payload) => payload,
            Err(e) => {
                error!(error = %e, event = event.event.event_name(), "Failed to encode relayed event");
                return;
            }
        };

        if self.queue.send(payload).is_err() {
            warn!("Relay publisher is gone; dropping event");
        }
    }

    fn name(&self) -> &'static str {
        "redis"
    }
}

fn encode(event: &RoutedEvent, instance_id: &str) -> Result<String, serde_json::Error> {
    let mut event = event.clone();
    event.origin.get_or_insert_with(|| instance_id.to_string());
    serde_json::to_string(&event)
}

/// Decode a relayed payload, dropping our own echoes.
fn decode_remote(payload: &str, instance_id: &str) -> Option<RoutedEvent> {
    match serde_json::from_str::<RoutedEvent>(payload) {
        Ok(event) if event.origin.as_deref() == Some(instance_id) => None,
        Ok(event) => Some(event),
        Err(e) => {
            warn!(error = %e, "Discarding malformed relayed event");
            None
        }
    }
}

/// Subscribe to the relay channel and hand remote events to `sink`.
///
/// Resubscribes after connection loss.
pub fn spawn_subscriber(
    client: redis::Client,
    channel: String,
    instance_id: String,
    sink: Arc<dyn RemoteSink>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match subscribe(&client, &channel, &instance_id, sink.as_ref()).await {
                Ok(()) => warn!(channel = %channel, "Relay subscription ended"),
                Err(e) => error!(error = %e, channel = %channel, "Relay subscription failed"),
            }
            tokio::time::sleep(RESUBSCRIBE_DELAY).await;
        }
    })
}

async fn subscribe(
    client: &redis::Client,
    channel: &str,
    instance_id: &str,
    sink: &dyn RemoteSink,
) -> redis::RedisResult<()> {
    let mut pubsub = client.get_async_pubsub().await?;
    pubsub.subscribe(channel).await?;
    info!(channel, "Subscribed to relay channel");

    let mut messages = pubsub.on_message();
    while let Some(msg) = messages.next().await {
        let payload: String = match msg.get_payload() {
            Ok(payload) => payload,
            Err(e) => {
                warn!(error = %e, "Unreadable relay payload");
                continue;
            }
        };

        if let Some(event) = decode_remote(&payload, instance_id) {
            sink.deliver_remote(event);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::events::{ServerEvent, Target};

    fn routed() -> RoutedEvent {
        RoutedEvent::new(Target::Room(5), ServerEvent::Pong)
    }

    #[test]
    fn test_encode_stamps_origin() {
        let payload = encode(&routed(), "node-a").unwrap();
        let decoded: RoutedEvent = serde_json::from_str(&payload).unwrap();
        assert_eq!(decoded.origin.as_deref(), Some("node-a"));
    }

    #[test]
    fn test_own_echo_is_dropped() {
        let payload = encode(&routed(), "node-a").unwrap();
        assert!(decode_remote(&payload, "node-a").is_none());
        assert_eq!(decode_remote(&payload, "node-b").unwrap().target, Target::Room(5));
    }

    #[test]
    fn test_garbage_is_dropped() {
        assert!(decode_remote("not json", "node-a").is_none());
    }
}
