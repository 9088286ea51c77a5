//! WebSocket Gateway
//!
//! Connection registry and event routing. Sessions are indexed by user,
//! tenant and joined room so that a routed event reaches exactly the
//! matching local sockets. Events produced on this instance are also handed
//! to the relay so that other instances can deliver them to their own
//! sockets.

use std::collections::HashSet;
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::RwLock;
use tokio::sync::mpsc;

use crate::application::events::{
    EventPublisher, EventRelay, Eviction, RemoteSink, RoutedEvent, ServerEvent, Target,
};
use crate::infrastructure::metrics;

/// Connected session with its outbound queue
pub struct ConnectedSession {
    pub session_id: String,
    pub user_id: i64,
    pub tenant_id: i64,
    rooms: RwLock<HashSet<i64>>,
    typing: RwLock<HashSet<i64>>,
    sender: mpsc::UnboundedSender<ServerEvent>,
}

impl ConnectedSession {
    pub fn send(&self, event: ServerEvent) -> bool {
        self.sender.send(event).is_ok()
    }
}

/// What a closed session leaves behind
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Departure {
    pub user_id: i64,
    pub tenant_id: i64,
    /// Rooms the session had joined
    pub rooms: Vec<i64>,
    /// Rooms where the session was still typing
    pub typing_rooms: Vec<i64>,
    /// No other session of the user remains on this instance
    pub last_local_session: bool,
}

/// WebSocket gateway managing all connections of this instance
pub struct Gateway {
    instance_id: String,
    /// Active sessions by session_id
    sessions: DashMap<String, Arc<ConnectedSession>>,
    /// User ID to session IDs (one user can have multiple sessions)
    user_sessions: DashMap<i64, HashSet<String>>,
    /// Tenant ID to session IDs
    tenant_sessions: DashMap<i64, HashSet<String>>,
    /// Room ID to session IDs that joined it
    room_sessions: DashMap<i64, HashSet<String>>,
    relay: Arc<dyn EventRelay>,
    heartbeat_interval_ms: u64,
}

impl Gateway {
    pub fn new(instance_id: String, relay: Arc<dyn EventRelay>, heartbeat_interval_ms: u64) -> Self {
        Self {
            instance_id,
            sessions: DashMap::new(),
            user_sessions: DashMap::new(),
            tenant_sessions: DashMap::new(),
            room_sessions: DashMap::new(),
            relay,
            heartbeat_interval_ms,
        }
    }

    pub fn instance_id(&self) -> &str {
        &self.instance_id
    }

    pub fn heartbeat_interval(&self) -> u64 {
        self.heartbeat_interval_ms
    }

    pub fn relay_name(&self) -> &'static str {
        self.relay.name()
    }

    /// Register a new connected session.
    ///
    /// Returns true when this is the user's first session on this instance.
    pub fn register_session(
        &self,
        session_id: String,
        user_id: i64,
        tenant_id: i64,
        sender: mpsc::UnboundedSender<ServerEvent>,
    ) -> bool {
        let session = Arc::new(ConnectedSession {
            session_id: session_id.clone(),
            user_id,
            tenant_id,
            rooms: RwLock::new(HashSet::new()),
            typing: RwLock::new(HashSet::new()),
            sender,
        });

        self.sessions.insert(session_id.clone(), session);

        let first = {
            let mut user = self.user_sessions.entry(user_id).or_default();
            user.insert(session_id.clone());
            user.len() == 1
        };

        self.tenant_sessions
            .entry(tenant_id)
            .or_default()
            .insert(session_id.clone());

        metrics::set_gateway_sessions(self.sessions.len());

        tracing::debug!(
            user_id,
            tenant_id,
            session_id = %session_id,
            "Session registered"
        );

        first
    }

    /// Unregister a session and report what it leaves behind.
    pub fn unregister_session(&self, session_id: &str) -> Option<Departure> {
        let (_, session) = self.sessions.remove(session_id)?;

        let rooms: Vec<i64> = session.rooms.write().drain().collect();
        let typing_rooms: Vec<i64> = session.typing.write().drain().collect();

        for room_id in &rooms {
            remove_from_index(&self.room_sessions, room_id, session_id);
        }
        remove_from_index(&self.tenant_sessions, &session.tenant_id, session_id);
        let last_local_session = remove_from_index(&self.user_sessions, &session.user_id, session_id);

        metrics::set_gateway_sessions(self.sessions.len());

        tracing::debug!(
            user_id = session.user_id,
            session_id = %session_id,
            "Session unregistered"
        );

        Some(Departure {
            user_id: session.user_id,
            tenant_id: session.tenant_id,
            rooms,
            typing_rooms,
            last_local_session,
        })
    }

    /// Add a session to a room. Returns false when the session is unknown or
    /// already joined.
    pub fn join_room(&self, session_id: &str, room_id: i64) -> bool {
        let Some(session) = self.session(session_id) else {
            return false;
        };

        if !session.rooms.write().insert(room_id) {
            return false;
        }

        self.room_sessions
            .entry(room_id)
            .or_default()
            .insert(session_id.to_string());
        true
    }

    /// Remove a session from a room. Also clears its typing state there.
    pub fn leave_room(&self, session_id: &str, room_id: i64) -> bool {
        let Some(session) = self.session(session_id) else {
            return false;
        };

        if !session.rooms.write().remove(&room_id) {
            return false;
        }
        session.typing.write().remove(&room_id);

        remove_from_index(&self.room_sessions, &room_id, session_id);
        true
    }

    /// Remove every local session of `user_id` from a room.
    ///
    /// Returns the number of sessions that left.
    pub fn evict_user_from_room(&self, user_id: i64, room_id: i64) -> usize {
        self.user_session_ids(user_id)
            .iter()
            .filter(|session_id| self.leave_room(session_id, room_id))
            .count()
    }

    /// Drop every local subscription to a room, typing state included.
    ///
    /// Returns the number of sessions that were subscribed.
    pub fn close_room(&self, room_id: i64) -> usize {
        let Some((_, session_ids)) = self.room_sessions.remove(&room_id) else {
            return 0;
        };

        for session_id in &session_ids {
            if let Some(session) = self.session(session_id) {
                session.rooms.write().remove(&room_id);
                session.typing.write().remove(&room_id);
            }
        }

        tracing::debug!(room_id, sessions = session_ids.len(), "Room closed");
        session_ids.len()
    }

    pub fn is_in_room(&self, session_id: &str, room_id: i64) -> bool {
        self.session(session_id)
            .is_some_and(|s| s.rooms.read().contains(&room_id))
    }

    /// Update the typing flag of a session in a room.
    ///
    /// Returns true when the state changed.
    pub fn set_typing(&self, session_id: &str, room_id: i64, typing: bool) -> bool {
        let Some(session) = self.session(session_id) else {
            return false;
        };

        let mut set = session.typing.write();
        if typing {
            set.insert(room_id)
        } else {
            set.remove(&room_id)
        }
    }

    /// Send an event directly to one session
    pub fn send_to_session(&self, session_id: &str, event: ServerEvent) -> bool {
        self.session(session_id).is_some_and(|s| s.send(event))
    }

    /// Deliver locally and forward to the other instances.
    pub fn dispatch(&self, event: RoutedEvent) {
        self.deliver_local(&event);
        self.relay.forward(&event);
    }

    /// Deliver to matching sessions on this instance.
    ///
    /// Returns the number of sessions the event was queued to.
    pub fn deliver_local(&self, routed: &RoutedEvent) -> usize {
        let session_ids = match routed.target {
            Target::Room(room_id) => snapshot(&self.room_sessions, &room_id),
            Target::User(user_id) => snapshot(&self.user_sessions, &user_id),
            Target::Tenant(tenant_id) => snapshot(&self.tenant_sessions, &tenant_id),
        };

        let mut delivered = 0;
        for session_id in session_ids {
            if routed.exclude_session.as_deref() == Some(session_id.as_str()) {
                continue;
            }
            if let Some(session) = self.session(&session_id) {
                if session.send(routed.event.clone()) {
                    delivered += 1;
                }
            }
        }

        metrics::record_event_delivered(routed.event.event_name(), delivered);

        match routed.evict {
            Some(Eviction::User { user_id, room_id }) => {
                self.evict_user_from_room(user_id, room_id);
            }
            Some(Eviction::Room { room_id }) => {
                self.close_room(room_id);
            }
            None => {}
        }

        tracing::trace!(
            event = routed.event.event_name(),
            target = ?routed.target,
            delivered,
            "Event delivered"
        );

        delivered
    }

    /// Distinct users with a session joined to `room_id` on this instance
    pub fn online_users_in_room(&self, room_id: i64) -> Vec<i64> {
        let mut users: Vec<i64> = snapshot(&self.room_sessions, &room_id)
            .iter()
            .filter_map(|session_id| self.session(session_id).map(|s| s.user_id))
            .collect();
        users.sort_unstable();
        users.dedup();
        users
    }

    pub fn is_user_online(&self, user_id: i64) -> bool {
        self.user_sessions
            .get(&user_id)
            .is_some_and(|ids| !ids.is_empty())
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    fn session(&self, session_id: &str) -> Option<Arc<ConnectedSession>> {
        self.sessions.get(session_id).map(|s| Arc::clone(s.value()))
    }

    fn user_session_ids(&self, user_id: i64) -> Vec<String> {
        snapshot(&self.user_sessions, &user_id)
    }
}

impl EventPublisher for Gateway {
    fn publish(&self, event: RoutedEvent) {
        self.dispatch(event);
    }
}

impl RemoteSink for Gateway {
    fn deliver_remote(&self, event: RoutedEvent) {
        self.deliver_local(&event);
    }
}

fn snapshot(index: &DashMap<i64, HashSet<String>>, key: &i64) -> Vec<String> {
    index
        .get(key)
        .map(|ids| ids.iter().cloned().collect())
        .unwrap_or_default()
}

/// Remove `session_id` under `key`, dropping the entry once empty.
///
/// Returns true when the entry became empty.
fn remove_from_index(index: &DashMap<i64, HashSet<String>>, key: &i64, session_id: &str) -> bool {
    let emptied = match index.get_mut(key) {
        Some(mut ids) => {
            ids.remove(session_id);
            ids.is_empty()
        }
        None => true,
    };

    if emptied {
        index.remove_if(key, |_, ids| ids.is_empty());
    }
    emptied
}
