//! WebSocket Session Management

use std::time::{Duration, Instant};

use crate::domain::Actor;

/// Per-connection state owned by the socket task
#[derive(Debug)]
pub struct SessionState {
    pub session_id: String,
    pub actor: Actor,
    last_heartbeat: Instant,
    timeout: Duration,
}

impl SessionState {
    /// `timeout_ms` is the heartbeat interval plus grace.
    pub fn new(session_id: String, actor: Actor, timeout_ms: u64) -> Self {
        Self {
            session_id,
            actor,
            last_heartbeat: Instant::now(),
            timeout: Duration::from_millis(timeout_ms),
        }
    }

    pub fn user_id(&self) -> i64 {
        self.actor.user_id
    }

    pub fn tenant_id(&self) -> i64 {
        self.actor.tenant_id
    }

    pub fn heartbeat(&mut self) {
        self.last_heartbeat = Instant::now();
    }

    pub fn is_alive(&self) -> bool {
        self.is_alive_at(Instant::now())
    }

    fn is_alive_at(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.last_heartbeat) < self.timeout
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Roles;

    fn session(timeout_ms: u64) -> SessionState {
        SessionState::new("s".into(), Actor::new(1, 1, Roles::default()), timeout_ms)
    }

    #[test]
    fn test_session_expires_after_timeout() {
        let session = session(35_000);
        let start = session.last_heartbeat;

        assert!(session.is_alive_at(start + Duration::from_secs(34)));
        assert!(!session.is_alive_at(start + Duration::from_secs(35)));
    }

    #[test]
    fn test_heartbeat_extends_session() {
        let mut session = session(10);
        std::thread::sleep(Duration::from_millis(15));
        assert!(!session.is_alive());
        session.heartbeat();
        assert!(session.is_alive());
    }
}
