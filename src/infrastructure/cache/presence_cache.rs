//! Presence store implementations.
//!
//! Both stores count sessions per user. The first session marks the user
//! online and the last one to close marks them offline.

use async_trait::async_trait;
use dashmap::DashMap;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use tracing::debug;

use super::keys;
use crate::application::presence::PresenceStore;
use crate::shared::error::AppError;

/// In-process presence for single-instance deployments.
#[derive(Debug, Default)]
pub struct LocalPresence {
    sessions: DashMap<i64, usize>,
}

impl LocalPresence {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PresenceStore for LocalPresence {
    async fn mark_online(&self, user_id: i64) -> Result<bool, AppError> {
        let mut count = self.sessions.entry(user_id).or_insert(0);
        *count += 1;
        Ok(*count == 1)
    }

    async fn mark_offline(&self, user_id: i64) -> Result<bool, AppError> {
        let went_offline = match self.sessions.get_mut(&user_id) {
            Some(mut count) => {
                *count = count.saturating_sub(1);
                *count == 0
            }
            None => return Ok(false),
        };

        if went_offline {
            self.sessions.remove_if(&user_id, |_, count| *count == 0);
        }
        Ok(went_offline)
    }

    async fn refresh(&self, _user_id: i64) -> Result<(), AppError> {
        Ok(())
    }

    async fn is_online(&self, user_id: i64) -> Result<bool, AppError> {
        Ok(self.sessions.get(&user_id).is_some_and(|c| *c > 0))
    }

    async fn filter_online(&self, user_ids: &[i64]) -> Result<Vec<i64>, AppError> {
        Ok(user_ids
            .iter()
            .copied()
            .filter(|id| self.sessions.get(id).is_some_and(|c| *c > 0))
            .collect())
    }

    fn name(&self) -> &'static str {
        "local"
    }
}

/// `remaining` is the script's result: the sessions left, or -1 when there
/// was no counter to decrement.
fn released_last_session(remaining: i64) -> bool {
    remaining == 0
}

/// Redis-backed presence shared by every gateway instance.
///
/// Counters expire after `ttl_secs` unless refreshed, so a crashed instance
/// cannot pin its users online forever.
#[derive(Clone)]
pub struct RedisPresence {
    conn: ConnectionManager,
    ttl_secs: u64,
}

impl RedisPresence {
    pub fn new(conn: ConnectionManager, ttl_secs: u64) -> Self {
        Self { conn, ttl_secs }
    }
}

#[async_trait]
impl PresenceStore for RedisPresence {
    async fn mark_online(&self, user_id: i64) -> Result<bool, AppError> {
        let key = keys::presence(user_id);
        let mut conn = self.conn.clone();

        let (count, _): (i64, i64) = redis::pipe()
            .atomic()
            .incr(&key, 1)
            .expire(&key, self.ttl_secs as i64)
            .query_async(&mut conn)
            .await?;

        debug!(user_id, sessions = count, "Presence incremented");
        Ok(count == 1)
    }

    async fn mark_offline(&self, user_id: i64) -> Result<bool, AppError> {
        let key = keys::presence(user_id);
        let mut conn = self.conn.clone();

        // Never drops below zero: a missing or expired counter has no
        // session left to release.
        let script = redis::Script::new(
            r#"
            local count = tonumber(redis.call('GET', KEYS[1]) or '0')
            if count <= 0 then
                return -1
            end
            if count == 1 then
                redis.call('DEL', KEYS[1])
                return 0
            end
            return redis.call('DECR', KEYS[1])
            "#,
        );

        let remaining: i64 = script.key(&key).invoke_async(&mut conn).await?;
        debug!(user_id, sessions = remaining, "Presence decremented");

        Ok(released_last_session(remaining))
    }

    async fn refresh(&self, user_id: i64) -> Result<(), AppError> {
        let mut conn = self.conn.clone();
        let _: bool = conn.expire(keys::presence(user_id), self.ttl_secs as i64).await?;
        Ok(())
    }

    async fn is_online(&self, user_id: i64) -> Result<bool, AppError> {
        let mut conn = self.conn.clone();
        let count: Option<i64> = conn.get(keys::presence(user_id)).await?;
        Ok(count.unwrap_or(0) > 0)
    }

    async fn filter_online(&self, user_ids: &[i64]) -> Result<Vec<i64>, AppError> {
        if user_ids.is_empty() {
            return Ok(Vec::new());
        }

        let presence_keys: Vec<String> = user_ids.iter().map(|id| keys::presence(*id)).collect();
        let mut conn = self.conn.clone();
        let counts: Vec<Option<i64>> = redis::cmd("MGET")
            .arg(&presence_keys)
            .query_async(&mut conn)
            .await?;

        Ok(user_ids
            .iter()
            .zip(counts)
            .filter(|(_, count)| count.unwrap_or(0) > 0)
            .map(|(id, _)| *id)
            .collect())
    }

    fn name(&self) -> &'static str {
        "redis"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_online_transition_only_on_first_session() {
        let presence = LocalPresence::new();

        assert!(presence.mark_online(7).await.unwrap());
        assert!(!presence.mark_online(7).await.unwrap());
        assert!(presence.is_online(7).await.unwrap());
    }

    #[tokio::test]
    async fn test_offline_transition_only_on_last_session() {
        let presence = LocalPresence::new();
        presence.mark_online(7).await.unwrap();
        presence.mark_online(7).await.unwrap();

        assert!(!presence.mark_offline(7).await.unwrap());
        assert!(presence.is_online(7).await.unwrap());
        assert!(presence.mark_offline(7).await.unwrap());
        assert!(!presence.is_online(7).await.unwrap());
    }

    #[tokio::test]
    async fn test_offline_for_unknown_user_is_not_a_transition() {
        let presence = LocalPresence::new();
        assert!(!presence.mark_offline(99).await.unwrap());
    }

    #[tokio::test]
    async fn test_filter_online_keeps_input_order() {
        let presence = LocalPresence::new();
        presence.mark_online(3).await.unwrap();
        presence.mark_online(1).await.unwrap();

        let online = presence.filter_online(&[1, 2, 3]).await.unwrap();
        assert_eq!(online, vec![1, 3]);
    }

    #[test]
    fn test_only_the_last_release_goes_offline() {
        assert!(released_last_session(0));
        assert!(!released_last_session(2));
        // Counter already gone: another session may still be live
        assert!(!released_last_session(-1));
    }
}
