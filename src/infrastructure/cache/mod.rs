//! Cache Module
//!
//! Redis connection management and presence storage.
//!
//! ```text
//! +-------------------+
//! |  PresenceStore    |  <-- application trait
//! +-------------------+
//!     |           |
//!     v           v
//! LocalPresence  RedisPresence
//!                   |
//!                   v
//!          +-------------------+
//!          | ConnectionManager |
//!          +-------------------+
//! ```

mod presence_cache;

pub use presence_cache::{LocalPresence, RedisPresence};

use redis::aio::ConnectionManager;
use redis::Client;
use tracing::{info, instrument};

use crate::config::RedisSettings;

/// Creates a Redis connection manager with automatic reconnection.
#[instrument(skip(settings), fields(url = %settings.url))]
pub async fn create_redis_client(
    settings: &RedisSettings,
) -> Result<ConnectionManager, redis::RedisError> {
    info!("Connecting to Redis...");
    let client = Client::open(settings.url.as_str())?;
    let manager = ConnectionManager::new(client).await?;
    info!("Redis connection established");
    Ok(manager)
}

/// Cache key prefixes.
pub mod keys {
    /// Prefix for per-user session counters (e.g., "presence:user:123")
    pub const USER_PRESENCE: &str = "presence:user:";

    #[inline]
    pub fn presence(user_id: impl std::fmt::Display) -> String {
        format!("{}{}", USER_PRESENCE, user_id)
    }
}
