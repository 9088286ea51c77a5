//! Cross-instance event relay over Redis pub/sub.

mod redis_relay;

pub use redis_relay::{spawn_subscriber, RedisRelay};
