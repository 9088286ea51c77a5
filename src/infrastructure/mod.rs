//! Infrastructure Layer
//!
//! Implementations of the application's outbound ports:
//! - Database repositories (PostgreSQL)
//! - Presence stores (in-process and Redis)
//! - Cross-instance event relay (Redis pub/sub)
//! - Prometheus metrics

pub mod cache;
pub mod database;
pub mod metrics;
pub mod pubsub;
pub mod repositories;
