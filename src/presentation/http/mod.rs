//! HTTP API
//!
//! REST routes under `/api/v1`, health checks and the metrics endpoint.

pub mod extractors;
pub mod handlers;
pub mod routes;

pub use routes::create_router;
