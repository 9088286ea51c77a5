//! # Campus Chat
//!
//! Real-time layer of a multi-tenant learning platform:
//! - WebSocket gateway for rooms, messages, typing and presence
//! - RESTful HTTP API for rooms, history and notifications
//! - PostgreSQL for persistent storage
//! - Optional Redis for cross-instance fan-out and shared presence
//!
//! ## Architecture
//!
//! The crate follows Clean Architecture principles:
//!
//! - **Domain Layer**: Entities, repository traits and caller identity
//! - **Application Layer**: Services, DTOs and the event vocabulary
//! - **Infrastructure Layer**: Database, Redis, relay and metrics
//! - **Presentation Layer**: HTTP handlers and WebSocket gateway
//!
//! ## Module Structure
//!
//! ```text
//! campus_chat/
//! +-- config/         Configuration management
//! +-- domain/         Entities, repository traits, roles
//! +-- application/    Services, DTOs, events, presence trait
//! +-- infrastructure/ Postgres, Redis, pub/sub relay, metrics
//! +-- presentation/   HTTP routes and WebSocket gateway
//! +-- shared/         Common utilities (errors, snowflake IDs)
//! ```

// Configuration module
pub mod config;

// Domain layer - Core business logic
pub mod domain;

// Application layer - Business services
pub mod application;

// Infrastructure layer - External implementations
pub mod infrastructure;

// Presentation layer - HTTP and WebSocket handlers
pub mod presentation;

// Shared utilities
pub mod shared;

// Application startup and state management
pub mod startup;

// Structured logging
pub mod telemetry;
