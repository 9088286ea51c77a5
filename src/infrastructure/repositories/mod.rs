//! Repository Implementations
//!
//! PostgreSQL implementations of domain repository traits.
//!
//! ## Available Repositories
//!
//! - **PgRoomRepository** - Rooms and room membership
//! - **PgMessageRepository** - Messages with cursor pagination
//! - **PgNotificationRepository** - Per-user notifications
//!
//! All lookups skip soft-deleted rows.

pub mod message_repository;
pub mod notification_repository;
pub mod room_repository;

pub use message_repository::PgMessageRepository;
pub use notification_repository::PgNotificationRepository;
pub use room_repository::PgRoomRepository;
