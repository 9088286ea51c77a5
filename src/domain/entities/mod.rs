//! # Domain Entities
//!
//! Core domain entities of the real-time layer. All entities map directly
//! to their corresponding database tables and follow the platform's
//! soft-delete (`is_deleted` / `deleted_at`) and audit
//! (`created_at` / `updated_at`) conventions.
//!
//! - **ChatRoom**: a tenant-scoped conversation with explicit members
//! - **ChatMessage**: a text message posted in a room
//! - **Notification**: a message addressed to a single user
//!
//! Each entity has an associated repository trait implemented in the
//! infrastructure layer.

mod chat_message;
mod chat_room;
mod notification;

pub use chat_message::{ChatMessage, MessageRepository, MAX_MESSAGE_LENGTH};
pub use chat_room::{ChatRoom, RoomMember, RoomRepository, RoomType};
pub use notification::{Notification, NotificationRepository};

#[cfg(test)]
pub use chat_message::MockMessageRepository;
#[cfg(test)]
pub use chat_room::MockRoomRepository;
#[cfg(test)]
pub use notification::MockNotificationRepository;
