//! Application Services
//!
//! Business logic services that coordinate domain operations.
//!
//! ## Available Services
//!
//! - **ChatService**: Rooms, membership and messages
//! - **NotificationService**: Per-user notifications with live push

pub mod chat_service;
pub mod notification_service;

pub use chat_service::{
    ChatError, ChatService, ChatServiceImpl, CreateMessageDto, CreateRoomDto, MessageQueryDto,
};
pub use notification_service::{
    CreateNotificationDto, NotificationError, NotificationQueryDto, NotificationService,
    NotificationServiceImpl,
};

#[cfg(test)]
pub use chat_service::MockChatService;
