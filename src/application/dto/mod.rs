//! Data Transfer Objects
//!
//! DTOs for API request/response serialization.

pub mod request;
pub mod response;

pub use request::{
    AddMemberRequest, CreateNotificationRequest, CreateRoomRequest, MessageQueryParams,
    NotificationQueryParams, SendMessageRequest,
};
pub use response::{
    MarkAllReadResponse, MessageDto, NotificationDto, PresenceResponse, RoomDetailDto, RoomDto,
    RoomPresenceResponse, UnreadCountResponse,
};
