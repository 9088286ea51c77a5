//! Chat Service
//!
//! Room lifecycle, membership and message operations. Every operation is
//! scoped to the caller's tenant; successful writes are announced to the
//! room through the event publisher after they are persisted.

use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;

use crate::application::dto::{MessageDto, RoomDetailDto, RoomDto};
use crate::application::events::{
    EventPublisher, MessageDeletedPayload, RoomDeletedPayload, RoomMembershipPayload,
    RoutedEvent, ServerEvent, Target,
};
use crate::domain::{
    Actor, ChatMessage, ChatRoom, MessageRepository, RoomRepository, RoomType,
    MAX_MESSAGE_LENGTH,
};
use crate::shared::error::AppError;
use crate::shared::snowflake::SnowflakeGenerator;

const DEFAULT_PAGE_SIZE: i32 = 50;
const MAX_PAGE_SIZE: i32 = 100;

/// Chat service trait
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ChatService: Send + Sync {
    async fn create_room(&self, actor: &Actor, request: CreateRoomDto) -> Result<RoomDto, ChatError>;

    async fn list_rooms(&self, actor: &Actor) -> Result<Vec<RoomDto>, ChatError>;

    async fn get_room(&self, actor: &Actor, room_id: i64) -> Result<RoomDetailDto, ChatError>;

    async fn delete_room(&self, actor: &Actor, room_id: i64) -> Result<(), ChatError>;

    async fn add_member(&self, actor: &Actor, room_id: i64, user_id: i64) -> Result<(), ChatError>;

    async fn remove_member(&self, actor: &Actor, room_id: i64, user_id: i64) -> Result<(), ChatError>;

    /// Member IDs of a room the actor can see.
    async fn member_ids(&self, actor: &Actor, room_id: i64) -> Result<Vec<i64>, ChatError>;

    /// Check that the actor may subscribe to the room's live events.
    async fn authorize_join(&self, actor: &Actor, room_id: i64) -> Result<RoomDto, ChatError>;

    async fn get_messages(
        &self,
        actor: &Actor,
        room_id: i64,
        query: MessageQueryDto,
    ) -> Result<Vec<MessageDto>, ChatError>;

    /// Persist a message, then emit `message:new` to the room.
    async fn send_message(
        &self,
        actor: &Actor,
        room_id: i64,
        request: CreateMessageDto,
    ) -> Result<MessageDto, ChatError>;

    async fn delete_message(&self, actor: &Actor, room_id: i64, message_id: i64) -> Result<(), ChatError>;
}

/// Create room request
#[derive(Debug, Clone)]
pub struct CreateRoomDto {
    pub name: String,
    pub description: Option<String>,
    pub room_type: RoomType,
    pub member_ids: Vec<i64>,
}

/// Create message request
#[derive(Debug, Clone)]
pub struct CreateMessageDto {
    pub content: String,
    pub reply_to_id: Option<i64>,
}

/// Message query parameters
#[derive(Debug, Clone, Default)]
pub struct MessageQueryDto {
    pub before: Option<i64>,
    pub limit: Option<i32>,
}

/// Chat service errors
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("Room not found")]
    RoomNotFound,

    #[error("Message not found")]
    MessageNotFound,

    #[error("User is not a member of this room")]
    NotMember,

    #[error("User is already a member of this room")]
    AlreadyMember,

    #[error("Permission denied: {0}")]
    Forbidden(&'static str),

    #[error("{0}")]
    InvalidRoom(&'static str),

    #[error("Message content must not be empty")]
    EmptyContent,

    #[error("Message content too long (max 2000 characters)")]
    ContentTooLong,

    #[error("Replied-to message does not exist in this room")]
    InvalidReply,

    #[error(transparent)]
    Repository(#[from] AppError),
}

impl From<ChatError> for AppError {
    fn from(err: ChatError) -> Self {
        match err {
            ChatError::RoomNotFound | ChatError::MessageNotFound | ChatError::NotMember => {
                AppError::NotFound(err.to_string())
            }
            ChatError::AlreadyMember => AppError::Conflict(err.to_string()),
            ChatError::Forbidden(_) => AppError::Forbidden(err.to_string()),
            ChatError::InvalidRoom(_)
            | ChatError::EmptyContent
            | ChatError::ContentTooLong
            | ChatError::InvalidReply => AppError::BadRequest(err.to_string()),
            ChatError::Repository(inner) => inner,
        }
    }
}

impl ChatError {
    /// Short machine-readable code for gateway error frames.
    pub fn code(&self) -> &'static str {
        match self {
            ChatError::RoomNotFound => "room_not_found",
            ChatError::MessageNotFound => "message_not_found",
            ChatError::NotMember => "not_member",
            ChatError::AlreadyMember => "already_member",
            ChatError::Forbidden(_) => "forbidden",
            ChatError::InvalidRoom(_) => "invalid_room",
            ChatError::EmptyContent => "empty_content",
            ChatError::ContentTooLong => "content_too_long",
            ChatError::InvalidReply => "invalid_reply",
            ChatError::Repository(_) => "internal",
        }
    }
}

/// ChatService implementation
pub struct ChatServiceImpl<R, M>
where
    R: RoomRepository,
    M: MessageRepository,
{
    room_repo: Arc<R>,
    message_repo: Arc<M>,
    events: Arc<dyn EventPublisher>,
    id_generator: Arc<SnowflakeGenerator>,
}

impl<R, M> ChatServiceImpl<R, M>
where
    R: RoomRepository,
    M: MessageRepository,
{
    pub fn new(
        room_repo: Arc<R>,
        message_repo: Arc<M>,
        events: Arc<dyn EventPublisher>,
        id_generator: Arc<SnowflakeGenerator>,
    ) -> Self {
        Self {
            room_repo,
            message_repo,
            events,
            id_generator,
        }
    }

    /// Load a live room in the actor's tenant.
    async fn load_room(&self, actor: &Actor, room_id: i64) -> Result<ChatRoom, ChatError> {
        self.room_repo
            .find_by_id(room_id)
            .await?
            .filter(|room| room.is_visible_to(actor.tenant_id))
            .ok_or(ChatError::RoomNotFound)
    }

    /// Load a room the actor belongs to. Admins see every room of their tenant.
    async fn load_member_room(&self, actor: &Actor, room_id: i64) -> Result<ChatRoom, ChatError> {
        let room = self.load_room(actor, room_id).await?;
        if actor.is_admin() || self.room_repo.is_member(room_id, actor.user_id).await? {
            Ok(room)
        } else {
            Err(ChatError::Forbidden("not a member of this room"))
        }
    }

    fn can_manage(actor: &Actor, room: &ChatRoom) -> bool {
        room.is_owner(actor.user_id) || actor.is_admin()
    }
}

#[async_trait]
impl<R, M> ChatService for ChatServiceImpl<R, M>
where
    R: RoomRepository + 'static,
    M: MessageRepository + 'static,
{
    async fn create_room(&self, actor: &Actor, request: CreateRoomDto) -> Result<RoomDto, ChatError> {
        let name = request.name.trim();
        if name.is_empty() {
            return Err(ChatError::InvalidRoom("Room name must not be empty"));
        }

        if request.room_type == RoomType::Course && !actor.is_staff() {
            return Err(ChatError::Forbidden("course rooms require a staff role"));
        }

        let others: BTreeSet<i64> = request
            .member_ids
            .iter()
            .copied()
            .filter(|id| *id != actor.user_id)
            .collect();

        if request.room_type == RoomType::Direct && others.len() != 1 {
            return Err(ChatError::InvalidRoom(
                "Direct rooms need exactly one other member",
            ));
        }

        let mut members = Vec::with_capacity(others.len() + 1);
        members.push(actor.user_id);
        members.extend(others);

        let now = Utc::now();
        let room = ChatRoom {
            id: self.id_generator.generate(),
            tenant_id: actor.tenant_id,
            name: name.to_string(),
            description: request.description,
            room_type: request.room_type,
            owner_id: actor.user_id,
            is_deleted: false,
            deleted_at: None,
            created_at: now,
            updated_at: now,
        };

        let created = self.room_repo.create(&room, &members).await?;

        tracing::info!(
            room_id = created.id,
            tenant_id = created.tenant_id,
            room_type = %created.room_type,
            members = members.len(),
            "Room created"
        );

        Ok(RoomDto::from(created))
    }

    async fn list_rooms(&self, actor: &Actor) -> Result<Vec<RoomDto>, ChatError> {
        let rooms = self
            .room_repo
            .find_by_member(actor.tenant_id, actor.user_id)
            .await?;

        Ok(rooms.into_iter().map(RoomDto::from).collect())
    }

    async fn get_room(&self, actor: &Actor, room_id: i64) -> Result<RoomDetailDto, ChatError> {
        let room = self.load_member_room(actor, room_id).await?;
        let members = self.room_repo.find_members(room_id).await?;

        Ok(RoomDetailDto {
            room: RoomDto::from(room),
            member_ids: members.into_iter().map(|m| m.user_id.to_string()).collect(),
        })
    }

    async fn delete_room(&self, actor: &Actor, room_id: i64) -> Result<(), ChatError> {
        let room = self.load_room(actor, room_id).await?;
        if !Self::can_manage(actor, &room) {
            return Err(ChatError::Forbidden("only the owner can delete this room"));
        }

        self.room_repo.soft_delete(room_id).await?;
        tracing::info!(room_id, actor_id = actor.user_id, "Room deleted");

        self.events.publish(
            RoutedEvent::new(
                Target::Room(room_id),
                ServerEvent::RoomDeleted(RoomDeletedPayload {
                    room_id,
                    deleted_by: actor.user_id,
                }),
            )
            .closing_room(room_id),
        );
        Ok(())
    }

    async fn add_member(&self, actor: &Actor, room_id: i64, user_id: i64) -> Result<(), ChatError> {
        let room = self.load_room(actor, room_id).await?;
        if !Self::can_manage(actor, &room) {
            return Err(ChatError::Forbidden("only the owner can add members"));
        }
        if room.room_type == RoomType::Direct {
            return Err(ChatError::InvalidRoom("Direct rooms have fixed members"));
        }

        if !self.room_repo.add_member(room_id, user_id).await? {
            return Err(ChatError::AlreadyMember);
        }
        Ok(())
    }

    async fn remove_member(&self, actor: &Actor, room_id: i64, user_id: i64) -> Result<(), ChatError> {
        let room = self.load_room(actor, room_id).await?;
        let leaving_self = actor.user_id == user_id;
        if !leaving_self && !Self::can_manage(actor, &room) {
            return Err(ChatError::Forbidden("only the owner can remove members"));
        }
        if room.is_owner(user_id) {
            return Err(ChatError::InvalidRoom("The owner cannot leave the room"));
        }

        if !self.room_repo.remove_member(room_id, user_id).await? {
            return Err(ChatError::NotMember);
        }

        self.events.publish(RoutedEvent::new(
            Target::Room(room_id),
            ServerEvent::RoomLeft(RoomMembershipPayload {
                room_id,
                user_id,
            }),
        )
        .evicting(user_id, room_id));
        Ok(())
    }

    async fn member_ids(&self, actor: &Actor, room_id: i64) -> Result<Vec<i64>, ChatError> {
        self.load_member_room(actor, room_id).await?;
        let members = self.room_repo.find_members(room_id).await?;
        Ok(members.into_iter().map(|m| m.user_id).collect())
    }

    async fn authorize_join(&self, actor: &Actor, room_id: i64) -> Result<RoomDto, ChatError> {
        let room = self.load_member_room(actor, room_id).await?;
        Ok(RoomDto::from(room))
    }

    async fn get_messages(
        &self,
        actor: &Actor,
        room_id: i64,
        query: MessageQueryDto,
    ) -> Result<Vec<MessageDto>, ChatError> {
        self.load_member_room(actor, room_id).await?;

        let limit = query
            .limit
            .unwrap_or(DEFAULT_PAGE_SIZE)
            .clamp(1, MAX_PAGE_SIZE);

        let messages = self
            .message_repo
            .find_by_room(room_id, query.before, limit)
            .await?;

        Ok(messages.into_iter().map(MessageDto::from).collect())
    }

    async fn send_message(
        &self,
        actor: &Actor,
        room_id: i64,
        request: CreateMessageDto,
    ) -> Result<MessageDto, ChatError> {
        if request.content.trim().is_empty() {
            return Err(ChatError::EmptyContent);
        }
        if request.content.chars().count() > MAX_MESSAGE_LENGTH {
            return Err(ChatError::ContentTooLong);
        }

        self.load_member_room(actor, room_id).await?;

        if let Some(reply_to_id) = request.reply_to_id {
            let parent = self.message_repo.find_by_id(reply_to_id).await?;
            if !parent.is_some_and(|p| p.room_id == room_id) {
                return Err(ChatError::InvalidReply);
            }
        }

        let now = Utc::now();
        let message = ChatMessage {
            id: self.id_generator.generate(),
            room_id,
            sender_id: actor.user_id,
            content: request.content,
            reply_to_id: request.reply_to_id,
            is_deleted: false,
            deleted_at: None,
            created_at: now,
            updated_at: now,
        };

        let created = MessageDto::from(self.message_repo.create(&message).await?);

        self.events.publish(RoutedEvent::new(
            Target::Room(room_id),
            ServerEvent::MessageNew(created.clone()),
        ));

        Ok(created)
    }

    async fn delete_message(&self, actor: &Actor, room_id: i64, message_id: i64) -> Result<(), ChatError> {
        let room = self.load_member_room(actor, room_id).await?;

        let message = self
            .message_repo
            .find_by_id(message_id)
            .await?
            .filter(|m| m.room_id == room_id)
            .ok_or(ChatError::MessageNotFound)?;

        if message.sender_id != actor.user_id && !Self::can_manage(actor, &room) {
            return Err(ChatError::Forbidden("cannot delete another user's message"));
        }

        self.message_repo.soft_delete(message_id).await?;

        self.events.publish(RoutedEvent::new(
            Target::Room(room_id),
            ServerEvent::MessageDeleted(MessageDeletedPayload {
                id: message_id,
                room_id,
            }),
        ));

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::events::{Eviction, MockEventPublisher};
    use crate::domain::{MockMessageRepository, MockRoomRepository, RoomMember, Roles};
    use crate::shared::snowflake::PLATFORM_EPOCH;
    use mockall::predicate::eq;

    const TENANT: i64 = 100;

    fn actor(user_id: i64, roles: &[&str]) -> Actor {
        Actor::new(user_id, TENANT, Roles::new(roles.iter().copied()))
    }

    fn room(id: i64, owner_id: i64, room_type: RoomType) -> ChatRoom {
        let now = Utc::now();
        ChatRoom {
            id,
            tenant_id: TENANT,
            name: "Cohort 7".into(),
            description: None,
            room_type,
            owner_id,
            is_deleted: false,
            deleted_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn message(id: i64, room_id: i64, sender_id: i64) -> ChatMessage {
        let now = Utc::now();
        ChatMessage {
            id,
            room_id,
            sender_id,
            content: "hello".into(),
            reply_to_id: None,
            is_deleted: false,
            deleted_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn service(
        rooms: MockRoomRepository,
        messages: MockMessageRepository,
        events: MockEventPublisher,
    ) -> ChatServiceImpl<MockRoomRepository, MockMessageRepository> {
        ChatServiceImpl::new(
            Arc::new(rooms),
            Arc::new(messages),
            Arc::new(events),
            Arc::new(SnowflakeGenerator::new(1, PLATFORM_EPOCH)),
        )
    }

    fn member_room_repo(room: ChatRoom, member: bool) -> MockRoomRepository {
        let mut rooms = MockRoomRepository::new();
        rooms
            .expect_find_by_id()
            .with(eq(room.id))
            .returning(move |_| Ok(Some(room.clone())));
        rooms.expect_is_member().returning(move |_, _| Ok(member));
        rooms
    }

    #[tokio::test]
    async fn test_send_message_persists_then_emits_to_room() {
        let rooms = member_room_repo(room(1, 9, RoomType::Group), true);

        let mut messages = MockMessageRepository::new();
        messages
            .expect_create()
            .times(1)
            .returning(|m| Ok(ChatMessage::clone(m)));

        let mut events = MockEventPublisher::new();
        events
            .expect_publish()
            .times(1)
            .withf(|routed| {
                routed.target == Target::Room(1)
                    && matches!(&routed.event, ServerEvent::MessageNew(m) if m.content == "hi all" && m.sender_id == 5)
            })
            .return_const(());

        let svc = service(rooms, messages, events);
        let sent = svc
            .send_message(
                &actor(5, &["student"]),
                1,
                CreateMessageDto {
                    content: "hi all".into(),
                    reply_to_id: None,
                },
            )
            .await
            .unwrap();

        assert_eq!(sent.room_id, 1);
        assert_eq!(sent.sender_id, 5);
    }

    #[tokio::test]
    async fn test_send_message_failure_emits_nothing() {
        let rooms = member_room_repo(room(1, 9, RoomType::Group), true);

        let mut messages = MockMessageRepository::new();
        messages
            .expect_create()
            .returning(|_| Err(AppError::Internal("insert failed".into())));

        let mut events = MockEventPublisher::new();
        events.expect_publish().never();

        let svc = service(rooms, messages, events);
        let result = svc
            .send_message(
                &actor(5, &[]),
                1,
                CreateMessageDto {
                    content: "hi".into(),
                    reply_to_id: None,
                },
            )
            .await;

        assert!(matches!(result, Err(ChatError::Repository(_))));
    }

    #[tokio::test]
    async fn test_send_message_requires_membership() {
        let rooms = member_room_repo(room(1, 9, RoomType::Group), false);
        let mut events = MockEventPublisher::new();
        events.expect_publish().never();

        let svc = service(rooms, MockMessageRepository::new(), events);
        let result = svc
            .send_message(
                &actor(5, &["student"]),
                1,
                CreateMessageDto {
                    content: "let me in".into(),
                    reply_to_id: None,
                },
            )
            .await;

        assert!(matches!(result, Err(ChatError::Forbidden(_))));
    }

    #[tokio::test]
    async fn test_send_message_validates_content_before_lookup() {
        let svc = service(
            MockRoomRepository::new(),
            MockMessageRepository::new(),
            MockEventPublisher::new(),
        );
        let too_long = CreateMessageDto {
            content: "x".repeat(MAX_MESSAGE_LENGTH + 1),
            reply_to_id: None,
        };
        let blank = CreateMessageDto {
            content: "   ".into(),
            reply_to_id: None,
        };

        assert!(matches!(
            svc.send_message(&actor(5, &[]), 1, too_long).await,
            Err(ChatError::ContentTooLong)
        ));
        assert!(matches!(
            svc.send_message(&actor(5, &[]), 1, blank).await,
            Err(ChatError::EmptyContent)
        ));
    }

    #[tokio::test]
    async fn test_reply_must_target_same_room() {
        let rooms = member_room_repo(room(1, 9, RoomType::Group), true);
        let mut messages = MockMessageRepository::new();
        messages
            .expect_find_by_id()
            .with(eq(77))
            .returning(|_| Ok(Some(message(77, 2, 9))));
        messages.expect_create().never();

        let svc = service(rooms, messages, MockEventPublisher::new());
        let result = svc
            .send_message(
                &actor(5, &[]),
                1,
                CreateMessageDto {
                    content: "re".into(),
                    reply_to_id: Some(77),
                },
            )
            .await;

        assert!(matches!(result, Err(ChatError::InvalidReply)));
    }

    #[tokio::test]
    async fn test_room_in_other_tenant_is_not_found() {
        let mut foreign = room(1, 9, RoomType::Group);
        foreign.tenant_id = TENANT + 1;

        let mut rooms = MockRoomRepository::new();
        rooms
            .expect_find_by_id()
            .returning(move |_| Ok(Some(foreign.clone())));

        let svc = service(rooms, MockMessageRepository::new(), MockEventPublisher::new());
        let result = svc.authorize_join(&actor(5, &["admin"]), 1).await;

        assert!(matches!(result, Err(ChatError::RoomNotFound)));
    }

    #[tokio::test]
    async fn test_admin_can_join_without_membership() {
        let rooms = member_room_repo(room(1, 9, RoomType::Course), false);
        let svc = service(rooms, MockMessageRepository::new(), MockEventPublisher::new());

        let joined = svc.authorize_join(&actor(5, &["admin"]), 1).await.unwrap();
        assert_eq!(joined.id, 1);
    }

    #[tokio::test]
    async fn test_course_room_requires_staff() {
        let svc = service(
            MockRoomRepository::new(),
            MockMessageRepository::new(),
            MockEventPublisher::new(),
        );
        let result = svc
            .create_room(
                &actor(5, &["student"]),
                CreateRoomDto {
                    name: "Biology 101".into(),
                    description: None,
                    room_type: RoomType::Course,
                    member_ids: vec![],
                },
            )
            .await;

        assert!(matches!(result, Err(ChatError::Forbidden(_))));
    }

    #[tokio::test]
    async fn test_direct_room_needs_exactly_one_peer() {
        let svc = service(
            MockRoomRepository::new(),
            MockMessageRepository::new(),
            MockEventPublisher::new(),
        );
        let result = svc
            .create_room(
                &actor(5, &[]),
                CreateRoomDto {
                    name: "dm".into(),
                    description: None,
                    room_type: RoomType::Direct,
                    // the creator is ignored when counting peers
                    member_ids: vec![5, 6, 7],
                },
            )
            .await;

        assert!(matches!(result, Err(ChatError::InvalidRoom(_))));
    }

    #[tokio::test]
    async fn test_create_room_adds_creator_and_dedupes_members() {
        let mut rooms = MockRoomRepository::new();
        rooms
            .expect_create()
            .times(1)
            .withf(|room, members| {
                room.owner_id == 5 && room.tenant_id == TENANT && members.to_vec() == vec![5, 6, 8]
            })
            .returning(|room, _| Ok(ChatRoom::clone(room)));

        let svc = service(rooms, MockMessageRepository::new(), MockEventPublisher::new());
        let created = svc
            .create_room(
                &actor(5, &["instructor"]),
                CreateRoomDto {
                    name: "  Physics lab  ".into(),
                    description: Some("Thursday group".into()),
                    room_type: RoomType::Course,
                    member_ids: vec![8, 6, 5, 8],
                },
            )
            .await
            .unwrap();

        assert_eq!(created.name, "Physics lab");
        assert_eq!(created.owner_id, 5);
    }

    #[tokio::test]
    async fn test_get_messages_clamps_limit() {
        let rooms = member_room_repo(room(1, 9, RoomType::Group), true);
        let mut messages = MockMessageRepository::new();
        messages
            .expect_find_by_room()
            .with(eq(1), eq(Some(500)), eq(MAX_PAGE_SIZE))
            .returning(|_, _, _| Ok(vec![message(499, 1, 9), message(498, 1, 5)]));

        let svc = service(rooms, messages, MockEventPublisher::new());
        let page = svc
            .get_messages(
                &actor(5, &[]),
                1,
                MessageQueryDto {
                    before: Some(500),
                    limit: Some(1000),
                },
            )
            .await
            .unwrap();

        assert_eq!(page.len(), 2);
        assert_eq!(page[0].id, 499);
    }

    #[tokio::test]
    async fn test_delete_message_by_other_student_is_forbidden() {
        let rooms = member_room_repo(room(1, 9, RoomType::Group), true);
        let mut messages = MockMessageRepository::new();
        messages
            .expect_find_by_id()
            .returning(|_| Ok(Some(message(40, 1, 6))));
        messages.expect_soft_delete().never();

        let svc = service(rooms, messages, MockEventPublisher::new());
        let result = svc.delete_message(&actor(5, &["student"]), 1, 40).await;

        assert!(matches!(result, Err(ChatError::Forbidden(_))));
    }

    #[tokio::test]
    async fn test_room_owner_can_delete_any_message() {
        let rooms = member_room_repo(room(1, 9, RoomType::Group), true);
        let mut messages = MockMessageRepository::new();
        messages
            .expect_find_by_id()
            .returning(|_| Ok(Some(message(40, 1, 6))));
        messages
            .expect_soft_delete()
            .with(eq(40))
            .times(1)
            .returning(|_| Ok(()));

        let mut events = MockEventPublisher::new();
        events
            .expect_publish()
            .times(1)
            .withf(|routed| {
                matches!(&routed.event, ServerEvent::MessageDeleted(p) if p.id == 40 && p.room_id == 1)
            })
            .return_const(());

        let svc = service(rooms, messages, events);
        svc.delete_message(&actor(9, &[]), 1, 40).await.unwrap();
    }

    #[tokio::test]
    async fn test_delete_room_closes_it_for_connected_sessions() {
        let mut rooms = MockRoomRepository::new();
        let owned = room(1, 9, RoomType::Group);
        rooms
            .expect_find_by_id()
            .returning(move |_| Ok(Some(owned.clone())));
        rooms
            .expect_soft_delete()
            .with(eq(1))
            .times(1)
            .returning(|_| Ok(()));

        let mut events = MockEventPublisher::new();
        events
            .expect_publish()
            .times(1)
            .withf(|routed| {
                routed.target == Target::Room(1)
                    && routed.evict == Some(Eviction::Room { room_id: 1 })
                    && matches!(&routed.event, ServerEvent::RoomDeleted(p) if p.deleted_by == 9)
            })
            .return_const(());

        let svc = service(rooms, MockMessageRepository::new(), events);
        svc.delete_room(&actor(9, &[]), 1).await.unwrap();
    }

    #[tokio::test]
    async fn test_delete_room_refused_to_plain_member() {
        let mut rooms = MockRoomRepository::new();
        let owned = room(1, 9, RoomType::Group);
        rooms
            .expect_find_by_id()
            .returning(move |_| Ok(Some(owned.clone())));
        rooms.expect_soft_delete().never();

        let mut events = MockEventPublisher::new();
        events.expect_publish().never();

        let svc = service(rooms, MockMessageRepository::new(), events);
        let result = svc.delete_room(&actor(5, &[]), 1).await;

        assert!(matches!(result, Err(ChatError::Forbidden(_))));
    }

    #[tokio::test]
    async fn test_owner_cannot_be_removed() {
        let mut rooms = MockRoomRepository::new();
        let owned = room(1, 9, RoomType::Group);
        rooms
            .expect_find_by_id()
            .returning(move |_| Ok(Some(owned.clone())));
        rooms.expect_remove_member().never();

        let svc = service(rooms, MockMessageRepository::new(), MockEventPublisher::new());
        let result = svc.remove_member(&actor(9, &[]), 1, 9).await;

        assert!(matches!(result, Err(ChatError::InvalidRoom(_))));
    }

    #[tokio::test]
    async fn test_member_can_leave_on_their_own() {
        let mut rooms = MockRoomRepository::new();
        let owned = room(1, 9, RoomType::Group);
        rooms
            .expect_find_by_id()
            .returning(move |_| Ok(Some(owned.clone())));
        rooms
            .expect_remove_member()
            .with(eq(1), eq(5))
            .returning(|_, _| Ok(true));

        let mut events = MockEventPublisher::new();
        events
            .expect_publish()
            .times(1)
            .withf(|routed| matches!(&routed.event, ServerEvent::RoomLeft(p) if p.user_id == 5))
            .return_const(());

        let svc = service(rooms, MockMessageRepository::new(), events);
        svc.remove_member(&actor(5, &[]), 1, 5).await.unwrap();
    }

    #[tokio::test]
    async fn test_get_room_lists_members() {
        let mut rooms = member_room_repo(room(1, 9, RoomType::Group), true);
        rooms.expect_find_members().returning(|room_id| {
            Ok(vec![
                RoomMember {
                    room_id,
                    user_id: 9,
                    joined_at: Utc::now(),
                },
                RoomMember {
                    room_id,
                    user_id: 5,
                    joined_at: Utc::now(),
                },
            ])
        });

        let svc = service(rooms, MockMessageRepository::new(), MockEventPublisher::new());
        let detail = svc.get_room(&actor(5, &[]), 1).await.unwrap();

        assert_eq!(detail.member_ids, vec!["9".to_string(), "5".to_string()]);
    }

    #[test]
    fn test_error_mapping() {
        assert!(matches!(AppError::from(ChatError::RoomNotFound), AppError::NotFound(_)));
        assert!(matches!(AppError::from(ChatError::AlreadyMember), AppError::Conflict(_)));
        assert!(matches!(AppError::from(ChatError::ContentTooLong), AppError::BadRequest(_)));
        assert!(matches!(
            AppError::from(ChatError::Forbidden("x")),
            AppError::Forbidden(_)
        ));
    }
}
