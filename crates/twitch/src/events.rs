use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use thiserror::Error;

use crate::irc::{channel_target, IrcMessage};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChatEnvelope {
    pub envelope_id: String,
    pub event: ChatEvent,
}

impl ChatEnvelope {
    pub fn new(event: ChatEvent) -> Self {
        Self { envelope_id: uuid::Uuid::new_v4().to_string(), event }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ChatEvent {
    Message(ChatMessageEvent),
    Join(MembershipEvent),
    Part(MembershipEvent),
    Ping { payload: String },
    Notice(NoticeEvent),
    Unsupported { command: String },
}

impl ChatEvent {
    pub fn event_type(&self) -> ChatEventType {
        match self {
            Self::Message(_) => ChatEventType::Message,
            Self::Join(_) => ChatEventType::Join,
            Self::Part(_) => ChatEventType::Part,
            Self::Ping { .. } => ChatEventType::Ping,
            Self::Notice(_) => ChatEventType::Notice,
            Self::Unsupported { .. } => ChatEventType::Unsupported,
        }
    }

    /// Maps a parsed gateway line onto the event model. `self_nick` marks
    /// events caused by the bot's own account.
    pub fn from_irc(message: &IrcMessage, self_nick: &str) -> Self {
        let is_self = |nick: &str| nick.eq_ignore_ascii_case(self_nick);

        match message.command.as_str() {
            "PRIVMSG" => {
                let (Some(nick), Some(channel), Some(text)) =
                    (message.nick(), message.param(0), message.params.get(1))
                else {
                    return Self::Unsupported { command: message.command.clone() };
                };
                let display_name = message
                    .tag("display-name")
                    .filter(|name| !name.is_empty())
                    .unwrap_or(nick)
                    .to_owned();
                Self::Message(ChatMessageEvent {
                    channel: channel_target(channel),
                    username: nick.to_lowercase(),
                    display_name,
                    text: text.clone(),
                    is_self: is_self(nick),
                })
            }
            "JOIN" | "PART" => {
                let (Some(nick), Some(channel)) = (message.nick(), message.param(0)) else {
                    return Self::Unsupported { command: message.command.clone() };
                };
                let event = MembershipEvent {
                    channel: channel_target(channel),
                    username: nick.to_lowercase(),
                    is_self: is_self(nick),
                };
                if message.command == "JOIN" {
                    Self::Join(event)
                } else {
                    Self::Part(event)
                }
            }
            "PING" => Self::Ping { payload: message.trailing().unwrap_or_default().to_owned() },
            "NOTICE" => Self::Notice(NoticeEvent {
                channel: message.param(0).filter(|target| target.starts_with('#')).map(channel_target),
                message_id: message.tag("msg-id").map(str::to_owned),
                text: message.trailing().unwrap_or_default().to_owned(),
            }),
            other => Self::Unsupported { command: other.to_owned() },
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum ChatEventType {
    Message,
    Join,
    Part,
    Ping,
    Notice,
    Unsupported,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChatMessageEvent {
    pub channel: String,
    /// Lowercased login name.
    pub username: String,
    pub display_name: String,
    pub text: String,
    pub is_self: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MembershipEvent {
    pub channel: String,
    pub username: String,
    pub is_self: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NoticeEvent {
    pub channel: Option<String>,
    pub message_id: Option<String>,
    pub text: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EventContext {
    pub correlation_id: String,
}

impl Default for EventContext {
    fn default() -> Self {
        Self { correlation_id: "unknown-correlation-id".to_owned() }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OutboundMessage {
    pub channel: String,
    pub text: String,
}

impl OutboundMessage {
    pub fn new(channel: impl Into<String>, text: impl Into<String>) -> Self {
        Self { channel: channel.into(), text: text.into() }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HandlerResult {
    Responded(OutboundMessage),
    Processed,
    Ignored,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EventHandlerError {
    #[error("chat message handler failure: {0}")]
    Message(String),
    #[error("membership handler failure: {0}")]
    Membership(String),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DispatchError {
    #[error(transparent)]
    Handler(#[from] EventHandlerError),
}

#[async_trait]
pub trait EventHandler: Send + Sync {
    fn event_type(&self) -> ChatEventType;
    async fn handle(
        &self,
        envelope: &ChatEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError>;
}

#[derive(Default)]
pub struct EventDispatcher {
    handlers: HashMap<ChatEventType, Arc<dyn EventHandler>>,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<H>(&mut self, handler: H)
    where
        H: EventHandler + 'static,
    {
        self.handlers.insert(handler.event_type(), Arc::new(handler));
    }

    pub async fn dispatch(
        &self,
        envelope: &ChatEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerResult, DispatchError> {
        let Some(handler) = self.handlers.get(&envelope.event.event_type()) else {
            return Ok(HandlerResult::Ignored);
        };

        handler.handle(envelope, ctx).await.map_err(DispatchError::from)
    }

    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }
}

pub fn default_dispatcher() -> EventDispatcher {
    let mut dispatcher = EventDispatcher::new();
    dispatcher.register(ChatMessageHandler::new(NoopMessageService));
    dispatcher.register(JoinHandler::new(NoopMembershipService));
    dispatcher.register(PartHandler::new(NoopMembershipService));
    dispatcher
}

/// Answers a chat line. `Ok(Some(text))` is sent back to the channel the
/// line came from.
#[async_trait]
pub trait MessageService: Send + Sync {
    async fn handle_message(
        &self,
        event: &ChatMessageEvent,
        ctx: &EventContext,
    ) -> Result<Option<String>, EventHandlerError>;
}

pub struct ChatMessageHandler<S> {
    service: S,
}

impl<S> ChatMessageHandler<S>
where
    S: MessageService,
{
    pub fn new(service: S) -> Self {
        Self { service }
    }
}

#[async_trait]
impl<S> EventHandler for ChatMessageHandler<S>
where
    S: MessageService + 'static,
{
    fn event_type(&self) -> ChatEventType {
        ChatEventType::Message
    }

    async fn handle(
        &self,
        envelope: &ChatEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        let ChatEvent::Message(event) = &envelope.event else {
            return Ok(HandlerResult::Ignored);
        };
        if event.is_self {
            return Ok(HandlerResult::Ignored);
        }

        let reply = self.service.handle_message(event, ctx).await?;
        Ok(match reply {
            Some(text) => HandlerResult::Responded(OutboundMessage::new(event.channel.clone(), text)),
            None => HandlerResult::Processed,
        })
    }
}

#[derive(Default)]
pub struct NoopMessageService;

#[async_trait]
impl MessageService for NoopMessageService {
    async fn handle_message(
        &self,
        _event: &ChatMessageEvent,
        _ctx: &EventContext,
    ) -> Result<Option<String>, EventHandlerError> {
        Ok(None)
    }
}

#[async_trait]
pub trait MembershipService: Send + Sync {
    async fn handle_join(
        &self,
        event: &MembershipEvent,
        ctx: &EventContext,
    ) -> Result<Option<String>, EventHandlerError>;

    async fn handle_part(
        &self,
        event: &MembershipEvent,
        ctx: &EventContext,
    ) -> Result<(), EventHandlerError>;
}

pub struct JoinHandler<S> {
    service: S,
}

impl<S> JoinHandler<S>
where
    S: MembershipService,
{
    pub fn new(service: S) -> Self {
        Self { service }
    }
}

#[async_trait]
impl<S> EventHandler for JoinHandler<S>
where
    S: MembershipService + 'static,
{
    fn event_type(&self) -> ChatEventType {
        ChatEventType::Join
    }

    async fn handle(
        &self,
        envelope: &ChatEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        let ChatEvent::Join(event) = &envelope.event else {
            return Ok(HandlerResult::Ignored);
        };
        if event.is_self {
            return Ok(HandlerResult::Ignored);
        }

        let greeting = self.service.handle_join(event, ctx).await?;
        Ok(match greeting {
            Some(text) => HandlerResult::Responded(OutboundMessage::new(event.channel.clone(), text)),
            None => HandlerResult::Processed,
        })
    }
}

pub struct PartHandler<S> {
    service: S,
}

impl<S> PartHandler<S>
where
    S: MembershipService,
{
    pub fn new(service: S) -> Self {
        Self { service }
    }
}

#[async_trait]
impl<S> EventHandler for PartHandler<S>
where
    S: MembershipService + 'static,
{
    fn event_type(&self) -> ChatEventType {
        ChatEventType::Part
    }

    async fn handle(
        &self,
        envelope: &ChatEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        let ChatEvent::Part(event) = &envelope.event else {
            return Ok(HandlerResult::Ignored);
        };
        if event.is_self {
            return Ok(HandlerResult::Ignored);
        }

        self.service.handle_part(event, ctx).await?;
        Ok(HandlerResult::Processed)
    }
}

#[derive(Clone, Copy, Default)]
pub struct NoopMembershipService;

#[async_trait]
impl MembershipService for NoopMembershipService {
    async fn handle_join(
        &self,
        _event: &MembershipEvent,
        _ctx: &EventContext,
    ) -> Result<Option<String>, EventHandlerError> {
        Ok(None)
    }

    async fn handle_part(
        &self,
        _event: &MembershipEvent,
        _ctx: &EventContext,
    ) -> Result<(), EventHandlerError> {
        Ok(())
    }
}
