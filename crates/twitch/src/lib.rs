//! Twitch chat transport for chatterbox.
//!
//! - **IRC codec** (`irc`) - parses gateway lines and formats outbound ones
//! - **Events** (`events`) - chat messages, joins, parts and notices, routed
//!   to handlers by type
//! - **Runner** (`socket`) - reconnecting event loop with an outbound queue
//! - **WebSocket** (`ws`) - the real gateway connection
//!
//! # Architecture
//!
//! ```text
//! Twitch gateway → TwitchWsTransport → ChatRunner → EventDispatcher → services
//!                                          ↑
//!                                 Outbox (deferred replies, announcements)
//! ```

pub mod events;
pub mod irc;
pub mod socket;
pub mod ws;

pub use events::{
    default_dispatcher, ChatEnvelope, ChatEvent, ChatEventType, ChatMessageEvent,
    ChatMessageHandler, EventContext, EventDispatcher, EventHandler, EventHandlerError,
    HandlerResult, JoinHandler, MembershipEvent, MembershipService, MessageService,
    OutboundMessage, PartHandler,
};
pub use socket::{ChatRunner, ChatTransport, Outbox, ReconnectPolicy, TransportError};
pub use ws::TwitchWsTransport;
