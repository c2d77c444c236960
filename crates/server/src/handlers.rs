use std::sync::Arc;

use async_trait::async_trait;
use chatterbox_agent::{ChannelContext, Decision, Greeter, MessageSink, Responder};
use chatterbox_twitch::events::{
    ChatMessageEvent, ChatMessageHandler, EventContext, EventDispatcher, EventHandlerError,
    JoinHandler, MembershipEvent, MembershipService, MessageService, OutboundMessage, PartHandler,
};
use chatterbox_twitch::Outbox;
use tracing::{debug, warn};

/// Routes chat lines through the responder. Generative replies finish on a
/// separate task and arrive through the outbox, so the event loop keeps
/// recording messages while a call is in flight.
#[derive(Clone)]
pub struct ResponderService {
    responder: Arc<Responder>,
    outbox: Outbox,
}

impl ResponderService {
    pub fn new(responder: Arc<Responder>, outbox: Outbox) -> Self {
        Self { responder, outbox }
    }
}

#[async_trait]
impl MessageService for ResponderService {
    async fn handle_message(
        &self,
        event: &ChatMessageEvent,
        ctx: &EventContext,
    ) -> Result<Option<String>, EventHandlerError> {
        let channel_ctx = ChannelContext {
            channel: event.channel.clone(),
            correlation_id: ctx.correlation_id.clone(),
        };

        match self.responder.decide(&channel_ctx, &event.username, &event.text) {
            Decision::Silent(reason) => {
                debug!(
                    event_name = "responder.message.silent",
                    correlation_id = %ctx.correlation_id,
                    reason = reason.reason_code(),
                    "no reply"
                );
                Ok(None)
            }
            Decision::Reply(text) => Ok(Some(text)),
            Decision::Generate(request) => {
                let responder = self.responder.clone();
                let outbox = self.outbox.clone();
                tokio::spawn(async move {
                    let channel = request.channel.clone();
                    let correlation_id = request.correlation_id.clone();
                    if let Some(reply) = responder.complete(request).await {
                        if !outbox.push(OutboundMessage::new(channel, reply)) {
                            warn!(
                                event_name = "responder.generative.undeliverable",
                                correlation_id = %correlation_id,
                                "chat runner is gone, dropping reply"
                            );
                        }
                    }
                });
                Ok(None)
            }
        }
    }
}

/// Join greetings, generated off the event loop like generative replies.
#[derive(Clone)]
pub struct GreeterService {
    greeter: Arc<Greeter>,
    outbox: Outbox,
}

impl GreeterService {
    pub fn new(greeter: Arc<Greeter>, outbox: Outbox) -> Self {
        Self { greeter, outbox }
    }
}

#[async_trait]
impl MembershipService for GreeterService {
    async fn handle_join(
        &self,
        event: &MembershipEvent,
        _ctx: &EventContext,
    ) -> Result<Option<String>, EventHandlerError> {
        let greeter = self.greeter.clone();
        let outbox = self.outbox.clone();
        let event = event.clone();
        tokio::spawn(async move {
            if let Some(greeting) = greeter.greet(&event.username).await {
                outbox.push(OutboundMessage::new(event.channel, greeting));
            }
        });
        Ok(None)
    }

    async fn handle_part(
        &self,
        event: &MembershipEvent,
        _ctx: &EventContext,
    ) -> Result<(), EventHandlerError> {
        debug!(
            event_name = "greeter.viewer_parted",
            channel = %event.channel,
            username = %event.username,
            "viewer left, greeting stays spent"
        );
        Ok(())
    }
}

/// Lets the announcement timer write into the chat runner's queue.
pub struct OutboxSink(pub Outbox);

#[async_trait]
impl MessageSink for OutboxSink {
    async fn deliver(&self, channel: &str, text: &str) {
        if !self.0.push(OutboundMessage::new(channel, text)) {
            warn!(event_name = "announcer.undeliverable", channel, "chat runner is gone, dropping announcement");
        }
    }
}

pub fn build_dispatcher(
    responder: Arc<Responder>,
    greeter: Option<Arc<Greeter>>,
    outbox: &Outbox,
) -> EventDispatcher {
    let mut dispatcher = EventDispatcher::new();
    dispatcher.register(ChatMessageHandler::new(ResponderService::new(responder, outbox.clone())));
    if let Some(greeter) = greeter {
        let service = GreeterService::new(greeter, outbox.clone());
        dispatcher.register(JoinHandler::new(service.clone()));
        dispatcher.register(PartHandler::new(service));
    }
    dispatcher
}
