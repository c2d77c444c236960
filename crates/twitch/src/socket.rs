use std::{sync::Arc, time::Duration};

use anyhow::Result;
use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::{mpsc, watch, Mutex};
use tracing::{debug, info, warn};

use crate::events::{
    default_dispatcher, ChatEnvelope, ChatEvent, EventContext, EventDispatcher, HandlerResult,
    OutboundMessage,
};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("transport failed to connect: {0}")]
    Connect(String),
    #[error("transport read failed: {0}")]
    Receive(String),
    #[error("transport send failed: {0}")]
    Send(String),
    #[error("transport disconnect failed: {0}")]
    Disconnect(String),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self { max_retries: 5, base_delay_ms: 250, max_delay_ms: 5_000 }
    }
}

impl ReconnectPolicy {
    fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.min(16);
        let multiplier = 1_u64 << exponent;
        let delay_ms = self.base_delay_ms.saturating_mul(multiplier).min(self.max_delay_ms);
        Duration::from_millis(delay_ms)
    }
}

/// Chat gateway connection. `next_envelope` returning `Ok(None)` means the
/// transport has nothing more to deliver and the runner should stop; a
/// dropped connection is reported as an error so the runner reconnects.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    async fn connect(&self) -> Result<(), TransportError>;
    async fn next_envelope(&self) -> Result<Option<ChatEnvelope>, TransportError>;
    async fn send(&self, channel: &str, text: &str) -> Result<(), TransportError>;
    async fn pong(&self, payload: &str) -> Result<(), TransportError>;
    async fn disconnect(&self) -> Result<(), TransportError>;
}

#[derive(Default)]
pub struct NoopChatTransport;

#[async_trait]
impl ChatTransport for NoopChatTransport {
    async fn connect(&self) -> Result<(), TransportError> {
        Ok(())
    }

    async fn next_envelope(&self) -> Result<Option<ChatEnvelope>, TransportError> {
        Ok(None)
    }

    async fn send(&self, _channel: &str, _text: &str) -> Result<(), TransportError> {
        Ok(())
    }

    async fn pong(&self, _payload: &str) -> Result<(), TransportError> {
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), TransportError> {
        Ok(())
    }
}

/// Cloneable handle for queueing messages the runner sends on its own
/// schedule, e.g. replies that finish after the triggering event.
#[derive(Clone, Debug)]
pub struct Outbox {
    sender: mpsc::UnboundedSender<OutboundMessage>,
}

impl Outbox {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<OutboundMessage>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }

    /// Returns `false` once the receiving side is gone.
    pub fn push(&self, message: OutboundMessage) -> bool {
        self.sender.send(message).is_ok()
    }
}

enum PumpExit {
    Exhausted,
    Shutdown,
}

pub struct ChatRunner {
    transport: Arc<dyn ChatTransport>,
    dispatcher: EventDispatcher,
    reconnect_policy: ReconnectPolicy,
    outbox: Outbox,
    outbound: Mutex<mpsc::UnboundedReceiver<OutboundMessage>>,
}

impl Default for ChatRunner {
    fn default() -> Self {
        Self::new(Arc::new(NoopChatTransport), default_dispatcher(), ReconnectPolicy::default())
    }
}

impl ChatRunner {
    pub fn new(
        transport: Arc<dyn ChatTransport>,
        dispatcher: EventDispatcher,
        reconnect_policy: ReconnectPolicy,
    ) -> Self {
        let (outbox, outbound) = Outbox::channel();
        Self::with_outbox(transport, dispatcher, reconnect_policy, outbox, outbound)
    }

    /// For callers that hand the outbox to handlers before the runner exists.
    pub fn with_outbox(
        transport: Arc<dyn ChatTransport>,
        dispatcher: EventDispatcher,
        reconnect_policy: ReconnectPolicy,
        outbox: Outbox,
        outbound: mpsc::UnboundedReceiver<OutboundMessage>,
    ) -> Self {
        Self { transport, dispatcher, reconnect_policy, outbox, outbound: Mutex::new(outbound) }
    }

    pub fn outbox(&self) -> Outbox {
        self.outbox.clone()
    }

    /// Runs until the transport is exhausted, retries run out, or
    /// `shutdown` flips to `true`. Never fails the process.
    pub async fn start(&self, mut shutdown: watch::Receiver<bool>) -> Result<()> {
        let mut attempt = 0;
        loop {
            match self.connect_and_pump(attempt, &mut shutdown).await {
                Ok(PumpExit::Exhausted) => return Ok(()),
                Ok(PumpExit::Shutdown) => {
                    if let Err(error) = self.transport.disconnect().await {
                        warn!(event_name = "transport.twitch.disconnect_failed", error = %error, "disconnect failed during shutdown");
                    }
                    info!(event_name = "transport.twitch.stopped", "chat runner stopped");
                    return Ok(());
                }
                Err((transport_error, connected)) => {
                    if connected {
                        attempt = 0;
                    }
                    warn!(
                        event_name = "transport.twitch.failed",
                        attempt,
                        max_retries = self.reconnect_policy.max_retries,
                        error = %transport_error,
                        "chat transport failed"
                    );

                    if attempt >= self.reconnect_policy.max_retries {
                        warn!(
                            event_name = "transport.twitch.retries_exhausted",
                            max_retries = self.reconnect_policy.max_retries,
                            "chat transport retries exhausted; continuing process without crash"
                        );
                        return Ok(());
                    }

                    let delay = self.reconnect_policy.backoff(attempt);
                    attempt += 1;
                    if !delay.is_zero() {
                        tokio::select! {
                            _ = tokio::time::sleep(delay) => {}
                            _ = shutdown_requested(&mut shutdown) => return Ok(()),
                        }
                    }
                }
            }
        }
    }

    /// The error half carries whether the connection had been established,
    /// which resets the retry budget.
    async fn connect_and_pump(
        &self,
        attempt: u32,
        shutdown: &mut watch::Receiver<bool>,
    ) -> Result<PumpExit, (TransportError, bool)> {
        if *shutdown.borrow() {
            return Ok(PumpExit::Shutdown);
        }
        info!(event_name = "transport.twitch.connecting", attempt, "opening chat transport connection");
        self.transport.connect().await.map_err(|error| (error, false))?;
        info!(event_name = "transport.twitch.connected", attempt, "chat transport connected");

        let mut outbound = self.outbound.lock().await;
        loop {
            tokio::select! {
                _ = shutdown_requested(shutdown) => return Ok(PumpExit::Shutdown),
                Some(message) = outbound.recv() => self.deliver(&message, None).await,
                envelope = self.transport.next_envelope() => {
                    let Some(envelope) = envelope.map_err(|error| (error, true))? else {
                        info!(event_name = "transport.twitch.stream_closed", attempt, "chat transport stream closed");
                        self.transport.disconnect().await.map_err(|error| (error, true))?;
                        return Ok(PumpExit::Exhausted);
                    };
                    self.handle_envelope(envelope).await;
                }
            }
        }
    }

    async fn handle_envelope(&self, envelope: ChatEnvelope) {
        let correlation_id = envelope.envelope_id.as_str();
        debug!(
            event_name = "ingress.twitch.event_received",
            correlation_id,
            event_type = ?envelope.event.event_type(),
            "received chat event"
        );

        match &envelope.event {
            ChatEvent::Ping { payload } => {
                if let Err(error) = self.transport.pong(payload).await {
                    warn!(event_name = "transport.twitch.pong_failed", correlation_id, error = %error, "failed to answer ping");
                }
                return;
            }
            ChatEvent::Notice(notice) => {
                info!(
                    event_name = "ingress.twitch.notice",
                    correlation_id,
                    message_id = notice.message_id.as_deref().unwrap_or("unknown"),
                    text = %notice.text,
                    "gateway notice"
                );
            }
            _ => {}
        }

        let context = EventContext { correlation_id: envelope.envelope_id.clone() };
        match self.dispatcher.dispatch(&envelope, &context).await {
            Ok(HandlerResult::Responded(message)) => self.deliver(&message, Some(correlation_id)).await,
            Ok(_) => {}
            Err(error) => {
                warn!(
                    event_name = "ingress.twitch.dispatch_failed",
                    correlation_id,
                    error = %error,
                    "event dispatch failed; continuing chat loop"
                );
            }
        }
    }

    /// Fire and forget: a failed send is logged and dropped.
    async fn deliver(&self, message: &OutboundMessage, correlation_id: Option<&str>) {
        let correlation_id = correlation_id.unwrap_or("outbox");
        match self.transport.send(&message.channel, &message.text).await {
            Ok(()) => debug!(
                event_name = "egress.twitch.sent",
                correlation_id,
                channel = %message.channel,
                "chat message sent"
            ),
            Err(error) => warn!(
                event_name = "egress.twitch.send_failed",
                correlation_id,
                channel = %message.channel,
                error = %error,
                "chat message dropped"
            ),
        }
    }
}

/// Resolves once shutdown is requested. A dropped sender never resolves.
async fn shutdown_requested(shutdown: &mut watch::Receiver<bool>) {
    loop {
        if *shutdown.borrow_and_update() {
            return;
        }
        if shutdown.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;
    use tokio::sync::{watch, Mutex};

    use super::{ChatRunner, ChatTransport, ReconnectPolicy, TransportError};
    use crate::events::{
        ChatEnvelope, ChatEvent, ChatMessageEvent, ChatMessageHandler, EventContext,
        EventDispatcher, EventHandlerError, MessageService, OutboundMessage,
    };

    #[derive(Default)]
    struct ScriptedTransport {
        state: Mutex<ScriptedState>,
        hold_open: bool,
    }

    #[derive(Default)]
    struct ScriptedState {
        connect_results: VecDeque<Result<(), TransportError>>,
        envelopes: VecDeque<Result<Option<ChatEnvelope>, TransportError>>,
        send_results: VecDeque<Result<(), TransportError>>,
        connect_attempts: usize,
        sent: Vec<(String, String)>,
        pongs: Vec<String>,
        disconnect_calls: usize,
    }

    impl ScriptedTransport {
        fn with_script(
            connect_results: Vec<Result<(), TransportError>>,
            envelopes: Vec<Result<Option<ChatEnvelope>, TransportError>>,
        ) -> Self {
            Self {
                state: Mutex::new(ScriptedState {
                    connect_results: connect_results.into(),
                    envelopes: envelopes.into(),
                    ..ScriptedState::default()
                }),
                hold_open: false,
            }
        }

        /// Keeps the stream pending once the script runs out.
        fn held_open(mut self) -> Self {
            self.hold_open = true;
            self
        }

        async fn connect_attempts(&self) -> usize {
            self.state.lock().await.connect_attempts
        }

        async fn sent(&self) -> Vec<(String, String)> {
            self.state.lock().await.sent.clone()
        }
    }

    #[async_trait]
    impl ChatTransport for ScriptedTransport {
        async fn connect(&self) -> Result<(), TransportError> {
            let mut state = self.state.lock().await;
            state.connect_attempts += 1;
            state.connect_results.pop_front().unwrap_or(Ok(()))
        }

        async fn next_envelope(&self) -> Result<Option<ChatEnvelope>, TransportError> {
            let next = self.state.lock().await.envelopes.pop_front();
            match next {
                Some(next) => next,
                None if self.hold_open => std::future::pending().await,
                None => Ok(None),
            }
        }

        async fn send(&self, channel: &str, text: &str) -> Result<(), TransportError> {
            let mut state = self.state.lock().await;
            state.sent.push((channel.to_owned(), text.to_owned()));
            state.send_results.pop_front().unwrap_or(Ok(()))
        }

        async fn pong(&self, payload: &str) -> Result<(), TransportError> {
            self.state.lock().await.pongs.push(payload.to_owned());
            Ok(())
        }

        async fn disconnect(&self) -> Result<(), TransportError> {
            self.state.lock().await.disconnect_calls += 1;
            Ok(())
        }
    }

    struct ShoutService;

    #[async_trait]
    impl MessageService for ShoutService {
        async fn handle_message(
            &self,
            event: &ChatMessageEvent,
            _ctx: &EventContext,
        ) -> Result<Option<String>, EventHandlerError> {
            if event.text == "boom" {
                return Err(EventHandlerError::Message("boom".to_owned()));
            }
            Ok(Some(event.text.to_uppercase()))
        }
    }

    fn chat(text: &str) -> Result<Option<ChatEnvelope>, TransportError> {
        Ok(Some(ChatEnvelope::new(ChatEvent::Message(ChatMessageEvent {
            channel: "#stream".to_owned(),
            username: "alice".to_owned(),
            display_name: "alice".to_owned(),
            text: text.to_owned(),
            is_self: false,
        }))))
    }

    fn no_delay(max_retries: u32) -> ReconnectPolicy {
        ReconnectPolicy { max_retries, base_delay_ms: 0, max_delay_ms: 0 }
    }

    fn idle_shutdown() -> watch::Receiver<bool> {
        watch::channel(false).1
    }

    #[tokio::test]
    async fn reconnects_after_initial_connect_failure() {
        let transport = Arc::new(ScriptedTransport::with_script(
            vec![Err(TransportError::Connect("network down".to_owned())), Ok(())],
            vec![chat("hello"), Ok(None)],
        ));
        let mut dispatcher = EventDispatcher::new();
        dispatcher.register(ChatMessageHandler::new(ShoutService));

        let runner = ChatRunner::new(transport.clone(), dispatcher, no_delay(2));
        runner.start(idle_shutdown()).await.expect("runner should not fail");

        assert_eq!(transport.connect_attempts().await, 2);
        assert_eq!(transport.sent().await, vec![("#stream".to_owned(), "HELLO".to_owned())]);
    }

    #[tokio::test]
    async fn exhausts_retries_without_crashing() {
        let transport = Arc::new(ScriptedTransport::with_script(
            vec![
                Err(TransportError::Connect("fail-1".to_owned())),
                Err(TransportError::Connect("fail-2".to_owned())),
                Err(TransportError::Connect("fail-3".to_owned())),
            ],
            vec![],
        ));

        let runner = ChatRunner::new(transport.clone(), EventDispatcher::default(), no_delay(2));

        runner.start(idle_shutdown()).await.expect("runner should degrade gracefully");
        assert_eq!(transport.connect_attempts().await, 3);
    }

    #[tokio::test]
    async fn dropped_connection_reconnects_with_fresh_budget() {
        let transport = Arc::new(ScriptedTransport::with_script(
            vec![Ok(()), Ok(()), Err(TransportError::Connect("flaky".to_owned())), Ok(())],
            vec![
                Err(TransportError::Receive("closed by server".to_owned())),
                Err(TransportError::Receive("closed by server".to_owned())),
                Ok(None),
            ],
        ));

        let runner = ChatRunner::new(transport.clone(), EventDispatcher::default(), no_delay(2));
        runner.start(idle_shutdown()).await.expect("runner should not fail");

        assert_eq!(transport.connect_attempts().await, 4);
    }

    #[tokio::test]
    async fn answers_pings_and_survives_handler_errors() {
        let transport = Arc::new(ScriptedTransport::with_script(
            vec![],
            vec![
                Ok(Some(ChatEnvelope::new(ChatEvent::Ping { payload: "tmi.twitch.tv".to_owned() }))),
                chat("boom"),
                chat("still here"),
                Ok(None),
            ],
        ));
        let mut dispatcher = EventDispatcher::new();
        dispatcher.register(ChatMessageHandler::new(ShoutService));

        let runner = ChatRunner::new(transport.clone(), dispatcher, no_delay(0));
        runner.start(idle_shutdown()).await.expect("runner should not fail");

        let state = transport.state.lock().await;
        assert_eq!(state.pongs, vec!["tmi.twitch.tv".to_owned()]);
        assert_eq!(state.sent, vec![("#stream".to_owned(), "STILL HERE".to_owned())]);
    }

    #[tokio::test]
    async fn send_failures_are_dropped() {
        let transport = Arc::new(ScriptedTransport::with_script(vec![], vec![chat("one"), chat("two"), Ok(None)]));
        transport.state.lock().await.send_results =
            vec![Err(TransportError::Send("socket closed".to_owned()))].into();
        let mut dispatcher = EventDispatcher::new();
        dispatcher.register(ChatMessageHandler::new(ShoutService));

        let runner = ChatRunner::new(transport.clone(), dispatcher, no_delay(0));
        runner.start(idle_shutdown()).await.expect("runner should not fail");

        assert_eq!(transport.sent().await.len(), 2);
        assert_eq!(transport.connect_attempts().await, 1);
    }

    #[tokio::test]
    async fn delivers_outbox_messages_and_stops_on_shutdown() {
        let transport = Arc::new(ScriptedTransport::with_script(vec![], vec![]).held_open());
        let runner = Arc::new(ChatRunner::new(transport.clone(), EventDispatcher::default(), no_delay(0)));
        let outbox = runner.outbox();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let task = tokio::spawn({
            let runner = runner.clone();
            async move { runner.start(shutdown_rx).await }
        });

        assert!(outbox.push(OutboundMessage::new("#stream", "Welcome in! 💜")));
        tokio::time::sleep(Duration::from_millis(50)).await;
        shutdown_tx.send(true).expect("runner still listening");

        let outcome = tokio::time::timeout(Duration::from_secs(2), task).await;
        assert!(matches!(outcome, Ok(Ok(Ok(())))));
        assert_eq!(transport.sent().await, vec![("#stream".to_owned(), "Welcome in! 💜".to_owned())]);
        assert_eq!(transport.state.lock().await.disconnect_calls, 1);
    }

    #[test]
    fn backoff_doubles_until_capped() {
        let policy = ReconnectPolicy::default();
        assert_eq!(policy.backoff(0), Duration::from_millis(250));
        assert_eq!(policy.backoff(2), Duration::from_millis(1_000));
        assert_eq!(policy.backoff(10), Duration::from_millis(5_000));
    }
}
