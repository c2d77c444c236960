use std::collections::VecDeque;
use std::time::Duration;

use async_trait::async_trait;
use chatterbox_core::config::TwitchConfig;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use secrecy::{ExposeSecret, SecretString};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

use crate::events::{ChatEnvelope, ChatEvent};
use crate::irc::{self, IrcMessage, IrcParseError};
use crate::socket::{ChatTransport, TransportError};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

pub const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);
const CAPABILITIES: &str = "CAP REQ :twitch.tv/tags twitch.tv/commands twitch.tv/membership";

struct Reader {
    stream: SplitStream<WsStream>,
    pending: VecDeque<String>,
}

/// Twitch chat over the IRC-on-WebSocket gateway.
pub struct TwitchWsTransport {
    url: String,
    nick: String,
    token: SecretString,
    channel: String,
    handshake_timeout: Duration,
    reader: Mutex<Option<Reader>>,
    writer: Mutex<Option<SplitSink<WsStream, Message>>>,
}

#[derive(Debug, PartialEq, Eq)]
enum HandshakeStep {
    Welcome,
    AuthFailed(String),
    Ping(String),
    Other,
}

fn classify_handshake(message: &IrcMessage) -> HandshakeStep {
    match message.command.as_str() {
        "001" | "376" => HandshakeStep::Welcome,
        "PING" => HandshakeStep::Ping(message.trailing().unwrap_or_default().to_owned()),
        "NOTICE" => {
            let text = message.trailing().unwrap_or_default();
            if text.contains("Login authentication failed")
                || text.contains("Improperly formatted auth")
            {
                HandshakeStep::AuthFailed(text.to_owned())
            } else {
                HandshakeStep::Other
            }
        }
        _ => HandshakeStep::Other,
    }
}

impl TwitchWsTransport {
    pub fn from_config(config: &TwitchConfig) -> Self {
        Self {
            url: config.server_url.clone(),
            nick: config.username.trim().to_lowercase(),
            token: SecretString::from(config.oauth_token.expose_secret().to_owned()),
            channel: config.channel_name(),
            handshake_timeout: DEFAULT_HANDSHAKE_TIMEOUT,
            reader: Mutex::new(None),
            writer: Mutex::new(None),
        }
    }

    pub fn with_handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    pub fn nick(&self) -> &str {
        &self.nick
    }

    async fn write_line(
        writer: &mut SplitSink<WsStream, Message>,
        line: String,
    ) -> Result<(), TransportError> {
        writer.send(Message::Text(line.into())).await.map_err(|error| TransportError::Send(error.to_string()))
    }

    /// Reads until the welcome numerics arrive. Lines after the welcome in
    /// the same frame are kept for `next_envelope`.
    async fn await_welcome(
        &self,
        reader: &mut Reader,
        writer: &mut SplitSink<WsStream, Message>,
    ) -> Result<(), TransportError> {
        loop {
            let frame = reader
                .stream
                .next()
                .await
                .ok_or_else(|| TransportError::Connect("gateway closed during login".to_owned()))?
                .map_err(|error| TransportError::Connect(error.to_string()))?;
            let Message::Text(text) = frame else {
                continue;
            };

            let mut lines = text.as_str().lines();
            while let Some(line) = lines.next() {
                let Ok(message) = IrcMessage::parse(line) else {
                    continue;
                };
                match classify_handshake(&message) {
                    HandshakeStep::Welcome => {
                        reader.pending.extend(lines.map(str::to_owned));
                        return Ok(());
                    }
                    HandshakeStep::AuthFailed(notice) => {
                        return Err(TransportError::Connect(format!("login rejected: {notice}")));
                    }
                    HandshakeStep::Ping(payload) => {
                        Self::write_line(writer, irc::pong(&payload)).await?;
                    }
                    HandshakeStep::Other => {}
                }
            }
        }
    }
}

#[async_trait]
impl ChatTransport for TwitchWsTransport {
    async fn connect(&self) -> Result<(), TransportError> {
        let (stream, _) = connect_async(self.url.as_str())
            .await
            .map_err(|error| TransportError::Connect(error.to_string()))?;
        let (mut writer, stream) = stream.split();
        let mut reader = Reader { stream, pending: VecDeque::new() };

        let token = self.token.expose_secret();
        let pass = if token.starts_with("oauth:") { token.to_owned() } else { format!("oauth:{token}") };
        Self::write_line(&mut writer, format!("PASS {pass}")).await?;
        Self::write_line(&mut writer, format!("NICK {}", self.nick)).await?;
        Self::write_line(&mut writer, CAPABILITIES.to_owned()).await?;

        tokio::time::timeout(self.handshake_timeout, self.await_welcome(&mut reader, &mut writer))
            .await
            .map_err(|_| TransportError::Connect("timed out waiting for gateway welcome".to_owned()))??;
        info!(event_name = "transport.twitch.authenticated", nick = %self.nick, "logged in to chat gateway");

        Self::write_line(&mut writer, irc::join(&self.channel)).await?;
        info!(event_name = "transport.twitch.joined", channel = %irc::channel_target(&self.channel), "joined channel");

        *self.reader.lock().await = Some(reader);
        *self.writer.lock().await = Some(writer);
        Ok(())
    }

    async fn next_envelope(&self) -> Result<Option<ChatEnvelope>, TransportError> {
        let mut guard = self.reader.lock().await;
        let Some(reader) = guard.as_mut() else {
            return Err(TransportError::Receive("not connected".to_owned()));
        };

        loop {
            while let Some(line) = reader.pending.pop_front() {
                let message = match IrcMessage::parse(&line) {
                    Ok(message) => message,
                    Err(IrcParseError::Empty) => continue,
                    Err(error) => {
                        debug!(event_name = "ingress.twitch.unparsed_line", error = %error, "skipping unparseable line");
                        continue;
                    }
                };
                if message.command == "RECONNECT" {
                    return Err(TransportError::Receive("gateway requested reconnect".to_owned()));
                }
                return Ok(Some(ChatEnvelope::new(ChatEvent::from_irc(&message, &self.nick))));
            }

            match reader.stream.next().await {
                Some(Ok(Message::Text(text))) => {
                    reader.pending.extend(text.as_str().lines().map(str::to_owned));
                }
                Some(Ok(Message::Close(_))) => {
                    return Err(TransportError::Receive("gateway closed the connection".to_owned()));
                }
                Some(Ok(_)) => {}
                Some(Err(error)) => return Err(TransportError::Receive(error.to_string())),
                None => return Err(TransportError::Receive("gateway stream ended".to_owned())),
            }
        }
    }

    async fn send(&self, channel: &str, text: &str) -> Result<(), TransportError> {
        let mut guard = self.writer.lock().await;
        let writer = guard.as_mut().ok_or_else(|| TransportError::Send("not connected".to_owned()))?;
        Self::write_line(writer, irc::privmsg(channel, text)).await
    }

    async fn pong(&self, payload: &str) -> Result<(), TransportError> {
        let mut guard = self.writer.lock().await;
        let writer = guard.as_mut().ok_or_else(|| TransportError::Send("not connected".to_owned()))?;
        Self::write_line(writer, irc::pong(payload)).await
    }

    async fn disconnect(&self) -> Result<(), TransportError> {
        self.reader.lock().await.take();
        let Some(mut writer) = self.writer.lock().await.take() else {
            return Ok(());
        };
        if let Err(error) = writer.close().await {
            warn!(event_name = "transport.twitch.close_failed", error = %error, "websocket close failed");
            return Err(TransportError::Disconnect(error.to_string()));
        }
        info!(event_name = "transport.twitch.disconnected", "chat gateway connection closed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chatterbox_core::config::AppConfig;
    use secrecy::ExposeSecret;

    use super::{classify_handshake, HandshakeStep, TwitchWsTransport};
    use crate::irc::IrcMessage;

    fn step(line: &str) -> HandshakeStep {
        classify_handshake(&IrcMessage::parse(line).expect("line parses"))
    }

    #[test]
    fn classifies_handshake_lines() {
        assert_eq!(step(":tmi.twitch.tv 001 chatterbot :Welcome, GLHF!"), HandshakeStep::Welcome);
        assert_eq!(step(":tmi.twitch.tv 376 chatterbot :>"), HandshakeStep::Welcome);
        assert_eq!(step("PING :tmi.twitch.tv"), HandshakeStep::Ping("tmi.twitch.tv".to_owned()));
        assert_eq!(
            step(":tmi.twitch.tv NOTICE * :Login authentication failed"),
            HandshakeStep::AuthFailed("Login authentication failed".to_owned())
        );
        assert_eq!(step(":tmi.twitch.tv CAP * ACK :twitch.tv/tags"), HandshakeStep::Other);
    }

    #[test]
    fn builds_from_twitch_config() {
        let mut config = AppConfig::default();
        config.twitch.username = " ChatterBot ".to_owned();
        config.twitch.channel = "#TheStreamer".to_owned();
        config.twitch.oauth_token = "oauth:abc123".to_owned().into();

        let transport = TwitchWsTransport::from_config(&config.twitch);

        assert_eq!(transport.nick(), "chatterbot");
        assert_eq!(transport.channel, "thestreamer");
        assert_eq!(transport.token.expose_secret(), "oauth:abc123");
    }
}
