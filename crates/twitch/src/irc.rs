//! Minimal IRCv3 line codec for the Twitch chat gateway.
//!
//! Lines have the shape `[@tags] [:prefix] COMMAND [params...] [:trailing]`.
//! Only what the bot reads is modelled; anything else still parses and is
//! surfaced as an unsupported command.

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IrcParseError {
    #[error("empty irc line")]
    Empty,
    #[error("irc line has no command: {0}")]
    MissingCommand(String),
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct IrcMessage {
    pub tags: Vec<(String, String)>,
    pub prefix: Option<String>,
    pub command: String,
    pub params: Vec<String>,
}

impl IrcMessage {
    pub fn parse(line: &str) -> Result<Self, IrcParseError> {
        let mut rest = line.trim_end_matches(['\r', '\n']).trim_start();
        if rest.is_empty() {
            return Err(IrcParseError::Empty);
        }

        let mut tags = Vec::new();
        if let Some(stripped) = rest.strip_prefix('@') {
            let (raw_tags, tail) = split_token(stripped);
            tags = raw_tags
                .split(';')
                .filter(|pair| !pair.is_empty())
                .map(|pair| match pair.split_once('=') {
                    Some((key, value)) => (key.to_owned(), unescape_tag_value(value)),
                    None => (pair.to_owned(), String::new()),
                })
                .collect();
            rest = tail;
        }

        let mut prefix = None;
        if let Some(stripped) = rest.strip_prefix(':') {
            let (raw_prefix, tail) = split_token(stripped);
            prefix = Some(raw_prefix.to_owned());
            rest = tail;
        }

        let (command, mut rest) = split_token(rest);
        if command.is_empty() {
            return Err(IrcParseError::MissingCommand(line.to_owned()));
        }

        let mut params = Vec::new();
        while !rest.is_empty() {
            if let Some(trailing) = rest.strip_prefix(':') {
                params.push(trailing.to_owned());
                break;
            }
            let (param, tail) = split_token(rest);
            params.push(param.to_owned());
            rest = tail;
        }

        Ok(Self { tags, prefix, command: command.to_ascii_uppercase(), params })
    }

    pub fn tag(&self, key: &str) -> Option<&str> {
        self.tags.iter().find(|(name, _)| name == key).map(|(_, value)| value.as_str())
    }

    /// Nick portion of a `nick!user@host` prefix.
    pub fn nick(&self) -> Option<&str> {
        let prefix = self.prefix.as_deref()?;
        let nick = prefix.split(['!', '@']).next().unwrap_or(prefix);
        (!nick.is_empty()).then_some(nick)
    }

    pub fn param(&self, index: usize) -> Option<&str> {
        self.params.get(index).map(String::as_str)
    }

    pub fn trailing(&self) -> Option<&str> {
        self.params.last().map(String::as_str)
    }

    pub fn is_numeric(&self) -> bool {
        self.command.len() == 3 && self.command.bytes().all(|byte| byte.is_ascii_digit())
    }
}

fn split_token(input: &str) -> (&str, &str) {
    match input.split_once(' ') {
        Some((head, tail)) => (head, tail.trim_start_matches(' ')),
        None => (input, ""),
    }
}

fn unescape_tag_value(value: &str) -> String {
    let mut output = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            output.push(ch);
            continue;
        }
        match chars.next() {
            Some(':') => output.push(';'),
            Some('s') => output.push(' '),
            Some('r') => output.push('\r'),
            Some('n') => output.push('\n'),
            Some(other) => output.push(other),
            None => {}
        }
    }
    output
}

/// `#channel` form used on the wire.
pub fn channel_target(channel: &str) -> String {
    let bare = channel.trim().trim_start_matches('#').to_lowercase();
    format!("#{bare}")
}

pub fn privmsg(channel: &str, text: &str) -> String {
    let single_line = text.replace(['\r', '\n'], " ");
    format!("PRIVMSG {} :{}", channel_target(channel), single_line)
}

pub fn pong(payload: &str) -> String {
    format!("PONG :{payload}")
}

pub fn join(channel: &str) -> String {
    format!("JOIN {}", channel_target(channel))
}
