use chatterbox_core::config::BotConfig;

/// Why the responder stayed quiet for a message.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SilenceReason {
    IgnoredUser,
    TooShort,
    Disabled,
    RateLimited,
    NotEngaged,
    GenerativeUnavailable,
    GenerativeCooldown,
    NoMatch,
}

impl SilenceReason {
    pub fn reason_code(&self) -> &'static str {
        match self {
            Self::IgnoredUser => "ignored_user",
            Self::TooShort => "below_min_length",
            Self::Disabled => "bot_disabled",
            Self::RateLimited => "rate_window_closed",
            Self::NotEngaged => "engagement_declined",
            Self::GenerativeUnavailable => "generative_unavailable",
            Self::GenerativeCooldown => "generative_cooldown",
            Self::NoMatch => "no_match",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GuardrailDecision {
    Allow,
    Deny { reason: SilenceReason },
}

/// Static admission checks applied before any rule or generative work.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GuardrailPolicy {
    pub enabled: bool,
    pub min_message_length: usize,
    pub ignored_users: Vec<String>,
}

impl Default for GuardrailPolicy {
    fn default() -> Self {
        Self::from_config(&chatterbox_core::AppConfig::default().bot)
    }
}

impl GuardrailPolicy {
    pub fn from_config(bot: &BotConfig) -> Self {
        Self {
            enabled: bot.enabled,
            min_message_length: bot.min_message_length,
            ignored_users: bot
                .ignored_users
                .iter()
                .map(|user| user.trim().to_lowercase())
                .filter(|user| !user.is_empty())
                .collect(),
        }
    }

    pub fn is_ignored(&self, username: &str) -> bool {
        let username = username.trim().to_lowercase();
        self.ignored_users.iter().any(|ignored| *ignored == username)
    }

    /// `rate_open` is sampled by the caller so the rate window stays the
    /// single owner of its counter.
    pub fn evaluate(&self, username: &str, text: &str, rate_open: bool) -> GuardrailDecision {
        if self.is_ignored(username) {
            return GuardrailDecision::Deny { reason: SilenceReason::IgnoredUser };
        }
        if text.trim().chars().count() < self.min_message_length {
            return GuardrailDecision::Deny { reason: SilenceReason::TooShort };
        }
        if !self.enabled {
            return GuardrailDecision::Deny { reason: SilenceReason::Disabled };
        }
        if !rate_open {
            return GuardrailDecision::Deny { reason: SilenceReason::RateLimited };
        }
        GuardrailDecision::Allow
    }
}

#[cfg(test)]
mod tests {
    use chatterbox_core::config::{AppConfig, BotConfig};

    use super::{GuardrailDecision, GuardrailPolicy, SilenceReason};

    fn deny(reason: SilenceReason) -> GuardrailDecision {
        GuardrailDecision::Deny { reason }
    }

    #[test]
    fn ignored_users_are_case_insensitive() {
        let policy = GuardrailPolicy::default();

        assert_eq!(policy.evaluate("NightBot", "hello there", true), deny(SilenceReason::IgnoredUser));
        assert_eq!(policy.evaluate("alice", "hello there", true), GuardrailDecision::Allow);
    }

    #[test]
    fn configured_ignore_list_is_normalized() {
        let bot = BotConfig {
            ignored_users: vec![" Nightbot ".to_string(), "moobot".to_string(), String::new()],
            ..AppConfig::default().bot
        };
        let policy = GuardrailPolicy::from_config(&bot);

        assert_eq!(policy.ignored_users, vec!["nightbot".to_string(), "moobot".to_string()]);
        assert!(policy.is_ignored("NIGHTBOT"));
        assert!(policy.is_ignored("MooBot"));
        assert!(!policy.is_ignored("streamlabs"));
    }

    #[test]
    fn short_messages_are_measured_after_trimming() {
        let policy = GuardrailPolicy::default();

        assert_eq!(policy.evaluate("alice", "  hi   ", true), deny(SilenceReason::TooShort));
        assert_eq!(policy.evaluate("alice", "hey", true), GuardrailDecision::Allow);
    }

    #[test]
    fn disabled_and_rate_closed_deny_in_order() {
        let policy = GuardrailPolicy { enabled: false, ..GuardrailPolicy::default() };

        assert_eq!(policy.evaluate("alice", "hello", false), deny(SilenceReason::Disabled));
        assert_eq!(
            GuardrailPolicy::default().evaluate("alice", "hello", false),
            deny(SilenceReason::RateLimited)
        );
    }

    #[test]
    fn reason_codes_are_stable() {
        assert_eq!(SilenceReason::RateLimited.reason_code(), "rate_window_closed");
        assert_eq!(SilenceReason::TooShort.reason_code(), "below_min_length");
    }
}
