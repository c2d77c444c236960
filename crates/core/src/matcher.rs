use chrono::{DateTime, Duration, Utc};
use tracing::debug;

use crate::cooldown::{CooldownKey, CooldownTracker};
use crate::random::RandomSource;
use crate::rules::{Command, CompiledRule, Rule, RuleBook};

pub const USER_PLACEHOLDER: &str = "{user}";
pub const UPPER_USER_PLACEHOLDER: &str = "{USER}";

/// Evaluates commands and rules for one inbound message. Borrows the mutable
/// decision state for the duration of that message only; matches borrow the
/// book alone so callers can keep using the random source afterwards.
pub struct RuleMatcher<'b, 'm> {
    book: &'b RuleBook,
    cooldowns: &'m mut CooldownTracker,
    random: &'m mut dyn RandomSource,
    now: DateTime<Utc>,
}

impl<'b, 'm> RuleMatcher<'b, 'm> {
    pub fn new(
        book: &'b RuleBook,
        cooldowns: &'m mut CooldownTracker,
        random: &'m mut dyn RandomSource,
        now: DateTime<Utc>,
    ) -> Self {
        Self { book, cooldowns, random, now }
    }

    /// Prefixed command lookup. A command on cooldown yields `None` without
    /// any user-facing notice.
    pub fn match_command(&mut self, text: &str, username: &str) -> Option<&'b Command> {
        let settings = self.book.commands();
        if !settings.enabled {
            return None;
        }

        let rest = text.strip_prefix(settings.prefix.as_str())?;
        let name = rest.split(char::is_whitespace).next().unwrap_or_default().to_lowercase();
        if name.is_empty() {
            return None;
        }

        let command = settings
            .list
            .iter()
            .find(|command| command.enabled && command.name.to_lowercase() == name)?;

        let window = Duration::seconds(clamp_secs(command.cooldown));
        if !self.cooldowns.try_fire(CooldownKey::command(&name, username), window, self.now) {
            debug!(
                event_name = "responder.command.cooldown",
                command = %name,
                username,
                "command on cooldown"
            );
            return None;
        }

        Some(command)
    }

    /// First enabled rule whose trigger, probability gate and cooldown all
    /// pass. Later rules are never consulted once one wins.
    pub fn match_rule(&mut self, text: &str, username: &str) -> Option<&'b CompiledRule> {
        let book = self.book;
        for compiled in book.rules() {
            let rule = &compiled.rule;
            if !rule.enabled || !compiled.triggered_by(text) {
                continue;
            }

            if !passes_probability(rule.probability, self.random.next_f64()) {
                debug!(
                    event_name = "responder.rule.probability_skip",
                    rule_id = %rule.id,
                    "rule skipped by probability gate"
                );
                continue;
            }

            let window = Duration::seconds(clamp_secs(rule.cooldown));
            if !self.cooldowns.try_fire(CooldownKey::rule(&rule.id, username), window, self.now) {
                debug!(
                    event_name = "responder.rule.cooldown",
                    rule_id = %rule.id,
                    username,
                    "rule on cooldown"
                );
                continue;
            }

            return Some(compiled);
        }

        None
    }
}

fn passes_probability(probability: f64, draw: f64) -> bool {
    if probability >= 1.0 {
        return true;
    }
    probability > 0.0 && draw <= probability
}

// chrono rejects second counts above i64::MAX / 1000.
pub(crate) fn clamp_secs(seconds: u64) -> i64 {
    const MAX_SECS: i64 = i64::MAX / 1_000;
    i64::try_from(seconds).map(|secs| secs.min(MAX_SECS)).unwrap_or(MAX_SECS)
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PlaceholderMode {
    #[default]
    FirstOccurrence,
    AllOccurrences,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ResponseRenderer {
    pub randomize: bool,
    pub placeholders: PlaceholderMode,
}

impl Default for ResponseRenderer {
    fn default() -> Self {
        Self { randomize: true, placeholders: PlaceholderMode::FirstOccurrence }
    }
}

impl ResponseRenderer {
    /// Picks one of the rule's responses and fills in the username. A rule
    /// without responses renders nothing.
    pub fn render(
        &self,
        rule: &Rule,
        username: &str,
        random: &mut dyn RandomSource,
    ) -> Option<String> {
        if rule.responses.is_empty() {
            return None;
        }

        let index = if self.randomize { random.pick(rule.responses.len()) } else { 0 };
        let template = rule.responses.get(index)?;
        Some(self.substitute(template, username))
    }

    pub fn substitute(&self, template: &str, username: &str) -> String {
        let upper = username.to_uppercase();
        match self.placeholders {
            PlaceholderMode::FirstOccurrence => template
                .replacen(USER_PLACEHOLDER, username, 1)
                .replacen(UPPER_USER_PLACEHOLDER, &upper, 1),
            PlaceholderMode::AllOccurrences => {
                template.replace(USER_PLACEHOLDER, username).replace(UPPER_USER_PLACEHOLDER, &upper)
            }
        }
    }
}
