use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};

/// Identity of a cooldown slot: what fired, for whom.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum CooldownKey {
    Rule { rule_id: String, username: String },
    Command { name: String, username: String },
    Generative { username: String },
}

impl CooldownKey {
    pub fn rule(rule_id: &str, username: &str) -> Self {
        Self::Rule { rule_id: rule_id.to_owned(), username: normalize_subject(username) }
    }

    pub fn command(name: &str, username: &str) -> Self {
        Self::Command { name: name.to_ascii_lowercase(), username: normalize_subject(username) }
    }

    pub fn generative(username: &str) -> Self {
        Self::Generative { username: normalize_subject(username) }
    }
}

fn normalize_subject(username: &str) -> String {
    username.trim().to_lowercase()
}

/// Last-fire timestamps per key. Entries are never removed; a stale entry only
/// matters while `now - last_fire` is inside the window.
#[derive(Clone, Debug, Default)]
pub struct CooldownTracker {
    last_fired: HashMap<CooldownKey, DateTime<Utc>>,
}

impl CooldownTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Permits and records `now` when the key is unknown or its window has
    /// elapsed; otherwise denies without touching state.
    pub fn try_fire(&mut self, key: CooldownKey, window: Duration, now: DateTime<Utc>) -> bool {
        if !self.is_ready(&key, window, now) {
            return false;
        }

        self.last_fired.insert(key, now);
        true
    }

    /// Same check as `try_fire` without recording. Pair with `record` when
    /// the fire is only confirmed later.
    pub fn is_ready(&self, key: &CooldownKey, window: Duration, now: DateTime<Utc>) -> bool {
        self.last_fired.get(key).map_or(true, |last| now.signed_duration_since(*last) >= window)
    }

    pub fn record(&mut self, key: CooldownKey, now: DateTime<Utc>) {
        self.last_fired.insert(key, now);
    }

    pub fn last_fired(&self, key: &CooldownKey) -> Option<DateTime<Utc>> {
        self.last_fired.get(key).copied()
    }

    pub fn len(&self) -> usize {
        self.last_fired.len()
    }

    pub fn is_empty(&self) -> bool {
        self.last_fired.is_empty()
    }
}
