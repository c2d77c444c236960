use std::collections::{HashMap, VecDeque};

use chrono::{DateTime, Duration, Utc};

pub const HISTORY_CAPACITY: usize = 50;
pub const CONTEXT_WINDOW: usize = 20;
pub const EMPTY_CONTEXT: &str = "Chat just started, no previous messages.";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConversationEntry {
    pub username: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UserEngagementState {
    pub username: String,
    pub message_count: u32,
    pub last_response_at: DateTime<Utc>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub entries_removed: usize,
    pub users_removed: usize,
}

/// Rolling chat log used to ground generated replies, plus per-user state for
/// users who have received one.
#[derive(Clone, Debug)]
pub struct ConversationMemory {
    entries: VecDeque<ConversationEntry>,
    users: HashMap<String, UserEngagementState>,
    capacity: usize,
    window: usize,
}

impl Default for ConversationMemory {
    fn default() -> Self {
        Self::new()
    }
}

impl ConversationMemory {
    pub fn new() -> Self {
        Self::with_limits(HISTORY_CAPACITY, CONTEXT_WINDOW)
    }

    pub fn with_limits(capacity: usize, window: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity + 1),
            users: HashMap::new(),
            capacity,
            window: window.min(capacity),
        }
    }

    pub fn record(&mut self, username: &str, message: &str, now: DateTime<Utc>) {
        self.entries.push_back(ConversationEntry {
            username: username.to_owned(),
            message: message.to_owned(),
            timestamp: now,
        });

        while self.entries.len() > self.capacity {
            self.entries.pop_front();
        }
    }

    /// `"username: message"` lines for the most recent entries, oldest first.
    pub fn context_window(&self) -> Vec<String> {
        let skip = self.entries.len().saturating_sub(self.window);
        self.entries
            .iter()
            .skip(skip)
            .map(|entry| format!("{}: {}", entry.username, entry.message))
            .collect()
    }

    pub fn context_text(&self) -> String {
        if self.entries.is_empty() {
            return EMPTY_CONTEXT.to_owned();
        }
        self.context_window().join("\n")
    }

    pub fn note_response(&mut self, username: &str, now: DateTime<Utc>) {
        let state = self.users.entry(username.to_owned()).or_insert_with(|| UserEngagementState {
            username: username.to_owned(),
            message_count: 0,
            last_response_at: now,
        });
        state.message_count = state.message_count.saturating_add(1);
        state.last_response_at = now;
    }

    pub fn engagement(&self, username: &str) -> Option<&UserEngagementState> {
        self.users.get(username)
    }

    /// Drops entries at or before `now - horizon` and users whose last
    /// generated reply predates it.
    pub fn sweep(&mut self, horizon: Duration, now: DateTime<Utc>) -> SweepReport {
        let cutoff = now - horizon;

        let before_entries = self.entries.len();
        self.entries.retain(|entry| entry.timestamp > cutoff);

        let before_users = self.users.len();
        self.users.retain(|_, state| state.last_response_at >= cutoff);

        SweepReport {
            entries_removed: before_entries - self.entries.len(),
            users_removed: before_users - self.users.len(),
        }
    }

    pub fn entries(&self) -> impl Iterator<Item = &ConversationEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn active_users(&self) -> usize {
        self.users.len()
    }
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, Duration, TimeZone, Utc};

    use super::{ConversationMemory, EMPTY_CONTEXT, HISTORY_CAPACITY};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 20, 0, 0).unwrap()
    }

    #[test]
    fn keeps_only_the_most_recent_fifty_entries_in_order() {
        let mut memory = ConversationMemory::new();
        for index in 0..60 {
            memory.record("viewer", &format!("message {index}"), t0());
        }

        assert_eq!(memory.len(), HISTORY_CAPACITY);
        let messages = memory.entries().map(|entry| entry.message.clone()).collect::<Vec<_>>();
        assert_eq!(messages.first().map(String::as_str), Some("message 10"));
        assert_eq!(messages.last().map(String::as_str), Some("message 59"));
    }

    #[test]
    fn context_window_covers_last_twenty_oldest_first() {
        let mut memory = ConversationMemory::new();
        for index in 0..30 {
            memory.record(&format!("user{index}"), "hi", t0());
        }

        let window = memory.context_window();
        assert_eq!(window.len(), 20);
        assert_eq!(window[0], "user10: hi");
        assert_eq!(window[19], "user29: hi");
    }

    #[test]
    fn short_history_yields_short_window_and_placeholder_when_empty() {
        let mut memory = ConversationMemory::new();
        assert_eq!(memory.context_text(), EMPTY_CONTEXT);

        memory.record("alice", "hello", t0());
        memory.record("bob", "yo", t0());

        assert_eq!(memory.context_text(), "alice: hello\nbob: yo");
    }

    #[test]
    fn sweep_evicts_stale_entries_and_users() {
        let mut memory = ConversationMemory::new();
        memory.record("old", "ancient", t0());
        memory.note_response("old", t0());
        memory.record("new", "fresh", t0() + Duration::minutes(50));
        memory.note_response("new", t0() + Duration::minutes(50));

        let report = memory.sweep(Duration::hours(1), t0() + Duration::minutes(70));

        assert_eq!(report.entries_removed, 1);
        assert_eq!(report.users_removed, 1);
        assert_eq!(memory.context_window(), vec!["new: fresh".to_owned()]);
        assert!(memory.engagement("old").is_none());
        assert_eq!(memory.engagement("new").map(|state| state.message_count), Some(1));
    }

    #[test]
    fn note_response_accumulates_per_user() {
        let mut memory = ConversationMemory::new();
        memory.note_response("alice", t0());
        memory.note_response("alice", t0() + Duration::seconds(5));

        let state = memory.engagement("alice").expect("tracked");
        assert_eq!(state.message_count, 2);
        assert_eq!(state.last_response_at, t0() + Duration::seconds(5));
        assert_eq!(memory.active_users(), 1);
    }
}
