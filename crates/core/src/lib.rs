//! Deterministic building blocks of the chat responder: configuration, the
//! rule document and its matcher, cooldowns, conversation memory, and the
//! engagement gate. Nothing in this crate performs I/O beyond reading files.

pub mod clock;
pub mod config;
pub mod cooldown;
pub mod engagement;
pub mod matcher;
pub mod memory;
pub mod random;
pub mod rules;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{AppConfig, ConfigError, ConfigOverrides, LoadOptions, LogFormat};
pub use cooldown::{CooldownKey, CooldownTracker};
pub use engagement::{EngagementPolicy, EngagementTrigger};
pub use matcher::{PlaceholderMode, ResponseRenderer, RuleMatcher};
pub use memory::{ConversationEntry, ConversationMemory, SweepReport, UserEngagementState};
pub use random::{RandomSource, ScriptedRandom, SeededRandom};
pub use rules::{
    Command, CommandSettings, CompiledRule, Rule, RuleBook, RuleDiagnostic, RuleDocument,
    RuleLoadError, Severity, TriggerType,
};
