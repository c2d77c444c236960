//! Response engine for the chat bot.
//!
//! Turns one inbound chat message plus the rolling conversation history into
//! at most one outbound line:
//! 1. **Admission** (`guardrails`) - ignore list, minimum length, admin switch, rate window
//! 2. **Commands and rules** (`chatterbox_core::matcher`) - deterministic replies
//! 3. **Generative fallback** (`llm`, `prompts`) - best-effort, bounded by a timeout
//!
//! # Key Types
//!
//! - `Responder` - per-message orchestrator (see `runtime` module)
//! - `LlmClient` - pluggable completion capability
//! - `Greeter` / `Announcer` - unsolicited welcome lines
//! - `MaintenanceTasks` - rate-window reset, memory sweep and announcement timers
//!
//! Every failure after a message arrives degrades to silence.

pub mod greeter;
pub mod guardrails;
pub mod llm;
pub mod maintenance;
pub mod prompts;
pub mod rate;
pub mod runtime;

pub use greeter::{Announcer, Greeter};
pub use guardrails::{GuardrailDecision, GuardrailPolicy, SilenceReason};
pub use llm::{Generation, GenerationParams, Generator, LlmClient, LlmError, OpenAiCompatibleClient};
pub use maintenance::{AnnouncementTarget, MaintenanceSchedule, MaintenanceTasks, MessageSink};
pub use runtime::{ChannelContext, Decision, GenerationRequest, Responder, ResponderSettings, ResponderStats};
