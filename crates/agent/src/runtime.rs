use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};

use chatterbox_core::clock::Clock;
use chatterbox_core::config::AppConfig;
use chatterbox_core::cooldown::{CooldownKey, CooldownTracker};
use chatterbox_core::engagement::EngagementPolicy;
use chatterbox_core::matcher::{PlaceholderMode, ResponseRenderer, RuleMatcher};
use chatterbox_core::memory::{ConversationMemory, SweepReport};
use chatterbox_core::random::RandomSource;
use chatterbox_core::rules::RuleBook;
use chrono::Duration;
use serde::Serialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::guardrails::{GuardrailDecision, GuardrailPolicy, SilenceReason};
use crate::llm::{GenerationParams, Generator};
use crate::prompts::PromptLibrary;
use crate::rate::RateWindow;

#[derive(Clone, Debug)]
pub struct ResponderSettings {
    /// Login name; a message containing it counts as a mention.
    pub bot_identity: String,
    pub persona_name: String,
    pub use_mentions: bool,
    pub randomize_responses: bool,
    pub placeholders: PlaceholderMode,
    pub generative_cooldown: Duration,
    pub max_messages_per_minute: u32,
    pub memory_retention: Duration,
    pub generation: GenerationParams,
    pub guardrails: GuardrailPolicy,
}

impl ResponderSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        let bot = &config.bot;
        Self {
            bot_identity: config.twitch.username.trim().to_string(),
            persona_name: bot.persona_name(&config.twitch).to_string(),
            use_mentions: bot.use_mentions,
            randomize_responses: bot.randomize_responses,
            placeholders: if bot.replace_all_placeholders {
                PlaceholderMode::AllOccurrences
            } else {
                PlaceholderMode::FirstOccurrence
            },
            generative_cooldown: seconds(bot.response_cooldown_secs),
            max_messages_per_minute: bot.max_messages_per_minute,
            memory_retention: seconds(bot.memory_retention_secs),
            generation: GenerationParams::from_config(&config.llm),
            guardrails: GuardrailPolicy::from_config(bot),
        }
    }
}

impl Default for ResponderSettings {
    fn default() -> Self {
        Self::from_config(&AppConfig::default())
    }
}

fn seconds(value: u64) -> Duration {
    Duration::seconds(i64::try_from(value).unwrap_or(i64::MAX).min(i64::MAX / 1_000))
}

/// Per-message context: the channel the message arrived on and the id that
/// ties together every log line it produces.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChannelContext {
    pub channel: String,
    pub correlation_id: String,
}

impl ChannelContext {
    pub fn new(channel: impl Into<String>) -> Self {
        Self { channel: channel.into(), correlation_id: Uuid::new_v4().to_string() }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct GenerationRequest {
    pub channel: String,
    pub correlation_id: String,
    pub username: String,
    pub message: String,
    /// Persona and chat context; sent as the system message ahead of
    /// `message`.
    pub system_prompt: String,
    pub params: GenerationParams,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Decision {
    Silent(SilenceReason),
    Reply(String),
    Generate(GenerationRequest),
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ResponderStats {
    pub history_size: usize,
    pub active_users: usize,
    pub generative_enabled: bool,
    pub sent_in_window: u32,
    pub max_per_window: u32,
    pub rules: usize,
    pub commands: usize,
}

struct ResponderState {
    book: RuleBook,
    cooldowns: CooldownTracker,
    memory: ConversationMemory,
    rate: RateWindow,
    random: Box<dyn RandomSource>,
}

/// The per-message decision pipeline. All mutable state sits behind one
/// mutex that is never held across an await.
pub struct Responder {
    settings: ResponderSettings,
    engagement: EngagementPolicy,
    renderer: ResponseRenderer,
    prompts: PromptLibrary,
    generator: Option<Generator>,
    clock: Arc<dyn Clock>,
    rules_path: Option<PathBuf>,
    state: Mutex<ResponderState>,
}

impl Responder {
    pub fn new(
        settings: ResponderSettings,
        book: RuleBook,
        generator: Option<Generator>,
        clock: Arc<dyn Clock>,
        random: Box<dyn RandomSource>,
    ) -> Result<Self, tera::Error> {
        let renderer = ResponseRenderer {
            randomize: settings.randomize_responses,
            placeholders: settings.placeholders,
        };
        let rules_path = book.source().map(|path| path.to_path_buf());
        let state = ResponderState {
            book,
            cooldowns: CooldownTracker::new(),
            memory: ConversationMemory::new(),
            rate: RateWindow::new(settings.max_messages_per_minute),
            random,
        };

        Ok(Self {
            settings,
            engagement: EngagementPolicy::default(),
            renderer,
            prompts: PromptLibrary::new()?,
            generator,
            clock,
            rules_path,
            state: Mutex::new(state),
        })
    }

    pub fn with_engagement(mut self, engagement: EngagementPolicy) -> Self {
        self.engagement = engagement;
        self
    }

    pub fn settings(&self) -> &ResponderSettings {
        &self.settings
    }

    pub fn generative_enabled(&self) -> bool {
        self.generator.is_some()
    }

    fn lock(&self) -> MutexGuard<'_, ResponderState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Runs the synchronous part of the pipeline. The message is recorded
    /// before anything else so context ordering survives deferred generation.
    pub fn decide(&self, ctx: &ChannelContext, sender: &str, text: &str) -> Decision {
        let now = self.clock.now();
        let mut guard = self.lock();
        let state = &mut *guard;

        state.memory.record(sender, text, now);
        debug!(
            event_name = "responder.message.recorded",
            correlation_id = %ctx.correlation_id,
            username = sender,
            history_size = state.memory.len(),
            "message recorded"
        );

        let guardrails = &self.settings.guardrails;
        if let GuardrailDecision::Deny { reason } =
            guardrails.evaluate(sender, text, state.rate.is_open())
        {
            if reason == SilenceReason::RateLimited {
                warn!(
                    event_name = "responder.rate.closed",
                    correlation_id = %ctx.correlation_id,
                    sent = state.rate.sent(),
                    max = state.rate.max(),
                    "rate window exhausted, suppressing reply"
                );
            } else {
                debug!(
                    event_name = "responder.admission.denied",
                    correlation_id = %ctx.correlation_id,
                    username = sender,
                    reason_code = reason.reason_code(),
                    "message not admitted"
                );
            }
            return Decision::Silent(reason);
        }

        let mut matcher = RuleMatcher::new(
            &state.book,
            &mut state.cooldowns,
            state.random.as_mut(),
            now,
        );

        if let Some(command) = matcher.match_command(text, sender) {
            let reply = self.format_reply(sender, &command.response);
            info!(
                event_name = "responder.command.matched",
                correlation_id = %ctx.correlation_id,
                username = sender,
                command = %command.name,
                "command matched"
            );
            return self.emit(&mut state.rate, reply);
        }

        if let Some(rule) = matcher.match_rule(text, sender) {
            match self.renderer.render(&rule.rule, sender, state.random.as_mut()) {
                Some(response) => {
                    info!(
                        event_name = "responder.rule.matched",
                        correlation_id = %ctx.correlation_id,
                        username = sender,
                        rule_id = %rule.rule.id,
                        "rule matched"
                    );
                    let reply = self.format_reply(sender, &response);
                    return self.emit(&mut state.rate, reply);
                }
                None => debug!(
                    event_name = "responder.rule.no_responses",
                    correlation_id = %ctx.correlation_id,
                    rule_id = %rule.rule.id,
                    "matched rule has no responses"
                ),
            }
        }

        if self.generator.is_none() {
            return Decision::Silent(SilenceReason::GenerativeUnavailable);
        }

        let identity = self.settings.bot_identity.as_str();
        let Some(trigger) = self.engagement.assess(text, identity, state.random.as_mut()) else {
            return Decision::Silent(SilenceReason::NotEngaged);
        };

        let cooldown = CooldownKey::generative(sender);
        if !state.cooldowns.is_ready(&cooldown, self.settings.generative_cooldown, now) {
            debug!(
                event_name = "responder.generative.cooldown",
                correlation_id = %ctx.correlation_id,
                username = sender,
                "generative reply on cooldown"
            );
            return Decision::Silent(SilenceReason::GenerativeCooldown);
        }

        let context = state.memory.context_text();
        let persona = self.settings.persona_name.as_str();
        let system_prompt = match self.prompts.chat_reply(persona, &context, sender, text) {
            Ok(prompt) => prompt,
            Err(error) => {
                warn!(
                    event_name = "responder.prompt.render_failed",
                    correlation_id = %ctx.correlation_id,
                    error = %error,
                    "could not render chat prompt"
                );
                return Decision::Silent(SilenceReason::GenerativeUnavailable);
            }
        };

        debug!(
            event_name = "responder.generative.requested",
            correlation_id = %ctx.correlation_id,
            username = sender,
            trigger = trigger.as_str(),
            "requesting generative reply"
        );

        Decision::Generate(GenerationRequest {
            channel: ctx.channel.clone(),
            correlation_id: ctx.correlation_id.clone(),
            username: sender.to_string(),
            message: text.to_string(),
            system_prompt,
            params: self.settings.generation,
        })
    }

    /// Finishes a deferred generation. The rate window is checked again
    /// because other replies may have closed it while the call was in flight.
    /// The sender's generative cooldown starts only once a reply is ready.
    pub async fn complete(&self, request: GenerationRequest) -> Option<String> {
        let generator = self.generator.as_ref()?;
        let generation = generator
            .generate(Some(request.system_prompt.as_str()), &request.message, &request.params)
            .await;
        let outcome = generation.outcome();

        let Some(text) = generation.into_text() else {
            debug!(
                event_name = "responder.generative.no_reply",
                correlation_id = %request.correlation_id,
                outcome,
                "generation produced no reply"
            );
            return None;
        };

        let now = self.clock.now();
        let cooldown = CooldownKey::generative(&request.username);
        let mut state = self.lock();
        if !state.cooldowns.is_ready(&cooldown, self.settings.generative_cooldown, now) {
            debug!(
                event_name = "responder.generative.superseded",
                correlation_id = %request.correlation_id,
                username = %request.username,
                "another reply to this user landed first, dropping reply"
            );
            return None;
        }
        if !state.rate.try_record() {
            warn!(
                event_name = "responder.generative.dropped",
                correlation_id = %request.correlation_id,
                "rate window closed while generating, dropping reply"
            );
            return None;
        }
        state.cooldowns.record(cooldown, now);
        state.memory.note_response(&request.username, now);

        info!(
            event_name = "responder.generative.completed",
            correlation_id = %request.correlation_id,
            username = %request.username,
            "generative reply ready"
        );
        Some(self.format_reply(&request.username, &text))
    }

    /// The whole pipeline for one message.
    pub async fn on_message(&self, ctx: &ChannelContext, sender: &str, text: &str) -> Option<String> {
        match self.decide(ctx, sender, text) {
            Decision::Silent(_) => None,
            Decision::Reply(reply) => Some(reply),
            Decision::Generate(request) => self.complete(request).await,
        }
    }

    fn emit(&self, rate: &mut RateWindow, reply: String) -> Decision {
        if rate.try_record() {
            Decision::Reply(reply)
        } else {
            Decision::Silent(SilenceReason::RateLimited)
        }
    }

    pub fn format_reply(&self, sender: &str, text: &str) -> String {
        if self.settings.use_mentions {
            format!("@{sender} {text}")
        } else {
            text.to_string()
        }
    }

    /// Re-reads the rule file and swaps it in. Unreadable or malformed files
    /// swap in an empty book.
    pub fn reload_rules(&self) -> usize {
        let Some(path) = self.rules_path.as_deref() else {
            warn!(event_name = "responder.rules.reload_skipped", "no rule file to reload");
            return self.lock().book.rules().len();
        };

        let book = RuleBook::load_or_empty(path);
        let count = book.rules().len();
        self.lock().book = book;

        info!(
            event_name = "responder.rules.reloaded",
            path = %path.display(),
            rules = count,
            "rule book reloaded"
        );
        count
    }

    pub fn reset_rate_window(&self) -> u32 {
        let sent = self.lock().rate.reset();
        debug!(event_name = "responder.rate.reset", sent, "rate window reset");
        sent
    }

    pub fn sweep_memory(&self) -> SweepReport {
        let now = self.clock.now();
        let report = self.lock().memory.sweep(self.settings.memory_retention, now);
        debug!(
            event_name = "responder.memory.swept",
            entries_removed = report.entries_removed,
            users_removed = report.users_removed,
            "conversation memory swept"
        );
        report
    }

    pub fn context_window(&self) -> Vec<String> {
        self.lock().memory.context_window()
    }

    pub fn stats(&self) -> ResponderStats {
        let state = self.lock();
        ResponderStats {
            history_size: state.memory.len(),
            active_users: state.memory.active_users(),
            generative_enabled: self.generator.is_some(),
            sent_in_window: state.rate.sent(),
            max_per_window: state.rate.max(),
            rules: state.book.rules().len(),
            commands: state.book.commands().list.len(),
        }
    }
}
