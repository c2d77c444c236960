use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};

use chatterbox_core::random::RandomSource;
use tracing::{debug, info};

use crate::guardrails::GuardrailPolicy;
use crate::llm::{Generation, GenerationParams, Generator};
use crate::prompts::PromptLibrary;

pub const JOIN_GREETING_PARAMS: GenerationParams = GenerationParams::new(1.2, 100);
pub const ANNOUNCEMENT_PARAMS: GenerationParams = GenerationParams::new(1.5, 100);
pub const ANNOUNCEMENT_MAX_CHARS: usize = 250;

const FIRST_VISIT_FALLBACKS: [&str; 7] = [
    "🎮 {user} has entered the chat for the FIRST TIME! Welcome aboard! 🏆",
    "⚡ {user} just spawned in! Fresh player detected! 😅",
    "🎪 Ladies and gentlemen, NEW VIEWER {user} has arrived! *throws confetti* 🎉",
    "🚀 {user} joined the stream! First time's the charm! 🌟",
    "👾 Wild {user} appeared for the first time! Welcome! ✨",
    "🎬 {user} has entered the arena! New challenger approaching! 💪",
    "🌈 {user} is here! First timer! The stream just leveled up 😎",
];

const RETURN_VISIT_FALLBACKS: [&str; 10] = [
    "🎮 {user} is BACK! Welcome home! 🏆",
    "⚡ {user} returned! They couldn't stay away! 😅",
    "🎪 Look who's back! {user} has returned! 🎉",
    "🚀 {user} is back for more! Welcome back! 🌟",
    "👾 {user} appeared again! The legend returns! ✨",
    "🎬 {user} is back in the arena! Round 2! 💪",
    "🌈 {user} returned! We missed you! 😎",
    "🎯 {user} came back! Once wasn't enough! 🔥",
    "🎨 {user} painted themselves back into chat! Welcome back! 🖌️",
    "⚔️ {user} rejoined the party! The gang's back together! 🛡️",
];

const ANNOUNCEMENT_FALLBACKS: [&str; 5] = [
    "Welcome to the stream! 🎮",
    "Hey everyone! Let's vibe! ✨",
    "We're live! 🔥",
    "What's up, legends? 🌟",
    "Welcome in! 💜",
];

struct GreeterState {
    greeted: HashSet<String>,
    visits: HashMap<String, u32>,
    random: Box<dyn RandomSource>,
}

/// Welcomes viewers as they join. Each viewer is greeted at most once per
/// process; parts and rejoins do not reset that.
pub struct Greeter {
    channel_owner: String,
    guardrails: GuardrailPolicy,
    prompts: PromptLibrary,
    generator: Option<Generator>,
    state: Mutex<GreeterState>,
}

impl Greeter {
    pub fn new(
        channel_owner: &str,
        guardrails: GuardrailPolicy,
        generator: Option<Generator>,
        random: Box<dyn RandomSource>,
    ) -> Result<Self, tera::Error> {
        Ok(Self {
            channel_owner: channel_owner.trim().trim_start_matches('#').to_lowercase(),
            guardrails,
            prompts: PromptLibrary::new()?,
            generator,
            state: Mutex::new(GreeterState {
                greeted: HashSet::new(),
                visits: HashMap::new(),
                random,
            }),
        })
    }

    fn lock(&self) -> MutexGuard<'_, GreeterState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Claims a greeting slot for `username`, returning the visit number, or
    /// `None` when the viewer should not be greeted.
    fn admit(&self, username: &str) -> Option<u32> {
        let key = username.trim().to_lowercase();
        if key.is_empty() || key == self.channel_owner || self.guardrails.is_ignored(&key) {
            return None;
        }

        let mut state = self.lock();
        if !state.greeted.insert(key.clone()) {
            return None;
        }
        let visits = state.visits.entry(key).or_insert(0);
        *visits += 1;
        Some(*visits)
    }

    pub async fn greet(&self, username: &str) -> Option<String> {
        let visits = self.admit(username)?;

        let generated = match (&self.generator, self.prompts.join_greeting(username, visits)) {
            (Some(generator), Ok(prompt)) => {
                generator.generate(None, &prompt, &JOIN_GREETING_PARAMS).await
            }
            _ => Generation::Empty,
        };

        let greeting = match generated {
            Generation::Success(text) => text,
            other => {
                debug!(
                    event_name = "greeter.fallback",
                    username,
                    outcome = other.outcome(),
                    "using fallback greeting"
                );
                self.fallback(username, visits)
            }
        };

        info!(event_name = "greeter.greeted", username, visits, "viewer greeted");
        Some(greeting)
    }

    pub fn visits(&self, username: &str) -> u32 {
        self.lock().visits.get(&username.trim().to_lowercase()).copied().unwrap_or(0)
    }

    fn fallback(&self, username: &str, visits: u32) -> String {
        let pool: &[&str] =
            if visits > 1 { &RETURN_VISIT_FALLBACKS } else { &FIRST_VISIT_FALLBACKS };
        let index = self.lock().random.pick(pool.len());
        pool[index].replace("{user}", username)
    }
}

/// Produces the periodic streamer-voice welcome line.
pub struct Announcer {
    prompts: PromptLibrary,
    generator: Option<Generator>,
    random: Mutex<Box<dyn RandomSource>>,
}

impl Announcer {
    pub fn new(
        generator: Option<Generator>,
        random: Box<dyn RandomSource>,
    ) -> Result<Self, tera::Error> {
        Ok(Self { prompts: PromptLibrary::new()?, generator, random: Mutex::new(random) })
    }

    pub async fn next_announcement(&self) -> String {
        if let (Some(generator), Ok(prompt)) = (&self.generator, self.prompts.announcement()) {
            let generated = generator.generate(None, &prompt, &ANNOUNCEMENT_PARAMS).await;
            if let Generation::Success(text) = generated {
                let tidied = tidy_announcement(&text);
                if !tidied.is_empty() {
                    return tidied;
                }
            }
        }

        let index = self
            .random
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .pick(ANNOUNCEMENT_FALLBACKS.len());
        ANNOUNCEMENT_FALLBACKS[index].to_string()
    }
}

/// Drops one wrapping quote at each end and caps the length.
pub fn tidy_announcement(text: &str) -> String {
    let text = text.trim();
    let text = text.strip_prefix(['"', '\'']).unwrap_or(text);
    let text = text.strip_suffix(['"', '\'']).unwrap_or(text);

    if text.chars().count() > ANNOUNCEMENT_MAX_CHARS {
        let head: String = text.chars().take(ANNOUNCEMENT_MAX_CHARS - 3).collect();
        format!("{head}...")
    } else {
        text.to_string()
    }
}
