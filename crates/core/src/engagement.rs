use crate::random::RandomSource;

pub const DEFAULT_KEYWORDS: [&str; 7] = ["bot", "help", "how", "what", "why", "when", "where"];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EngagementTrigger {
    Question,
    Mention,
    Keyword,
    Ambient,
}

impl EngagementTrigger {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Question => "question",
            Self::Mention => "mention",
            Self::Keyword => "keyword",
            Self::Ambient => "ambient",
        }
    }
}

/// Gate in front of the generative fallback. Direct address always engages;
/// keyword and ambient chatter engage by chance.
#[derive(Clone, Debug, PartialEq)]
pub struct EngagementPolicy {
    pub keywords: Vec<String>,
    pub keyword_probability: f64,
    pub ambient_probability: f64,
}

impl Default for EngagementPolicy {
    fn default() -> Self {
        Self {
            keywords: DEFAULT_KEYWORDS.iter().map(|keyword| (*keyword).to_owned()).collect(),
            keyword_probability: 0.5,
            ambient_probability: 0.1,
        }
    }
}

impl EngagementPolicy {
    pub fn should_engage(
        &self,
        message: &str,
        bot_identity: &str,
        random: &mut dyn RandomSource,
    ) -> bool {
        self.assess(message, bot_identity, random).is_some()
    }

    /// Which heuristic fired, or `None` to stay quiet.
    pub fn assess(
        &self,
        message: &str,
        bot_identity: &str,
        random: &mut dyn RandomSource,
    ) -> Option<EngagementTrigger> {
        if message.contains('?') {
            return Some(EngagementTrigger::Question);
        }

        let lowered = message.to_lowercase();
        let identity = bot_identity.trim().to_lowercase();
        if !identity.is_empty() && lowered.contains(&identity) {
            return Some(EngagementTrigger::Mention);
        }

        let has_keyword = self.keywords.iter().any(|keyword| lowered.contains(keyword.as_str()));
        if has_keyword {
            return (random.next_f64() < self.keyword_probability)
                .then_some(EngagementTrigger::Keyword);
        }

        (random.next_f64() < self.ambient_probability).then_some(EngagementTrigger::Ambient)
    }
}
