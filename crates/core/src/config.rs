use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_TWITCH_SERVER_URL: &str = "wss://irc-ws.chat.twitch.tv:443";
pub const DEFAULT_LLM_BASE_URL: &str = "https://api.groq.com/openai/v1";
pub const DEFAULT_LLM_MODEL: &str = "llama-3.3-70b-versatile";
pub const DEFAULT_RULES_PATH: &str = "config/guidelines.json";
pub const DEFAULT_IGNORED_USERS: [&str; 3] = ["nightbot", "streamelements", "streamlabs"];

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub twitch: TwitchConfig,
    pub llm: LlmConfig,
    pub bot: BotConfig,
    pub greetings: GreetingsConfig,
    pub announcements: AnnouncementsConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct TwitchConfig {
    pub username: String,
    pub oauth_token: SecretString,
    pub channel: String,
    pub server_url: String,
}

#[derive(Clone, Debug)]
pub struct LlmConfig {
    pub api_key: Option<SecretString>,
    pub base_url: String,
    pub model: String,
    pub timeout_secs: u64,
    pub temperature: f32,
    pub max_tokens: u32,
}

#[derive(Clone, Debug)]
pub struct BotConfig {
    pub enabled: bool,
    pub display_name: Option<String>,
    pub rules_path: PathBuf,
    pub response_cooldown_secs: u64,
    pub max_messages_per_minute: u32,
    pub use_mentions: bool,
    pub randomize_responses: bool,
    pub min_message_length: usize,
    pub ignored_users: Vec<String>,
    pub replace_all_placeholders: bool,
    pub memory_retention_secs: u64,
    pub memory_sweep_secs: u64,
}

#[derive(Clone, Debug)]
pub struct GreetingsConfig {
    pub enabled: bool,
}

#[derive(Clone, Debug)]
pub struct AnnouncementsConfig {
    pub enabled: bool,
    pub interval_secs: u64,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub health_check_port: u16,
    pub graceful_shutdown_secs: u64,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub log_level: Option<String>,
    pub twitch_username: Option<String>,
    pub twitch_oauth_token: Option<String>,
    pub twitch_channel: Option<String>,
    pub llm_model: Option<String>,
    pub rules_path: Option<PathBuf>,
    pub bot_enabled: Option<bool>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            twitch: TwitchConfig {
                username: String::new(),
                oauth_token: String::new().into(),
                channel: String::new(),
                server_url: DEFAULT_TWITCH_SERVER_URL.to_string(),
            },
            llm: LlmConfig {
                api_key: None,
                base_url: DEFAULT_LLM_BASE_URL.to_string(),
                model: DEFAULT_LLM_MODEL.to_string(),
                timeout_secs: 15,
                temperature: 1.0,
                max_tokens: 120,
            },
            bot: BotConfig {
                enabled: true,
                display_name: None,
                rules_path: PathBuf::from(DEFAULT_RULES_PATH),
                response_cooldown_secs: 0,
                max_messages_per_minute: 20,
                use_mentions: true,
                randomize_responses: true,
                min_message_length: 3,
                ignored_users: DEFAULT_IGNORED_USERS.iter().map(|user| user.to_string()).collect(),
                replace_all_placeholders: false,
                memory_retention_secs: 3_600,
                memory_sweep_secs: 1_800,
            },
            greetings: GreetingsConfig { enabled: false },
            announcements: AnnouncementsConfig { enabled: false, interval_secs: 100 },
            server: ServerConfig {
                bind_address: "0.0.0.0".to_string(),
                health_check_port: 8080,
                graceful_shutdown_secs: 10,
            },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

fn secret_value(value: String) -> SecretString {
    value.into()
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl TwitchConfig {
    /// Channel name without the leading `#`, lowercased.
    pub fn channel_name(&self) -> String {
        self.channel.trim().trim_start_matches('#').to_lowercase()
    }
}

impl LlmConfig {
    pub fn is_configured(&self) -> bool {
        self.api_key.as_ref().is_some_and(|key| !key.expose_secret().trim().is_empty())
    }
}

impl BotConfig {
    /// Name the bot introduces itself with in prompts. Branding only; chat
    /// mentions are matched against the login name.
    pub fn persona_name<'a>(&'a self, twitch: &'a TwitchConfig) -> &'a str {
        self.display_name
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| twitch.username.trim())
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected =
                options.config_path.unwrap_or_else(|| PathBuf::from("chatterbox.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(twitch) = patch.twitch {
            if let Some(username) = twitch.username {
                self.twitch.username = username;
            }
            if let Some(twitch_oauth_token_value) = twitch.oauth_token {
                self.twitch.oauth_token = secret_value(twitch_oauth_token_value);
            }
            if let Some(channel) = twitch.channel {
                self.twitch.channel = channel;
            }
            if let Some(server_url) = twitch.server_url {
                self.twitch.server_url = server_url;
            }
        }

        if let Some(llm) = patch.llm {
            if let Some(llm_api_key_value) = llm.api_key {
                self.llm.api_key = Some(secret_value(llm_api_key_value));
            }
            if let Some(base_url) = llm.base_url {
                self.llm.base_url = base_url;
            }
            if let Some(model) = llm.model {
                self.llm.model = model;
            }
            if let Some(timeout_secs) = llm.timeout_secs {
                self.llm.timeout_secs = timeout_secs;
            }
            if let Some(temperature) = llm.temperature {
                self.llm.temperature = temperature;
            }
            if let Some(max_tokens) = llm.max_tokens {
                self.llm.max_tokens = max_tokens;
            }
        }

        if let Some(bot) = patch.bot {
            if let Some(enabled) = bot.enabled {
                self.bot.enabled = enabled;
            }
            if let Some(display_name) = bot.display_name {
                self.bot.display_name = Some(display_name);
            }
            if let Some(rules_path) = bot.rules_path {
                self.bot.rules_path = rules_path;
            }
            if let Some(response_cooldown_secs) = bot.response_cooldown_secs {
                self.bot.response_cooldown_secs = response_cooldown_secs;
            }
            if let Some(max_messages_per_minute) = bot.max_messages_per_minute {
                self.bot.max_messages_per_minute = max_messages_per_minute;
            }
            if let Some(use_mentions) = bot.use_mentions {
                self.bot.use_mentions = use_mentions;
            }
            if let Some(randomize_responses) = bot.randomize_responses {
                self.bot.randomize_responses = randomize_responses;
            }
            if let Some(min_message_length) = bot.min_message_length {
                self.bot.min_message_length = min_message_length;
            }
            if let Some(ignored_users) = bot.ignored_users {
                self.bot.ignored_users = ignored_users;
            }
            if let Some(replace_all_placeholders) = bot.replace_all_placeholders {
                self.bot.replace_all_placeholders = replace_all_placeholders;
            }
            if let Some(memory_retention_secs) = bot.memory_retention_secs {
                self.bot.memory_retention_secs = memory_retention_secs;
            }
            if let Some(memory_sweep_secs) = bot.memory_sweep_secs {
                self.bot.memory_sweep_secs = memory_sweep_secs;
            }
        }

        if let Some(greetings) = patch.greetings {
            if let Some(enabled) = greetings.enabled {
                self.greetings.enabled = enabled;
            }
        }

        if let Some(announcements) = patch.announcements {
            if let Some(enabled) = announcements.enabled {
                self.announcements.enabled = enabled;
            }
            if let Some(interval_secs) = announcements.interval_secs {
                self.announcements.interval_secs = interval_secs;
            }
        }

        if let Some(server) = patch.server {
            if let Some(bind_address) = server.bind_address {
                self.server.bind_address = bind_address;
            }
            if let Some(health_check_port) = server.health_check_port {
                self.server.health_check_port = health_check_port;
            }
            if let Some(graceful_shutdown_secs) = server.graceful_shutdown_secs {
                self.server.graceful_shutdown_secs = graceful_shutdown_secs;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        let username = read_env("CHATTERBOX_TWITCH_USERNAME")
            .or_else(|| read_env("TWITCH_BOT_USERNAME"))
            .or_else(|| read_env("TWITCH_USERNAME"));
        if let Some(value) = username {
            self.twitch.username = value;
        }
        let oauth_token =
            read_env("CHATTERBOX_TWITCH_OAUTH_TOKEN").or_else(|| read_env("TWITCH_OAUTH_TOKEN"));
        if let Some(value) = oauth_token {
            self.twitch.oauth_token = secret_value(value);
        }
        let channel = read_env("CHATTERBOX_TWITCH_CHANNEL").or_else(|| read_env("TWITCH_CHANNEL"));
        if let Some(value) = channel {
            self.twitch.channel = value;
        }
        if let Some(value) = read_env("CHATTERBOX_TWITCH_SERVER_URL") {
            self.twitch.server_url = value;
        }

        let api_key = read_env("CHATTERBOX_LLM_API_KEY").or_else(|| read_env("GROQ_API_KEY"));
        if let Some(value) = api_key {
            self.llm.api_key = Some(secret_value(value));
        }
        if let Some(value) = read_env("CHATTERBOX_LLM_BASE_URL") {
            self.llm.base_url = value;
        }
        if let Some(value) = read_env("CHATTERBOX_LLM_MODEL") {
            self.llm.model = value;
        }
        if let Some(value) = read_env("CHATTERBOX_LLM_TIMEOUT_SECS") {
            self.llm.timeout_secs = parse_u64("CHATTERBOX_LLM_TIMEOUT_SECS", &value)?;
        }
        if let Some(value) = read_env("CHATTERBOX_LLM_TEMPERATURE") {
            self.llm.temperature = parse_f32("CHATTERBOX_LLM_TEMPERATURE", &value)?;
        }
        if let Some(value) = read_env("CHATTERBOX_LLM_MAX_TOKENS") {
            self.llm.max_tokens = parse_u32("CHATTERBOX_LLM_MAX_TOKENS", &value)?;
        }

        if let Some(value) = read_env("CHATTERBOX_BOT_ENABLED") {
            self.bot.enabled = parse_bool("CHATTERBOX_BOT_ENABLED", &value)?;
        } else if let Some(value) = read_env("BOT_ENABLED") {
            self.bot.enabled = parse_bool("BOT_ENABLED", &value)?;
        }
        let display_name =
            read_env("CHATTERBOX_BOT_DISPLAY_NAME").or_else(|| read_env("BOT_DISPLAY_NAME"));
        if let Some(value) = display_name {
            self.bot.display_name = Some(value);
        }
        if let Some(value) = read_env("CHATTERBOX_BOT_RULES_PATH") {
            self.bot.rules_path = PathBuf::from(value);
        }
        if let Some(value) = read_env("CHATTERBOX_BOT_RESPONSE_COOLDOWN_SECS") {
            self.bot.response_cooldown_secs =
                parse_u64("CHATTERBOX_BOT_RESPONSE_COOLDOWN_SECS", &value)?;
        }
        if let Some(value) = read_env("CHATTERBOX_BOT_MAX_MESSAGES_PER_MINUTE") {
            self.bot.max_messages_per_minute =
                parse_u32("CHATTERBOX_BOT_MAX_MESSAGES_PER_MINUTE", &value)?;
        }
        if let Some(value) = read_env("CHATTERBOX_BOT_USE_MENTIONS") {
            self.bot.use_mentions = parse_bool("CHATTERBOX_BOT_USE_MENTIONS", &value)?;
        }
        if let Some(value) = read_env("CHATTERBOX_BOT_RANDOMIZE_RESPONSES") {
            self.bot.randomize_responses =
                parse_bool("CHATTERBOX_BOT_RANDOMIZE_RESPONSES", &value)?;
        }
        if let Some(value) = read_env("CHATTERBOX_BOT_MIN_MESSAGE_LENGTH") {
            self.bot.min_message_length =
                parse_usize("CHATTERBOX_BOT_MIN_MESSAGE_LENGTH", &value)?;
        }
        if let Some(value) = read_env("CHATTERBOX_BOT_IGNORED_USERS") {
            self.bot.ignored_users = split_list(&value);
        }
        if let Some(value) = read_env("CHATTERBOX_BOT_REPLACE_ALL_PLACEHOLDERS") {
            self.bot.replace_all_placeholders =
                parse_bool("CHATTERBOX_BOT_REPLACE_ALL_PLACEHOLDERS", &value)?;
        }
        if let Some(value) = read_env("CHATTERBOX_BOT_MEMORY_RETENTION_SECS") {
            self.bot.memory_retention_secs =
                parse_u64("CHATTERBOX_BOT_MEMORY_RETENTION_SECS", &value)?;
        }
        if let Some(value) = read_env("CHATTERBOX_BOT_MEMORY_SWEEP_SECS") {
            self.bot.memory_sweep_secs = parse_u64("CHATTERBOX_BOT_MEMORY_SWEEP_SECS", &value)?;
        }

        if let Some(value) = read_env("CHATTERBOX_GREETINGS_ENABLED") {
            self.greetings.enabled = parse_bool("CHATTERBOX_GREETINGS_ENABLED", &value)?;
        }
        if let Some(value) = read_env("CHATTERBOX_ANNOUNCEMENTS_ENABLED") {
            self.announcements.enabled = parse_bool("CHATTERBOX_ANNOUNCEMENTS_ENABLED", &value)?;
        }
        if let Some(value) = read_env("CHATTERBOX_ANNOUNCEMENTS_INTERVAL_SECS") {
            self.announcements.interval_secs =
                parse_u64("CHATTERBOX_ANNOUNCEMENTS_INTERVAL_SECS", &value)?;
        }

        if let Some(value) = read_env("CHATTERBOX_SERVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        let port = read_env("CHATTERBOX_SERVER_HEALTH_CHECK_PORT").map(|value| {
            ("CHATTERBOX_SERVER_HEALTH_CHECK_PORT", value)
        });
        if let Some((key, value)) = port.or_else(|| read_env("PORT").map(|value| ("PORT", value)))
        {
            self.server.health_check_port = parse_u16(key, &value)?;
        }
        if let Some(value) = read_env("CHATTERBOX_SERVER_GRACEFUL_SHUTDOWN_SECS") {
            self.server.graceful_shutdown_secs =
                parse_u64("CHATTERBOX_SERVER_GRACEFUL_SHUTDOWN_SECS", &value)?;
        }

        let log_level =
            read_env("CHATTERBOX_LOGGING_LEVEL").or_else(|| read_env("CHATTERBOX_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("CHATTERBOX_LOGGING_FORMAT").or_else(|| read_env("CHATTERBOX_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(username) = overrides.twitch_username {
            self.twitch.username = username;
        }
        if let Some(oauth_token) = overrides.twitch_oauth_token {
            self.twitch.oauth_token = secret_value(oauth_token);
        }
        if let Some(channel) = overrides.twitch_channel {
            self.twitch.channel = channel;
        }
        if let Some(llm_model) = overrides.llm_model {
            self.llm.model = llm_model;
        }
        if let Some(rules_path) = overrides.rules_path {
            self.bot.rules_path = rules_path;
        }
        if let Some(enabled) = overrides.bot_enabled {
            self.bot.enabled = enabled;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_twitch(&self.twitch)?;
        validate_llm(&self.llm)?;
        validate_bot(&self.bot)?;
        validate_announcements(&self.announcements)?;
        validate_server(&self.server)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("chatterbox.toml"), PathBuf::from("config/chatterbox.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_twitch(twitch: &TwitchConfig) -> Result<(), ConfigError> {
    if twitch.username.trim().is_empty() {
        return Err(ConfigError::Validation(
            "twitch.username is required (the bot account's login name)".to_string(),
        ));
    }

    let token = twitch.oauth_token.expose_secret();
    if token.is_empty() {
        return Err(ConfigError::Validation(
            "twitch.oauth_token is required. Generate a chat token for the bot account and set TWITCH_OAUTH_TOKEN".to_string(),
        ));
    }
    if !token.starts_with("oauth:") {
        return Err(ConfigError::Validation(
            "twitch.oauth_token must start with `oauth:`".to_string(),
        ));
    }

    if twitch.channel_name().is_empty() {
        return Err(ConfigError::Validation(
            "twitch.channel is required (the channel to join, without `#`)".to_string(),
        ));
    }

    let url = twitch.server_url.trim();
    if !url.starts_with("ws://") && !url.starts_with("wss://") {
        return Err(ConfigError::Validation(
            "twitch.server_url must start with ws:// or wss://".to_string(),
        ));
    }

    Ok(())
}

fn validate_llm(llm: &LlmConfig) -> Result<(), ConfigError> {
    if llm.timeout_secs == 0 || llm.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "llm.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    if !llm.temperature.is_finite() || !(0.0..=2.0).contains(&llm.temperature) {
        return Err(ConfigError::Validation(
            "llm.temperature must be in range 0.0..=2.0".to_string(),
        ));
    }

    if llm.max_tokens == 0 {
        return Err(ConfigError::Validation(
            "llm.max_tokens must be greater than zero".to_string(),
        ));
    }

    if llm.model.trim().is_empty() {
        return Err(ConfigError::Validation("llm.model must not be empty".to_string()));
    }

    let base_url = llm.base_url.trim();
    if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
        return Err(ConfigError::Validation(
            "llm.base_url must start with http:// or https://".to_string(),
        ));
    }

    Ok(())
}

fn validate_bot(bot: &BotConfig) -> Result<(), ConfigError> {
    if bot.max_messages_per_minute == 0 {
        return Err(ConfigError::Validation(
            "bot.max_messages_per_minute must be greater than zero".to_string(),
        ));
    }

    if bot.memory_sweep_secs == 0 {
        return Err(ConfigError::Validation(
            "bot.memory_sweep_secs must be greater than zero".to_string(),
        ));
    }

    if bot.rules_path.as_os_str().is_empty() {
        return Err(ConfigError::Validation("bot.rules_path must not be empty".to_string()));
    }

    Ok(())
}

fn validate_announcements(announcements: &AnnouncementsConfig) -> Result<(), ConfigError> {
    if announcements.enabled && announcements.interval_secs == 0 {
        return Err(ConfigError::Validation(
            "announcements.interval_secs must be greater than zero when announcements are enabled"
                .to_string(),
        ));
    }

    Ok(())
}

fn validate_server(server: &ServerConfig) -> Result<(), ConfigError> {
    if server.health_check_port == 0 {
        return Err(ConfigError::Validation(
            "server.health_check_port must be greater than zero".to_string(),
        ));
    }

    if server.graceful_shutdown_secs == 0 {
        return Err(ConfigError::Validation(
            "server.graceful_shutdown_secs must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

fn invalid_override(key: &str, value: &str) -> ConfigError {
    ConfigError::InvalidEnvOverride { key: key.to_string(), value: value.to_string() }
}

fn parse_u16(key: &str, value: &str) -> Result<u16, ConfigError> {
    value.trim().parse::<u16>().map_err(|_| invalid_override(key, value))
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value.trim().parse::<u32>().map_err(|_| invalid_override(key, value))
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.trim().parse::<u64>().map_err(|_| invalid_override(key, value))
}

fn parse_usize(key: &str, value: &str) -> Result<usize, ConfigError> {
    value.trim().parse::<usize>().map_err(|_| invalid_override(key, value))
}

fn parse_f32(key: &str, value: &str) -> Result<f32, ConfigError> {
    value.trim().parse::<f32>().map_err(|_| invalid_override(key, value))
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    value.trim().parse::<bool>().map_err(|_| invalid_override(key, value))
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    twitch: Option<TwitchPatch>,
    llm: Option<LlmPatch>,
    bot: Option<BotPatch>,
    greetings: Option<GreetingsPatch>,
    announcements: Option<AnnouncementsPatch>,
    server: Option<ServerPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct TwitchPatch {
    username: Option<String>,
    oauth_token: Option<String>,
    channel: Option<String>,
    server_url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct LlmPatch {
    api_key: Option<String>,
    base_url: Option<String>,
    model: Option<String>,
    timeout_secs: Option<u64>,
    temperature: Option<f32>,
    max_tokens: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct BotPatch {
    enabled: Option<bool>,
    display_name: Option<String>,
    rules_path: Option<PathBuf>,
    response_cooldown_secs: Option<u64>,
    max_messages_per_minute: Option<u32>,
    use_mentions: Option<bool>,
    randomize_responses: Option<bool>,
    min_message_length: Option<usize>,
    ignored_users: Option<Vec<String>>,
    replace_all_placeholders: Option<bool>,
    memory_retention_secs: Option<u64>,
    memory_sweep_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct GreetingsPatch {
    enabled: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
struct AnnouncementsPatch {
    enabled: Option<bool>,
    interval_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    health_check_port: Option<u16>,
    graceful_shutdown_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}
