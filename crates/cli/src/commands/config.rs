use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use chatterbox_core::config::{AppConfig, LoadOptions};
use secrecy::ExposeSecret;
use toml::Value;

struct SourceLookup {
    file_doc: Option<Value>,
    file_path: Option<PathBuf>,
}

pub fn run() -> String {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let file_path = detect_config_path();
    let lookup = SourceLookup { file_doc: load_config_file_doc(file_path.as_deref()), file_path };

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];
    let mut push = |key: &str, value: &str, env_keys: &[&str]| {
        lines.push(render_line(key, value, lookup.field_source(key, env_keys)));
    };

    push(
        "twitch.username",
        &config.twitch.username,
        &["CHATTERBOX_TWITCH_USERNAME", "TWITCH_BOT_USERNAME", "TWITCH_USERNAME"],
    );
    push(
        "twitch.oauth_token",
        &redact_token(config.twitch.oauth_token.expose_secret()),
        &["CHATTERBOX_TWITCH_OAUTH_TOKEN", "TWITCH_OAUTH_TOKEN"],
    );
    push("twitch.channel", &config.twitch.channel, &["CHATTERBOX_TWITCH_CHANNEL", "TWITCH_CHANNEL"]);
    push("twitch.server_url", &config.twitch.server_url, &["CHATTERBOX_TWITCH_SERVER_URL"]);

    let llm_api_key = if config.llm.is_configured() { "<redacted>" } else { "<unset>" };
    push("llm.api_key", llm_api_key, &["CHATTERBOX_LLM_API_KEY", "GROQ_API_KEY"]);
    push("llm.base_url", &config.llm.base_url, &["CHATTERBOX_LLM_BASE_URL"]);
    push("llm.model", &config.llm.model, &["CHATTERBOX_LLM_MODEL"]);
    push("llm.timeout_secs", &config.llm.timeout_secs.to_string(), &["CHATTERBOX_LLM_TIMEOUT_SECS"]);

    push("bot.enabled", &config.bot.enabled.to_string(), &["CHATTERBOX_BOT_ENABLED", "BOT_ENABLED"]);
    push(
        "bot.display_name",
        config.bot.display_name.as_deref().unwrap_or("<unset>"),
        &["CHATTERBOX_BOT_DISPLAY_NAME", "BOT_DISPLAY_NAME"],
    );
    push(
        "bot.rules_path",
        &config.bot.rules_path.display().to_string(),
        &["CHATTERBOX_BOT_RULES_PATH"],
    );
    push(
        "bot.response_cooldown_secs",
        &config.bot.response_cooldown_secs.to_string(),
        &["CHATTERBOX_BOT_RESPONSE_COOLDOWN_SECS"],
    );
    push(
        "bot.max_messages_per_minute",
        &config.bot.max_messages_per_minute.to_string(),
        &["CHATTERBOX_BOT_MAX_MESSAGES_PER_MINUTE"],
    );
    push("bot.use_mentions", &config.bot.use_mentions.to_string(), &["CHATTERBOX_BOT_USE_MENTIONS"]);
    push(
        "bot.ignored_users",
        &config.bot.ignored_users.join(","),
        &["CHATTERBOX_BOT_IGNORED_USERS"],
    );

    push(
        "greetings.enabled",
        &config.greetings.enabled.to_string(),
        &["CHATTERBOX_GREETINGS_ENABLED"],
    );
    push(
        "announcements.enabled",
        &config.announcements.enabled.to_string(),
        &["CHATTERBOX_ANNOUNCEMENTS_ENABLED"],
    );
    push(
        "announcements.interval_secs",
        &config.announcements.interval_secs.to_string(),
        &["CHATTERBOX_ANNOUNCEMENTS_INTERVAL_SECS"],
    );

    push("server.bind_address", &config.server.bind_address, &["CHATTERBOX_SERVER_BIND_ADDRESS"]);
    push(
        "server.health_check_port",
        &config.server.health_check_port.to_string(),
        &["CHATTERBOX_SERVER_HEALTH_CHECK_PORT", "PORT"],
    );

    push(
        "logging.level",
        &config.logging.level,
        &["CHATTERBOX_LOGGING_LEVEL", "CHATTERBOX_LOG_LEVEL"],
    );
    push(
        "logging.format",
        &format!("{:?}", config.logging.format),
        &["CHATTERBOX_LOGGING_FORMAT", "CHATTERBOX_LOG_FORMAT"],
    );

    lines.join("\n")
}

fn detect_config_path() -> Option<PathBuf> {
    [PathBuf::from("chatterbox.toml"), PathBuf::from("config/chatterbox.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let raw = fs::read_to_string(path?).ok()?;
    raw.parse::<Value>().ok()
}

impl SourceLookup {
    fn field_source(&self, key_path: &str, env_keys: &[&str]) -> String {
        if let Some(env_key) = env_keys.iter().find(|key| env::var_os(key).is_some()) {
            return format!("env ({env_key})");
        }

        if self.file_doc.as_ref().is_some_and(|doc| contains_path(doc, key_path)) {
            let file_path = self
                .file_path
                .as_deref()
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }

        "default".to_string()
    }
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}

/// Keeps the `oauth:` scheme visible so a missing prefix is easy to spot.
fn redact_token(token: &str) -> String {
    let trimmed = token.trim();
    if trimmed.is_empty() {
        return "<empty>".to_string();
    }

    match trimmed.split_once(':') {
        Some((scheme, _)) => format!("{scheme}:***"),
        None => "<redacted>".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::{contains_path, redact_token};

    #[test]
    fn redaction_keeps_only_the_scheme() {
        assert_eq!(redact_token("oauth:abcdef123"), "oauth:***");
        assert_eq!(redact_token("abcdef123"), "<redacted>");
        assert_eq!(redact_token("   "), "<empty>");
    }

    #[test]
    fn nested_keys_are_found_in_toml() {
        let doc: toml::Value = "[bot]\nrules_path = \"x.json\"\n".parse().expect("toml");
        assert!(contains_path(&doc, "bot.rules_path"));
        assert!(!contains_path(&doc, "bot.enabled"));
        assert!(!contains_path(&doc, "twitch.username"));
    }
}
