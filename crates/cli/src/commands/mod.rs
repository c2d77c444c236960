pub mod config;
pub mod doctor;
pub mod rules;
pub mod simulate;

use std::path::{Path, PathBuf};

use chatterbox_core::config::{AppConfig, LoadOptions, DEFAULT_RULES_PATH};
use serde::Serialize;

#[derive(Debug, Clone)]
pub struct CommandResult {
    pub exit_code: u8,
    pub output: String,
}

#[derive(Debug, Serialize)]
struct CommandOutcome {
    command: String,
    status: String,
    error_class: Option<String>,
    message: String,
}

impl CommandResult {
    pub fn success(command: &str, message: impl Into<String>) -> Self {
        let payload = CommandOutcome {
            command: command.to_string(),
            status: "ok".to_string(),
            error_class: None,
            message: message.into(),
        };
        Self { exit_code: 0, output: serialize_payload(payload) }
    }

    pub fn failure(
        command: &str,
        error_class: &str,
        message: impl Into<String>,
        exit_code: u8,
    ) -> Self {
        let payload = CommandOutcome {
            command: command.to_string(),
            status: "error".to_string(),
            error_class: Some(error_class.to_string()),
            message: message.into(),
        };
        Self { exit_code, output: serialize_payload(payload) }
    }
}

fn serialize_payload(payload: CommandOutcome) -> String {
    serde_json::to_string(&payload).unwrap_or_else(|error| {
        format!(
            "{{\"command\":\"unknown\",\"status\":\"error\",\"error_class\":\"serialization\",\"message\":\"{}\"}}",
            error.to_string().replace('\\', "\\\\").replace('"', "\\\"")
        )
    })
}

/// Offline commands must work without chat credentials, so a config that
/// fails validation falls back to defaults here instead of aborting.
pub(crate) fn offline_config() -> (AppConfig, Option<String>) {
    match AppConfig::load(LoadOptions::default()) {
        Ok(config) => (config, None),
        Err(error) => (AppConfig::default(), Some(error.to_string())),
    }
}

pub(crate) fn resolve_rules_path(explicit: Option<&Path>, config: &AppConfig) -> PathBuf {
    match explicit {
        Some(path) => path.to_path_buf(),
        None if config.bot.rules_path.as_os_str().is_empty() => PathBuf::from(DEFAULT_RULES_PATH),
        None => config.bot.rules_path.clone(),
    }
}
