use std::sync::Arc;
use std::time::Duration;

use chatterbox_agent::{
    AnnouncementTarget, Announcer, Generator, Greeter, GuardrailPolicy, MaintenanceSchedule,
    MaintenanceTasks, OpenAiCompatibleClient, Responder, ResponderSettings,
};
use chatterbox_core::clock::SystemClock;
use chatterbox_core::config::{AppConfig, ConfigError};
use chatterbox_core::random::SeededRandom;
use chatterbox_core::rules::RuleBook;
use chatterbox_twitch::{ChatRunner, ChatTransport, Outbox, ReconnectPolicy, TwitchWsTransport};
use thiserror::Error;
use tracing::{info, warn};

use crate::handlers::{build_dispatcher, OutboxSink};

pub struct Application {
    pub config: AppConfig,
    pub responder: Arc<Responder>,
    pub greeter: Option<Arc<Greeter>>,
    pub announcer: Option<Arc<Announcer>>,
    pub runner: Arc<ChatRunner>,
    pub outbox: Outbox,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("prompt templates failed to compile: {0}")]
    Prompts(#[from] tera::Error),
}

pub fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(event_name = "system.bootstrap.start", correlation_id = "bootstrap", "starting application bootstrap");
    let transport = Arc::new(TwitchWsTransport::from_config(&config.twitch));
    bootstrap_with_transport(config, transport)
}

pub fn bootstrap_with_transport(
    config: AppConfig,
    transport: Arc<dyn ChatTransport>,
) -> Result<Application, BootstrapError> {
    let book = RuleBook::load_or_empty(&config.bot.rules_path);
    info!(
        event_name = "system.bootstrap.rules_loaded",
        correlation_id = "bootstrap",
        path = %config.bot.rules_path.display(),
        rules = book.rules().len(),
        commands = book.commands().list.len(),
        "rule book loaded"
    );

    let generator = build_generator(&config);
    let responder = Arc::new(Responder::new(
        ResponderSettings::from_config(&config),
        book,
        generator.clone(),
        Arc::new(SystemClock),
        Box::new(SeededRandom::from_entropy()),
    )?);

    let greeter = if config.greetings.enabled {
        Some(Arc::new(Greeter::new(
            &config.twitch.channel_name(),
            GuardrailPolicy::from_config(&config.bot),
            generator.clone(),
            Box::new(SeededRandom::from_entropy()),
        )?))
    } else {
        None
    };
    let announcer = if config.announcements.enabled {
        Some(Arc::new(Announcer::new(generator, Box::new(SeededRandom::from_entropy()))?))
    } else {
        None
    };

    let (outbox, outbound) = Outbox::channel();
    let dispatcher = build_dispatcher(responder.clone(), greeter.clone(), &outbox);
    let runner = Arc::new(ChatRunner::with_outbox(
        transport,
        dispatcher,
        ReconnectPolicy::default(),
        outbox.clone(),
        outbound,
    ));

    info!(
        event_name = "system.bootstrap.ready",
        correlation_id = "bootstrap",
        generative = responder.generative_enabled(),
        greetings = greeter.is_some(),
        announcements = announcer.is_some(),
        "application assembled"
    );
    Ok(Application { config, responder, greeter, announcer, runner, outbox })
}

/// `None` disables the generative path; a missing key is not an error.
fn build_generator(config: &AppConfig) -> Option<Generator> {
    if !config.llm.is_configured() {
        info!(
            event_name = "system.bootstrap.generative_disabled",
            correlation_id = "bootstrap",
            "no llm api key configured, generative replies disabled"
        );
        return None;
    }

    match OpenAiCompatibleClient::from_config(&config.llm) {
        Ok(client) => {
            info!(
                event_name = "system.bootstrap.generative_enabled",
                correlation_id = "bootstrap",
                model = client.model(),
                "generative replies enabled"
            );
            Some(Generator::new(Arc::new(client), Duration::from_secs(config.llm.timeout_secs)))
        }
        Err(error) => {
            warn!(
                event_name = "system.bootstrap.generative_disabled",
                correlation_id = "bootstrap",
                error = %error,
                "llm client could not be built, generative replies disabled"
            );
            None
        }
    }
}

impl Application {
    pub fn start_maintenance(&self) -> MaintenanceTasks {
        let announcements = self.announcer.clone().map(|announcer| AnnouncementTarget {
            announcer,
            sink: Arc::new(OutboxSink(self.outbox.clone())),
            channel: self.config.twitch.channel_name(),
        });
        MaintenanceTasks::spawn(
            MaintenanceSchedule::from_config(&self.config),
            self.responder.clone(),
            announcements,
        )
    }
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::PathBuf;
    use std::sync::Arc;

    use chatterbox_core::config::{AppConfig, ConfigOverrides, LoadOptions};
    use chatterbox_twitch::socket::NoopChatTransport;
    use tempfile::TempDir;

    use crate::bootstrap::{bootstrap_with_transport, BootstrapError};

    fn configured(rules_path: PathBuf) -> AppConfig {
        let mut config = AppConfig::default();
        config.twitch.username = "chatterbot".to_owned();
        config.twitch.oauth_token = "oauth:test-token".to_owned().into();
        config.twitch.channel = "#stream".to_owned();
        config.bot.rules_path = rules_path;
        config.llm.api_key = None;
        config
    }

    #[test]
    fn malformed_oauth_token_is_a_fatal_config_error() {
        let loaded = AppConfig::load(LoadOptions {
            config_path: Some(PathBuf::from("/nonexistent/chatterbox.toml")),
            overrides: ConfigOverrides {
                twitch_username: Some("chatterbot".to_owned()),
                twitch_oauth_token: Some("not-a-token".to_owned()),
                twitch_channel: Some("stream".to_owned()),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        });

        let message = loaded.map_err(BootstrapError::from).err().map(|error| error.to_string());
        assert!(
            message.as_deref().is_some_and(|message| message.contains("twitch.oauth_token")),
            "unexpected outcome: {message:?}"
        );
    }

    #[test]
    fn missing_rule_file_degrades_to_empty_book() {
        let app = bootstrap_with_transport(
            configured(PathBuf::from("/nonexistent/guidelines.json")),
            Arc::new(NoopChatTransport),
        )
        .expect("bootstrap should degrade, not fail");

        let stats = app.responder.stats();
        assert_eq!(stats.rules, 0);
        assert!(!stats.generative_enabled);
        assert!(app.greeter.is_none());
        assert!(app.announcer.is_none());
    }

    #[tokio::test]
    async fn assembles_optional_features_from_config() {
        let dir = TempDir::new().expect("temp dir");
        let rules = dir.path().join("guidelines.json");
        fs::write(
            &rules,
            r#"{ "guidelines": { "rules": [
                { "id": "hi", "enabled": true, "triggers": ["hello"], "responses": ["hey"] }
            ] } }"#,
        )
        .expect("write rules");

        let mut config = configured(rules);
        config.greetings.enabled = true;
        config.announcements.enabled = true;
        let app = bootstrap_with_transport(config, Arc::new(NoopChatTransport)).expect("bootstrap");

        assert_eq!(app.responder.stats().rules, 1);
        assert!(app.greeter.is_some());

        let tasks = app.start_maintenance();
        assert_eq!(tasks.task_names(), vec!["rate_reset", "memory_sweep", "announcements"]);
        tasks.shutdown().await;
    }
}
