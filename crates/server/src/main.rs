mod bootstrap;
mod handlers;
mod health;

use std::time::Duration;

use anyhow::Result;
use chatterbox_core::config::{AppConfig, LoadOptions};
use tokio::sync::watch;
use tracing::{info, warn};

use crate::bootstrap::Application;

fn init_logging(config: &AppConfig) {
    use chatterbox_core::config::LogFormat::*;
    use tracing::Level;

    let log_level = config.logging.level.parse::<Level>().unwrap_or(Level::INFO);

    match config.logging.format {
        Compact => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).compact().init();
        }
        Pretty => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).pretty().init();
        }
        Json => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).json().init();
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    run().await
}

pub async fn run() -> Result<()> {
    // Config errors are fatal before anything connects.
    let config = AppConfig::load(LoadOptions::default())?;
    init_logging(&config);

    let app = bootstrap::bootstrap_with_config(config)?;

    health::spawn(
        &app.config.server.bind_address,
        app.config.server.health_check_port,
        app.responder.clone(),
    )
    .await?;

    let maintenance = app.start_maintenance();
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let runner = app.runner.clone();
    let runner_task = tokio::spawn(async move { runner.start(shutdown_rx).await });

    info!(
        event_name = "system.server.started",
        correlation_id = "bootstrap",
        channel = %app.config.twitch.channel_name(),
        greetings = app.greeter.is_some(),
        "chatterbox started"
    );
    supervise(&app).await?;
    info!(event_name = "system.server.stopping", correlation_id = "shutdown", "chatterbox stopping");

    // Timers first so nothing is queued against a closing connection.
    maintenance.shutdown().await;
    let _ = shutdown_tx.send(true);

    let grace = Duration::from_secs(app.config.server.graceful_shutdown_secs);
    match tokio::time::timeout(grace, runner_task).await {
        Ok(Ok(Ok(()))) => {}
        Ok(Ok(Err(error))) => {
            warn!(event_name = "system.server.runner_failed", correlation_id = "shutdown", error = %error, "chat runner ended with error");
        }
        Ok(Err(error)) => {
            warn!(event_name = "system.server.runner_failed", correlation_id = "shutdown", error = %error, "chat runner task panicked");
        }
        Err(_) => {
            warn!(event_name = "system.server.shutdown_timeout", correlation_id = "shutdown", grace_secs = grace.as_secs(), "chat runner did not stop in time");
        }
    }

    info!(event_name = "system.server.stopped", correlation_id = "shutdown", "chatterbox stopped");
    Ok(())
}

/// Blocks until Ctrl-C or SIGTERM. SIGHUP reloads the rule file in place.
#[cfg(unix)]
async fn supervise(app: &Application) -> Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut terminate = signal(SignalKind::terminate())?;
    let mut hangup = signal(SignalKind::hangup())?;

    loop {
        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                result?;
                return Ok(());
            }
            _ = terminate.recv() => return Ok(()),
            _ = hangup.recv() => {
                let rules = app.responder.reload_rules();
                info!(event_name = "system.server.rules_reloaded", correlation_id = "signal", rules, "reloaded rules on SIGHUP");
            }
        }
    }
}

#[cfg(not(unix))]
async fn supervise(_app: &Application) -> Result<()> {
    tokio::signal::ctrl_c().await?;
    Ok(())
}
