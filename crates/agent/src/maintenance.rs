use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chatterbox_core::config::AppConfig;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::greeter::Announcer;
use crate::rate::RATE_WINDOW_PERIOD;
use crate::runtime::Responder;

/// Fire-and-forget outbound path for messages the bot sends on its own
/// initiative.
#[async_trait]
pub trait MessageSink: Send + Sync {
    async fn deliver(&self, channel: &str, text: &str);
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MaintenanceSchedule {
    pub rate_reset: Duration,
    pub memory_sweep: Duration,
    pub announcements: Option<Duration>,
}

impl MaintenanceSchedule {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            rate_reset: RATE_WINDOW_PERIOD,
            memory_sweep: Duration::from_secs(config.bot.memory_sweep_secs),
            announcements: config
                .announcements
                .enabled
                .then(|| Duration::from_secs(config.announcements.interval_secs)),
        }
    }
}

pub struct AnnouncementTarget {
    pub announcer: Arc<Announcer>,
    pub sink: Arc<dyn MessageSink>,
    pub channel: String,
}

/// Background timers. Stopped together through one watch channel; callers
/// shut these down before releasing the transport.
pub struct MaintenanceTasks {
    shutdown: watch::Sender<bool>,
    handles: Vec<(&'static str, JoinHandle<()>)>,
}

impl MaintenanceTasks {
    pub fn spawn(
        schedule: MaintenanceSchedule,
        responder: Arc<Responder>,
        announcements: Option<AnnouncementTarget>,
    ) -> Self {
        let (shutdown, _) = watch::channel(false);
        let mut handles = Vec::new();

        let rate_responder = responder.clone();
        handles.push((
            "rate_reset",
            spawn_periodic(schedule.rate_reset, shutdown.subscribe(), move || {
                let responder = rate_responder.clone();
                async move {
                    responder.reset_rate_window();
                }
            }),
        ));

        handles.push((
            "memory_sweep",
            spawn_periodic(schedule.memory_sweep, shutdown.subscribe(), move || {
                let responder = responder.clone();
                async move {
                    responder.sweep_memory();
                }
            }),
        ));

        if let (Some(period), Some(target)) = (schedule.announcements, announcements) {
            let target = Arc::new(target);
            handles.push((
                "announcements",
                spawn_periodic(period, shutdown.subscribe(), move || {
                    let target = target.clone();
                    async move {
                        let text = target.announcer.next_announcement().await;
                        target.sink.deliver(&target.channel, &text).await;
                        info!(event_name = "announcer.sent", channel = %target.channel, "announcement queued");
                    }
                }),
            ));
        }

        info!(
            event_name = "maintenance.started",
            tasks = handles.len(),
            "maintenance timers started"
        );
        Self { shutdown, handles }
    }

    pub fn task_names(&self) -> Vec<&'static str> {
        self.handles.iter().map(|(name, _)| *name).collect()
    }

    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        for (name, handle) in self.handles {
            if let Err(error) = handle.await {
                warn!(event_name = "maintenance.task_failed", task = name, error = %error, "timer task ended abnormally");
            }
        }
        info!(event_name = "maintenance.stopped", "maintenance timers stopped");
    }
}

fn spawn_periodic<F, Fut>(
    period: Duration,
    mut shutdown: watch::Receiver<bool>,
    mut tick: F,
) -> JoinHandle<()>
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: std::future::Future<Output = ()> + Send + 'static,
{
    tokio::spawn(async move {
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
                _ = ticker.tick() => {
                    debug!(event_name = "maintenance.tick", period_ms = period.as_millis() as u64, "timer tick");
                    tick().await;
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;
    use chatterbox_core::clock::SystemClock;
    use chatterbox_core::random::ScriptedRandom;
    use chatterbox_core::rules::{RuleBook, RuleDocument};
    use tokio::sync::Mutex;

    use super::{AnnouncementTarget, MaintenanceSchedule, MaintenanceTasks, MessageSink};
    use crate::greeter::Announcer;
    use crate::runtime::{ChannelContext, Responder, ResponderSettings};

    #[derive(Default)]
    struct CollectingSink {
        sent: Mutex<Vec<(String, String)>>,
    }

    #[async_trait]
    impl MessageSink for CollectingSink {
        async fn deliver(&self, channel: &str, text: &str) {
            self.sent.lock().await.push((channel.to_string(), text.to_string()));
        }
    }

    fn responder() -> Arc<Responder> {
        let document = RuleDocument::from_json(
            r#"{ "guidelines": { "rules": [
                { "id": "hi", "enabled": true, "triggers": ["hello"], "responses": ["hey"] }
            ] } }"#,
        )
        .expect("fixture parses");
        let settings = ResponderSettings { max_messages_per_minute: 1, ..ResponderSettings::default() };
        Arc::new(
            Responder::new(
                settings,
                RuleBook::from_document(document),
                None,
                Arc::new(SystemClock),
                Box::new(ScriptedRandom::constant(0.0)),
            )
            .expect("prompts compile"),
        )
    }

    #[tokio::test]
    async fn rate_window_is_reset_by_timer() {
        let responder = responder();
        let ctx = ChannelContext::new("#stream");
        assert!(responder.on_message(&ctx, "alice", "hello").await.is_some());
        assert_eq!(responder.stats().sent_in_window, 1);

        let schedule = MaintenanceSchedule {
            rate_reset: Duration::from_millis(10),
            memory_sweep: Duration::from_secs(3_600),
            announcements: None,
        };
        let tasks = MaintenanceTasks::spawn(schedule, responder.clone(), None);
        assert_eq!(tasks.task_names(), vec!["rate_reset", "memory_sweep"]);

        tokio::time::sleep(Duration::from_millis(60)).await;
        tasks.shutdown().await;

        assert_eq!(responder.stats().sent_in_window, 0);
    }

    #[tokio::test]
    async fn announcements_are_delivered_until_shutdown() {
        let sink = Arc::new(CollectingSink::default());
        let announcer = Arc::new(
            Announcer::new(None, Box::new(ScriptedRandom::constant(0.0))).expect("prompts compile"),
        );
        let schedule = MaintenanceSchedule {
            rate_reset: Duration::from_secs(60),
            memory_sweep: Duration::from_secs(3_600),
            announcements: Some(Duration::from_millis(10)),
        };

        let tasks = MaintenanceTasks::spawn(
            schedule,
            responder(),
            Some(AnnouncementTarget { announcer, sink: sink.clone(), channel: "#stream".into() }),
        );
        tokio::time::sleep(Duration::from_millis(60)).await;
        tasks.shutdown().await;

        let delivered = sink.sent.lock().await.len();
        assert!(delivered >= 1);
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(sink.sent.lock().await.len(), delivered);
        assert_eq!(sink.sent.lock().await[0], ("#stream".to_string(), "Welcome to the stream! 🎮".to_string()));
    }
}
