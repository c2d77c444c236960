use std::sync::Arc;

use chatterbox_agent::{ChannelContext, Decision, Responder, ResponderSettings, SilenceReason};
use chatterbox_core::clock::ManualClock;
use chatterbox_core::random::{ScriptedRandom, SeededRandom};
use chatterbox_core::rules::{RuleBook, RuleDocument};
use chrono::{Duration, TimeZone, Utc};

fn book(json: &str) -> RuleBook {
    match RuleDocument::from_json(json) {
        Ok(document) => RuleBook::from_document(document),
        Err(error) => panic!("fixture should parse: {error}"),
    }
}

fn responder_with(book: RuleBook, settings: ResponderSettings, clock: ManualClock) -> Responder {
    match Responder::new(
        settings,
        book,
        None,
        Arc::new(clock),
        Box::new(SeededRandom::from_seed(7)),
    ) {
        Ok(responder) => responder,
        Err(error) => panic!("responder should build: {error}"),
    }
}

fn clock() -> ManualClock {
    ManualClock::new(Utc.with_ymd_and_hms(2026, 3, 1, 20, 0, 0).unwrap())
}

const GREETING_RULE: &str = r#"{
    "guidelines": { "rules": [
        { "id": "r1", "enabled": true, "triggers": ["hi"], "triggerType": "contains",
          "probability": 1, "cooldown": 0, "responses": ["hello {user}!"] }
    ] }
}"#;

#[tokio::test]
async fn rule_reply_is_prefixed_with_mention() {
    let responder = responder_with(book(GREETING_RULE), ResponderSettings::default(), clock());
    let ctx = ChannelContext::new("#stream");

    let reply = responder.on_message(&ctx, "alice", "hi there").await;

    assert_eq!(reply.as_deref(), Some("@alice hello alice!"));
}

#[tokio::test]
async fn command_reply_is_prefixed_with_mention() {
    let book = book(
        r#"{
            "guidelines": { "rules": [] },
            "commands": { "enabled": true, "prefix": "!", "list": [
                { "name": "help", "enabled": true, "response": "Type !commands" }
            ] }
        }"#,
    );
    let responder = responder_with(book, ResponderSettings::default(), clock());
    let ctx = ChannelContext::new("#stream");

    let reply = responder.on_message(&ctx, "bob", "!help").await;

    assert_eq!(reply.as_deref(), Some("@bob Type !commands"));
}

#[tokio::test]
async fn ignored_user_is_silent_but_remembered() {
    let responder = responder_with(book(GREETING_RULE), ResponderSettings::default(), clock());
    let ctx = ChannelContext::new("#stream");

    assert_eq!(responder.decide(&ctx, "nightbot", "hi"), Decision::Silent(SilenceReason::IgnoredUser));
    assert_eq!(responder.context_window(), vec!["nightbot: hi".to_string()]);
}

#[tokio::test]
async fn short_messages_skip_rules_but_are_remembered() {
    let responder = responder_with(book(GREETING_RULE), ResponderSettings::default(), clock());
    let ctx = ChannelContext::new("#stream");

    assert_eq!(responder.decide(&ctx, "carol", "hi"), Decision::Silent(SilenceReason::TooShort));
    assert_eq!(responder.context_window(), vec!["carol: hi".to_string()]);
    assert_eq!(responder.stats().sent_in_window, 0);
}

#[tokio::test]
async fn rate_window_suppresses_after_max_sends() {
    let settings = ResponderSettings { max_messages_per_minute: 3, ..ResponderSettings::default() };
    let responder = responder_with(book(GREETING_RULE), settings, clock());
    let ctx = ChannelContext::new("#stream");

    for user in ["u1", "u2", "u3"] {
        assert!(responder.on_message(&ctx, user, "hi all").await.is_some());
    }
    assert_eq!(responder.on_message(&ctx, "u4", "hi all").await, None);

    responder.reset_rate_window();
    assert!(responder.on_message(&ctx, "u4", "hi all").await.is_some());
}

#[tokio::test]
async fn earlier_rule_always_wins() {
    let book = book(
        r#"{ "guidelines": { "rules": [
            { "id": "first", "enabled": true, "triggers": ["gg"], "probability": 1, "responses": ["one"] },
            { "id": "second", "enabled": true, "triggers": ["gg"], "probability": 1, "responses": ["two"] }
        ] } }"#,
    );
    let responder = match Responder::new(
        ResponderSettings { use_mentions: false, ..ResponderSettings::default() },
        book,
        None,
        Arc::new(clock()),
        Box::new(ScriptedRandom::new([0.9, 0.1, 0.5, 0.99])),
    ) {
        Ok(responder) => responder,
        Err(error) => panic!("responder should build: {error}"),
    };
    let ctx = ChannelContext::new("#stream");

    for user in ["a", "b", "c", "d", "e"] {
        assert_eq!(responder.on_message(&ctx, user, "gg wp").await.as_deref(), Some("one"));
    }
}

#[tokio::test]
async fn rule_cooldown_expires_exactly_at_window() {
    let book = book(
        r#"{ "guidelines": { "rules": [
            { "id": "r1", "enabled": true, "triggers": ["hi"], "cooldown": 45, "responses": ["yo"] }
        ] } }"#,
    );
    let clock = clock();
    let responder = responder_with(book, ResponderSettings::default(), clock.clone());
    let ctx = ChannelContext::new("#stream");

    assert!(responder.on_message(&ctx, "dave", "hi hi").await.is_some());
    clock.advance(Duration::seconds(44));
    assert_eq!(responder.on_message(&ctx, "dave", "hi hi").await, None);
    assert!(responder.on_message(&ctx, "erin", "hi hi").await.is_some());
    clock.advance(Duration::seconds(1));
    assert!(responder.on_message(&ctx, "dave", "hi hi").await.is_some());
}

#[tokio::test]
async fn memory_keeps_the_latest_fifty_messages() {
    let responder = responder_with(RuleBook::empty(), ResponderSettings::default(), clock());
    let ctx = ChannelContext::new("#stream");

    for index in 0..60 {
        responder.decide(&ctx, "viewer", &format!("message {index}"));
    }

    assert_eq!(responder.stats().history_size, 50);
    let window = responder.context_window();
    assert_eq!(window.len(), 20);
    assert_eq!(window.last().map(String::as_str), Some("viewer: message 59"));
}
