use std::path::Path;
use std::sync::Arc;

use chatterbox_agent::{ChannelContext, Decision, Responder, ResponderSettings};
use chatterbox_core::clock::SystemClock;
use chatterbox_core::random::SeededRandom;
use chatterbox_core::rules::RuleBook;

use crate::commands::{offline_config, resolve_rules_path, CommandResult};

/// Dry-runs one message through admission, commands and rules. Nothing is
/// sent and no completion endpoint is called; a message that would have gone
/// to the generative path reports `generative_unavailable`.
pub fn run(user: &str, text: &str, explicit_path: Option<&Path>) -> CommandResult {
    let (config, _) = offline_config();
    let path = resolve_rules_path(explicit_path, &config);

    let book = match RuleBook::load(&path) {
        Ok(book) => book,
        Err(error) => {
            return CommandResult::failure("simulate", "rule_file", error.to_string(), 2)
        }
    };

    let responder = match Responder::new(
        ResponderSettings::from_config(&config),
        book,
        None,
        Arc::new(SystemClock),
        Box::new(SeededRandom::from_entropy()),
    ) {
        Ok(responder) => responder,
        Err(error) => return CommandResult::failure("simulate", "prompts", error.to_string(), 1),
    };

    let channel = config.twitch.channel_name();
    let channel = if channel.is_empty() { "simulation".to_string() } else { channel };
    let ctx = ChannelContext::new(format!("#{channel}"));

    let output = match responder.decide(&ctx, user, text) {
        Decision::Reply(reply) => reply,
        Decision::Silent(reason) => format!("silent: {}", reason.reason_code()),
        Decision::Generate(_) => "silent: generative_unavailable".to_string(),
    };
    CommandResult { exit_code: 0, output }
}
