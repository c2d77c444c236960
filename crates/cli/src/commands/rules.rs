use std::path::Path;

use chatterbox_core::rules::{RuleBook, Severity};

use crate::commands::{offline_config, resolve_rules_path, CommandResult};

/// Lists the rule file's contents and lint findings. Exit code 2 when the
/// file cannot be loaded, 1 when lint reports errors.
pub fn run(explicit_path: Option<&Path>) -> CommandResult {
    let (config, _) = offline_config();
    let path = resolve_rules_path(explicit_path, &config);

    let book = match RuleBook::load(&path) {
        Ok(book) => book,
        Err(error) => return CommandResult::failure("rules", "rule_file", error.to_string(), 2),
    };

    let mut lines = vec![format!("rule file `{}`:", path.display())];

    lines.push(format!("rules ({}):", book.rules().len()));
    for compiled in book.rules() {
        let rule = &compiled.rule;
        let state = if rule.enabled { "on" } else { "off" };
        lines.push(format!(
            "- [{state}] {} ({}, p={}, cooldown={}s): {} triggers, {} responses",
            rule.id,
            rule.trigger_type,
            rule.probability,
            rule.cooldown,
            rule.triggers.len(),
            rule.responses.len()
        ));
    }

    let commands = book.commands();
    let state = if commands.enabled { "on" } else { "off" };
    lines.push(format!("commands ({}, prefix `{}`, {state}):", commands.list.len(), commands.prefix));
    for command in &commands.list {
        let state = if command.enabled { "on" } else { "off" };
        lines.push(format!(
            "- [{state}] {}{} (cooldown={}s)",
            commands.prefix, command.name, command.cooldown
        ));
    }

    let diagnostics = book.lint();
    if diagnostics.is_empty() {
        lines.push("lint: clean".to_string());
    } else {
        lines.push(format!("lint ({}):", diagnostics.len()));
        for diagnostic in &diagnostics {
            let marker = match diagnostic.severity {
                Severity::Warning => "warn",
                Severity::Error => "error",
            };
            lines.push(format!("- [{marker}] {}: {}", diagnostic.subject, diagnostic.message));
        }
    }

    let has_errors = diagnostics.iter().any(|diagnostic| diagnostic.severity == Severity::Error);
    CommandResult { exit_code: if has_errors { 1 } else { 0 }, output: lines.join("\n") }
}
