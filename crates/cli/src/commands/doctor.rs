use chatterbox_core::config::{AppConfig, LoadOptions};
use chatterbox_core::rules::{RuleBook, Severity};
use serde::Serialize;

use crate::commands::CommandResult;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum CheckStatus {
    Pass,
    Warn,
    Fail,
    Skipped,
}

#[derive(Debug, Serialize)]
struct DoctorCheck {
    name: &'static str,
    status: CheckStatus,
    details: String,
}

#[derive(Debug, Serialize)]
struct DoctorReport {
    overall_status: CheckStatus,
    summary: String,
    checks: Vec<DoctorCheck>,
}

pub fn run(json_output: bool) -> CommandResult {
    let report = build_report();
    let exit_code = if report.overall_status == CheckStatus::Fail { 1 } else { 0 };

    let output = if json_output {
        serde_json::to_string_pretty(&report).unwrap_or_else(|error| {
            format!(
                "{{\"overall_status\":\"fail\",\"summary\":\"doctor serialization failed\",\"error\":\"{}\"}}",
                escape_json(&error.to_string())
            )
        })
    } else {
        render_human(&report)
    };

    CommandResult { exit_code, output }
}

fn build_report() -> DoctorReport {
    let mut checks = Vec::new();

    match AppConfig::load(LoadOptions::default()) {
        Ok(config) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Pass,
                details: format!(
                    "configuration loaded; joining #{} as {}",
                    config.twitch.channel_name(),
                    config.twitch.username.trim()
                ),
            });
            checks.push(check_rule_file(&config));
            checks.push(check_generative_readiness(&config));
        }
        Err(error) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Fail,
                details: error.to_string(),
            });
            for name in ["rule_file", "generative_readiness"] {
                checks.push(DoctorCheck {
                    name,
                    status: CheckStatus::Skipped,
                    details: "skipped because configuration did not load".to_string(),
                });
            }
        }
    }

    let overall_status = if checks.iter().any(|check| check.status == CheckStatus::Fail) {
        CheckStatus::Fail
    } else if checks.iter().any(|check| check.status == CheckStatus::Warn) {
        CheckStatus::Warn
    } else {
        CheckStatus::Pass
    };
    let summary = match overall_status {
        CheckStatus::Pass => "doctor: all readiness checks passed",
        CheckStatus::Warn => "doctor: ready, with warnings",
        _ => "doctor: one or more readiness checks failed",
    }
    .to_string();

    DoctorReport { overall_status, summary, checks }
}

/// A broken rule file does not stop the bot (it runs with no rules), so the
/// worst outcome here is a warning unless lint finds hard errors.
fn check_rule_file(config: &AppConfig) -> DoctorCheck {
    let path = &config.bot.rules_path;
    let book = match RuleBook::load(path) {
        Ok(book) => book,
        Err(error) => {
            return DoctorCheck {
                name: "rule_file",
                status: CheckStatus::Warn,
                details: format!("{error}; the bot will start with no rules"),
            };
        }
    };

    let diagnostics = book.lint();
    let errors = diagnostics.iter().filter(|d| d.severity == Severity::Error).count();
    let warnings = diagnostics.len() - errors;
    let status = if errors > 0 {
        CheckStatus::Fail
    } else if warnings > 0 {
        CheckStatus::Warn
    } else {
        CheckStatus::Pass
    };

    DoctorCheck {
        name: "rule_file",
        status,
        details: format!(
            "`{}`: {} rules, {} commands, {errors} lint errors, {warnings} lint warnings",
            path.display(),
            book.rules().len(),
            book.commands().list.len()
        ),
    }
}

fn check_generative_readiness(config: &AppConfig) -> DoctorCheck {
    if config.llm.is_configured() {
        DoctorCheck {
            name: "generative_readiness",
            status: CheckStatus::Pass,
            details: format!("api key present; model `{}` at {}", config.llm.model, config.llm.base_url),
        }
    } else {
        DoctorCheck {
            name: "generative_readiness",
            status: CheckStatus::Warn,
            details: "no api key configured; generative replies, greetings and announcements fall back or stay silent".to_string(),
        }
    }
}

fn render_human(report: &DoctorReport) -> String {
    let mut lines = Vec::new();
    lines.push(report.summary.clone());

    for check in &report.checks {
        let marker = match check.status {
            CheckStatus::Pass => "ok",
            CheckStatus::Warn => "warn",
            CheckStatus::Fail => "fail",
            CheckStatus::Skipped => "skip",
        };
        lines.push(format!("- [{marker}] {}: {}", check.name, check.details));
    }

    lines.join("\n")
}

fn escape_json(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}
