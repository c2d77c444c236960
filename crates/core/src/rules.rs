use std::collections::HashSet;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use regex::{Regex, RegexBuilder};
use serde::Deserialize;
use thiserror::Error;
use tracing::{error, info, warn};

pub const DEFAULT_COMMAND_PREFIX: &str = "!";

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Deserialize)]
#[serde(from = "String")]
pub enum TriggerType {
    #[default]
    Contains,
    StartsWith,
    EndsWith,
    Exact,
    Regex,
}

impl TriggerType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Contains => "contains",
            Self::StartsWith => "startsWith",
            Self::EndsWith => "endsWith",
            Self::Exact => "exact",
            Self::Regex => "regex",
        }
    }
}

impl fmt::Display for TriggerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// Unrecognised trigger types fall back to substring matching.
impl From<String> for TriggerType {
    fn from(value: String) -> Self {
        let normalized = value.trim().to_ascii_lowercase().replace(['_', '-'], "");
        match normalized.as_str() {
            "startswith" => Self::StartsWith,
            "endswith" => Self::EndsWith,
            "exact" => Self::Exact,
            "regex" => Self::Regex,
            _ => Self::Contains,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Rule {
    pub id: String,
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub triggers: Vec<String>,
    #[serde(default)]
    pub trigger_type: TriggerType,
    #[serde(default = "default_probability")]
    pub probability: f64,
    /// Seconds.
    #[serde(default, alias = "cooldownSeconds")]
    pub cooldown: u64,
    #[serde(default)]
    pub responses: Vec<String>,
}

fn default_probability() -> f64 {
    1.0
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Command {
    pub name: String,
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub response: String,
    #[serde(default, alias = "cooldownSeconds")]
    pub cooldown: u64,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandSettings {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_prefix")]
    pub prefix: String,
    #[serde(default)]
    pub list: Vec<Command>,
}

impl Default for CommandSettings {
    fn default() -> Self {
        Self { enabled: false, prefix: default_prefix(), list: Vec::new() }
    }
}

fn default_prefix() -> String {
    DEFAULT_COMMAND_PREFIX.to_owned()
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct Guidelines {
    #[serde(default)]
    pub rules: Vec<Rule>,
}

/// On-disk shape of the rule file.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct RuleDocument {
    #[serde(default)]
    pub guidelines: Guidelines,
    #[serde(default)]
    pub commands: CommandSettings,
}

impl RuleDocument {
    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }

    pub fn from_toml(raw: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(raw)
    }
}

#[derive(Debug, Error)]
pub enum RuleLoadError {
    #[error("could not read rule file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse rule file `{path}` as json: {source}")]
    ParseJson { path: PathBuf, source: serde_json::Error },
    #[error("could not parse rule file `{path}` as toml: {source}")]
    ParseToml { path: PathBuf, source: toml::de::Error },
}

#[derive(Clone, Debug)]
enum TriggerMatcher {
    Text(String),
    Pattern(Regex),
    Invalid,
}

impl TriggerMatcher {
    fn compile(rule_id: &str, trigger: &str, trigger_type: TriggerType) -> Self {
        if trigger_type != TriggerType::Regex {
            return Self::Text(trigger.to_lowercase());
        }

        match RegexBuilder::new(trigger).case_insensitive(true).build() {
            Ok(pattern) => Self::Pattern(pattern),
            Err(error) => {
                warn!(
                    event_name = "rules.trigger.invalid_regex",
                    rule_id,
                    pattern = trigger,
                    error = %error,
                    "invalid regex trigger; it will never match"
                );
                Self::Invalid
            }
        }
    }

    fn matches(&self, trigger_type: TriggerType, message: &str, lowered: &str) -> bool {
        match self {
            Self::Text(needle) => match trigger_type {
                TriggerType::Contains | TriggerType::Regex => lowered.contains(needle.as_str()),
                TriggerType::StartsWith => lowered.starts_with(needle.as_str()),
                TriggerType::EndsWith => lowered.ends_with(needle.as_str()),
                TriggerType::Exact => lowered == needle,
            },
            Self::Pattern(pattern) => pattern.is_match(message),
            Self::Invalid => false,
        }
    }
}

#[derive(Clone, Debug)]
pub struct CompiledRule {
    pub rule: Rule,
    matchers: Vec<TriggerMatcher>,
}

impl CompiledRule {
    fn compile(rule: Rule) -> Self {
        let matchers = rule
            .triggers
            .iter()
            .map(|trigger| TriggerMatcher::compile(&rule.id, trigger, rule.trigger_type))
            .collect();
        Self { rule, matchers }
    }

    /// True when any trigger matches; says nothing about enablement,
    /// probability or cooldown.
    pub fn triggered_by(&self, message: &str) -> bool {
        let lowered = message.to_lowercase();
        self.matchers
            .iter()
            .any(|matcher| matcher.matches(self.rule.trigger_type, message, &lowered))
    }

    pub fn invalid_trigger_count(&self) -> usize {
        self.matchers.iter().filter(|matcher| matches!(matcher, TriggerMatcher::Invalid)).count()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Severity {
    Warning,
    Error,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RuleDiagnostic {
    pub subject: String,
    pub severity: Severity,
    pub message: String,
}

/// Compiled, immutable rule set. Reloading builds a new book and swaps it in.
#[derive(Clone, Debug, Default)]
pub struct RuleBook {
    source: Option<PathBuf>,
    rules: Vec<CompiledRule>,
    commands: CommandSettings,
}

impl RuleBook {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_document(document: RuleDocument) -> Self {
        let rules = document.guidelines.rules.into_iter().map(CompiledRule::compile).collect();
        Self { source: None, rules, commands: document.commands }
    }

    pub fn load(path: &Path) -> Result<Self, RuleLoadError> {
        let raw = fs::read_to_string(path)
            .map_err(|source| RuleLoadError::ReadFile { path: path.to_path_buf(), source })?;

        let is_json = path
            .extension()
            .and_then(|extension| extension.to_str())
            .map(|extension| extension.eq_ignore_ascii_case("json"))
            .unwrap_or(false);

        let document = if is_json {
            RuleDocument::from_json(&raw)
                .map_err(|source| RuleLoadError::ParseJson { path: path.to_path_buf(), source })?
        } else {
            RuleDocument::from_toml(&raw)
                .map_err(|source| RuleLoadError::ParseToml { path: path.to_path_buf(), source })?
        };

        let mut book = Self::from_document(document);
        book.source = Some(path.to_path_buf());
        Ok(book)
    }

    /// Loads the rule file, degrading to an empty book when it is missing or
    /// malformed. The path is remembered so a later reload can retry.
    pub fn load_or_empty(path: &Path) -> Self {
        match Self::load(path) {
            Ok(book) => {
                info!(
                    event_name = "rules.load.succeeded",
                    path = %path.display(),
                    rules = book.rules.len(),
                    commands = book.commands.list.len(),
                    "rule file loaded"
                );
                book
            }
            Err(load_error) => {
                error!(
                    event_name = "rules.load.failed",
                    path = %path.display(),
                    error = %load_error,
                    "rule file could not be loaded; continuing with an empty rule set"
                );
                Self { source: Some(path.to_path_buf()), ..Self::default() }
            }
        }
    }

    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    pub fn rules(&self) -> &[CompiledRule] {
        &self.rules
    }

    pub fn commands(&self) -> &CommandSettings {
        &self.commands
    }

    pub fn lint(&self) -> Vec<RuleDiagnostic> {
        let mut diagnostics = Vec::new();
        let mut seen_rule_ids = HashSet::new();

        for compiled in &self.rules {
            let rule = &compiled.rule;
            let subject = format!("rule `{}`", rule.id);

            if !seen_rule_ids.insert(rule.id.clone()) {
                diagnostics.push(RuleDiagnostic {
                    subject: subject.clone(),
                    severity: Severity::Error,
                    message: "duplicate rule id; cooldowns will be shared".to_owned(),
                });
            }
            if rule.triggers.is_empty() {
                diagnostics.push(RuleDiagnostic {
                    subject: subject.clone(),
                    severity: Severity::Warning,
                    message: "no triggers; rule can never match".to_owned(),
                });
            }
            if rule.triggers.iter().any(|trigger| trigger.is_empty()) {
                diagnostics.push(RuleDiagnostic {
                    subject: subject.clone(),
                    severity: Severity::Warning,
                    message: "empty trigger string matches every message".to_owned(),
                });
            }
            if rule.responses.is_empty() {
                diagnostics.push(RuleDiagnostic {
                    subject: subject.clone(),
                    severity: Severity::Warning,
                    message: "no responses; a match produces no reply".to_owned(),
                });
            }
            if !(0.0..=1.0).contains(&rule.probability) {
                diagnostics.push(RuleDiagnostic {
                    subject: subject.clone(),
                    severity: Severity::Error,
                    message: format!("probability {} is outside 0..=1", rule.probability),
                });
            }
            let invalid = compiled.invalid_trigger_count();
            if invalid > 0 {
                diagnostics.push(RuleDiagnostic {
                    subject,
                    severity: Severity::Error,
                    message: format!("{invalid} regex trigger(s) failed to compile"),
                });
            }
        }

        let mut seen_commands = HashSet::new();
        for command in &self.commands.list {
            let name = command.name.to_lowercase();
            let subject = format!("command `{}`", command.name);
            if !seen_commands.insert(name) {
                diagnostics.push(RuleDiagnostic {
                    subject: subject.clone(),
                    severity: Severity::Error,
                    message: "duplicate command name (names are case-insensitive)".to_owned(),
                });
            }
            if command.name.chars().any(char::is_whitespace) || command.name.is_empty() {
                diagnostics.push(RuleDiagnostic {
                    subject,
                    severity: Severity::Error,
                    message: "command names must be a single non-empty token".to_owned(),
                });
            }
        }

        diagnostics
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::TempDir;

    use super::{RuleBook, RuleDocument, RuleLoadError, Severity, TriggerType};

    const SAMPLE: &str = r#"{
        "guidelines": {
            "rules": [
                {
                    "id": "greeting",
                    "enabled": true,
                    "triggers": ["hi", "hello"],
                    "triggerType": "contains",
                    "probability": 1,
                    "cooldown": 30,
                    "responses": ["hello {user}!"]
                },
                {
                    "id": "gg",
                    "enabled": true,
                    "triggers": ["^g+$"],
                    "triggerType": "regex",
                    "responses": ["GG!"]
                }
            ]
        },
        "commands": {
            "enabled": true,
            "prefix": "!",
            "list": [{ "name": "help", "enabled": true, "response": "Type !commands" }]
        }
    }"#;

    #[test]
    fn parses_original_json_document_shape() {
        let document = RuleDocument::from_json(SAMPLE).expect("sample parses");

        assert_eq!(document.guidelines.rules.len(), 2);
        let greeting = &document.guidelines.rules[0];
        assert_eq!(greeting.trigger_type, TriggerType::Contains);
        assert_eq!(greeting.cooldown, 30);
        assert_eq!(document.guidelines.rules[1].probability, 1.0);
        assert!(document.commands.enabled);
        assert_eq!(document.commands.list[0].name, "help");
    }

    #[test]
    fn unknown_trigger_type_behaves_as_contains() {
        let document = RuleDocument::from_json(
            r#"{"guidelines":{"rules":[{"id":"x","enabled":true,"triggers":["a"],"triggerType":"fuzzy","responses":["b"]}]}}"#,
        )
        .expect("document parses");

        assert_eq!(document.guidelines.rules[0].trigger_type, TriggerType::Contains);
    }

    #[test]
    fn missing_sections_default_to_empty() {
        let document = RuleDocument::from_json("{}").expect("empty object parses");

        assert!(document.guidelines.rules.is_empty());
        assert!(!document.commands.enabled);
        assert_eq!(document.commands.prefix, "!");
    }

    #[test]
    fn cooldown_seconds_alias_is_accepted() {
        let document = RuleDocument::from_json(
            r#"{"guidelines":{"rules":[{"id":"x","enabled":true,"triggers":["a"],"cooldownSeconds":12,"responses":["b"]}]}}"#,
        )
        .expect("document parses");

        assert_eq!(document.guidelines.rules[0].cooldown, 12);
    }

    #[test]
    fn invalid_regex_compiles_to_never_matching_trigger() {
        let book = RuleBook::from_document(
            RuleDocument::from_json(
                r#"{"guidelines":{"rules":[{"id":"bad","enabled":true,"triggers":["(unclosed"],"triggerType":"regex","responses":["x"]}]}}"#,
            )
            .expect("document parses"),
        );

        let rule = &book.rules()[0];
        assert!(!rule.triggered_by("(unclosed"));
        assert_eq!(rule.invalid_trigger_count(), 1);
        assert!(book.lint().iter().any(|diagnostic| diagnostic.severity == Severity::Error));
    }

    #[test]
    fn loads_toml_rule_files() {
        let dir = TempDir::new().expect("temp dir");
        let path = dir.path().join("guidelines.toml");
        fs::write(
            &path,
            r#"
[commands]
enabled = true
prefix = "?"

[[commands.list]]
name = "discord"
enabled = true
response = "join us"

[[guidelines.rules]]
id = "lurk"
enabled = true
triggers = ["lurk"]
triggerType = "startsWith"
responses = ["enjoy the lurk"]
"#,
        )
        .expect("write rules");

        let book = RuleBook::load(&path).expect("toml loads");

        assert_eq!(book.commands().prefix, "?");
        assert_eq!(book.rules()[0].rule.trigger_type, TriggerType::StartsWith);
        assert_eq!(book.source(), Some(path.as_path()));
    }

    #[test]
    fn malformed_file_degrades_to_empty_book_but_keeps_path() {
        let dir = TempDir::new().expect("temp dir");
        let path = dir.path().join("guidelines.json");
        fs::write(&path, "{ not json").expect("write rules");

        assert!(matches!(RuleBook::load(&path), Err(RuleLoadError::ParseJson { .. })));

        let book = RuleBook::load_or_empty(&path);
        assert!(book.rules().is_empty());
        assert_eq!(book.source(), Some(path.as_path()));
    }

    #[test]
    fn missing_file_degrades_to_empty_book() {
        let dir = TempDir::new().expect("temp dir");
        let book = RuleBook::load_or_empty(&dir.path().join("absent.json"));

        assert!(book.rules().is_empty());
        assert!(book.commands().list.is_empty());
    }

    #[test]
    fn lint_reports_duplicate_commands_case_insensitively() {
        let book = RuleBook::from_document(
            RuleDocument::from_json(
                r#"{"commands":{"enabled":true,"list":[{"name":"Help","enabled":true,"response":"a"},{"name":"help","enabled":true,"response":"b"}]}}"#,
            )
            .expect("document parses"),
        );

        let diagnostics = book.lint();
        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics[0].message.contains("duplicate command"));
    }
}
