pub mod commands;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(
    name = "chatterbox",
    about = "Chatterbox operator CLI",
    long_about = "Inspect configuration, check readiness, lint the rule file, and dry-run chat messages through the rule pipeline.",
    after_help = "Examples:\n  chatterbox doctor --json\n  chatterbox rules --path config/guidelines.json\n  chatterbox simulate --user alice hello there"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config,
    #[command(about = "Validate config, the rule file, and generative capability readiness")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
    #[command(about = "List rules and commands from the rule file and report lint findings")]
    Rules {
        #[arg(long, help = "Rule file to read instead of the configured one")]
        path: Option<PathBuf>,
    },
    #[command(about = "Run one chat message through commands and rules without connecting")]
    Simulate {
        #[arg(long, help = "Sender login name")]
        user: String,
        #[arg(long, help = "Rule file to read instead of the configured one")]
        path: Option<PathBuf>,
        #[arg(required = true, trailing_var_arg = true, help = "Message text")]
        text: Vec<String>,
    },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Config => {
            commands::CommandResult { exit_code: 0, output: commands::config::run() }
        }
        Command::Doctor { json } => commands::doctor::run(json),
        Command::Rules { path } => commands::rules::run(path.as_deref()),
        Command::Simulate { user, path, text } => {
            commands::simulate::run(&user, &text.join(" "), path.as_deref())
        }
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
