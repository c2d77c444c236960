use std::process::ExitCode;

fn main() -> ExitCode {
    chatterbox_cli::run()
}
