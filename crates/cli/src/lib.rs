pub mod commands;

use clap::{Parser, Subcommand};
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "relay",
    about = "Relay operator CLI",
    long_about = "Inspect relay configuration, check readiness, apply session-store migrations, and chat with the agent locally.",
    after_help = "Examples:\n  relay doctor --json\n  relay config\n  relay chat"
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
    #[command(about = "Validate config, oracle readiness, and session store connectivity")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
    #[command(about = "Apply pending session-store migrations and return structured status output")]
    Migrate,
    #[command(about = "Chat with the agent from the terminal using in-memory collaborators")]
    Chat,
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Config => {
            commands::CommandResult { exit_code: 0, output: commands::config::run() }
        }
        Command::Doctor { json } => commands::doctor::run(json),
        Command::Migrate => commands::migrate::run(),
        Command::Chat => commands::chat::run(),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
