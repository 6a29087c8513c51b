pub mod commands;

use clap::{Parser, Subcommand};
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "aura",
    about = "Aura CRM operator CLI",
    long_about = "Operate the Aura CRM decision core: migrations, sample data, config inspection, \
readiness checks, lead scoring, follow-ups, and one-shot questions to the assistant.",
    after_help = "Examples:\n  aura doctor --json\n  aura leads --persist\n  aura ask \"who owns villa 42\""
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Apply pending database migrations and return structured status output")]
    Migrate,
    #[command(about = "Load the sample CRM dataset (idempotent) and verify it landed")]
    Seed,
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config,
    #[command(about = "Validate config, knowledge base, language model, and DB connectivity")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
    #[command(about = "Score every contact and list the ranking")]
    Leads {
        #[arg(long, help = "Store the computed scores")]
        persist: bool,
    },
    #[command(name = "follow-ups", about = "List contacts due for a follow-up, most urgent first")]
    FollowUps,
    #[command(about = "Send one utterance through the cognitive router")]
    Ask {
        #[arg(required = true, num_args = 1.., help = "What to ask")]
        text: Vec<String>,
    },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Migrate => commands::migrate::run(),
        Command::Seed => commands::seed::run(),
        Command::Config => {
            commands::CommandResult { exit_code: 0, output: commands::config::run() }
        }
        Command::Doctor { json } => {
            commands::CommandResult { exit_code: 0, output: commands::doctor::run(json) }
        }
        Command::Leads { persist } => commands::leads::run(persist),
        Command::FollowUps => commands::follow_ups::run(),
        Command::Ask { text } => commands::ask::run(&text.join(" ")),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::{Cli, Command};

    #[test]
    fn ask_joins_trailing_words() {
        let cli = Cli::try_parse_from(["aura", "ask", "who", "owns", "villa", "42"])
            .expect("ask should parse");
        match cli.command {
            Command::Ask { text } => assert_eq!(text.join(" "), "who owns villa 42"),
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn follow_ups_uses_kebab_case_name() {
        let cli = Cli::try_parse_from(["aura", "follow-ups"]).expect("follow-ups should parse");
        assert!(matches!(cli.command, Command::FollowUps));
    }

    #[test]
    fn leads_persist_flag_is_optional() {
        let cli = Cli::try_parse_from(["aura", "leads"]).expect("leads should parse");
        assert!(matches!(cli.command, Command::Leads { persist: false }));
        let cli = Cli::try_parse_from(["aura", "leads", "--persist"]).expect("leads should parse");
        assert!(matches!(cli.command, Command::Leads { persist: true }));
    }
}
