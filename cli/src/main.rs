use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;
mod store;
mod util;

use commands::AgentArgs;

#[derive(Parser)]
#[command(
    name = "kotoba",
    version,
    about = "Kotoba CLI: bilingual chat-command agents for ledgers, workouts and events"
)]
struct Cli {
    #[command(flatten)]
    agent: AgentArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Interactive chat: one message per line, `/quit` to leave
    Chat {
        /// Record file (defaults to <data dir>/kotoba/<agent>.json)
        #[arg(long, env = "KOTOBA_STORE")]
        store: Option<PathBuf>,
    },
    /// Handle a single message and print the reply
    Say {
        /// Message text
        #[arg(required = true, num_args = 1..)]
        text: Vec<String>,
        /// Record file (defaults to <data dir>/kotoba/<agent>.json)
        #[arg(long, env = "KOTOBA_STORE")]
        store: Option<PathBuf>,
    },
    /// Print the parsed request as JSON without dispatching it
    Resolve {
        /// Message text
        #[arg(required = true, num_args = 1..)]
        text: Vec<String>,
    },
    /// Normalize a date token ("today", "来週", "3/1", "2026-3-1")
    Date {
        #[arg(required = true, num_args = 1..)]
        token: Vec<String>,
    },
    /// List built-in agents and their intents
    Agents,
    /// Report sample messages shadowed by earlier trigger rules
    Lint,
}

fn main() {
    let _ = dotenvy::dotenv();
    util::init_tracing();
    let cli = Cli::parse();

    let code = match cli.command {
        Commands::Chat { store } => commands::chat::run(&cli.agent, store),
        Commands::Say { text, store } => commands::say::run(&cli.agent, &text.join(" "), store),
        Commands::Resolve { text } => commands::resolve::run(&cli.agent, &text.join(" ")),
        Commands::Date { token } => commands::date::run(&cli.agent, &token.join(" ")),
        Commands::Agents => commands::agents::run(),
        Commands::Lint => commands::lint::run(&cli.agent),
    };
    std::process::exit(code);
}
