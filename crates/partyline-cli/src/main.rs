//! partyline command-line chat client.
//!
//! Binary name: `partyline`
//!
//! Parses CLI arguments, sets up logging, opens the client store, then
//! dispatches to the chat loop or one of the local state commands.

mod cli;
mod state;

use clap::Parser;
use partyline_observe::{TracingOptions, init_tracing, shutdown_tracing};

use cli::{Cli, Commands, ProfileCommand};
use state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let options = TracingOptions {
        default_filter: verbosity_filter(cli.verbose, cli.quiet).to_string(),
        json: cli.log_json,
        otel: cli.otel,
    };
    init_tracing(&options).map_err(|e| anyhow::anyhow!("failed to initialize logging: {e}"))?;

    let result = run(cli).await;
    shutdown_tracing();
    result
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let state = AppState::init(cli.ephemeral, cli.server.clone()).await?;

    match cli.command {
        Commands::Chat {
            room,
            create,
            nickname,
        } => {
            cli::chat::loop_runner::run_chat_loop(&state, room, create, nickname).await?;
        }

        Commands::Profile { action } => match action {
            ProfileCommand::Set { nickname, icon } => {
                cli::profile::set_profile(&state, &nickname, icon, cli.json).await?;
            }
            ProfileCommand::Show => {
                cli::profile::show_profile(&state, cli.json).await?;
            }
        },

        Commands::History { limit } => {
            cli::history::show_history(&state, limit, cli.json).await?;
        }

        Commands::Forget { all } => {
            cli::history::forget(&state, all, cli.json).await?;
        }
    }

    Ok(())
}

/// Map `-v` counts to tracing filter directives.
fn verbosity_filter(verbose: u8, quiet: bool) -> &'static str {
    match verbose {
        0 if quiet => "error",
        0 => "warn",
        1 => "info,partyline_core=debug,partyline_infra=debug",
        _ => "trace",
    }
}
