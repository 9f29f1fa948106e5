//! CLI command definitions for the `partyline` binary.
//!
//! Uses clap derive macros for argument parsing.

pub mod chat;
pub mod history;
pub mod profile;

use clap::{Parser, Subcommand};

/// Chat in shared rooms over a resilient session connection.
#[derive(Parser)]
#[command(name = "partyline", version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output machine-readable JSON instead of styled text.
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress all log output except errors.
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Detailed logging (-v for debug, -vv for trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Write logs as JSON lines.
    #[arg(long, global = true)]
    pub log_json: bool,

    /// Export spans through OpenTelemetry (stdout exporter).
    #[arg(long, global = true)]
    pub otel: bool,

    /// Keep all client state in memory for this run only.
    #[arg(long, global = true)]
    pub ephemeral: bool,

    /// Session server URL (overrides config.toml).
    #[arg(long, global = true)]
    pub server: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Connect and chat. Rejoins the last room automatically.
    Chat {
        /// Join this room once connected.
        #[arg(long, conflicts_with = "create")]
        room: Option<String>,

        /// Create a new room once connected.
        #[arg(long)]
        create: bool,

        /// Nickname to use (saved as the active profile).
        #[arg(long)]
        nickname: Option<String>,
    },

    /// Manage the local user profile.
    Profile {
        #[command(subcommand)]
        action: ProfileCommand,
    },

    /// Print the saved message history of the current room.
    History {
        /// Show only the most recent N messages.
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Forget the saved room and its history.
    Forget {
        /// Also forget the saved profile.
        #[arg(long)]
        all: bool,
    },
}

#[derive(Subcommand)]
pub enum ProfileCommand {
    /// Set the nickname (and optional icon) used in rooms.
    Set {
        nickname: String,

        #[arg(long)]
        icon: Option<String>,
    },

    /// Show the saved profile.
    Show,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_chat_with_room() {
        let cli = Cli::try_parse_from(["partyline", "-v", "chat", "--room", "R1", "--nickname", "Alice"]).unwrap();
        assert_eq!(cli.verbose, 1);
        let Commands::Chat { room, create, nickname } = cli.command else {
            panic!("expected chat");
        };
        assert_eq!(room.as_deref(), Some("R1"));
        assert!(!create);
        assert_eq!(nickname.as_deref(), Some("Alice"));
    }

    #[test]
    fn test_room_conflicts_with_create() {
        assert!(Cli::try_parse_from(["partyline", "chat", "--room", "R1", "--create"]).is_err());
    }

    #[test]
    fn test_parse_profile_set() {
        let cli = Cli::try_parse_from(["partyline", "--ephemeral", "profile", "set", "Bob", "--icon", "cat.png"]).unwrap();
        assert!(cli.ephemeral);
        let Commands::Profile { action: ProfileCommand::Set { nickname, icon } } = cli.command else {
            panic!("expected profile set");
        };
        assert_eq!(nickname, "Bob");
        assert_eq!(icon.as_deref(), Some("cat.png"));
    }
}
