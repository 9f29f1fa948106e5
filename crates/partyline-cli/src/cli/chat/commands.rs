//! Slash command parsing for the chat loop.
//!
//! Commands start with `/` and control the session itself: joining and
//! leaving rooms, typing state, and the local transcript.

use console::style;

/// Available slash commands in the chat loop.
#[derive(Debug, PartialEq)]
pub enum ChatCommand {
    /// Show available commands.
    Help,
    /// Tear down the session and exit.
    Quit,
    /// Leave the current room.
    Leave,
    /// Create a new room.
    Create,
    /// Join a room by id.
    Join(String),
    /// Publish typing state.
    Typing(bool),
    /// List who is in the room.
    Who,
    /// Reprint the reconciled history.
    History,
    /// Unknown command or bad arguments.
    Unknown(String),
}

/// Parse user input as a slash command.
///
/// Returns `None` if the input doesn't start with `/`.
pub fn parse(input: &str) -> Option<ChatCommand> {
    let trimmed = input.trim();
    if !trimmed.starts_with('/') {
        return None;
    }

    let (cmd, arg) = match trimmed.split_once(' ') {
        Some((cmd, arg)) => (cmd.to_lowercase(), arg.trim()),
        None => (trimmed.to_lowercase(), ""),
    };

    let command = match cmd.as_str() {
        "/help" | "/h" | "/?" => ChatCommand::Help,
        "/quit" | "/exit" | "/q" => ChatCommand::Quit,
        "/leave" => ChatCommand::Leave,
        "/create" | "/new" => ChatCommand::Create,
        "/join" if arg.is_empty() => ChatCommand::Unknown("/join requires a room id".to_string()),
        "/join" => ChatCommand::Join(arg.to_string()),
        "/typing" => match arg.to_lowercase().as_str() {
            "on" | "" => ChatCommand::Typing(true),
            "off" => ChatCommand::Typing(false),
            _ => ChatCommand::Unknown("/typing takes on or off".to_string()),
        },
        "/who" | "/users" => ChatCommand::Who,
        "/history" => ChatCommand::History,
        other => ChatCommand::Unknown(other.to_string()),
    };
    Some(command)
}

/// Help text listing all available commands.
pub fn help_text() -> String {
    let rows = [
        ("/help", "Show this help message"),
        ("/join <id>", "Join a room by id"),
        ("/create", "Create a new room"),
        ("/leave", "Leave the current room"),
        ("/who", "List people in the room"),
        ("/typing on|off", "Set your typing indicator"),
        ("/history", "Reprint the room history"),
        ("/quit", "Disconnect and exit"),
    ];

    let mut out = format!("\n  {}\n\n", style("Available commands:").bold());
    for (cmd, description) in rows {
        out.push_str(&format!("  {:<16} {}\n", style(cmd).cyan(), description));
    }
    out
}
