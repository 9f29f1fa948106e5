//! Plain-text rendering of messages and session events.
//!
//! Every function here is pure: it returns the line to print and leaves
//! writing to the caller, which owns the readline writer.

use chrono::{DateTime, Local};
use console::style;

use partyline_core::session::{CloseReason, RejoinOutcome, SessionEvent};
use partyline_types::message::Message;
use partyline_types::session::{ConnectionState, RosterEntry, TypingPresence};

/// `HH:MM` in local time, or `--:--` for out-of-range timestamps.
pub fn clock(timestamp_ms: i64) -> String {
    DateTime::from_timestamp_millis(timestamp_ms)
        .map(|utc| utc.with_timezone(&Local).format("%H:%M").to_string())
        .unwrap_or_else(|| "--:--".to_string())
}

pub fn render_message(message: &Message) -> String {
    let time = style(clock(message.timestamp)).dim();
    if message.is_system_message {
        format!("{time} {} {}", style("*").yellow(), style(&message.body).italic())
    } else {
        let nickname = if message.user_nickname.is_empty() {
            "anonymous"
        } else {
            &message.user_nickname
        };
        format!("{time} {} {}", style(format!("{nickname}:")).cyan().bold(), message.body)
    }
}

/// Status line for a supervisor event. Chat messages and roster snapshots
/// are rendered by the loop itself; this covers everything else.
pub fn render_event(event: &SessionEvent) -> Option<String> {
    let line = match event {
        SessionEvent::StateChanged { state, terminal } => match (state, terminal) {
            (ConnectionState::Connecting, _) => format!("{} connecting...", style("~").dim()),
            (ConnectionState::Connected, _) => format!("{} connected", style("✓").green().bold()),
            (ConnectionState::Disconnected, true) => {
                format!("{} disconnected, giving up", style("✗").red().bold())
            }
            (ConnectionState::Disconnected, false) => {
                format!("{} disconnected", style("!").yellow().bold())
            }
        },
        SessionEvent::ReconnectScheduled { attempt, delay } => format!(
            "{} reconnecting in {:.1}s (attempt {})",
            style("~").dim(),
            delay.as_secs_f64(),
            attempt + 1
        ),
        SessionEvent::Closed(CloseReason::Manual) => format!("{} session closed", style("·").dim()),
        SessionEvent::Closed(CloseReason::RetriesExhausted(err)) => {
            format!("{} {err}", style("✗").red().bold())
        }
        SessionEvent::Rejoin(RejoinOutcome::Skipped) => return None,
        SessionEvent::Rejoin(RejoinOutcome::Rejoined { room_id, history_len }) => format!(
            "{} rejoined {} ({history_len} messages)",
            style("✓").green().bold(),
            style(room_id).cyan()
        ),
        SessionEvent::Rejoin(RejoinOutcome::Failed { room_id, error }) => format!(
            "{} could not rejoin {}: {error}",
            style("✗").red().bold(),
            style(room_id).cyan()
        ),
        SessionEvent::Reconnection(outcome) if !outcome.success => {
            format!("{} server could not restore the session", style("!").yellow().bold())
        }
        SessionEvent::HistoryMerged { added, .. } if *added > 0 => {
            format!("{} {added} earlier messages loaded", style("·").dim())
        }
        SessionEvent::Chat(_)
        | SessionEvent::Roster(_)
        | SessionEvent::Typing(_)
        | SessionEvent::Reconnection(_)
        | SessionEvent::HistoryMerged { .. } => return None,
    };
    Some(line)
}

/// Nicknames that appeared in or disappeared from the roster.
pub fn roster_changes<'a>(
    previous: &'a [RosterEntry],
    current: &'a [RosterEntry],
) -> (Vec<&'a str>, Vec<&'a str>) {
    fn present(list: &[RosterEntry], entry: &RosterEntry) -> bool {
        list.iter().any(|e| e.connection_id == entry.connection_id)
    }
    let joined = current
        .iter()
        .filter(|e| !present(previous, e))
        .map(|e| e.nickname.as_str())
        .collect();
    let left = previous
        .iter()
        .filter(|e| !present(current, e))
        .map(|e| e.nickname.as_str())
        .collect();
    (joined, left)
}

pub fn render_roster(roster: &[RosterEntry]) -> String {
    if roster.is_empty() {
        return format!("{} nobody here", style("·").dim());
    }
    let names: Vec<String> = roster
        .iter()
        .map(|entry| {
            if entry.is_host {
                format!("{} {}", entry.nickname, style("(host)").dim())
            } else {
                entry.nickname.clone()
            }
        })
        .collect();
    format!("{} {} here: {}", style("·").dim(), roster.len(), names.join(", "))
}

/// "Bob is typing..." for the typists the roster can name.
pub fn render_typing(presence: &TypingPresence, roster: &[RosterEntry]) -> Option<String> {
    if !presence.anyone_typing {
        return None;
    }
    let names: Vec<&str> = roster
        .iter()
        .filter(|entry| presence.users_typing.contains(&entry.perm_id))
        .map(|entry| entry.nickname.as_str())
        .collect();
    let who = match names.as_slice() {
        [] => "someone is".to_string(),
        [one] => format!("{one} is"),
        many => format!("{} are", many.join(", ")),
    };
    Some(format!("{} {who} typing...", style("·").dim()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use partyline_types::error::ChatError;

    fn plain(s: &str) -> String {
        console::strip_ansi_codes(s).to_string()
    }

    fn entry(connection_id: &str, perm_id: &str, nickname: &str) -> RosterEntry {
        RosterEntry {
            connection_id: connection_id.to_string(),
            perm_id: perm_id.to_string(),
            nickname: nickname.to_string(),
            icon: None,
            is_host: false,
            is_cloud_player: false,
        }
    }

    #[test]
    fn test_render_chat_and_system_messages() {
        let chat = plain(&render_message(&Message::chat("p-1", "Alice", "hello", 1_000)));
        assert!(chat.contains("Alice: hello"));

        let system = plain(&render_message(&Message::system("Bob", "Bob joined", 2_000)));
        assert!(system.contains("* Bob joined"));

        let anon = plain(&render_message(&Message::chat("", "", "hi", 3_000)));
        assert!(anon.contains("anonymous: hi"));
    }

    #[test]
    fn test_clock_out_of_range() {
        assert_eq!(clock(i64::MAX), "--:--");
        assert_eq!(clock(0).len(), 5);
    }

    #[test]
    fn test_render_lifecycle_events() {
        let scheduled = SessionEvent::ReconnectScheduled {
            attempt: 0,
            delay: Duration::from_millis(1500),
        };
        assert!(plain(&render_event(&scheduled).unwrap()).contains("1.5s (attempt 1)"));

        let terminal = SessionEvent::StateChanged {
            state: ConnectionState::Disconnected,
            terminal: true,
        };
        assert!(plain(&render_event(&terminal).unwrap()).contains("giving up"));

        let exhausted = SessionEvent::Closed(CloseReason::RetriesExhausted(ChatError::RetriesExhausted {
            attempts: 5,
        }));
        assert!(render_event(&exhausted).is_some());
    }

    #[test]
    fn test_quiet_events_render_nothing() {
        assert!(render_event(&SessionEvent::Rejoin(RejoinOutcome::Skipped)).is_none());
        assert!(render_event(&SessionEvent::HistoryMerged { added: 0, total: 4 }).is_none());
        assert!(render_event(&SessionEvent::Chat(Message::chat("p", "A", "x", 1))).is_none());
        assert!(render_event(&SessionEvent::Roster(vec![])).is_none());
    }

    #[test]
    fn test_render_rejoin() {
        let rejoined = SessionEvent::Rejoin(RejoinOutcome::Rejoined {
            room_id: "R1".to_string(),
            history_len: 3,
        });
        assert!(plain(&render_event(&rejoined).unwrap()).contains("rejoined R1 (3 messages)"));
    }

    #[test]
    fn test_roster_changes() {
        let before = vec![entry("c-1", "p-1", "Alice"), entry("c-2", "p-2", "Bob")];
        let after = vec![entry("c-1", "p-1", "Alice"), entry("c-3", "p-3", "Carol")];
        let (joined, left) = roster_changes(&before, &after);
        assert_eq!(joined, vec!["Carol"]);
        assert_eq!(left, vec!["Bob"]);

        let (joined, left) = roster_changes(&after, &after);
        assert!(joined.is_empty() && left.is_empty());
    }

    #[test]
    fn test_render_typing() {
        let roster = vec![entry("c-1", "p-1", "Alice"), entry("c-2", "p-2", "Bob")];
        let idle = TypingPresence::default();
        assert!(render_typing(&idle, &roster).is_none());

        let bob = TypingPresence {
            anyone_typing: true,
            users_typing: vec!["p-2".to_string()],
        };
        assert!(plain(&render_typing(&bob, &roster).unwrap()).contains("Bob is typing"));

        let unknown = TypingPresence {
            anyone_typing: true,
            users_typing: vec!["p-9".to_string()],
        };
        assert!(plain(&render_typing(&unknown, &roster).unwrap()).contains("someone is typing"));
    }

    #[test]
    fn test_render_roster() {
        let mut host = entry("c-1", "p-1", "Alice");
        host.is_host = true;
        let line = plain(&render_roster(&[host, entry("c-2", "p-2", "Bob")]));
        assert!(line.contains("2 here: Alice (host), Bob"));
        assert!(plain(&render_roster(&[])).contains("nobody"));
    }
}
