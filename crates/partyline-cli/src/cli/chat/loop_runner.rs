//! Main interactive chat loop.
//!
//! Opens a supervised connection, then multiplexes three sources until the
//! user quits or the session closes: readline input, supervisor events, and
//! the results of room requests (create, join, leave) that run as spawned
//! tasks so the loop keeps draining events while a request waits for its
//! acknowledgement.

use std::io::Write;
use std::time::Duration;

use anyhow::{Result, bail};
use console::style;
use rustyline_async::SharedWriter;
use tokio::sync::mpsc;

use partyline_core::session::{ChatClient, CloseReason, ConnectionSupervisor, RejoinOutcome, SessionEvent};
use partyline_core::storage::{StorageKey, load_json};
use partyline_infra::transport::WsTransport;
use partyline_types::error::ChatError;
use partyline_types::message::{Message, UserProfile};
use partyline_types::session::RosterEntry;

use super::commands::{self, ChatCommand};
use super::input::{ChatInput, InputEvent};
use super::renderer;

/// How many history messages to print after entering a room.
const HISTORY_TAIL: usize = 20;

/// How long to wait for the supervisor to confirm teardown on exit.
const CLOSE_GRACE: Duration = Duration::from_secs(2);

/// What to do once the first connect has settled.
#[derive(Debug, Clone, PartialEq)]
enum StartIntent {
    /// Stay wherever the automatic rejoin put us.
    Resume,
    Create,
    Join(String),
}

/// Completion of a room request spawned off the loop.
enum RoomOutcome {
    Created(Result<String, ChatError>),
    Joined {
        room_id: String,
        result: Result<Vec<Message>, ChatError>,
    },
    Left(Result<bool, ChatError>),
}

/// Mutable view of the session the loop renders from.
struct ChatView {
    profile: UserProfile,
    room_id: Option<String>,
    roster: Vec<RosterEntry>,
    intent: Option<StartIntent>,
}

impl ChatView {
    fn prompt(&self) -> String {
        match &self.room_id {
            Some(room_id) => format!("{}@{}> ", self.profile.nickname, room_id),
            None => format!("{}> ", self.profile.nickname),
        }
    }
}

/// Run the interactive chat loop.
pub async fn run_chat_loop(
    state: &crate::state::AppState,
    room: Option<String>,
    create: bool,
    nickname: Option<String>,
) -> Result<()> {
    let saved: Option<UserProfile> = load_json(state.store.as_ref(), StorageKey::ActiveProfile).await;
    let profile = match (nickname, saved) {
        (Some(nickname), saved) if !nickname.trim().is_empty() => {
            UserProfile::new(nickname.trim(), saved.and_then(|p| p.user_icon))
        }
        (_, Some(saved)) if !saved.nickname.is_empty() => saved,
        _ => bail!(
            "no nickname set; pass --nickname or run `partyline profile set <nickname>`"
        ),
    };

    let intent = match (create, room) {
        (true, _) => StartIntent::Create,
        (false, Some(room_id)) => StartIntent::Join(room_id),
        (false, None) => StartIntent::Resume,
    };

    tracing::info!(server = %state.config.server_url, nickname = %profile.nickname, ?intent, "starting chat");

    let transport = WsTransport::new(state.config.server_url.clone());
    let (client, mut events) =
        ConnectionSupervisor::open(transport, state.store.clone(), state.config.clone());
    client.set_profile(profile.clone()).await?;

    let mut view = ChatView {
        profile,
        room_id: None,
        roster: Vec::new(),
        intent: Some(intent),
    };

    let (mut input, mut out) = ChatInput::new(view.prompt())?;
    let (outcome_tx, mut outcomes) = mpsc::unbounded_channel();

    writeln!(
        out,
        "  {} {} as {} {}",
        style("partyline").bold(),
        style(&state.config.server_url).dim(),
        style(&view.profile.nickname).cyan().bold(),
        style("(/help for commands)").dim()
    )?;

    loop {
        tokio::select! {
            line = input.read_line() => match line {
                InputEvent::Line(line) if line.is_empty() => {}
                InputEvent::Line(line) => {
                    let keep_going = handle_line(&line, &client, &mut view, &mut out, &outcome_tx).await?;
                    if !keep_going {
                        break;
                    }
                }
                InputEvent::Eof | InputEvent::Interrupted => break,
            },

            event = events.recv() => {
                let Some(event) = event else { break };
                let closed = matches!(event, SessionEvent::Closed(_));
                handle_event(event, &client, &mut view, &mut out, &outcome_tx).await?;
                if closed {
                    break;
                }
            }

            Some(outcome) = outcomes.recv() => {
                handle_outcome(outcome, &mut view, &mut out)?;
            }
        }
        input.update_prompt(&view.prompt());
    }

    client.teardown();
    let drained = tokio::time::timeout(CLOSE_GRACE, async {
        while let Some(event) = events.recv().await {
            if matches!(event, SessionEvent::Closed(_)) {
                break;
            }
        }
    })
    .await;
    if drained.is_err() {
        tracing::debug!("supervisor did not confirm close in time");
    }

    input.flush();
    Ok(())
}

/// Handle one submitted line. Returns `false` when the user asked to quit.
async fn handle_line(
    line: &str,
    client: &ChatClient,
    view: &mut ChatView,
    out: &mut SharedWriter,
    outcomes: &mpsc::UnboundedSender<RoomOutcome>,
) -> Result<bool> {
    let Some(command) = commands::parse(line) else {
        if view.room_id.is_none() {
            writeln!(
                out,
                "  {} not in a room; use {} or {}",
                style("i").blue().bold(),
                style("/join <id>").cyan(),
                style("/create").cyan()
            )?;
        } else {
            client.send_chat_message(line);
        }
        return Ok(true);
    };

    match command {
        ChatCommand::Help => write!(out, "{}", commands::help_text())?,
        ChatCommand::Quit => return Ok(false),
        ChatCommand::Create => spawn_create(client, &view.profile, outcomes),
        ChatCommand::Join(room_id) => spawn_join(client, &view.profile, room_id, outcomes),
        ChatCommand::Leave => {
            let client = client.clone();
            let outcomes = outcomes.clone();
            tokio::spawn(async move {
                let _ = outcomes.send(RoomOutcome::Left(client.leave_room().await));
            });
        }
        ChatCommand::Typing(typing) => client.set_typing_status(typing),
        ChatCommand::Who => writeln!(out, "{}", renderer::render_roster(&view.roster))?,
        ChatCommand::History => {
            let messages = client.messages().await?;
            print_tail(out, &messages, messages.len())?;
        }
        ChatCommand::Unknown(what) => writeln!(
            out,
            "  {} unknown command {} (try /help)",
            style("?").yellow().bold(),
            style(what).bold()
        )?,
    }
    Ok(true)
}

async fn handle_event(
    event: SessionEvent,
    client: &ChatClient,
    view: &mut ChatView,
    out: &mut SharedWriter,
    outcomes: &mpsc::UnboundedSender<RoomOutcome>,
) -> Result<()> {
    if let Some(line) = renderer::render_event(&event) {
        writeln!(out, "{line}")?;
    }

    match event {
        SessionEvent::Chat(message) => writeln!(out, "{}", renderer::render_message(&message))?,
        SessionEvent::Typing(presence) => {
            if let Some(line) = renderer::render_typing(&presence, &view.roster) {
                writeln!(out, "{line}")?;
            }
        }
        SessionEvent::Roster(roster) => {
            let (joined, left) = renderer::roster_changes(&view.roster, &roster);
            tracing::debug!(?joined, ?left, size = roster.len(), "roster updated");
            // The first snapshot after entering a room is not news.
            if !view.roster.is_empty() {
                for nickname in joined {
                    writeln!(out, "  {} {nickname} is here", style("+").green())?;
                }
                for nickname in left {
                    writeln!(out, "  {} {nickname} went away", style("-").red())?;
                }
            }
            view.roster = roster;
        }
        SessionEvent::Rejoin(outcome) => {
            match &outcome {
                RejoinOutcome::Rejoined { room_id, .. } => {
                    view.room_id = Some(room_id.clone());
                    let messages = client.messages().await?;
                    print_tail(out, &messages, HISTORY_TAIL)?;
                }
                RejoinOutcome::Failed { .. } => view.room_id = None,
                RejoinOutcome::Skipped => {}
            }
            if let Some(intent) = view.intent.take() {
                start(intent, client, view, &outcome, out, outcomes)?;
            }
        }
        SessionEvent::Closed(CloseReason::RetriesExhausted(_)) => view.room_id = None,
        _ => {}
    }
    Ok(())
}

/// Carry out the start intent once the first connect has settled.
fn start(
    intent: StartIntent,
    client: &ChatClient,
    view: &ChatView,
    rejoin: &RejoinOutcome,
    out: &mut SharedWriter,
    outcomes: &mpsc::UnboundedSender<RoomOutcome>,
) -> Result<()> {
    match intent {
        StartIntent::Create => spawn_create(client, &view.profile, outcomes),
        StartIntent::Join(room_id) => match rejoin {
            RejoinOutcome::Rejoined { room_id: current, .. } if *current == room_id => {}
            _ => spawn_join(client, &view.profile, room_id, outcomes),
        },
        StartIntent::Resume if view.room_id.is_none() => writeln!(
            out,
            "  {} not in a room; use {} or {}",
            style("i").blue().bold(),
            style("/join <id>").cyan(),
            style("/create").cyan()
        )?,
        StartIntent::Resume => {}
    }
    Ok(())
}

fn handle_outcome(outcome: RoomOutcome, view: &mut ChatView, out: &mut SharedWriter) -> Result<()> {
    match outcome {
        RoomOutcome::Created(Ok(room_id)) => {
            writeln!(
                out,
                "  {} created room {} (share this id to invite others)",
                style("✓").green().bold(),
                style(&room_id).cyan().bold()
            )?;
            view.room_id = Some(room_id);
            view.roster.clear();
        }
        RoomOutcome::Joined {
            room_id,
            result: Ok(history),
        } => {
            writeln!(out, "  {} joined {}", style("✓").green().bold(), style(&room_id).cyan())?;
            print_tail(out, &history, HISTORY_TAIL)?;
            view.room_id = Some(room_id);
            view.roster.clear();
        }
        RoomOutcome::Left(Ok(acked)) => {
            let note = if acked { "" } else { " (offline, forgotten locally)" };
            if view.room_id.is_some() {
                writeln!(out, "  {} left the room{note}", style("✓").green().bold())?;
            } else {
                writeln!(out, "  {} not in a room", style("i").blue().bold())?;
            }
            view.room_id = None;
            view.roster.clear();
        }
        RoomOutcome::Created(Err(err)) => writeln!(out, "  {} create failed: {err}", style("✗").red().bold())?,
        RoomOutcome::Joined {
            room_id,
            result: Err(err),
        } => writeln!(
            out,
            "  {} could not join {}: {err}",
            style("✗").red().bold(),
            style(room_id).cyan()
        )?,
        RoomOutcome::Left(Err(err)) => writeln!(out, "  {} leave failed: {err}", style("✗").red().bold())?,
    }
    Ok(())
}

fn spawn_create(client: &ChatClient, profile: &UserProfile, outcomes: &mpsc::UnboundedSender<RoomOutcome>) {
    let client = client.clone();
    let profile = profile.clone();
    let outcomes = outcomes.clone();
    tokio::spawn(async move {
        let result = client.create_room(profile.nickname, profile.user_icon).await;
        let _ = outcomes.send(RoomOutcome::Created(result));
    });
}

fn spawn_join(
    client: &ChatClient,
    profile: &UserProfile,
    room_id: String,
    outcomes: &mpsc::UnboundedSender<RoomOutcome>,
) {
    let client = client.clone();
    let profile = profile.clone();
    let outcomes = outcomes.clone();
    tokio::spawn(async move {
        let result = client
            .join_room(profile.nickname, room_id.clone(), profile.user_icon)
            .await;
        let _ = outcomes.send(RoomOutcome::Joined { room_id, result });
    });
}

fn print_tail(out: &mut SharedWriter, messages: &[Message], limit: usize) -> std::io::Result<()> {
    let skip = messages.len().saturating_sub(limit);
    if skip > 0 {
        writeln!(out, "  {}", style(format!("... {skip} earlier messages")).dim())?;
    }
    for message in &messages[skip..] {
        writeln!(out, "{}", renderer::render_message(message))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn view(room_id: Option<&str>) -> ChatView {
        ChatView {
            profile: UserProfile::new("Alice", None),
            room_id: room_id.map(str::to_string),
            roster: Vec::new(),
            intent: None,
        }
    }

    #[test]
    fn test_prompt_shows_room() {
        assert_eq!(view(None).prompt(), "Alice> ");
        assert_eq!(view(Some("R1")).prompt(), "Alice@R1> ");
    }
}
