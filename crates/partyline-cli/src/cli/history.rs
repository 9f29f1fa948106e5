//! Offline history commands: show the saved transcript, forget state.

use anyhow::Result;
use console::style;

use partyline_core::storage::{StorageKey, clear_slot, load_json};
use partyline_types::message::Message;

use crate::cli::chat::renderer::render_message;
use crate::state::AppState;

/// Print the persisted history of the current room.
pub async fn show_history(state: &AppState, limit: Option<usize>, json: bool) -> Result<()> {
    let store = state.store.as_ref();
    let messages: Vec<Message> = load_json(store, StorageKey::MessageHistory)
        .await
        .unwrap_or_default();
    let room_id: Option<String> = load_json(store, StorageKey::ActiveRoomId).await;

    let skip = limit.map_or(0, |n| messages.len().saturating_sub(n));
    let shown = &messages[skip..];

    if json {
        println!("{}", serde_json::to_string_pretty(shown)?);
        return Ok(());
    }

    if shown.is_empty() {
        println!();
        println!("  {} No saved history.", style("i").blue().bold());
        println!();
        return Ok(());
    }

    println!();
    if let Some(room_id) = room_id {
        println!("  {} {}", style("Room").bold(), style(room_id).cyan());
        println!();
    }
    for message in shown {
        println!("  {}", render_message(message));
    }
    println!();
    println!(
        "  {}",
        style(format!("{} of {} messages", shown.len(), messages.len())).dim()
    );

    Ok(())
}

/// Clear the saved room and history (and the profile with `--all`).
pub async fn forget(state: &AppState, all: bool, json: bool) -> Result<()> {
    let store = state.store.as_ref();
    let keys: &[StorageKey] = if all {
        &StorageKey::ALL
    } else {
        &[StorageKey::ActiveRoomId, StorageKey::MessageHistory]
    };

    for key in keys {
        clear_slot(store, *key).await;
    }

    if json {
        let cleared: Vec<&str> = keys.iter().map(StorageKey::as_str).collect();
        println!("{}", serde_json::json!({"cleared": cleared}));
    } else {
        println!(
            "  {} Forgot {}",
            style("✓").green().bold(),
            if all { "profile, room, and history" } else { "room and history" }
        );
    }

    Ok(())
}
