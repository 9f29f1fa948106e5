//! Profile CLI commands: set, show.

use anyhow::{Result, bail};
use console::style;

use partyline_core::storage::{StorageKey, load_json, save_json};
use partyline_types::message::UserProfile;

use crate::state::AppState;

/// Save the nickname (and icon) used when creating or joining rooms.
///
/// # Examples
///
/// ```bash
/// partyline profile set Alice --icon fox.png
/// ```
pub async fn set_profile(
    state: &AppState,
    nickname: &str,
    icon: Option<String>,
    json: bool,
) -> Result<()> {
    let nickname = nickname.trim();
    if nickname.is_empty() {
        bail!("nickname must not be empty");
    }

    let profile = UserProfile::new(nickname, icon);
    save_json(state.store.as_ref(), StorageKey::ActiveProfile, &profile).await;

    if json {
        println!("{}", serde_json::json!({"saved": true, "profile": profile}));
    } else {
        println!(
            "  {} Profile saved as '{}'",
            style("✓").green().bold(),
            style(&profile.nickname).bold()
        );
    }

    Ok(())
}

/// Show the saved profile and the room the client will rejoin.
pub async fn show_profile(state: &AppState, json: bool) -> Result<()> {
    let store = state.store.as_ref();
    let profile: Option<UserProfile> = load_json(store, StorageKey::ActiveProfile).await;
    let room_id: Option<String> = load_json(store, StorageKey::ActiveRoomId).await;

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({
                "profile": profile,
                "roomId": room_id,
                "dataDir": state.data_dir,
            }))?
        );
        return Ok(());
    }

    println!();
    match profile {
        Some(profile) => {
            println!("  {}  {}", style("Nickname:").dim(), style(&profile.nickname).bold());
            if let Some(icon) = &profile.user_icon {
                println!("  {}      {}", style("Icon:").dim(), icon);
            }
        }
        None => println!(
            "  {} No profile saved. Set one with: {}",
            style("i").blue().bold(),
            style("partyline profile set <nickname>").yellow()
        ),
    }
    if let Some(room_id) = room_id {
        println!("  {}      {}", style("Room:").dim(), style(room_id).cyan());
    }
    println!("  {}      {}", style("Data:").dim(), state.data_dir.display());
    println!();

    Ok(())
}
