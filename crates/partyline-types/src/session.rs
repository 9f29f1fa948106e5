//! Session, roster, and presence types.
//!
//! These model the logical chat session kept alive by the supervisor and the
//! read-only snapshots the remote room broadcasts (roster, typing presence,
//! reconnection outcome).

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Connection lifecycle of a session.
///
/// "Reconnecting" is not a separate state: it is `Disconnected` while a
/// backoff timer is pending.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionState::Disconnected => write!(f, "disconnected"),
            ConnectionState::Connecting => write!(f, "connecting"),
            ConnectionState::Connected => write!(f, "connected"),
        }
    }
}

/// Parameters of the last successful create or join.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub room_id: String,
    pub nickname: String,
    pub user_icon: Option<String>,
}

/// Snapshot of the logical session as the client currently sees it.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Session {
    /// Present only while the user is in a room.
    pub room_id: Option<String>,
    pub nickname: String,
    pub user_icon: Option<String>,
    pub connection_state: ConnectionState,
}

impl Session {
    pub fn in_room(&self) -> bool {
        self.room_id.is_some()
    }
}

/// Typing indicator broadcast for the room.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypingPresence {
    #[serde(default)]
    pub anyone_typing: bool,
    #[serde(default)]
    pub users_typing: Vec<String>,
}

/// Server-side notice about an automatic reconnection.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconnectionOutcome {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub room_id: Option<String>,
}

/// One participant currently present in the room.
///
/// Decoded from the remote roster broadcast; never mutated locally.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RosterWire")]
pub struct RosterEntry {
    pub connection_id: String,
    pub perm_id: String,
    pub nickname: String,
    pub icon: Option<String>,
    pub is_host: bool,
    pub is_cloud_player: bool,
}

/// Raw roster entry as sent by the server.
///
/// The host and cloud-player flags arrive either as JSON booleans or as the
/// strings `"true"` / `"false"`.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RosterWire {
    #[serde(default, alias = "connectionId")]
    socket_connection_id: String,
    #[serde(default)]
    perm_id: String,
    #[serde(default)]
    is_host: Value,
    #[serde(default)]
    is_cloud_player: Value,
    #[serde(default)]
    user_settings: RosterSettings,
    #[serde(default)]
    nickname: Option<String>,
    #[serde(default)]
    icon: Option<String>,
}

#[derive(Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RosterSettings {
    #[serde(default)]
    user_nickname: String,
    #[serde(default)]
    user_icon: Option<String>,
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::String(s) => s.eq_ignore_ascii_case("true"),
        Value::Number(n) => n.as_i64().is_some_and(|n| n != 0),
        _ => false,
    }
}

impl From<RosterWire> for RosterEntry {
    fn from(wire: RosterWire) -> Self {
        Self {
            connection_id: wire.socket_connection_id,
            perm_id: wire.perm_id,
            nickname: wire.nickname.unwrap_or(wire.user_settings.user_nickname),
            icon: wire.icon.or(wire.user_settings.user_icon),
            is_host: truthy(&wire.is_host),
            is_cloud_player: truthy(&wire.is_cloud_player),
        }
    }
}
