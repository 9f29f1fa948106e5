//! Chat message and user profile types.
//!
//! `Message` mirrors the remote session's chat message shape (camelCase on
//! the wire) plus one persisted-only marker used by history reconciliation.

use serde::{Deserialize, Serialize};

/// A single chat message in a room.
///
/// Messages are ordered by `timestamp` (milliseconds since the epoch).
/// System messages ("joined", "left", ...) carry the acting user's nickname
/// separately; reconciliation folds it into `body` exactly once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    #[serde(default)]
    pub perm_id: String,
    #[serde(default)]
    pub user_nickname: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_icon: Option<String>,
    pub body: String,
    pub timestamp: i64,
    #[serde(default)]
    pub is_system_message: bool,
    /// Set once the nickname prefix has been folded into a system message body.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub actor_prefixed: bool,
}

impl Message {
    /// Build a regular (non-system) chat message.
    pub fn chat(
        perm_id: impl Into<String>,
        user_nickname: impl Into<String>,
        body: impl Into<String>,
        timestamp: i64,
    ) -> Self {
        Self {
            perm_id: perm_id.into(),
            user_nickname: user_nickname.into(),
            user_icon: None,
            body: body.into(),
            timestamp,
            is_system_message: false,
            actor_prefixed: false,
        }
    }

    /// Build a system message announcing something `user_nickname` did.
    pub fn system(user_nickname: impl Into<String>, body: impl Into<String>, timestamp: i64) -> Self {
        Self {
            perm_id: String::new(),
            user_nickname: user_nickname.into(),
            user_icon: None,
            body: body.into(),
            timestamp,
            is_system_message: true,
            actor_prefixed: false,
        }
    }

    /// Identity used for deduplication.
    ///
    /// Two distinct messages sent in the same millisecond with identical text
    /// collapse into one. Known limitation, kept for compatibility with the
    /// persisted history format.
    pub fn key(&self) -> MessageKey {
        MessageKey {
            timestamp: self.timestamp,
            body: self.body.clone(),
        }
    }
}

/// Deduplication identity of a message: `(timestamp, body)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MessageKey {
    pub timestamp: i64,
    pub body: String,
}

/// The local user's display identity, persisted in the active-profile slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub nickname: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_icon: Option<String>,
}

impl UserProfile {
    pub fn new(nickname: impl Into<String>, user_icon: Option<String>) -> Self {
        Self {
            nickname: nickname.into(),
            user_icon,
        }
    }
}
