//! Wire frames exchanged with the session server.
//!
//! Every frame is a JSON object `{ "type": ..., "data": ..., "callbackId"? }`.
//! Outbound request frames carry a `callbackId`; the server echoes it on the
//! acknowledgement frame.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Frame `type` values understood by the client.
pub mod frame_types {
    pub const CREATE_SESSION: &str = "createSession";
    pub const JOIN_SESSION: &str = "joinSession";
    pub const LEAVE_SESSION: &str = "leaveSession";
    pub const SEND_MESSAGE: &str = "sendMessage";
    pub const SET_TYPING_PRESENCE: &str = "setTypingPresence";
    pub const USER_LIST: &str = "userList";
    pub const RECONNECTION: &str = "reconnection";
    pub const KEEP_ALIVE: &str = "keepAlive";

    /// Alternate spellings accepted on inbound frames.
    pub const CHAT_MESSAGE_ALIAS: &str = "chat-message";
    pub const TYPING_PRESENCE_ALIAS: &str = "typing-presence";
    pub const ROSTER_UPDATE_ALIAS: &str = "roster-update";
}

/// One discrete message on the transport.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    #[serde(rename = "type")]
    pub frame_type: String,
    #[serde(default)]
    pub data: Value,
    #[serde(rename = "callbackId", default, skip_serializing_if = "Option::is_none")]
    pub callback_id: Option<String>,
}

impl Frame {
    /// Build a frame without a correlation id.
    pub fn new(frame_type: impl Into<String>, data: Value) -> Self {
        Self {
            frame_type: frame_type.into(),
            data,
            callback_id: None,
        }
    }

    /// Attach a correlation id.
    #[must_use]
    pub fn with_callback_id(mut self, callback_id: impl Into<String>) -> Self {
        self.callback_id = Some(callback_id.into());
        self
    }
}

/// The `userSettings` object sent with create and join requests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSettings {
    pub user_nickname: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_icon: Option<String>,
}
