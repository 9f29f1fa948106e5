//! Cloneable handle to a running connection supervisor.
//!
//! Every operation is a message to the supervisor task. Requests carry a
//! oneshot reply; if the supervisor is gone (torn down) before answering,
//! the request resolves to [`ChatError::Cancelled`].

use partyline_types::error::ChatError;
use partyline_types::frame::frame_types;
use partyline_types::message::{Message, UserProfile};
use partyline_types::session::{ConnectionState, Session};
use serde_json::{Value, json};
use tokio::sync::{mpsc, oneshot, watch};

pub(crate) type Reply<T> = oneshot::Sender<Result<T, ChatError>>;

/// Commands sent from `ChatClient` to the supervisor task.
#[derive(Debug)]
pub(crate) enum Command {
    CreateRoom {
        nickname: String,
        user_icon: Option<String>,
        reply: Reply<String>,
    },
    JoinRoom {
        nickname: String,
        room_id: String,
        user_icon: Option<String>,
        reply: Reply<Vec<Message>>,
    },
    LeaveRoom {
        reply: Reply<bool>,
    },
    Send {
        frame_type: String,
        payload: Value,
    },
    SendWithAck {
        frame_type: String,
        payload: Value,
        reply: Reply<Value>,
    },
    SetProfile {
        profile: UserProfile,
        reply: Reply<()>,
    },
    Profile {
        reply: Reply<Option<UserProfile>>,
    },
    Messages {
        reply: Reply<Vec<Message>>,
    },
    Session {
        reply: Reply<Session>,
    },
    Teardown,
}

/// Handle used by the UI layer to drive a chat session.
#[derive(Debug, Clone)]
pub struct ChatClient {
    commands: mpsc::UnboundedSender<Command>,
    state: watch::Receiver<ConnectionState>,
}

impl ChatClient {
    pub(crate) fn new(
        commands: mpsc::UnboundedSender<Command>,
        state: watch::Receiver<ConnectionState>,
    ) -> Self {
        Self { commands, state }
    }

    /// Create a new room and enter it. Resolves to the room id.
    pub async fn create_room(
        &self,
        nickname: impl Into<String>,
        user_icon: Option<String>,
    ) -> Result<String, ChatError> {
        let nickname = nickname.into();
        self.request(|reply| Command::CreateRoom {
            nickname,
            user_icon,
            reply,
        })
        .await
    }

    /// Join an existing room. Resolves to the reconciled message history.
    pub async fn join_room(
        &self,
        nickname: impl Into<String>,
        room_id: impl Into<String>,
        user_icon: Option<String>,
    ) -> Result<Vec<Message>, ChatError> {
        let nickname = nickname.into();
        let room_id = room_id.into();
        self.request(|reply| Command::JoinRoom {
            nickname,
            room_id,
            user_icon,
            reply,
        })
        .await
    }

    /// Leave the current room.
    ///
    /// Resolves to `true` if the server acknowledged the leave, `false` if
    /// there was no room or the client was offline (the room is still
    /// forgotten locally in that case).
    pub async fn leave_room(&self) -> Result<bool, ChatError> {
        self.request(|reply| Command::LeaveRoom { reply }).await
    }

    /// Post a chat message to the current room. Dropped while disconnected.
    pub fn send_chat_message(&self, body: impl Into<String>) {
        self.send(frame_types::SEND_MESSAGE, json!({ "body": body.into() }));
    }

    /// Publish the local user's typing state. Dropped while disconnected.
    pub fn set_typing_status(&self, typing: bool) {
        self.send(frame_types::SET_TYPING_PRESENCE, json!({ "typing": typing }));
    }

    /// Fire-and-forget frame. Dropped (and logged) while disconnected.
    pub fn send(&self, frame_type: impl Into<String>, payload: Value) {
        let command = Command::Send {
            frame_type: frame_type.into(),
            payload,
        };
        if self.commands.send(command).is_err() {
            tracing::debug!("client torn down, dropping outbound frame");
        }
    }

    /// Send a frame and wait for the server's acknowledgement payload.
    pub async fn send_with_ack(
        &self,
        frame_type: impl Into<String>,
        payload: Value,
    ) -> Result<Value, ChatError> {
        let frame_type = frame_type.into();
        self.request(|reply| Command::SendWithAck {
            frame_type,
            payload,
            reply,
        })
        .await
    }

    /// Persist the local user's profile.
    pub async fn set_profile(&self, profile: UserProfile) -> Result<(), ChatError> {
        self.request(|reply| Command::SetProfile { profile, reply }).await
    }

    /// The persisted profile, if any.
    pub async fn profile(&self) -> Result<Option<UserProfile>, ChatError> {
        self.request(|reply| Command::Profile { reply }).await
    }

    /// Snapshot of the reconciled message collection.
    pub async fn messages(&self) -> Result<Vec<Message>, ChatError> {
        self.request(|reply| Command::Messages { reply }).await
    }

    /// Snapshot of the logical session.
    pub async fn session(&self) -> Result<Session, ChatError> {
        self.request(|reply| Command::Session { reply }).await
    }

    /// Watch the connection state.
    pub fn state(&self) -> watch::Receiver<ConnectionState> {
        self.state.clone()
    }

    pub fn connection_state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// Stop the session: cancel timers, close the transport, and reject
    /// outstanding requests. Safe to call any number of times.
    pub fn teardown(&self) {
        if self.commands.send(Command::Teardown).is_err() {
            tracing::debug!("teardown requested on a stopped client");
        }
    }

    async fn request<T>(
        &self,
        build: impl FnOnce(Reply<T>) -> Command,
    ) -> Result<T, ChatError> {
        let (tx, rx) = oneshot::channel();
        self.commands
            .send(build(tx))
            .map_err(|_| ChatError::Cancelled)?;
        rx.await.unwrap_or(Err(ChatError::Cancelled))
    }
}
