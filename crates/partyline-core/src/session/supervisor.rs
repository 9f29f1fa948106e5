//! Connection supervisor: the single task that owns a chat session.
//!
//! `ConnectionSupervisor::open` spawns one tokio task that owns the transport
//! connection, the session, the message collection, the registrar, pending
//! requests, and both timers. Transport events, client commands, the
//! reconnect timer, and the keepalive tick are all handled inside one
//! `select!` loop, so handlers never run concurrently.
//!
//! Reconnection uses exponential backoff. The delay before attempt `n`
//! (0-indexed) is `base_delay_ms * backoff_factor^n`; after `max_attempts`
//! consecutive failed reconnects the session is closed with
//! `ChatError::RetriesExhausted`. Every successful connect resets the counter
//! and triggers the automatic rejoin check.

use std::collections::HashMap;
use std::pin::Pin;
use std::sync::Arc;

use partyline_types::config::ClientConfig;
use partyline_types::error::{ChatError, ProtocolError, TransportError};
use partyline_types::frame::{Frame, UserSettings, frame_types};
use partyline_types::message::{Message, UserProfile};
use partyline_types::session::{ConnectionState, Session, SessionRecord};
use serde_json::{Value, json};
use tokio::sync::{mpsc, watch};
use tokio::time::{Instant, MissedTickBehavior, Sleep};
use uuid::Uuid;

use super::client::{ChatClient, Command, Reply};
use super::event::{CloseReason, RejoinOutcome, SessionEvent};
use super::registrar::SessionRegistrar;
use crate::history::MessageReconciler;
use crate::routing::{EventRouter, RoutedEvent};
use crate::storage::{PersistenceStore, StorageKey, clear_slot, load_json, save_json};
use crate::transport::{
    Transport, TransportConnection, TransportEnvelope, TransportEvent, TransportSink,
};

/// A request waiting for its acknowledgement frame.
enum PendingRequest {
    Create {
        nickname: String,
        user_icon: Option<String>,
        reply: Reply<String>,
    },
    /// `reply` is `None` for the automatic rejoin after a reconnect.
    Join {
        record: SessionRecord,
        reply: Option<Reply<Vec<Message>>>,
    },
    Leave {
        reply: Reply<bool>,
    },
    Ack {
        reply: Reply<Value>,
    },
}

pub struct ConnectionSupervisor<T: Transport, S: PersistenceStore> {
    transport: T,
    store: Arc<S>,
    config: ClientConfig,
    events: mpsc::Sender<SessionEvent>,
    state_tx: watch::Sender<ConnectionState>,
    transport_tx: mpsc::UnboundedSender<TransportEnvelope>,
    connection: Option<T::Connection>,
    generation: u64,
    attempt_count: u32,
    reconnect_timer: Option<Pin<Box<Sleep>>>,
    manual_close: bool,
    exhausted: bool,
    closed_emitted: bool,
    pending: HashMap<String, PendingRequest>,
    registrar: SessionRegistrar,
    session: Session,
    messages: Vec<Message>,
}

impl<T: Transport, S: PersistenceStore> ConnectionSupervisor<T, S> {
    /// Start a supervised session.
    ///
    /// Spawns the supervisor task on the current tokio runtime and opens the
    /// first transport connection. The returned receiver is the caller's
    /// session handler; it yields `None` once the supervisor has stopped.
    pub fn open(
        transport: T,
        store: Arc<S>,
        config: ClientConfig,
    ) -> (ChatClient, mpsc::Receiver<SessionEvent>) {
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let (events_tx, events_rx) = mpsc::channel(config.event_channel_capacity.max(1));
        let (state_tx, state_rx) = watch::channel(ConnectionState::Disconnected);
        let (transport_tx, transport_rx) = mpsc::unbounded_channel();

        let supervisor = Self {
            transport,
            store,
            config,
            events: events_tx,
            state_tx,
            transport_tx,
            connection: None,
            generation: 0,
            attempt_count: 0,
            reconnect_timer: None,
            manual_close: false,
            exhausted: false,
            closed_emitted: false,
            pending: HashMap::new(),
            registrar: SessionRegistrar::new(),
            session: Session::default(),
            messages: Vec::new(),
        };

        tokio::spawn(supervisor.run(commands_rx, transport_rx));

        (ChatClient::new(commands_tx, state_rx), events_rx)
    }

    async fn run(
        mut self,
        mut commands: mpsc::UnboundedReceiver<Command>,
        mut transport_events: mpsc::UnboundedReceiver<TransportEnvelope>,
    ) {
        self.restore().await;
        self.connect();

        let period = self.config.keepalive_interval();
        let mut keepalive = tokio::time::interval_at(Instant::now() + period, period);
        keepalive.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tracing::info!(server_url = %self.config.server_url, "connection supervisor started");

        loop {
            tokio::select! {
                biased;

                Some(envelope) = transport_events.recv() => {
                    self.handle_transport(envelope).await;
                }

                command = commands.recv() => {
                    match command {
                        Some(Command::Teardown) | None => {
                            self.teardown().await;
                            break;
                        }
                        Some(command) => self.handle_command(command).await,
                    }
                }

                () = wait_for(self.reconnect_timer.as_mut()) => {
                    self.reconnect_timer = None;
                    self.reconnect();
                }

                _ = keepalive.tick() => self.send_keepalive(),
            }
        }

        tracing::info!("connection supervisor stopped");
    }

    // ------------------------------------------------------------------
    // Startup
    // ------------------------------------------------------------------

    /// Load the persisted room, profile, and history.
    async fn restore(&mut self) {
        let store = &*self.store;

        if let Some(history) = load_json::<S, Vec<Message>>(store, StorageKey::MessageHistory).await {
            self.messages = MessageReconciler::merge(Vec::new(), history);
        }
        if let Some(profile) = load_json::<S, UserProfile>(store, StorageKey::ActiveProfile).await {
            self.session.nickname = profile.nickname;
            self.session.user_icon = profile.user_icon;
        }
        self.session.room_id = load_json::<S, String>(store, StorageKey::ActiveRoomId)
            .await
            .filter(|room_id| !room_id.is_empty());

        tracing::debug!(
            room_id = ?self.session.room_id,
            messages = self.messages.len(),
            "restored persisted session"
        );
    }

    // ------------------------------------------------------------------
    // Connection lifecycle
    // ------------------------------------------------------------------

    fn connect(&mut self) {
        self.generation += 1;
        let sink = TransportSink::new(self.generation, self.transport_tx.clone());
        self.connection = Some(self.transport.open(sink));
        tracing::debug!(generation = self.generation, attempt = self.attempt_count, "opening transport");
        self.set_state(ConnectionState::Connecting, false);
    }

    fn reconnect(&mut self) {
        if self.manual_close || self.exhausted {
            return;
        }
        self.attempt_count += 1;
        tracing::info!(attempt = self.attempt_count, "reconnecting");
        self.connect();
    }

    async fn handle_transport(&mut self, envelope: TransportEnvelope) {
        // Anything from a closed or replaced connection is stale.
        if self.manual_close || self.connection.is_none() || envelope.generation != self.generation {
            tracing::debug!(
                generation = envelope.generation,
                current = self.generation,
                "ignoring stale transport event"
            );
            return;
        }

        match envelope.event {
            TransportEvent::Ready => self.on_ready().await,
            TransportEvent::Frame(frame) => self.on_frame(frame).await,
            TransportEvent::Closed => self.on_closed().await,
        }
    }

    async fn on_ready(&mut self) {
        tracing::info!(generation = self.generation, "transport connected");
        self.attempt_count = 0;
        self.set_state(ConnectionState::Connected, false);
        self.rejoin().await;
    }

    async fn on_closed(&mut self) {
        tracing::warn!(generation = self.generation, "transport closed unexpectedly");
        if let Some(connection) = self.connection.take() {
            connection.close();
        }
        self.fail_pending(ChatError::Transport(TransportError::ConnectionLost));
        self.schedule_reconnect().await;
    }

    /// Arm the reconnect timer, or give up once the policy is spent.
    async fn schedule_reconnect(&mut self) {
        if self.manual_close || self.exhausted {
            return;
        }

        let policy = &self.config.reconnect;
        if !policy.allows(self.attempt_count) {
            let attempts = self.attempt_count;
            self.exhausted = true;
            self.reconnect_timer = None;
            tracing::error!(attempts, "reconnect attempts exhausted, giving up");
            self.session.connection_state = ConnectionState::Disconnected;
            self.state_tx.send_replace(ConnectionState::Disconnected);
            self.deliver(SessionEvent::StateChanged {
                state: ConnectionState::Disconnected,
                terminal: true,
            })
            .await;
            self.closed_emitted = true;
            self.deliver(SessionEvent::Closed(CloseReason::RetriesExhausted(
                ChatError::RetriesExhausted { attempts },
            )))
            .await;
            return;
        }

        let attempt = self.attempt_count;
        let delay = policy.delay_for(attempt);
        self.set_state(ConnectionState::Disconnected, false);
        self.reconnect_timer = Some(Box::pin(tokio::time::sleep(delay)));
        tracing::info!(attempt, delay_ms = delay.as_millis() as u64, "reconnect scheduled");
        self.emit(SessionEvent::ReconnectScheduled { attempt, delay });
    }

    async fn teardown(&mut self) {
        tracing::info!("tearing down session");
        self.manual_close = true;
        self.reconnect_timer = None;
        if let Some(connection) = self.connection.take() {
            connection.close();
        }
        self.fail_pending(ChatError::Cancelled);
        self.registrar.clear();

        if self.session.connection_state != ConnectionState::Disconnected {
            self.set_state(ConnectionState::Disconnected, false);
        }
        if !self.closed_emitted {
            self.closed_emitted = true;
            self.deliver(SessionEvent::Closed(CloseReason::Manual)).await;
        }
    }

    fn send_keepalive(&self) {
        let Some(connection) = self.live_connection() else {
            tracing::debug!("keepalive skipped while disconnected");
            return;
        };
        if let Err(err) = connection.send(Frame::new(frame_types::KEEP_ALIVE, json!({}))) {
            tracing::warn!(error = %err, "keepalive failed");
        }
    }

    // ------------------------------------------------------------------
    // Rejoin
    // ------------------------------------------------------------------

    async fn rejoin(&mut self) {
        let Some(record) = self.registrar.rejoin_if_known(&*self.store).await else {
            tracing::debug!("no previous room, skipping rejoin");
            self.emit(SessionEvent::Rejoin(RejoinOutcome::Skipped));
            return;
        };

        tracing::info!(room_id = %record.room_id, nickname = %record.nickname, "rejoining room");
        let frame = join_frame(&record);
        match self.dispatch(frame) {
            Ok(callback_id) => {
                self.pending.insert(callback_id, PendingRequest::Join { record, reply: None });
            }
            Err(error) => {
                tracing::warn!(room_id = %record.room_id, %error, "rejoin could not be sent");
                self.emit(SessionEvent::Rejoin(RejoinOutcome::Failed {
                    room_id: record.room_id,
                    error,
                }));
            }
        }
    }

    // ------------------------------------------------------------------
    // Client commands
    // ------------------------------------------------------------------

    async fn handle_command(&mut self, command: Command) {
        match command {
            Command::CreateRoom {
                nickname,
                user_icon,
                reply,
            } => {
                let settings = UserSettings {
                    user_nickname: nickname.clone(),
                    user_icon: user_icon.clone(),
                };
                let frame = Frame::new(
                    frame_types::CREATE_SESSION,
                    json!({ "controlLock": false, "userSettings": settings }),
                );
                self.track(frame, reply, |reply| PendingRequest::Create {
                    nickname,
                    user_icon,
                    reply,
                });
            }
            Command::JoinRoom {
                nickname,
                room_id,
                user_icon,
                reply,
            } => {
                let record = SessionRecord {
                    room_id,
                    nickname,
                    user_icon,
                };
                let frame = join_frame(&record);
                self.track(frame, reply, |reply| PendingRequest::Join {
                    record,
                    reply: Some(reply),
                });
            }
            Command::LeaveRoom { reply } => self.leave(reply).await,
            Command::Send {
                frame_type,
                payload,
            } => {
                let Some(connection) = self.live_connection() else {
                    tracing::info!(%frame_type, "not connected, dropping outbound frame");
                    return;
                };
                if let Err(err) = connection.send(Frame::new(frame_type.as_str(), payload)) {
                    tracing::warn!(%frame_type, error = %err, "failed to send frame");
                }
            }
            Command::SendWithAck {
                frame_type,
                payload,
                reply,
            } => {
                let frame = Frame::new(frame_type, payload);
                self.track(frame, reply, |reply| PendingRequest::Ack { reply });
            }
            Command::SetProfile { profile, reply } => {
                save_json(&*self.store, StorageKey::ActiveProfile, &profile).await;
                if self.session.room_id.is_none() {
                    self.session.nickname = profile.nickname;
                    self.session.user_icon = profile.user_icon;
                }
                let _ = reply.send(Ok(()));
            }
            Command::Profile { reply } => {
                let profile = load_json(&*self.store, StorageKey::ActiveProfile).await;
                let _ = reply.send(Ok(profile));
            }
            Command::Messages { reply } => {
                let _ = reply.send(Ok(self.messages.clone()));
            }
            Command::Session { reply } => {
                let _ = reply.send(Ok(self.session.clone()));
            }
            Command::Teardown => {}
        }
    }

    async fn leave(&mut self, reply: Reply<bool>) {
        let Some(room_id) = self.session.room_id.clone() else {
            let _ = reply.send(Ok(false));
            return;
        };

        if self.live_connection().is_none() {
            tracing::info!(%room_id, "offline, leaving room locally");
            self.leave_locally().await;
            let _ = reply.send(Ok(false));
            return;
        }

        let frame = Frame::new(frame_types::LEAVE_SESSION, json!({ "sessionId": room_id }));
        self.track(frame, reply, |reply| PendingRequest::Leave { reply });
    }

    /// Send a request frame and park its reply until the ack arrives.
    fn track<R>(
        &mut self,
        frame: Frame,
        reply: Reply<R>,
        pending: impl FnOnce(Reply<R>) -> PendingRequest,
    ) {
        match self.dispatch(frame) {
            Ok(callback_id) => {
                self.pending.insert(callback_id, pending(reply));
            }
            Err(error) => {
                let _ = reply.send(Err(error));
            }
        }
    }

    /// Send a frame with a fresh correlation id.
    fn dispatch(&self, frame: Frame) -> Result<String, ChatError> {
        let connection = self
            .live_connection()
            .ok_or(ChatError::Transport(TransportError::NotConnected))?;
        let callback_id = Uuid::now_v7().to_string();
        connection.send(frame.with_callback_id(callback_id.as_str()))?;
        Ok(callback_id)
    }

    fn live_connection(&self) -> Option<&T::Connection> {
        if self.session.connection_state != ConnectionState::Connected {
            return None;
        }
        self.connection.as_ref()
    }

    // ------------------------------------------------------------------
    // Inbound frames
    // ------------------------------------------------------------------

    async fn on_frame(&mut self, frame: Frame) {
        if let Some(pending) = frame.callback_id.as_ref().and_then(|id| self.pending.remove(id)) {
            self.resolve(pending, frame).await;
            return;
        }

        let frame_type = frame.frame_type.clone();
        let routed = match EventRouter::classify(frame) {
            Ok(routed) => routed,
            Err(err) => {
                tracing::warn!(%frame_type, error = %err, "skipping inbound frame");
                return;
            }
        };
        tracing::trace!(kind = routed.kind(), "routed inbound frame");

        match routed {
            RoutedEvent::Chat(mut message) => {
                MessageReconciler::normalize(&mut message);
                let added = MessageReconciler::merge_into(&mut self.messages, [message.clone()]);
                if added == 0 {
                    tracing::debug!(timestamp = message.timestamp, "duplicate chat message ignored");
                    return;
                }
                self.persist_history().await;
                self.emit(SessionEvent::Chat(message));
            }
            RoutedEvent::History(batch) => {
                let added = self.merge_history(batch).await;
                self.emit(SessionEvent::HistoryMerged {
                    added,
                    total: self.messages.len(),
                });
            }
            other => {
                if let Some(event) = SessionEvent::from_routed(other) {
                    self.emit(event);
                }
            }
        }
    }

    async fn resolve(&mut self, pending: PendingRequest, frame: Frame) {
        match pending {
            PendingRequest::Create {
                nickname,
                user_icon,
                reply,
            } => {
                let result = match ack_payload(frame).and_then(|data| created_room_id(&data)) {
                    Ok(room_id) => {
                        let record = SessionRecord {
                            room_id: room_id.clone(),
                            nickname,
                            user_icon,
                        };
                        self.enter_room(record).await;
                        tracing::info!(%room_id, "room created");
                        Ok(room_id)
                    }
                    Err(err) => Err(err),
                };
                let _ = reply.send(result);
            }
            PendingRequest::Join { record, reply } => {
                let room_id = record.room_id.clone();
                let result = match ack_payload(frame).and_then(joined_history) {
                    Ok(history) => {
                        self.enter_room(record).await;
                        let added = self.merge_history(history).await;
                        tracing::info!(%room_id, added, total = self.messages.len(), "joined room");
                        self.emit(SessionEvent::HistoryMerged {
                            added,
                            total: self.messages.len(),
                        });
                        Ok(self.messages.clone())
                    }
                    Err(err) => {
                        tracing::warn!(%room_id, error = %err, "join rejected");
                        Err(err)
                    }
                };

                match reply {
                    Some(reply) => {
                        let _ = reply.send(result);
                    }
                    None => {
                        let outcome = match result {
                            Ok(messages) => RejoinOutcome::Rejoined {
                                room_id,
                                history_len: messages.len(),
                            },
                            Err(error) => RejoinOutcome::Failed { room_id, error },
                        };
                        self.emit(SessionEvent::Rejoin(outcome));
                    }
                }
            }
            PendingRequest::Leave { reply } => {
                let result = match ack_payload(frame) {
                    Ok(_) => {
                        self.leave_locally().await;
                        Ok(true)
                    }
                    Err(err) => Err(err),
                };
                let _ = reply.send(result);
            }
            PendingRequest::Ack { reply } => {
                let _ = reply.send(ack_payload(frame));
            }
        }
    }

    // ------------------------------------------------------------------
    // Session and history state
    // ------------------------------------------------------------------

    /// Make `record` the current room. History from another room is dropped.
    async fn enter_room(&mut self, record: SessionRecord) {
        if self.session.room_id.as_deref() != Some(record.room_id.as_str()) {
            if !self.messages.is_empty() {
                tracing::debug!(room_id = %record.room_id, "entering a different room, clearing history");
            }
            self.messages.clear();
            clear_slot(&*self.store, StorageKey::MessageHistory).await;
        }

        let store = &*self.store;
        save_json(store, StorageKey::ActiveRoomId, &record.room_id).await;
        // A saved profile is only ever replaced through `set_profile`.
        if load_json::<S, UserProfile>(store, StorageKey::ActiveProfile).await.is_none() {
            let profile = UserProfile::new(record.nickname.as_str(), record.user_icon.clone());
            save_json(store, StorageKey::ActiveProfile, &profile).await;
        }

        self.session.room_id = Some(record.room_id.clone());
        self.session.nickname = record.nickname.clone();
        self.session.user_icon = record.user_icon.clone();
        self.registrar.record(record);
    }

    async fn leave_locally(&mut self) {
        if let Some(room_id) = self.session.room_id.take() {
            tracing::info!(%room_id, "left room");
        }
        self.registrar.clear();
        self.messages.clear();
        clear_slot(&*self.store, StorageKey::ActiveRoomId).await;
        clear_slot(&*self.store, StorageKey::MessageHistory).await;
    }

    async fn merge_history(&mut self, batch: Vec<Message>) -> usize {
        let added = MessageReconciler::merge_into(&mut self.messages, batch);
        self.persist_history().await;
        added
    }

    async fn persist_history(&self) {
        save_json(&*self.store, StorageKey::MessageHistory, &self.messages).await;
    }

    /// Reject every outstanding request with `error`.
    fn fail_pending(&mut self, error: ChatError) {
        let mut failed_rejoins = Vec::new();
        for (_, pending) in self.pending.drain() {
            match pending {
                PendingRequest::Create { reply, .. } => {
                    let _ = reply.send(Err(error.clone()));
                }
                PendingRequest::Join { reply: Some(reply), .. } => {
                    let _ = reply.send(Err(error.clone()));
                }
                PendingRequest::Join { record, reply: None } => {
                    failed_rejoins.push(RejoinOutcome::Failed {
                        room_id: record.room_id,
                        error: error.clone(),
                    });
                }
                PendingRequest::Leave { reply } => {
                    let _ = reply.send(Err(error.clone()));
                }
                PendingRequest::Ack { reply } => {
                    let _ = reply.send(Err(error.clone()));
                }
            }
        }
        for outcome in failed_rejoins {
            self.emit(SessionEvent::Rejoin(outcome));
        }
    }

    // ------------------------------------------------------------------
    // Event emission
    // ------------------------------------------------------------------

    fn set_state(&mut self, state: ConnectionState, terminal: bool) {
        self.session.connection_state = state;
        self.state_tx.send_replace(state);
        self.emit(SessionEvent::StateChanged { state, terminal });
    }

    /// Deliver a closing event, waiting for room in the channel.
    async fn deliver(&self, event: SessionEvent) {
        if self.events.send(event).await.is_err() {
            tracing::debug!("session handler dropped before close");
        }
    }

    /// Deliver an event without blocking the loop. A full channel drops it.
    fn emit(&self, event: SessionEvent) {
        match self.events.try_send(event) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(dropped)) => {
                tracing::warn!(event = ?dropped, "session event channel full, dropping event");
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                tracing::debug!("session handler dropped");
            }
        }
    }
}

/// Await the reconnect timer if one is armed; otherwise never resolve.
async fn wait_for(timer: Option<&mut Pin<Box<Sleep>>>) {
    match timer {
        Some(sleep) => sleep.as_mut().await,
        None => std::future::pending().await,
    }
}

fn join_frame(record: &SessionRecord) -> Frame {
    let settings = UserSettings {
        user_nickname: record.nickname.clone(),
        user_icon: record.user_icon.clone(),
    };
    Frame::new(
        frame_types::JOIN_SESSION,
        json!({ "sessionId": record.room_id, "userSettings": settings }),
    )
}

/// Unwrap an acknowledgement, turning `errorMessage` into a rejection.
fn ack_payload(frame: Frame) -> Result<Value, ChatError> {
    if let Some(message) = frame.data.get("errorMessage").and_then(Value::as_str) {
        return Err(ChatError::Session(message.to_string()));
    }
    Ok(frame.data)
}

/// The room id of a create ack: a bare string or `{sessionId | roomId}`.
fn created_room_id(data: &Value) -> Result<String, ChatError> {
    let room_id = match data {
        Value::String(room_id) => Some(room_id.as_str()),
        Value::Object(map) => map
            .get("sessionId")
            .or_else(|| map.get("roomId"))
            .and_then(Value::as_str),
        _ => None,
    };

    room_id
        .filter(|room_id| !room_id.is_empty())
        .map(str::to_string)
        .ok_or_else(|| {
            ChatError::Protocol(ProtocolError::Malformed {
                frame_type: frame_types::CREATE_SESSION.to_string(),
                reason: "acknowledgement carries no room id".to_string(),
            })
        })
}

/// The history batch of a join ack. A missing list means no history.
fn joined_history(data: Value) -> Result<Vec<Message>, ChatError> {
    let messages = match data {
        Value::Object(mut map) => map.remove("messages").unwrap_or(Value::Null),
        _ => Value::Null,
    };
    if messages.is_null() {
        return Ok(Vec::new());
    }
    serde_json::from_value(messages).map_err(|err| {
        ChatError::Protocol(ProtocolError::Malformed {
            frame_type: frame_types::JOIN_SESSION.to_string(),
            reason: err.to_string(),
        })
    })
}
