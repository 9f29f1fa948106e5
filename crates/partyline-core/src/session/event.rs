//! Events delivered to the caller's session handler.

use std::time::Duration;

use partyline_types::error::ChatError;
use partyline_types::message::Message;
use partyline_types::session::{ConnectionState, ReconnectionOutcome, RosterEntry, TypingPresence};

use crate::routing::RoutedEvent;

/// Everything the supervisor reports to the caller, in the order it happened.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// Connection state moved. `terminal` is set only on the final
    /// `Disconnected` after reconnect attempts are exhausted.
    StateChanged { state: ConnectionState, terminal: bool },

    /// A reconnect timer was armed for 0-indexed `attempt`.
    ReconnectScheduled { attempt: u32, delay: Duration },

    /// The session is over. Delivered at most once.
    Closed(CloseReason),

    /// Result of the automatic rejoin check after a successful connect.
    Rejoin(RejoinOutcome),

    /// A new chat message, already normalized and deduplicated.
    Chat(Message),

    Typing(TypingPresence),

    Roster(Vec<RosterEntry>),

    Reconnection(ReconnectionOutcome),

    /// A history batch was merged into the collection.
    HistoryMerged { added: usize, total: usize },
}

impl SessionEvent {
    /// Map a routed frame to the event the caller sees.
    ///
    /// Chat and history frames are reconciled by the supervisor first, so
    /// they never pass through here.
    pub(crate) fn from_routed(event: RoutedEvent) -> Option<Self> {
        match event {
            RoutedEvent::Typing(presence) => Some(SessionEvent::Typing(presence)),
            RoutedEvent::Roster(roster) => Some(SessionEvent::Roster(roster)),
            RoutedEvent::Reconnection(outcome) => Some(SessionEvent::Reconnection(outcome)),
            RoutedEvent::Chat(_) | RoutedEvent::History(_) => None,
        }
    }
}

/// Why the session ended.
#[derive(Debug, Clone, PartialEq)]
pub enum CloseReason {
    /// `teardown()` was called (or every client handle was dropped).
    Manual,
    /// Reconnect attempts ran out. Carries `ChatError::RetriesExhausted`.
    RetriesExhausted(ChatError),
}

/// Outcome of the automatic rejoin check that follows every connect.
#[derive(Debug, Clone, PartialEq)]
pub enum RejoinOutcome {
    /// No previous room was known.
    Skipped,
    Rejoined { room_id: String, history_len: usize },
    Failed { room_id: String, error: ChatError },
}
