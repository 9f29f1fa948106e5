use thiserror::Error;

/// Failures of the raw transport (connect failure, unexpected close).
///
/// Absorbed by the supervisor and turned into reconnect attempts; callers only
/// see them on requests that were in flight when the connection dropped.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("not connected")]
    NotConnected,

    #[error("connect failed: {0}")]
    Connect(String),

    #[error("connection lost")]
    ConnectionLost,

    #[error("send failed: {0}")]
    Send(String),
}

/// Malformed or unrecognized inbound frames.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    #[error("unrecognized frame type '{0}'")]
    Unrecognized(String),

    #[error("malformed '{frame_type}' frame: {reason}")]
    Malformed { frame_type: String, reason: String },
}

/// Read, write, or parse failures on the persistence port.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PersistenceError {
    #[error("read error: {0}")]
    Read(String),

    #[error("write error: {0}")]
    Write(String),

    #[error("corrupt value for '{key}': {reason}")]
    Parse { key: String, reason: String },
}

/// Errors surfaced to callers of the chat client.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChatError {
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// The remote side rejected a create, join, or leave request.
    #[error("session rejected: {0}")]
    Session(String),

    #[error("reconnect attempts exhausted after {attempts} tries")]
    RetriesExhausted { attempts: u32 },

    #[error("persistence error: {0}")]
    Persistence(#[from] PersistenceError),

    /// The client was torn down before the request completed.
    #[error("request cancelled by teardown")]
    Cancelled,
}
