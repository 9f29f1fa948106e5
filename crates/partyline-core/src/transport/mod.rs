//! Transport port: a duplex frame channel to the session server.
//!
//! The supervisor opens one connection at a time through [`Transport::open`]
//! and hands it a [`TransportSink`]. The connection reports `Ready`, inbound
//! frames, and `Closed` through the sink; the supervisor sends frames and
//! closes the connection through [`TransportConnection`].
//!
//! Sinks are tagged with the generation of the connection they belong to, so
//! events from a replaced connection can be told apart and ignored.

use partyline_types::error::TransportError;
use partyline_types::frame::Frame;
use tokio::sync::mpsc;

/// Lifecycle and data events reported by a transport connection.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    /// The connection is established and frames may be sent.
    Ready,
    /// One inbound frame, in the order the server produced it.
    Frame(Frame),
    /// The connection ended (failed to connect, dropped, or was closed).
    Closed,
}

/// A `TransportEvent` tagged with the generation of its connection.
#[derive(Debug, Clone, PartialEq)]
pub struct TransportEnvelope {
    pub generation: u64,
    pub event: TransportEvent,
}

/// Event sink handed to a transport connection.
///
/// Cheap to clone. Sending never blocks; once the supervisor is gone the
/// events are silently discarded.
#[derive(Debug, Clone)]
pub struct TransportSink {
    generation: u64,
    tx: mpsc::UnboundedSender<TransportEnvelope>,
}

impl TransportSink {
    pub fn new(generation: u64, tx: mpsc::UnboundedSender<TransportEnvelope>) -> Self {
        Self { generation, tx }
    }

    /// Create a sink together with the receiver that observes it.
    pub fn channel(generation: u64) -> (Self, mpsc::UnboundedReceiver<TransportEnvelope>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(generation, tx), rx)
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn ready(&self) -> bool {
        self.emit(TransportEvent::Ready)
    }

    pub fn frame(&self, frame: Frame) -> bool {
        self.emit(TransportEvent::Frame(frame))
    }

    pub fn closed(&self) -> bool {
        self.emit(TransportEvent::Closed)
    }

    /// Returns `false` if the receiving side has gone away.
    pub fn emit(&self, event: TransportEvent) -> bool {
        self.tx
            .send(TransportEnvelope {
                generation: self.generation,
                event,
            })
            .is_ok()
    }
}

/// One live (or connecting) transport connection.
pub trait TransportConnection: Send + Sync + 'static {
    /// Queue a frame for delivery.
    ///
    /// Returns an error if the connection can no longer carry frames.
    fn send(&self, frame: Frame) -> Result<(), TransportError>;

    /// Close the connection. Must be idempotent.
    fn close(&self);
}

/// Factory for transport connections.
///
/// `open` must not block: connection establishment happens in the background
/// and is reported through the sink as `Ready` or `Closed`.
pub trait Transport: Send + Sync + 'static {
    type Connection: TransportConnection;

    fn open(&self, sink: TransportSink) -> Self::Connection;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn sink_tags_events_with_generation() {
        let (sink, mut rx) = TransportSink::channel(7);
        assert!(sink.ready());
        assert!(sink.frame(Frame::new("userList", json!([]))));
        assert!(sink.closed());

        let first = rx.recv().await.unwrap();
        assert_eq!(first.generation, 7);
        assert_eq!(first.event, TransportEvent::Ready);
        assert!(matches!(rx.recv().await.unwrap().event, TransportEvent::Frame(_)));
        assert_eq!(rx.recv().await.unwrap().event, TransportEvent::Closed);
    }

    #[tokio::test]
    async fn sink_reports_dropped_receiver() {
        let (sink, rx) = TransportSink::channel(1);
        drop(rx);
        assert!(!sink.ready());
    }
}
