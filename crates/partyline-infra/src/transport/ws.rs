//! WebSocket implementation of the transport port.
//!
//! Every `open` spawns one connection task. The task connects, reports
//! `Ready`, then pumps text frames both ways until the socket ends, errors,
//! or the connection is cancelled. `Closed` is reported exactly once, on
//! every exit path including a failed connect.

use futures_util::{SinkExt, StreamExt};
use partyline_core::transport::{Transport, TransportConnection, TransportSink};
use partyline_types::error::TransportError;
use partyline_types::frame::Frame;
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;

/// Opens WebSocket connections to a fixed server URL.
#[derive(Debug, Clone)]
pub struct WsTransport {
    url: String,
}

impl WsTransport {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl Transport for WsTransport {
    type Connection = WsConnection;

    fn open(&self, sink: TransportSink) -> WsConnection {
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();

        tokio::spawn(run_connection(
            self.url.clone(),
            sink,
            outbound_rx,
            cancel.clone(),
        ));

        WsConnection {
            outbound: outbound_tx,
            cancel,
        }
    }
}

/// Handle to one WebSocket connection task.
#[derive(Debug)]
pub struct WsConnection {
    outbound: mpsc::UnboundedSender<Frame>,
    cancel: CancellationToken,
}

impl TransportConnection for WsConnection {
    fn send(&self, frame: Frame) -> Result<(), TransportError> {
        if self.cancel.is_cancelled() {
            return Err(TransportError::ConnectionLost);
        }
        self.outbound
            .send(frame)
            .map_err(|_| TransportError::ConnectionLost)
    }

    fn close(&self) {
        self.cancel.cancel();
    }
}

impl Drop for WsConnection {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn run_connection(
    url: String,
    sink: TransportSink,
    outbound: mpsc::UnboundedReceiver<Frame>,
    cancel: CancellationToken,
) {
    let generation = sink.generation();
    if let Err(err) = connect_and_pump(&url, &sink, outbound, &cancel).await {
        tracing::warn!(%url, generation, error = %err, "websocket connection ended");
    }
    cancel.cancel();
    sink.closed();
}

async fn connect_and_pump(
    url: &str,
    sink: &TransportSink,
    mut outbound: mpsc::UnboundedReceiver<Frame>,
    cancel: &CancellationToken,
) -> Result<(), TransportError> {
    let connected = tokio::select! {
        _ = cancel.cancelled() => return Ok(()),
        result = connect_async(url) => result,
    };
    let (ws_stream, _) = connected.map_err(|e| TransportError::Connect(e.to_string()))?;

    tracing::info!(%url, generation = sink.generation(), "websocket connected");
    sink.ready();

    let (mut write, mut read) = ws_stream.split();

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::debug!("websocket close requested");
                let _ = write.close().await;
                return Ok(());
            }

            frame = outbound.recv() => {
                let Some(frame) = frame else {
                    let _ = write.close().await;
                    return Ok(());
                };
                let text = serde_json::to_string(&frame)
                    .map_err(|e| TransportError::Send(e.to_string()))?;
                write
                    .send(Message::Text(text))
                    .await
                    .map_err(|e| TransportError::Send(e.to_string()))?;
            }

            msg = read.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => match serde_json::from_str::<Frame>(&text) {
                        Ok(frame) => {
                            sink.frame(frame);
                        }
                        Err(e) => {
                            tracing::debug!(error = %e, "ignoring non-frame text message");
                        }
                    },
                    Some(Ok(Message::Close(_))) => {
                        tracing::info!("server closed websocket");
                        return Ok(());
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => return Err(TransportError::Send(e.to_string())),
                    None => return Err(TransportError::ConnectionLost),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use partyline_core::transport::{TransportEnvelope, TransportEvent};
    use serde_json::json;
    use tokio::net::TcpListener;

    use super::*;

    /// Accept one websocket client and echo every text message back.
    async fn echo_server() -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
            while let Some(Ok(msg)) = ws.next().await {
                if msg.is_text() && ws.send(msg).await.is_err() {
                    break;
                }
            }
        });

        format!("ws://{addr}")
    }

    async fn next(rx: &mut mpsc::UnboundedReceiver<TransportEnvelope>) -> TransportEvent {
        tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("timed out waiting for transport event")
            .expect("sink dropped")
            .event
    }

    #[tokio::test]
    async fn test_connects_and_round_trips_frames() {
        let url = echo_server().await;
        let (sink, mut rx) = TransportSink::channel(3);
        let connection = WsTransport::new(url).open(sink);

        assert_eq!(next(&mut rx).await, TransportEvent::Ready);

        let frame = Frame::new("sendMessage", json!({"body": "hi"})).with_callback_id("cb-1");
        connection.send(frame.clone()).unwrap();
        assert_eq!(next(&mut rx).await, TransportEvent::Frame(frame));

        connection.close();
        assert_eq!(next(&mut rx).await, TransportEvent::Closed);
        assert!(connection.send(Frame::new("keepAlive", json!({}))).is_err());
    }

    #[tokio::test]
    async fn test_failed_connect_reports_closed_only() {
        // Bind then drop to get a port nobody listens on.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let (sink, mut rx) = TransportSink::channel(1);
        let _connection = WsTransport::new(format!("ws://{addr}")).open(sink);

        let envelope = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(envelope.generation, 1);
        assert_eq!(envelope.event, TransportEvent::Closed);
    }

    #[tokio::test]
    async fn test_server_close_reports_closed() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
            let _ = ws.close(None).await;
        });

        let (sink, mut rx) = TransportSink::channel(1);
        let _connection = WsTransport::new(format!("ws://{addr}")).open(sink);

        assert_eq!(next(&mut rx).await, TransportEvent::Ready);
        assert_eq!(next(&mut rx).await, TransportEvent::Closed);
    }
}
