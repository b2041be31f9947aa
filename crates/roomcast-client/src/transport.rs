//! WebSocket transport for the client.
//!
//! Provides [`ConnectedClient`] which bridges a room WebSocket to channels.
//! An internal task owns the socket: it writes whatever arrives on
//! `to_server` and forwards every text message from the server to
//! `from_server`.

use futures_util::{SinkExt, StreamExt};
use percent_encoding::{AsciiSet, CONTROLS, utf8_percent_encode};
use thiserror::Error;
use tokio::{
    io::{AsyncRead, AsyncWrite},
    sync::mpsc,
};
use tokio_tungstenite::{WebSocketStream, client_async, connect_async, tungstenite::Message};

/// Channel capacity in each direction.
const CHANNEL_CAPACITY: usize = 256;

/// Characters escaped in a room path segment.
const SEGMENT: &AsciiSet =
    &CONTROLS.add(b' ').add(b'"').add(b'#').add(b'%').add(b'/').add(b'?').add(b'<').add(b'>');

/// Transport errors.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Connection or handshake failed.
    #[error("connection failed: {0}")]
    Connection(String),

    /// Connection task has stopped.
    #[error("connection closed")]
    Closed,
}

/// Handle to a connected room client.
///
/// Text is sent and received via the channels, and an internal task handles
/// the WebSocket I/O. Dropping `to_server` closes the connection gracefully.
pub struct ConnectedClient {
    /// Send text to the room.
    pub to_server: mpsc::Sender<String>,
    /// Receive text from the room.
    pub from_server: mpsc::Receiver<String>,
    /// Abort handle to stop the connection task.
    abort_handle: tokio::task::AbortHandle,
}

impl ConnectedClient {
    /// Send one message to the room.
    pub async fn send(&self, text: impl Into<String>) -> Result<(), TransportError> {
        self.to_server.send(text.into()).await.map_err(|_| TransportError::Closed)
    }

    /// Next message from the room. `None` once the connection has ended.
    pub async fn recv(&mut self) -> Option<String> {
        self.from_server.recv().await
    }

    /// Stop the connection immediately, without a close handshake.
    pub fn stop(&self) {
        self.abort_handle.abort();
    }
}

/// Build `<base>/<room>` with the room percent-encoded as a path segment.
pub fn room_url(base: &str, room: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), utf8_percent_encode(room, SEGMENT))
}

/// Connect to a room URL such as `ws://127.0.0.1:8080/chat/lobby`.
pub async fn connect(url: &str) -> Result<ConnectedClient, TransportError> {
    let (ws, _response) = connect_async(url)
        .await
        .map_err(|e| TransportError::Connection(format!("connect to {url} failed: {e}")))?;

    Ok(spawn_connection(ws))
}

/// Connect to a room URL over an already-established stream.
///
/// Used with simulated networks where the caller opens the byte stream.
pub async fn connect_with_stream<S>(url: &str, stream: S) -> Result<ConnectedClient, TransportError>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let (ws, _response) = client_async(url, stream)
        .await
        .map_err(|e| TransportError::Connection(format!("handshake with {url} failed: {e}")))?;

    Ok(spawn_connection(ws))
}

fn spawn_connection<S>(ws: WebSocketStream<S>) -> ConnectedClient
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let (to_server_tx, to_server_rx) = mpsc::channel::<String>(CHANNEL_CAPACITY);
    let (from_server_tx, from_server_rx) = mpsc::channel::<String>(CHANNEL_CAPACITY);

    let handle = tokio::spawn(run_connection(ws, to_server_rx, from_server_tx));

    ConnectedClient {
        to_server: to_server_tx,
        from_server: from_server_rx,
        abort_handle: handle.abort_handle(),
    }
}

/// Run the connection, bridging between channels and the WebSocket.
async fn run_connection<S>(
    ws: WebSocketStream<S>,
    mut to_server: mpsc::Receiver<String>,
    from_server: mpsc::Sender<String>,
) where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let (mut sink, mut stream) = ws.split();
    let mut outgoing_open = true;

    loop {
        tokio::select! {
            outgoing = to_server.recv(), if outgoing_open => match outgoing {
                Some(text) => {
                    if let Err(e) = sink.send(Message::text(text)).await {
                        tracing::debug!("send failed: {}", e);
                        break;
                    }
                },
                None => {
                    // Caller is done sending; finish the close handshake by
                    // reading until the server acknowledges.
                    outgoing_open = false;
                    if let Err(e) = sink.close().await {
                        tracing::debug!("close failed: {}", e);
                        break;
                    }
                },
            },
            incoming = stream.next() => match incoming {
                Some(Ok(Message::Text(text))) => {
                    if from_server.send(text.as_str().to_owned()).await.is_err() {
                        break;
                    }
                },
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {},
                Some(Err(e)) => {
                    tracing::debug!("receive failed: {}", e);
                    break;
                },
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn room_url_joins_base_and_room() {
        assert_eq!(room_url("ws://host/chat", "lobby"), "ws://host/chat/lobby");
        assert_eq!(room_url("ws://host/chat/", "lobby"), "ws://host/chat/lobby");
    }

    #[test]
    fn room_url_encodes_segment() {
        assert_eq!(room_url("ws://host/chat", "test room"), "ws://host/chat/test%20room");
        assert_eq!(room_url("ws://host/chat", "a/b"), "ws://host/chat/a%2Fb");
    }

    #[tokio::test]
    async fn connect_fails_for_unreachable_server() {
        let result = connect("ws://127.0.0.1:1/chat/lobby").await;
        assert!(matches!(result, Err(TransportError::Connection(_))));
    }
}
