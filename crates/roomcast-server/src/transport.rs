//! WebSocket transport.
//!
//! Upgrades an accepted byte stream to a WebSocket, routes it to a room by
//! its request path (`<prefix>/<room>`) and splits it into the
//! [`Outbound`]/[`Inbound`] halves the registry and session handler work with.
//!
//! Everything here is generic over the underlying stream so the same code
//! serves real TCP in production and turmoil's simulated TCP in tests.
//!
//! # Framing
//!
//! Text frames carry chat messages. Binary frames are ignored. Ping/pong is
//! answered by the WebSocket layer. A close frame, or the stream ending, is a
//! clean close.

use std::net::SocketAddr;

use async_trait::async_trait;
use futures_util::{
    SinkExt, StreamExt,
    stream::{SplitSink, SplitStream},
};
use roomcast_core::RoomName;
use tokio::{
    io::{AsyncRead, AsyncWrite},
    net::{TcpListener, TcpStream},
    sync::Mutex,
};
use tokio_tungstenite::{
    WebSocketStream, accept_hdr_async,
    tungstenite::{
        self, Message,
        handshake::server::{ErrorResponse, Request, Response},
        http::StatusCode,
    },
};

use crate::{
    connection::{Inbound, Outbound},
    error::{AcceptError, ServerError, TransportError},
};

/// TCP listener that hands out raw streams for WebSocket upgrade.
pub struct WsTransport {
    listener: TcpListener,
}

impl WsTransport {
    /// Bind a TCP listener.
    pub async fn bind(address: &str) -> Result<Self, ServerError> {
        let addr: SocketAddr = address
            .parse()
            .map_err(|e| ServerError::Config(format!("invalid bind address '{address}': {e}")))?;

        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| ServerError::Transport(format!("failed to bind {addr}: {e}")))?;

        tracing::info!("WebSocket transport bound to {}", addr);

        Ok(Self { listener })
    }

    /// Accept the next TCP connection.
    pub async fn accept(&self) -> Result<(TcpStream, SocketAddr), ServerError> {
        let (stream, peer) = self.listener.accept().await?;

        if let Err(e) = stream.set_nodelay(true) {
            tracing::debug!(%peer, "failed to set TCP_NODELAY: {}", e);
        }

        Ok((stream, peer))
    }

    /// Local address the transport is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr, ServerError> {
        self.listener
            .local_addr()
            .map_err(|e| ServerError::Transport(format!("failed to get local address: {e}")))
    }
}

/// A WebSocket that completed its handshake on a room path.
pub struct AcceptedConnection<S> {
    /// Room named in the request path
    pub room: RoomName,
    /// Shared sending half
    pub outbound: WsOutbound<S>,
    /// Receiving half, owned by the session
    pub inbound: WsInbound<S>,
}

/// Normalize a path prefix to `""` or `/segment[/segment...]`.
///
/// # Errors
///
/// - `ServerError::Config` if the prefix contains a query or fragment
pub fn normalize_prefix(prefix: &str) -> Result<String, ServerError> {
    if prefix.contains(['?', '#']) {
        return Err(ServerError::Config(format!("path prefix '{prefix}' must be a plain path")));
    }

    let trimmed = prefix.trim_matches('/');
    if trimmed.is_empty() { Ok(String::new()) } else { Ok(format!("/{trimmed}")) }
}

/// Extract the room from a request path under a normalized `prefix`.
///
/// # Errors
///
/// - `AcceptError::NotFound` if the path is not exactly `<prefix>/<segment>`
/// - `AcceptError::InvalidRoom` if the segment is not a valid room name
pub fn room_from_path(path: &str, prefix: &str) -> Result<RoomName, AcceptError> {
    let not_found = || AcceptError::NotFound { path: path.to_string() };

    let segment = path
        .strip_prefix(prefix)
        .and_then(|rest| rest.strip_prefix('/'))
        .ok_or_else(not_found)?;

    if segment.is_empty() || segment.contains('/') {
        return Err(not_found());
    }

    Ok(RoomName::from_path_segment(segment)?)
}

/// Perform the WebSocket handshake and route the connection to a room.
///
/// Requests for any path other than `<prefix>/<room>` are refused during the
/// handshake with an HTTP error status.
///
/// # Errors
///
/// - `AcceptError::NotFound` / `AcceptError::InvalidRoom` for a bad path
/// - `AcceptError::Handshake` if the upgrade itself failed
pub async fn accept_websocket<S>(
    stream: S,
    prefix: &str,
) -> Result<AcceptedConnection<S>, AcceptError>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let mut routed: Option<Result<RoomName, AcceptError>> = None;

    let callback = |request: &Request, response: Response| -> Result<Response, ErrorResponse> {
        let result = room_from_path(request.uri().path(), prefix);
        let outcome = match &result {
            Ok(_) => Ok(response),
            Err(err) => Err(error_response(err)),
        };
        routed = Some(result);
        outcome
    };

    let handshake = accept_hdr_async(stream, callback).await;

    match (handshake, routed) {
        (Ok(ws), Some(Ok(room))) => {
            let (sink, stream) = ws.split();
            Ok(AcceptedConnection {
                room,
                outbound: WsOutbound { sink: Mutex::new(sink) },
                inbound: WsInbound { stream },
            })
        },
        (_, Some(Err(err))) => Err(err),
        (Err(e), _) => Err(AcceptError::Handshake(e.to_string())),
        (Ok(_), None) => Err(AcceptError::Handshake("request was never routed".to_string())),
    }
}

fn error_response(err: &AcceptError) -> ErrorResponse {
    let status = match err {
        AcceptError::NotFound { .. } => StatusCode::NOT_FOUND,
        AcceptError::InvalidRoom(_) | AcceptError::Handshake(_) => StatusCode::BAD_REQUEST,
        AcceptError::TimedOut { .. } => StatusCode::REQUEST_TIMEOUT,
        AcceptError::ShuttingDown => StatusCode::SERVICE_UNAVAILABLE,
    };

    let mut response = ErrorResponse::new(Some(err.to_string()));
    *response.status_mut() = status;
    response
}

/// Sending half of a WebSocket.
///
/// The sink sits behind an async mutex so concurrent broadcasts to this
/// connection are written one whole message at a time.
pub struct WsOutbound<S> {
    sink: Mutex<SplitSink<WebSocketStream<S>, Message>>,
}

#[async_trait]
impl<S> Outbound for WsOutbound<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    async fn send_text(&self, text: &str) -> Result<(), TransportError> {
        let mut sink = self.sink.lock().await;
        sink.send(Message::text(text.to_owned())).await.map_err(write_error)
    }

    async fn close(&self) -> Result<(), TransportError> {
        let mut sink = self.sink.lock().await;
        sink.close().await.map_err(write_error)
    }
}

/// Receiving half of a WebSocket.
pub struct WsInbound<S> {
    stream: SplitStream<WebSocketStream<S>>,
}

#[async_trait]
impl<S> Inbound for WsInbound<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    async fn receive_text(&mut self) -> Result<Option<String>, TransportError> {
        loop {
            match self.stream.next().await {
                None | Some(Ok(Message::Close(_))) => return Ok(None),
                Some(Ok(Message::Text(text))) => return Ok(Some(text.as_str().to_owned())),
                Some(Ok(Message::Binary(data))) => {
                    tracing::debug!(len = data.len(), "ignoring binary frame");
                },
                Some(Ok(_)) => {},
                Some(Err(tungstenite::Error::ConnectionClosed)) => return Ok(None),
                Some(Err(e)) => return Err(TransportError::Read(e.to_string())),
            }
        }
    }
}

fn write_error(err: tungstenite::Error) -> TransportError {
    match err {
        tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed => {
            TransportError::Closed
        },
        other => TransportError::Write(other.to_string()),
    }
}
