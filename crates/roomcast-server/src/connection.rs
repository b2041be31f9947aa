//! Transport-facing connection halves.
//!
//! A live connection is split in two. The [`Outbound`] half is shared: the
//! registry holds it so any session in the room can deliver to it. The
//! [`Inbound`] half is owned by the connection's own session task and is
//! never seen by anyone else.

use async_trait::async_trait;

use crate::error::TransportError;

/// Sending half of a connection.
///
/// Implementations serialize concurrent sends internally so messages from
/// one broadcast are never interleaved with another at the frame level.
#[async_trait]
pub trait Outbound: Send + Sync {
    /// Send one text message.
    async fn send_text(&self, text: &str) -> Result<(), TransportError>;

    /// Close the connection. Further sends fail.
    async fn close(&self) -> Result<(), TransportError>;
}

/// Receiving half of a connection.
#[async_trait]
pub trait Inbound: Send {
    /// Wait for the next text message.
    ///
    /// Returns `Ok(None)` when the peer closed the connection cleanly.
    /// Non-text traffic (binary frames, pings) is consumed without returning.
    async fn receive_text(&mut self) -> Result<Option<String>, TransportError>;
}
