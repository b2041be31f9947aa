//! In-memory connection halves.
//!
//! [`memory_connection`] returns the server-side [`MemoryOutbound`] and
//! [`MemoryInbound`] plus a [`MemoryPeer`] that plays the remote client.
//! The peer can send text, hang up, inject read errors, sever its receiving
//! side, or stall so that deliveries to it never complete.

use std::sync::{
    Arc, Mutex, PoisonError,
    atomic::{AtomicBool, AtomicU64, Ordering},
};

use async_trait::async_trait;
use roomcast_server::{Inbound, Outbound, TransportError};
use tokio::sync::mpsc;

/// Link state shared between the server halves and the peer.
#[derive(Default)]
struct Link {
    /// Deliveries and close hang forever while set
    stalled: AtomicBool,
    /// Deliveries fail while set
    severed: AtomicBool,
    /// Successful deliveries
    delivered: AtomicU64,
}

/// Create a connected in-memory pair.
pub fn memory_connection() -> (MemoryOutbound, MemoryInbound, MemoryPeer) {
    let (to_peer_tx, to_peer_rx) = mpsc::unbounded_channel();
    let (to_server_tx, to_server_rx) = mpsc::unbounded_channel();
    let link = Arc::new(Link::default());

    let outbound = MemoryOutbound { sender: Mutex::new(Some(to_peer_tx)), link: Arc::clone(&link) };
    let inbound = MemoryInbound { receiver: to_server_rx };
    let peer = MemoryPeer { to_server: Some(to_server_tx), from_server: to_peer_rx, link };

    (outbound, inbound, peer)
}

/// Server-side sending half.
pub struct MemoryOutbound {
    sender: Mutex<Option<mpsc::UnboundedSender<String>>>,
    link: Arc<Link>,
}

#[async_trait]
impl Outbound for MemoryOutbound {
    async fn send_text(&self, text: &str) -> Result<(), TransportError> {
        if self.link.stalled.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        if self.link.severed.load(Ordering::SeqCst) {
            return Err(TransportError::Write("peer severed".to_string()));
        }

        let sender = self.sender.lock().unwrap_or_else(PoisonError::into_inner);
        match sender.as_ref() {
            Some(tx) => {
                tx.send(text.to_owned()).map_err(|_| TransportError::Closed)?;
                self.link.delivered.fetch_add(1, Ordering::SeqCst);
                Ok(())
            },
            None => Err(TransportError::Closed),
        }
    }

    async fn close(&self) -> Result<(), TransportError> {
        if self.link.stalled.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        self.sender.lock().unwrap_or_else(PoisonError::into_inner).take();
        Ok(())
    }
}

/// Server-side receiving half.
pub struct MemoryInbound {
    receiver: mpsc::UnboundedReceiver<Result<String, TransportError>>,
}

#[async_trait]
impl Inbound for MemoryInbound {
    async fn receive_text(&mut self) -> Result<Option<String>, TransportError> {
        match self.receiver.recv().await {
            Some(Ok(text)) => Ok(Some(text)),
            Some(Err(e)) => Err(e),
            None => Ok(None),
        }
    }
}

/// The remote end of an in-memory connection.
pub struct MemoryPeer {
    to_server: Option<mpsc::UnboundedSender<Result<String, TransportError>>>,
    from_server: mpsc::UnboundedReceiver<String>,
    link: Arc<Link>,
}

impl MemoryPeer {
    /// Send text to the server. Returns `false` once hung up or the server
    /// side is gone.
    pub fn send(&self, text: impl Into<String>) -> bool {
        self.to_server.as_ref().is_some_and(|tx| tx.send(Ok(text.into())).is_ok())
    }

    /// Make the server's next read fail with `reason`.
    pub fn fail(&self, reason: impl Into<String>) -> bool {
        self.to_server
            .as_ref()
            .is_some_and(|tx| tx.send(Err(TransportError::Read(reason.into()))).is_ok())
    }

    /// Close the peer's sending side. The server reads a clean close after
    /// any text already sent.
    pub fn hang_up(&mut self) {
        self.to_server = None;
    }

    /// Make every future delivery to this peer fail.
    pub fn sever(&self) {
        self.link.severed.store(true, Ordering::SeqCst);
    }

    /// Make every future delivery to this peer hang, and the server's close
    /// along with it.
    pub fn stall(&self) {
        self.link.stalled.store(true, Ordering::SeqCst);
    }

    /// Wait for the next message. `None` once the server closed its half.
    pub async fn recv(&mut self) -> Option<String> {
        self.from_server.recv().await
    }

    /// Take everything delivered so far without waiting.
    pub fn drain(&mut self) -> Vec<String> {
        let mut messages = Vec::new();
        while let Ok(text) = self.from_server.try_recv() {
            messages.push(text);
        }
        messages
    }

    /// Number of messages successfully delivered to this peer.
    pub fn delivered(&self) -> u64 {
        self.link.delivered.load(Ordering::SeqCst)
    }

    /// Whether the server closed its sending half.
    pub fn is_closed_by_server(&self) -> bool {
        self.from_server.is_closed()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn text_flows_both_ways() {
        let (outbound, mut inbound, mut peer) = memory_connection();

        assert!(peer.send("up"));
        assert_eq!(inbound.receive_text().await.unwrap(), Some("up".to_string()));

        outbound.send_text("down").await.unwrap();
        assert_eq!(peer.recv().await, Some("down".to_string()));
        assert_eq!(peer.delivered(), 1);
    }

    #[tokio::test]
    async fn hang_up_reads_as_clean_close() {
        let (_outbound, mut inbound, mut peer) = memory_connection();

        peer.send("last");
        peer.hang_up();

        assert_eq!(inbound.receive_text().await.unwrap(), Some("last".to_string()));
        assert_eq!(inbound.receive_text().await.unwrap(), None);
        assert!(!peer.send("after"));
    }

    #[tokio::test]
    async fn injected_failure_is_read_error() {
        let (_outbound, mut inbound, peer) = memory_connection();

        peer.fail("reset");

        let result = inbound.receive_text().await;
        assert_eq!(result, Err(TransportError::Read("reset".to_string())));
    }

    #[tokio::test]
    async fn severed_peer_rejects_delivery() {
        let (outbound, _inbound, peer) = memory_connection();

        peer.sever();

        assert!(outbound.send_text("x").await.is_err());
        assert_eq!(peer.delivered(), 0);
    }

    #[tokio::test]
    async fn closed_outbound_rejects_delivery() {
        let (outbound, _inbound, mut peer) = memory_connection();

        outbound.close().await.unwrap();

        assert_eq!(outbound.send_text("x").await, Err(TransportError::Closed));
        assert_eq!(peer.recv().await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn stalled_peer_never_completes() {
        let (outbound, _inbound, peer) = memory_connection();

        peer.stall();

        let result = tokio::time::timeout(Duration::from_secs(60), outbound.send_text("x")).await;
        assert!(result.is_err());

        let closed = tokio::time::timeout(Duration::from_secs(60), outbound.close()).await;
        assert!(closed.is_err());
        assert!(!peer.is_closed_by_server());
    }
}
