//! Room session handler.
//!
//! The per-connection control loop. Registers the connection, relays every
//! inbound message to the rest of the room, and deregisters exactly once when
//! the connection ends for any reason. The decisions are made by the pure
//! [`Session`] state machine; this module only executes its actions.

use std::sync::Arc;

use roomcast_core::{
    CloseReason, ConnectionId, Environment, Identity, RoomName, Session, SessionAction,
};
use tokio::sync::watch;

use crate::{
    connection::{Inbound, Outbound},
    error::ServerError,
    registry::RoomRegistry,
};

/// What happened over the life of one session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSummary {
    /// Connection the session drove
    pub connection_id: ConnectionId,
    /// Room it belonged to
    pub room: RoomName,
    /// Identity it was assigned
    pub identity: Identity,
    /// Inbound messages relayed to the room
    pub messages_sent: u64,
    /// Per-recipient delivery failures seen while broadcasting
    pub delivery_failures: usize,
    /// Why the session ended
    pub close_reason: CloseReason,
}

/// Runs room sessions against a shared registry.
pub struct SessionHandler<E: Environment> {
    registry: Arc<RoomRegistry<E>>,
    shutdown: watch::Receiver<bool>,
}

impl<E: Environment> Clone for SessionHandler<E> {
    fn clone(&self) -> Self {
        Self { registry: Arc::clone(&self.registry), shutdown: self.shutdown.clone() }
    }
}

impl<E: Environment> SessionHandler<E> {
    /// Create a handler. Sessions close when `shutdown` becomes `true`.
    pub fn new(registry: Arc<RoomRegistry<E>>, shutdown: watch::Receiver<bool>) -> Self {
        Self { registry, shutdown }
    }

    /// Registry sessions are registered with.
    pub fn registry(&self) -> &Arc<RoomRegistry<E>> {
        &self.registry
    }

    pub(crate) fn shutdown_signal(&self) -> watch::Receiver<bool> {
        self.shutdown.clone()
    }

    /// Drive one connection from registration to close.
    ///
    /// Returns once the peer closes, a read fails, or shutdown is signalled.
    /// The connection is deregistered and its outbound half closed before
    /// returning. Closing is bounded by the registry's send timeout so a peer
    /// that stopped reading cannot keep the session alive.
    pub async fn run<I: Inbound>(
        &self,
        room: RoomName,
        outbound: Arc<dyn Outbound>,
        mut inbound: I,
    ) -> Result<SessionSummary, ServerError> {
        let connection_id = self.registry.next_connection_id();
        let mut session = Session::new(connection_id, room.clone());

        let identity = match self.registry.connect(connection_id, &room, Arc::clone(&outbound)) {
            Ok(identity) => identity,
            Err(e) => {
                session.close();
                return Err(e.into());
            },
        };
        if let Err(e) = session.activate(identity.clone()) {
            self.registry.disconnect(connection_id, &room);
            return Err(e.into());
        }

        tracing::info!(%connection_id, %room, %identity, "session active");

        let mut shutdown = self.shutdown.clone();
        let mut delivery_failures = 0usize;

        let close_reason = loop {
            let next = tokio::select! {
                biased;
                () = wait_for_shutdown(&mut shutdown) => break CloseReason::ServerShutdown,
                next = inbound.receive_text() => next,
            };

            match next {
                Ok(Some(text)) => match session.on_text(&text) {
                    Ok(action) => delivery_failures += self.execute(connection_id, action).await,
                    Err(e) => {
                        tracing::error!(%connection_id, "session rejected inbound text: {}", e);
                        break CloseReason::ReadError(e.to_string());
                    },
                },
                Ok(None) => break CloseReason::ClientClosed,
                Err(e) => break CloseReason::ReadError(e.to_string()),
            }
        };

        for action in session.close() {
            self.execute(connection_id, action).await;
        }

        let close_timeout = self.registry.config().send_timeout;
        match tokio::time::timeout(close_timeout, outbound.close()).await {
            Ok(Ok(())) => {},
            Ok(Err(e)) => {
                tracing::debug!(%connection_id, "close after session end failed: {}", e);
            },
            Err(_) => {
                tracing::warn!(
                    %connection_id,
                    ?close_timeout,
                    "close timed out, dropping connection"
                );
            },
        }

        tracing::info!(
            %connection_id,
            %room,
            %identity,
            reason = %close_reason,
            messages = session.messages_sent(),
            "session closed"
        );

        Ok(SessionSummary {
            connection_id,
            room,
            identity,
            messages_sent: session.messages_sent(),
            delivery_failures,
            close_reason,
        })
    }

    /// Execute one session action. Returns the number of failed deliveries.
    async fn execute(&self, connection_id: ConnectionId, action: SessionAction) -> usize {
        match action {
            SessionAction::Broadcast { room, message } => {
                let report = self.registry.broadcast(&message, &room, connection_id).await;

                for failure in &report.failures {
                    tracing::warn!(
                        sender = %connection_id,
                        recipient = %failure.connection_id(),
                        %room,
                        "delivery failed: {}",
                        failure
                    );
                }

                report.failures.len()
            },

            SessionAction::Deregister { room } => {
                if self.registry.disconnect(connection_id, &room).is_none() {
                    tracing::warn!(%connection_id, %room, "deregister found no membership");
                }
                0
            },
        }
    }
}

/// Resolve once shutdown is signalled. Never resolves if the sender is gone.
pub(crate) async fn wait_for_shutdown(shutdown: &mut watch::Receiver<bool>) {
    let sender_dropped = shutdown.wait_for(|&stop| stop).await.is_err();
    if sender_dropped {
        std::future::pending::<()>().await;
    }
}

#[cfg(test)]
mod tests {
    use std::{sync::Mutex, time::Duration};

    use async_trait::async_trait;
    use tokio::sync::mpsc;

    use super::*;
    use crate::{error::TransportError, registry::RegistryConfig};

    #[derive(Clone)]
    struct FixedEnv;

    impl Environment for FixedEnv {
        fn random_bytes(&self, buffer: &mut [u8]) {
            buffer.fill(0xab);
        }
    }

    #[derive(Default)]
    struct RecordingOutbound {
        received: Mutex<Vec<String>>,
        closes: Mutex<usize>,
    }

    #[async_trait]
    impl Outbound for RecordingOutbound {
        async fn send_text(&self, text: &str) -> Result<(), TransportError> {
            self.received.lock().unwrap().push(text.to_string());
            Ok(())
        }

        async fn close(&self) -> Result<(), TransportError> {
            *self.closes.lock().unwrap() += 1;
            Ok(())
        }
    }

    /// Outbound whose close never completes, like a socket whose peer
    /// stopped reading with frames still buffered.
    struct StuckCloseOutbound;

    #[async_trait]
    impl Outbound for StuckCloseOutbound {
        async fn send_text(&self, _text: &str) -> Result<(), TransportError> {
            Ok(())
        }

        async fn close(&self) -> Result<(), TransportError> {
            std::future::pending().await
        }
    }

    /// Inbound fed from a channel of scripted reads.
    struct ScriptedInbound(mpsc::UnboundedReceiver<Result<Option<String>, TransportError>>);

    #[async_trait]
    impl Inbound for ScriptedInbound {
        async fn receive_text(&mut self) -> Result<Option<String>, TransportError> {
            match self.0.recv().await {
                Some(read) => read,
                None => std::future::pending().await,
            }
        }
    }

    fn handler() -> (SessionHandler<FixedEnv>, watch::Sender<bool>) {
        let registry = Arc::new(RoomRegistry::new(FixedEnv, RegistryConfig::default()));
        let (shutdown, shutdown_rx) = watch::channel(false);
        (SessionHandler::new(registry, shutdown_rx), shutdown)
    }

    fn lobby() -> RoomName {
        RoomName::new("lobby").unwrap()
    }

    #[tokio::test]
    async fn scripted_session_relays_then_deregisters() {
        let (handler, _shutdown) = handler();
        let listener = Arc::new(RecordingOutbound::default());
        let listener_id = handler.registry().next_connection_id();
        handler.registry().connect(listener_id, &lobby(), listener.clone()).unwrap();

        let (tx, rx) = mpsc::unbounded_channel();
        tx.send(Ok(Some("one".to_string()))).unwrap();
        tx.send(Ok(Some("two".to_string()))).unwrap();
        tx.send(Ok(None)).unwrap();

        let own = Arc::new(RecordingOutbound::default());
        let summary = handler.run(lobby(), own.clone(), ScriptedInbound(rx)).await.unwrap();

        assert_eq!(summary.messages_sent, 2);
        assert_eq!(summary.close_reason, CloseReason::ClientClosed);
        assert_eq!(summary.identity.as_str(), "abababab");
        assert_eq!(
            *listener.received.lock().unwrap(),
            vec!["abababab :: one".to_string(), "abababab :: two".to_string()]
        );
        assert!(own.received.lock().unwrap().is_empty());
        assert_eq!(*own.closes.lock().unwrap(), 1);
        assert_eq!(handler.registry().members(&lobby()), vec![listener_id]);
    }

    #[tokio::test]
    async fn read_error_ends_session_as_read_error() {
        let (handler, _shutdown) = handler();

        let (tx, rx) = mpsc::unbounded_channel();
        tx.send(Err(TransportError::Read("reset".to_string()))).unwrap();

        let outbound = Arc::new(RecordingOutbound::default());
        let summary = handler.run(lobby(), outbound, ScriptedInbound(rx)).await.unwrap();

        assert!(matches!(summary.close_reason, CloseReason::ReadError(_)));
        assert_eq!(handler.registry().connection_count(), 0);
        assert!(!handler.registry().has_room(&lobby()));
    }

    #[tokio::test]
    async fn shutdown_interrupts_pending_read() {
        let (handler, shutdown) = handler();
        let (_tx, rx) = mpsc::unbounded_channel();

        let session = {
            let handler = handler.clone();
            tokio::spawn(async move {
                let outbound = Arc::new(RecordingOutbound::default());
                handler.run(lobby(), outbound, ScriptedInbound(rx)).await
            })
        };

        while handler.registry().connection_count() == 0 {
            tokio::task::yield_now().await;
        }
        shutdown.send_replace(true);

        let summary = session.await.unwrap().unwrap();
        assert_eq!(summary.close_reason, CloseReason::ServerShutdown);
        assert_eq!(handler.registry().connection_count(), 0);
    }

    #[tokio::test]
    async fn dropped_shutdown_sender_never_fires() {
        let (handler, shutdown) = handler();
        drop(shutdown);

        let (tx, rx) = mpsc::unbounded_channel();
        tx.send(Ok(None)).unwrap();

        let outbound = Arc::new(RecordingOutbound::default());
        let summary = handler.run(lobby(), outbound, ScriptedInbound(rx)).await.unwrap();
        assert_eq!(summary.close_reason, CloseReason::ClientClosed);
    }

    #[tokio::test(start_paused = true)]
    async fn stuck_close_does_not_hold_session_open() {
        let (handler, _shutdown) = handler();

        let (tx, rx) = mpsc::unbounded_channel();
        tx.send(Ok(None)).unwrap();

        let session = handler.run(lobby(), Arc::new(StuckCloseOutbound), ScriptedInbound(rx));
        let summary = tokio::time::timeout(Duration::from_secs(60), session)
            .await
            .expect("session should end once the close deadline passes")
            .unwrap();

        assert_eq!(summary.close_reason, CloseReason::ClientClosed);
        assert_eq!(handler.registry().connection_count(), 0);
    }
}
