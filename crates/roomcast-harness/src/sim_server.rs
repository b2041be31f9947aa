//! Simulation server wrapper for testing with turmoil.
//!
//! `SimServer` runs the production session path (`serve_connection`) over
//! turmoil's deterministic TCP. The registry is supplied by the caller so a
//! test can inspect membership from outside the simulated host.

use std::{future::Future, io, net::Ipv4Addr, sync::Arc};

use roomcast_server::{
    DEFAULT_HANDSHAKE_TIMEOUT, DEFAULT_PATH_PREFIX, RoomRegistry, SessionHandler, serve_connection,
};
use tokio::{sync::watch, task::JoinSet};
use turmoil::net::TcpListener;

use crate::SimEnv;

/// Port the simulated server listens on.
pub const SIM_PORT: u16 = 9000;

/// Simulation server for testing with turmoil.
///
/// Accepts simulated TCP connections and drives each one through the same
/// handshake, session, and registry code as the production server.
pub struct SimServer {
    /// TCP listener for accepting connections
    listener: TcpListener,
    /// Shared registry
    registry: Arc<RoomRegistry<SimEnv>>,
    /// Normalized path prefix
    prefix: String,
}

impl SimServer {
    /// Bind on [`SIM_PORT`] serving rooms under the default prefix.
    pub async fn bind(registry: Arc<RoomRegistry<SimEnv>>) -> io::Result<Self> {
        let listener = TcpListener::bind((Ipv4Addr::UNSPECIFIED, SIM_PORT)).await?;

        Ok(Self { listener, registry, prefix: DEFAULT_PATH_PREFIX.to_string() })
    }

    /// Shared registry.
    pub fn registry(&self) -> &Arc<RoomRegistry<SimEnv>> {
        &self.registry
    }

    /// Serve until the simulation ends.
    pub async fn run(self) -> io::Result<()> {
        self.run_until(std::future::pending()).await
    }

    /// Serve until `shutdown` resolves, then close and await every session.
    pub async fn run_until<F>(self, shutdown: F) -> io::Result<()>
    where
        F: Future<Output = ()>,
    {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handler = SessionHandler::new(Arc::clone(&self.registry), shutdown_rx);
        let mut sessions = JoinSet::new();
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                () = &mut shutdown => break,
                accepted = self.listener.accept() => {
                    let (stream, peer) = accepted?;
                    let handler = handler.clone();
                    let prefix = self.prefix.clone();

                    sessions.spawn(async move {
                        let served =
                            serve_connection(stream, &prefix, DEFAULT_HANDSHAKE_TIMEOUT, &handler)
                                .await;
                        if let Err(e) = served {
                            tracing::debug!(%peer, "simulated connection error: {}", e);
                        }
                    });
                },
            }

            while sessions.try_join_next().is_some() {}
        }

        shutdown_tx.send_replace(true);
        while sessions.join_next().await.is_some() {}

        Ok(())
    }
}
