//! Roomcast production server.
//!
//! Real-time chat rooms over WebSocket. Clients connect to `<prefix>/<room>`,
//! send text, and receive every other member's text prefixed with the
//! sender's identity.
//!
//! # Architecture
//!
//! This crate provides production "glue" around [`roomcast_core`]'s pure
//! session logic. The [`RoomRegistry`] is the only shared mutable state; one
//! [`SessionHandler`] task per connection drives the core state machine and
//! executes its actions against the registry. [`Server`] accepts TCP
//! connections, upgrades them with [`accept_websocket`], and spawns sessions.
//!
//! # Components
//!
//! - [`RoomRegistry`]: Room membership, identities, and broadcast fan-out
//! - [`SessionHandler`]: Per-connection control loop
//! - [`WsTransport`]: TCP listener and WebSocket adapters
//! - [`Server`]: Accept loop, connection limit, graceful shutdown
//! - [`SystemEnv`]: Production environment (OS RNG)

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod connection;
mod error;
mod handler;
mod registry;
mod system_env;
mod transport;

use std::{future::Future, net::SocketAddr, sync::Arc, time::Duration};

pub use connection::{Inbound, Outbound};
pub use error::{AcceptError, DeliveryError, RegistryError, ServerError, TransportError};
pub use handler::{SessionHandler, SessionSummary};
use handler::wait_for_shutdown;
pub use registry::{
    BroadcastReport, DEFAULT_SEND_TIMEOUT, RegistryConfig, RoomRegistry, RoomStats,
};
use roomcast_core::Environment;
pub use system_env::SystemEnv;
use tokio::{
    io::{AsyncRead, AsyncWrite},
    sync::{Semaphore, watch},
    task::JoinSet,
};
pub use transport::{
    AcceptedConnection, WsInbound, WsOutbound, WsTransport, accept_websocket, normalize_prefix,
    room_from_path,
};

/// Default URL path prefix rooms are mounted under.
pub const DEFAULT_PATH_PREFIX: &str = "/chat";

/// Default cap on concurrently open connections.
pub const DEFAULT_MAX_CONNECTIONS: usize = 10_000;

/// Default time a new connection has to complete the WebSocket handshake.
pub const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// Server configuration for the production runtime.
#[derive(Debug, Clone)]
pub struct ServerRuntimeConfig {
    /// Address to bind to (e.g., "0.0.0.0:8080")
    pub bind_address: String,
    /// Path prefix rooms live under (e.g., "/chat" serves "/chat/<room>")
    pub path_prefix: String,
    /// Maximum concurrently open connections
    pub max_connections: usize,
    /// Time allowed for the WebSocket handshake after TCP accept
    pub handshake_timeout: Duration,
    /// Registry configuration (delivery timeout)
    pub registry: RegistryConfig,
}

impl Default for ServerRuntimeConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            path_prefix: DEFAULT_PATH_PREFIX.to_string(),
            max_connections: DEFAULT_MAX_CONNECTIONS,
            handshake_timeout: DEFAULT_HANDSHAKE_TIMEOUT,
            registry: RegistryConfig::default(),
        }
    }
}

/// Production roomcast server.
///
/// Wraps the registry with a WebSocket listener and the system environment.
pub struct Server {
    /// TCP listener
    transport: WsTransport,
    /// Shared room registry
    registry: Arc<RoomRegistry<SystemEnv>>,
    /// Normalized path prefix
    prefix: String,
    /// Handshake deadline per connection
    handshake_timeout: Duration,
    /// One permit per open connection
    connection_limit: Arc<Semaphore>,
}

impl Server {
    /// Create and bind a new server.
    pub async fn bind(config: ServerRuntimeConfig) -> Result<Self, ServerError> {
        if config.max_connections == 0 {
            return Err(ServerError::Config("max_connections must be at least 1".to_string()));
        }
        if config.handshake_timeout.is_zero() {
            return Err(ServerError::Config("handshake_timeout must be non-zero".to_string()));
        }

        let prefix = normalize_prefix(&config.path_prefix)?;
        let transport = WsTransport::bind(&config.bind_address).await?;
        let registry = Arc::new(RoomRegistry::new(SystemEnv::new(), config.registry));

        Ok(Self {
            transport,
            registry,
            prefix,
            handshake_timeout: config.handshake_timeout,
            connection_limit: Arc::new(Semaphore::new(config.max_connections)),
        })
    }

    /// Local address the server is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr, ServerError> {
        self.transport.local_addr()
    }

    /// Shared registry, for inspection.
    pub fn registry(&self) -> Arc<RoomRegistry<SystemEnv>> {
        Arc::clone(&self.registry)
    }

    /// Run the server until the process is killed.
    pub async fn run(self) -> Result<(), ServerError> {
        self.run_until(std::future::pending()).await
    }

    /// Run the server until `shutdown` resolves.
    ///
    /// On shutdown every open session is closed, deregistered, and awaited
    /// before this returns.
    pub async fn run_until<F>(self, shutdown: F) -> Result<(), ServerError>
    where
        F: Future<Output = ()>,
    {
        tracing::info!("Server starting on {}", self.transport.local_addr()?);

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handler = SessionHandler::new(Arc::clone(&self.registry), shutdown_rx);
        let mut sessions = JoinSet::new();
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                () = &mut shutdown => break,
                accepted = self.transport.accept() => match accepted {
                    Ok((stream, peer)) => {
                        let Ok(permit) = Arc::clone(&self.connection_limit).try_acquire_owned()
                        else {
                            tracing::warn!(%peer, "connection limit reached, dropping connection");
                            continue;
                        };

                        let handler = handler.clone();
                        let prefix = self.prefix.clone();
                        let handshake_timeout = self.handshake_timeout;

                        sessions.spawn(async move {
                            let _permit = permit;
                            let served =
                                serve_connection(stream, &prefix, handshake_timeout, &handler)
                                    .await;
                            match served {
                                Ok(summary) => tracing::debug!(
                                    %peer,
                                    connection_id = %summary.connection_id,
                                    "connection finished"
                                ),
                                Err(e) => tracing::warn!(%peer, "connection error: {}", e),
                            }
                        });
                    },
                    Err(e) => {
                        tracing::error!("Accept error: {}", e);
                    },
                },
            }

            while sessions.try_join_next().is_some() {}
        }

        tracing::info!(open_sessions = sessions.len(), "Server shutting down");
        shutdown_tx.send_replace(true);

        while let Some(result) = sessions.join_next().await {
            if let Err(e) = result {
                tracing::error!("session task failed: {}", e);
            }
        }

        Ok(())
    }
}

/// Upgrade `stream` and run its session to completion.
///
/// This is the whole lifetime of one connection: handshake, registration,
/// relay loop, deregistration.
///
/// # Errors
///
/// - `ServerError::Accept` if the handshake or room routing failed, did not
///   finish within `handshake_timeout`, or was cut short by shutdown; nothing
///   was registered
pub async fn serve_connection<S, E>(
    stream: S,
    prefix: &str,
    handshake_timeout: Duration,
    handler: &SessionHandler<E>,
) -> Result<SessionSummary, ServerError>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    E: Environment,
{
    let mut shutdown = handler.shutdown_signal();

    let handshake = tokio::select! {
        biased;
        () = wait_for_shutdown(&mut shutdown) => Err(AcceptError::ShuttingDown),
        accepted = tokio::time::timeout(handshake_timeout, accept_websocket(stream, prefix)) => {
            accepted.unwrap_or(Err(AcceptError::TimedOut { timeout: handshake_timeout }))
        },
    };
    let AcceptedConnection { room, outbound, inbound } = handshake?;
    let outbound: Arc<dyn Outbound> = Arc::new(outbound);

    handler.run(room, outbound, inbound).await
}
