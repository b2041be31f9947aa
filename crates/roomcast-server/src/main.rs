//! Roomcast server binary.
//!
//! # Usage
//!
//! ```bash
//! # Serve rooms at ws://0.0.0.0:8080/chat/<room>
//! roomcast-server --bind 0.0.0.0:8080
//!
//! # Mount rooms at the root and give slow receivers one second per message
//! roomcast-server --path-prefix / --send-timeout-ms 1000
//! ```

use std::time::Duration;

use clap::Parser;
use roomcast_server::{RegistryConfig, Server, ServerRuntimeConfig};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Roomcast chat room server
#[derive(Parser, Debug)]
#[command(name = "roomcast-server")]
#[command(about = "Real-time WebSocket chat room server")]
#[command(version)]
struct Args {
    /// Address to bind to
    #[arg(short, long, default_value = "0.0.0.0:8080")]
    bind: String,

    /// URL path prefix rooms are served under
    #[arg(long, default_value = roomcast_server::DEFAULT_PATH_PREFIX)]
    path_prefix: String,

    /// Maximum concurrent connections
    #[arg(long, default_value = "10000")]
    max_connections: usize,

    /// Time a new connection has to finish the WebSocket handshake, in
    /// milliseconds
    #[arg(long, default_value = "10000")]
    handshake_timeout_ms: u64,

    /// Per-recipient delivery timeout in milliseconds
    #[arg(long, default_value = "5000")]
    send_timeout_ms: u64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::registry().with(fmt::layer()).with(filter).init();

    tracing::info!("Roomcast server starting");
    tracing::info!("Binding to {}", args.bind);

    let config = ServerRuntimeConfig {
        bind_address: args.bind,
        path_prefix: args.path_prefix,
        max_connections: args.max_connections,
        handshake_timeout: Duration::from_millis(args.handshake_timeout_ms),
        registry: RegistryConfig { send_timeout: Duration::from_millis(args.send_timeout_ms) },
    };

    let server = Server::bind(config).await?;

    tracing::info!("Server listening on {}", server.local_addr()?);

    server
        .run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("failed to listen for Ctrl-C: {}", e);
                std::future::pending::<()>().await;
            }
        })
        .await?;

    tracing::info!("Server stopped");

    Ok(())
}
