//! Roomcast load generator.
//!
//! Joins a room and sends a burst of numbered messages at a fixed interval,
//! logging everything the room sends back.
//!
//! # Usage
//!
//! ```bash
//! # 100 messages to ws://localhost:8080/chat/test_room, one every 100ms
//! roomcast-load
//!
//! # A faster burst into another room
//! roomcast-load --room lobby --messages 1000 --interval-ms 5
//! ```

use std::time::Duration;

use clap::Parser;
use roomcast_client::{connect, room_url};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Roomcast load generator
#[derive(Parser, Debug)]
#[command(name = "roomcast-load")]
#[command(about = "Send a burst of chat messages to a roomcast room")]
#[command(version)]
struct Args {
    /// Base URL rooms are served under
    #[arg(long, default_value = "ws://localhost:8080/chat")]
    url: String,

    /// Room to join
    #[arg(long, default_value = "test_room")]
    room: String,

    /// Number of messages to send
    #[arg(long, default_value = "100")]
    messages: u64,

    /// Delay between messages in milliseconds
    #[arg(long, default_value = "100")]
    interval_ms: u64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

/// How long to keep reading after the last message was sent.
const DRAIN_GRACE: Duration = Duration::from_millis(500);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::registry().with(fmt::layer()).with(filter).init();

    let url = room_url(&args.url, &args.room);
    tracing::info!("Connecting to {}", url);

    let mut client = connect(&url).await?;
    let mut ticker = tokio::time::interval(Duration::from_millis(args.interval_ms.max(1)));
    let mut sent = 0u64;
    let mut received = 0u64;

    while sent < args.messages {
        tokio::select! {
            _ = ticker.tick() => {
                client.send(format!("Test message {sent}")).await?;
                sent += 1;
            },
            incoming = client.recv() => match incoming {
                Some(text) => {
                    received += 1;
                    tracing::info!("{}", text);
                },
                None => {
                    tracing::warn!("server closed the connection");
                    break;
                },
            },
        }
    }

    let drain = tokio::time::sleep(DRAIN_GRACE);
    tokio::pin!(drain);
    loop {
        tokio::select! {
            () = &mut drain => break,
            incoming = client.recv() => match incoming {
                Some(text) => {
                    received += 1;
                    tracing::info!("{}", text);
                },
                None => break,
            },
        }
    }

    client.stop();
    tracing::info!(sent, received, "Load run finished");

    Ok(())
}
