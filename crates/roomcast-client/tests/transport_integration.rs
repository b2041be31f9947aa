//! Integration tests for the client WebSocket transport.
//!
//! These tests connect real clients to a real server over loopback TCP.

use std::time::Duration;

use roomcast_client::{TransportError, connect, room_url};
use roomcast_server::{Server, ServerRuntimeConfig};
use tokio::time::timeout;

const RECV_TIMEOUT: Duration = Duration::from_secs(5);

/// Start a real server and return the base URL rooms are served under.
async fn start_server() -> String {
    let config =
        ServerRuntimeConfig { bind_address: "127.0.0.1:0".to_string(), ..Default::default() };
    let server = Server::bind(config).await.unwrap();
    let addr = server.local_addr().unwrap();

    tokio::spawn(async move {
        let _ = server.run().await;
    });

    format!("ws://{addr}/chat")
}

/// Give the server time to register connections that just completed their
/// handshake.
async fn settle() {
    tokio::time::sleep(Duration::from_millis(50)).await;
}

#[tokio::test]
async fn client_connects_to_room() {
    let base = start_server().await;

    let result = connect(&room_url(&base, "lobby")).await;

    assert!(result.is_ok(), "client should connect: {:?}", result.err());
}

#[tokio::test]
async fn client_connect_fails_for_unknown_path() {
    let base = start_server().await;
    let url = base.replace("/chat", "/elsewhere/lobby");

    let result = connect(&url).await;

    assert!(matches!(result, Err(TransportError::Connection(_))));
}

#[tokio::test]
async fn message_reaches_other_member_with_identity_prefix() {
    let base = start_server().await;
    let url = room_url(&base, "lobby");

    let alice = connect(&url).await.unwrap();
    let mut bob = connect(&url).await.unwrap();
    settle().await;

    alice.send("hi").await.unwrap();

    let received = timeout(RECV_TIMEOUT, bob.recv()).await.unwrap().unwrap();
    let (identity, text) = received.split_once(" :: ").unwrap();
    assert_eq!(identity.len(), 8);
    assert!(identity.chars().all(|c| c.is_ascii_hexdigit()));
    assert_eq!(text, "hi");
}

#[tokio::test]
async fn sender_does_not_receive_own_message() {
    let base = start_server().await;
    let url = room_url(&base, "lobby");

    let mut alice = connect(&url).await.unwrap();
    let mut bob = connect(&url).await.unwrap();
    settle().await;

    alice.send("first").await.unwrap();
    bob.send("second").await.unwrap();

    let at_bob = timeout(RECV_TIMEOUT, bob.recv()).await.unwrap().unwrap();
    assert!(at_bob.ends_with(" :: first"));

    let at_alice = timeout(RECV_TIMEOUT, alice.recv()).await.unwrap().unwrap();
    assert!(at_alice.ends_with(" :: second"), "alice got {at_alice}");
}

#[tokio::test]
async fn rooms_are_isolated() {
    let base = start_server().await;

    let alice = connect(&room_url(&base, "r1")).await.unwrap();
    let mut bob = connect(&room_url(&base, "r2")).await.unwrap();
    settle().await;

    alice.send("x").await.unwrap();

    let result = timeout(Duration::from_millis(200), bob.recv()).await;
    assert!(result.is_err(), "member of r2 must not receive r1 traffic");
}

#[tokio::test]
async fn stopped_client_ends_its_channel() {
    let base = start_server().await;

    let mut client = connect(&room_url(&base, "lobby")).await.unwrap();
    client.stop();

    let next = timeout(RECV_TIMEOUT, client.recv()).await.unwrap();
    assert!(next.is_none());
}
