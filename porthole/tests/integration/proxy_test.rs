//! Proxy sessions: tunnel sockets, buffered bytes and teardown

use super::{
    closed_port, read_n, serve_local, start_echo_server, wait_until, MockRelay, RelayConn, BOUND,
};
use porthole::protocol::ServerMessage;
use porthole::{CancellationToken, ClientConfig, TunnelClient};
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use uuid::Uuid;

/// Connect a client to `relay`, start its receive loop and hand back the
/// relay's end of the control connection.
async fn running_client(
    relay: &Arc<MockRelay>,
    config: ClientConfig,
    secret: Option<&'static str>,
) -> (Arc<TunnelClient>, RelayConn, JoinHandle<porthole::Result<()>>) {
    let relay_task = {
        let relay = Arc::clone(relay);
        tokio::spawn(async move {
            let mut conn = relay.accept().await;
            if let Some(secret) = secret {
                assert!(conn.authenticate(secret).await);
            }
            conn.assign(9000).await;
            conn
        })
    };

    let client = Arc::new(TunnelClient::connect(config).await.unwrap());
    let control = relay_task.await.unwrap();

    let listener = {
        let client = Arc::clone(&client);
        tokio::spawn(async move { client.listen(CancellationToken::new()).await })
    };
    (client, control, listener)
}

#[tokio::test]
async fn test_proxy_echo_roundtrip() {
    let (local_port, _echo) = start_echo_server().await;
    let relay = Arc::new(MockRelay::bind().await);
    let (client, mut control, _listener) =
        running_client(&relay, relay.config(local_port), None).await;

    let id = Uuid::new_v4();
    control.send(&ServerMessage::Connection(id)).await;

    let mut tunnel = relay.accept().await;
    tunnel.expect_accept(id).await;
    let (mut tunnel, buffered) = tunnel.into_raw();
    assert!(buffered.is_empty());

    tunnel.write_all(b"hello through the tunnel").await.unwrap();
    assert_eq!(read_n(&mut tunnel, 24).await, b"hello through the tunnel");
    assert!(wait_until(|| client.active_proxy_count() == 1).await);

    drop(tunnel);
    assert!(wait_until(|| client.active_proxy_count() == 0).await);
}

#[tokio::test]
async fn test_sessions_are_independent() {
    let (local_port, _echo) = start_echo_server().await;
    let relay = Arc::new(MockRelay::bind().await);
    let (client, mut control, _listener) =
        running_client(&relay, relay.config(local_port), None).await;

    let mut tunnels = Vec::new();
    for _ in 0..3 {
        let id = Uuid::new_v4();
        control.send(&ServerMessage::Connection(id)).await;
        let mut tunnel = relay.accept().await;
        tunnel.expect_accept(id).await;
        tunnels.push(tunnel.into_raw().0);
    }

    for (i, tunnel) in tunnels.iter_mut().enumerate().rev() {
        let message = format!("session-{i}");
        tunnel.write_all(message.as_bytes()).await.unwrap();
        assert_eq!(read_n(tunnel, message.len()).await, message.as_bytes());
    }
    assert!(wait_until(|| client.active_proxy_count() == 3).await);

    tunnels.truncate(1);
    assert!(wait_until(|| client.active_proxy_count() == 1).await);
    assert!(client.connected());
}

#[tokio::test]
async fn test_buffered_bytes_reach_local_first() {
    // Local service reports everything it receives
    let (seen_tx, mut seen_rx) = mpsc::unbounded_channel::<Vec<u8>>();
    let (local_port, _local) = serve_local(move |mut socket| {
        let seen_tx = seen_tx.clone();
        async move {
            let mut received = Vec::new();
            let _ = socket.read_to_end(&mut received).await;
            let _ = seen_tx.send(received);
        }
    })
    .await;

    let relay = Arc::new(MockRelay::bind().await);
    let config = ClientConfig {
        secret: Some("hunter2".into()),
        ..relay.config(local_port)
    };
    let (_client, mut control, _listener) =
        running_client(&relay, config, Some("hunter2")).await;

    let id = Uuid::new_v4();
    control.send(&ServerMessage::Connection(id)).await;

    // Payload rides in the same write as the tunnel socket's challenge, so
    // the client reads it into its frame buffer before it sends Accept
    let mut tunnel = relay.accept().await;
    let challenge = Uuid::new_v4();
    let mut first_write = serde_json::to_vec(&ServerMessage::Challenge(challenge)).unwrap();
    first_write.push(0);
    first_write.extend_from_slice(b"prefix|");
    tunnel.write_raw(&first_write).await;

    match tunnel.recv().await {
        Some(porthole::protocol::ClientMessage::Authenticate(tag)) => {
            assert!(porthole::Authenticator::new("hunter2").validate(&challenge, &tag));
        }
        other => panic!("expected Authenticate, got {other:?}"),
    }
    tunnel.expect_accept(id).await;

    let (mut tunnel, _) = tunnel.into_raw();
    tunnel.write_all(b"live").await.unwrap();
    drop(tunnel);

    let received = tokio::time::timeout(BOUND, seen_rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(received, b"prefix|live");
}

#[tokio::test]
async fn test_relay_drop_closes_local_connection() {
    let (eof_tx, eof_rx) = oneshot::channel::<()>();
    let eof_tx = Arc::new(std::sync::Mutex::new(Some(eof_tx)));
    let (local_port, _local) = serve_local(move |mut socket| {
        let eof_tx = Arc::clone(&eof_tx);
        async move {
            let mut sink = Vec::new();
            let _ = socket.read_to_end(&mut sink).await;
            if let Some(tx) = eof_tx.lock().unwrap().take() {
                let _ = tx.send(());
            }
        }
    })
    .await;

    let relay = Arc::new(MockRelay::bind().await);
    let (client, mut control, _listener) =
        running_client(&relay, relay.config(local_port), None).await;

    let id = Uuid::new_v4();
    control.send(&ServerMessage::Connection(id)).await;
    let mut tunnel = relay.accept().await;
    tunnel.expect_accept(id).await;
    assert!(wait_until(|| client.active_proxy_count() == 1).await);

    drop(tunnel);

    tokio::time::timeout(BOUND, eof_rx)
        .await
        .expect("local connection was not closed")
        .unwrap();
    assert!(wait_until(|| client.active_proxy_count() == 0).await);
}

#[tokio::test]
async fn test_failed_session_does_not_affect_control_loop() {
    let relay = Arc::new(MockRelay::bind().await);
    let (client, mut control, listener) =
        running_client(&relay, relay.config(closed_port().await), None).await;

    let id = Uuid::new_v4();
    control.send(&ServerMessage::Connection(id)).await;
    let mut tunnel = relay.accept().await;
    tunnel.expect_accept(id).await;

    // Local dial fails; the tunnel socket is dropped
    assert!(tunnel.recv().await.is_none());
    assert!(wait_until(|| client.active_proxy_count() == 0).await);

    control.send(&ServerMessage::Heartbeat).await;
    assert!(wait_until(|| client.last_heartbeat().is_some()).await);
    assert!(client.connected());
    assert!(!listener.is_finished());
}

#[tokio::test]
async fn test_running_sessions_survive_control_close() {
    let (local_port, _echo) = start_echo_server().await;
    let relay = Arc::new(MockRelay::bind().await);
    let (client, mut control, listener) =
        running_client(&relay, relay.config(local_port), None).await;

    let id = Uuid::new_v4();
    control.send(&ServerMessage::Connection(id)).await;
    let mut tunnel = relay.accept().await;
    tunnel.expect_accept(id).await;
    let (mut tunnel, _) = tunnel.into_raw();

    client.close();
    tokio::time::timeout(BOUND, listener)
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert!(control.recv().await.is_none());

    tunnel.write_all(b"still here").await.unwrap();
    assert_eq!(read_n(&mut tunnel, 10).await, b"still here");
    assert_eq!(client.active_proxy_count(), 1);
}
