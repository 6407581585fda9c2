//! Embedded `Client`: start, shutdown and reconnection

use super::{wait_until, MockRelay, BOUND};
use porthole::protocol::ServerMessage;
use porthole::{Client, ResilienceConfig, TunnelError};
use std::sync::Arc;
use std::time::Duration;

fn fast_resilience() -> ResilienceConfig {
    ResilienceConfig {
        reconnect_base: Duration::from_millis(20),
        reconnect_max: Duration::from_millis(100),
        jitter_factor: 0.0,
    }
}

#[tokio::test]
async fn test_start_and_shutdown() {
    let relay = MockRelay::bind().await;
    let mut client = Client::builder()
        .server("127.0.0.1")
        .local_port(8000)
        .control_port(relay.port)
        .auto_reconnect(false)
        .build()
        .unwrap();

    let relay_task = tokio::spawn(async move {
        let mut conn = relay.accept().await;
        conn.assign(9000).await;
        conn
    });

    let info = client.start().await.unwrap();
    let mut conn = relay_task.await.unwrap();

    assert_eq!(info.remote_port, 9000);
    assert_eq!(info.public_addr(), "127.0.0.1:9000");
    assert_eq!(client.remote_port(), Some(9000));
    assert!(client.connected());
    assert!(client.is_running());

    let err = client.start().await.unwrap_err();
    assert!(matches!(err, TunnelError::InvalidState(_)));

    conn.send(&ServerMessage::Heartbeat).await;
    assert!(wait_until(|| client.last_heartbeat().is_some()).await);

    tokio::time::timeout(BOUND, client.shutdown())
        .await
        .unwrap()
        .unwrap();
    assert!(!client.is_running());
    assert!(!client.connected());
    assert!(conn.recv().await.is_none());

    let status = client.status().unwrap();
    assert!(!status.connected);
    assert!(status.last_heartbeat.is_some());
}

#[tokio::test]
async fn test_start_reports_first_connection_failure() {
    let relay = MockRelay::bind().await;
    let mut client = Client::builder()
        .server("127.0.0.1")
        .local_port(8000)
        .control_port(relay.port)
        .build()
        .unwrap();

    tokio::spawn(async move {
        let mut conn = relay.accept().await;
        conn.send(&ServerMessage::Challenge(uuid::Uuid::new_v4()))
            .await;
        while conn.recv().await.is_some() {}
    });

    let err = client.start().await.unwrap_err();
    assert!(matches!(err, TunnelError::AuthenticationRequired));
    assert!(!client.is_running());
    assert_eq!(client.remote_port(), None);
}

#[tokio::test]
async fn test_no_reconnect_stops_after_relay_error() {
    let relay = MockRelay::bind().await;
    let mut client = Client::builder()
        .server("127.0.0.1")
        .local_port(8000)
        .control_port(relay.port)
        .auto_reconnect(false)
        .build()
        .unwrap();

    let relay_task = tokio::spawn(async move {
        let mut conn = relay.accept().await;
        conn.assign(9000).await;
        conn
    });
    client.start().await.unwrap();
    let mut conn = relay_task.await.unwrap();

    conn.send(&ServerMessage::Error("relay shutting down".into()))
        .await;

    assert!(wait_until(|| !client.is_running()).await);
    assert!(!client.connected());
}

#[tokio::test]
async fn test_reconnect_requests_previous_port() {
    let relay = Arc::new(MockRelay::bind().await);
    let mut client = Client::builder()
        .server("127.0.0.1")
        .local_port(8000)
        .control_port(relay.port)
        .auto_reconnect(true)
        .resilience(fast_resilience())
        .build()
        .unwrap();

    let first = {
        let relay = Arc::clone(&relay);
        tokio::spawn(async move {
            let mut conn = relay.accept().await;
            conn.assign(9321).await;
            conn
        })
    };
    client.start().await.unwrap();
    let first = first.await.unwrap();

    // Relay drops the control connection; the client comes back
    drop(first);
    let mut second = relay.accept().await;
    assert_eq!(second.assign(9321).await, 9321);

    assert!(wait_until(|| client.connected()).await);
    assert_eq!(client.remote_port(), Some(9321));
    assert!(client.is_running());

    tokio::time::timeout(BOUND, client.shutdown())
        .await
        .unwrap()
        .unwrap();
    assert!(second.recv().await.is_none());
}

#[tokio::test]
async fn test_reconnect_keeps_trying_until_relay_returns() {
    let relay = Arc::new(MockRelay::bind().await);
    let mut client = Client::builder()
        .server("127.0.0.1")
        .local_port(8000)
        .control_port(relay.port)
        .resilience(fast_resilience())
        .build()
        .unwrap();

    let first = {
        let relay = Arc::clone(&relay);
        tokio::spawn(async move {
            let mut conn = relay.accept().await;
            conn.assign(9400).await;
            conn
        })
    };
    client.start().await.unwrap();
    drop(first.await.unwrap());

    // Turn the next attempt away, then accept the one after
    let mut refused = relay.accept().await;
    let _ = refused.recv().await;
    refused
        .send(&ServerMessage::Error("try again later".into()))
        .await;

    let mut accepted = relay.accept().await;
    accepted.assign(9400).await;
    assert!(wait_until(|| client.connected()).await);

    client.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_stop_during_backoff() {
    let relay = Arc::new(MockRelay::bind().await);
    let mut client = Client::builder()
        .server("127.0.0.1")
        .local_port(8000)
        .control_port(relay.port)
        .resilience(ResilienceConfig {
            reconnect_base: Duration::from_secs(30),
            reconnect_max: Duration::from_secs(30),
            jitter_factor: 0.0,
        })
        .build()
        .unwrap();

    let first = {
        let relay = Arc::clone(&relay);
        tokio::spawn(async move {
            let mut conn = relay.accept().await;
            conn.assign(9500).await;
            conn
        })
    };
    client.start().await.unwrap();
    drop(first.await.unwrap());
    assert!(wait_until(|| !client.connected()).await);

    // Waiting 30s to retry; shutdown must not wait for it
    tokio::time::timeout(BOUND, client.shutdown())
        .await
        .unwrap()
        .unwrap();
    assert!(!client.is_running());
}
