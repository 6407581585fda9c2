#![allow(clippy::unwrap_used, clippy::expect_used)]

//! Integration tests for porthole
//!
//! Each test runs the client against an in-process relay that speaks the
//! wire protocol directly, plus a throwaway local service.

mod lifecycle_test;
mod proxy_test;

use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use porthole::protocol::{ClientMessage, DelimitedCodec, ServerMessage};
use porthole::{Authenticator, ClientConfig};
use std::future::Future;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tokio_util::codec::Framed;
use uuid::Uuid;

pub const BOUND: Duration = Duration::from_secs(5);

/// Listening side of a fake relay
pub struct MockRelay {
    listener: TcpListener,
    pub port: u16,
}

impl MockRelay {
    pub async fn bind() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        Self { listener, port }
    }

    pub async fn accept(&self) -> RelayConn {
        let (stream, _) = tokio::time::timeout(BOUND, self.listener.accept())
            .await
            .expect("client never connected")
            .unwrap();
        RelayConn(Framed::new(stream, DelimitedCodec::new()))
    }

    /// Client configuration pointing at this relay and `local_port`.
    pub fn config(&self, local_port: u16) -> ClientConfig {
        ClientConfig {
            local_host: "127.0.0.1".into(),
            control_port: self.port,
            ..ClientConfig::new(local_port, "127.0.0.1")
        }
    }
}

/// One accepted relay-side socket
pub struct RelayConn(Framed<TcpStream, DelimitedCodec>);

impl RelayConn {
    pub async fn send(&mut self, message: &ServerMessage) {
        let payload = serde_json::to_vec(message).unwrap();
        self.0.send(Bytes::from(payload)).await.unwrap();
    }

    /// Next client message; `None` once the client hung up.
    pub async fn recv(&mut self) -> Option<ClientMessage> {
        match tokio::time::timeout(BOUND, self.0.next()).await.ok()? {
            Some(Ok(frame)) => Some(serde_json::from_slice(&frame).unwrap()),
            _ => None,
        }
    }

    /// Challenge the client and check its answer against `secret`.
    pub async fn authenticate(&mut self, secret: &str) -> bool {
        let challenge = Uuid::new_v4();
        self.send(&ServerMessage::Challenge(challenge)).await;
        match self.recv().await {
            Some(ClientMessage::Authenticate(tag)) => {
                Authenticator::new(secret).validate(&challenge, &tag)
            }
            _ => false,
        }
    }

    /// Answer the client's Hello with `port`, returning the requested port.
    pub async fn assign(&mut self, port: u16) -> u16 {
        let requested = match self.recv().await {
            Some(ClientMessage::Hello(requested)) => requested,
            other => panic!("expected Hello, got {other:?}"),
        };
        self.send(&ServerMessage::Hello(port)).await;
        requested
    }

    pub async fn expect_accept(&mut self, id: Uuid) {
        assert_eq!(self.recv().await, Some(ClientMessage::Accept(id)));
    }

    /// Write bytes on the socket without framing.
    pub async fn write_raw(&mut self, bytes: &[u8]) {
        self.0.get_mut().write_all(bytes).await.unwrap();
    }

    /// Socket for raw relaying, plus anything read past the last frame.
    pub fn into_raw(self) -> (TcpStream, Bytes) {
        let parts = self.0.into_parts();
        (parts.io, parts.read_buf.freeze())
    }
}

/// Local service that echoes every connection back to itself
pub async fn start_echo_server() -> (u16, JoinHandle<()>) {
    serve_local(|mut socket| async move {
        let (mut read, mut write) = socket.split();
        let _ = tokio::io::copy(&mut read, &mut write).await;
    })
    .await
}

/// Local service running `handler` on every accepted connection
pub async fn serve_local<F, Fut>(handler: F) -> (u16, JoinHandle<()>)
where
    F: Fn(TcpStream) -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let handle = tokio::spawn(async move {
        while let Ok((socket, _)) = listener.accept().await {
            tokio::spawn(handler(socket));
        }
    });
    (port, handle)
}

/// A port nothing listens on
pub async fn closed_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap().port()
}

/// Poll `condition` until it holds or `BOUND` passes.
pub async fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
    let start = std::time::Instant::now();
    while start.elapsed() < BOUND {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}

/// Read exactly `len` bytes.
pub async fn read_n(stream: &mut TcpStream, len: usize) -> Vec<u8> {
    let mut buf = vec![0u8; len];
    tokio::time::timeout(BOUND, stream.read_exact(&mut buf))
        .await
        .expect("timed out reading")
        .unwrap();
    buf
}
