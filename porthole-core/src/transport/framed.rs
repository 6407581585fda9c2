//! Framed connection: JSON messages over a zero-byte delimited stream.
//!
//! Writes are always bounded by the connection timeout. Reads are bounded
//! only when the caller asks for it: handshake steps do, the long-lived
//! control loop does not.

use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use porthole_common::{Result, TunnelError};
use porthole_protocol::constants::{MAX_FRAME_LENGTH, NETWORK_TIMEOUT};
use porthole_protocol::{DelimitedCodec, ProtocolError, ServerMessage};
use serde::Serialize;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_util::codec::Framed;

/// A stream socket carrying delimited JSON frames
#[derive(Debug)]
pub struct FramedConnection<S = TcpStream> {
    framed: Framed<S, DelimitedCodec>,
    timeout: Duration,
}

impl<S> FramedConnection<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(stream: S) -> Self {
        Self::with_timeout(stream, NETWORK_TIMEOUT)
    }

    pub fn with_timeout(stream: S, timeout: Duration) -> Self {
        Self {
            framed: Framed::new(stream, DelimitedCodec::new()),
            timeout,
        }
    }

    /// Serialize `value` and write it as one frame.
    ///
    /// Oversized values are rejected before anything reaches the socket.
    pub async fn send<T: Serialize>(&mut self, value: &T) -> Result<()> {
        let payload = serde_json::to_vec(value).map_err(ProtocolError::from)?;
        if payload.len() > MAX_FRAME_LENGTH {
            return Err(ProtocolError::too_large(payload.len(), MAX_FRAME_LENGTH).into());
        }

        match timeout(self.timeout, self.framed.send(Bytes::from(payload))).await {
            Ok(result) => result.map_err(TunnelError::from),
            Err(_) => Err(TunnelError::Timeout(format!(
                "writing frame took longer than {:?}",
                self.timeout
            ))),
        }
    }

    /// Read the next frame payload, without its terminator.
    ///
    /// `Ok(None)` means the peer closed the stream cleanly between frames.
    pub async fn receive(&mut self, apply_timeout: bool) -> Result<Option<Bytes>> {
        let next = if apply_timeout {
            match timeout(self.timeout, self.framed.next()).await {
                Ok(next) => next,
                Err(_) => {
                    return Err(TunnelError::Timeout(format!(
                        "no message received within {:?}",
                        self.timeout
                    )))
                }
            }
        } else {
            self.framed.next().await
        };

        match next {
            Some(Ok(frame)) => Ok(Some(frame)),
            Some(Err(e)) => Err(e.into()),
            None => Ok(None),
        }
    }

    /// Read and decode the next relay message.
    pub async fn receive_message(&mut self, apply_timeout: bool) -> Result<Option<ServerMessage>> {
        match self.receive(apply_timeout).await? {
            Some(frame) => Ok(Some(ServerMessage::decode(&frame)?)),
            None => Ok(None),
        }
    }

    /// Take whatever was read off the socket past the last decoded frame.
    ///
    /// The socket itself is left untouched.
    pub fn drain_buffered(&mut self) -> Bytes {
        self.framed.read_buffer_mut().split().freeze()
    }

    /// Hand the socket over for raw byte relaying, together with the bytes
    /// already buffered past the last frame.
    pub fn into_raw(mut self) -> (S, Bytes) {
        let buffered = self.drain_buffered();
        (self.framed.into_inner(), buffered)
    }

    /// Shut down the write side and release the socket.
    pub async fn close(self) -> Result<()> {
        let mut stream = self.framed.into_inner();
        stream.shutdown().await?;
        Ok(())
    }
}
