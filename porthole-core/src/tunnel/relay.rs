//! Raw byte relay between a local service socket and a tunnel socket

use std::io;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::trace;

const COPY_BUFFER_SIZE: usize = 16 * 1024;

/// Bytes moved by a finished relay, per direction
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RelayStats {
    /// Local service to relay
    pub outbound: u64,
    /// Relay to local service
    pub inbound: u64,
}

/// Relay until either direction reaches end-of-stream or fails.
///
/// The first direction to finish ends the relay: both write halves are shut
/// down, the other copy is abandoned and both sockets are dropped. Half-open
/// sockets are therefore never left waiting on a peer that stopped reading.
pub async fn relay<L, T>(local: L, tunnel: T) -> io::Result<RelayStats>
where
    L: AsyncRead + AsyncWrite,
    T: AsyncRead + AsyncWrite,
{
    let (mut local_read, mut local_write) = tokio::io::split(local);
    let (mut tunnel_read, mut tunnel_write) = tokio::io::split(tunnel);
    let mut stats = RelayStats::default();

    let result = tokio::select! {
        res = pipe(&mut local_read, &mut tunnel_write, &mut stats.outbound) => {
            trace!("local side finished first");
            res
        }
        res = pipe(&mut tunnel_read, &mut local_write, &mut stats.inbound) => {
            trace!("tunnel side finished first");
            res
        }
    };

    // Best effort: the peer may already be gone
    let _ = local_write.shutdown().await;
    let _ = tunnel_write.shutdown().await;

    record_relayed(stats);
    result.map(|()| stats)
}

async fn pipe<R, W>(reader: &mut R, writer: &mut W, copied: &mut u64) -> io::Result<()>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut buf = vec![0u8; COPY_BUFFER_SIZE];
    loop {
        let n = reader.read(&mut buf).await?;
        if n == 0 {
            return Ok(());
        }
        writer.write_all(&buf[..n]).await?;
        writer.flush().await?;
        *copied += n as u64;
    }
}

#[cfg(feature = "metrics")]
fn record_relayed(stats: RelayStats) {
    if let Some(metrics) = porthole_observability::tunnel_metrics() {
        metrics.record_relayed("outbound", stats.outbound);
        metrics.record_relayed("inbound", stats.inbound);
    }
}

#[cfg(not(feature = "metrics"))]
fn record_relayed(_stats: RelayStats) {}
