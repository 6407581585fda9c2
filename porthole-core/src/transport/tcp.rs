//! Plain TCP dialing

use super::socket_tuning::configure_socket_silent;
use porthole_common::{Result, TunnelError};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::debug;

/// Dial `host:port`, giving up after `connect_timeout`.
pub async fn connect(host: &str, port: u16, connect_timeout: Duration) -> Result<TcpStream> {
    let addr = join_host_port(host, port);

    let stream = match timeout(connect_timeout, TcpStream::connect((host, port))).await {
        Ok(Ok(stream)) => stream,
        Ok(Err(source)) => return Err(TunnelError::Connect { addr, source }),
        Err(_) => {
            return Err(TunnelError::Timeout(format!(
                "connecting to {addr} took longer than {connect_timeout:?}"
            )))
        }
    };

    configure_socket_silent(&stream);
    debug!("Connected to {}", addr);
    Ok(stream)
}

/// `host:port`, bracketing IPv6 literals.
fn join_host_port(host: &str, port: u16) -> String {
    if host.contains(':') && !host.starts_with('[') {
        format!("[{host}]:{port}")
    } else {
        format!("{host}:{port}")
    }
}
