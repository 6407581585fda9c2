//! Socket tuning for relay and local connections
//!
//! - `TCP_NODELAY`: control frames are tiny and latency-sensitive
//! - TCP keepalive: notice a dead relay during long idle periods, since the
//!   control receive loop itself never times out

use socket2::SockRef;
use std::io;
use std::time::Duration;
use tokio::net::TcpStream;

const KEEPALIVE_TIME: Duration = Duration::from_secs(30);
const KEEPALIVE_INTERVAL: Duration = Duration::from_secs(10);

pub fn configure_socket(stream: &TcpStream) -> io::Result<()> {
    stream.set_nodelay(true)?;

    let socket = SockRef::from(stream);
    let keepalive = socket2::TcpKeepalive::new()
        .with_time(KEEPALIVE_TIME)
        .with_interval(KEEPALIVE_INTERVAL);
    socket.set_tcp_keepalive(&keepalive)?;

    Ok(())
}

pub fn configure_socket_silent(stream: &TcpStream) {
    if let Err(e) = configure_socket(stream) {
        tracing::debug!("Socket tuning failed: {}", e);
    }
}
