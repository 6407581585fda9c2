//! One proxy session per relay-announced inbound connection

use super::relay::relay;
use super::status::TunnelStatus;
use crate::auth::Authenticator;
use crate::transport::{self, FramedConnection};
use porthole_common::{ClientConfig, Result};
use porthole_protocol::ClientMessage;
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};
use uuid::Uuid;

/// Everything a proxy session needs; shared by all sessions of one client
#[derive(Debug)]
pub(crate) struct ProxyContext {
    pub(crate) config: ClientConfig,
    pub(crate) auth: Option<Authenticator>,
    pub(crate) status: Arc<TunnelStatus>,
}

/// Run a session to completion, logging instead of propagating failures.
pub(crate) async fn run_session(ctx: Arc<ProxyContext>, id: Uuid) {
    let mut guard = ctx.status.track_proxy();
    match proxy(&ctx, id).await {
        Ok(()) => debug!(session_id = %id, "Proxy session finished"),
        Err(e) => {
            guard.mark_failed();
            warn!(session_id = %id, error = %e, "Proxy session failed");
        }
    }
}

async fn proxy(ctx: &ProxyContext, id: Uuid) -> Result<()> {
    let config = &ctx.config;

    let stream = transport::connect(&config.server, config.control_port, config.timeout).await?;
    let mut conn = FramedConnection::with_timeout(stream, config.timeout);
    if let Some(auth) = &ctx.auth {
        auth.client_handshake(&mut conn).await?;
    }
    conn.send(&ClientMessage::Accept(id)).await?;

    // From here on the tunnel socket is a raw pipe without deadlines
    let (tunnel, buffered) = conn.into_raw();

    let mut local =
        transport::connect(&config.local_host, config.local_port, config.timeout).await?;
    if !buffered.is_empty() {
        debug!(session_id = %id, bytes = buffered.len(), "Replaying buffered tunnel bytes");
        local.write_all(&buffered).await?;
    }

    let stats = relay(local, tunnel).await?;
    debug!(
        session_id = %id,
        inbound = stats.inbound,
        outbound = stats.outbound,
        "Relay closed"
    );
    Ok(())
}
