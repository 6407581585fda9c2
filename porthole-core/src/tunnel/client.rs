use super::proxy::{self, ProxyContext};
use super::status::TunnelStatus;
use crate::auth::Authenticator;
use crate::transport::{self, FramedConnection};
use porthole_common::{ClientConfig, Result, TunnelError};
use porthole_protocol::{ClientMessage, ServerMessage};
use std::sync::{Arc, Mutex, Once, PoisonError};
use std::time::SystemTime;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

/// Client side of one tunnel: the control connection plus its status.
///
/// Obtained from [`TunnelClient::connect`] only after the relay has assigned
/// a public port. [`listen`](Self::listen) then serves connection
/// announcements until the relay goes away or a stop is requested.
#[derive(Debug)]
pub struct TunnelClient {
    /// Control connection; taken by `listen`, dropped by `close`
    conn: Mutex<Option<FramedConnection>>,
    context: Arc<ProxyContext>,
    remote_port: u16,
    close_once: Once,
    shutdown: CancellationToken,
}

impl TunnelClient {
    /// Dial the relay, authenticate if a secret is set, and request a port.
    ///
    /// Any failure drops the control socket; no half-built client escapes.
    pub async fn connect(config: ClientConfig) -> Result<Self> {
        let config = config.normalized();
        config.validate()?;
        let auth = config.secret.as_deref().map(Authenticator::new);

        info!(
            "Connecting to {}:{} (control)",
            config.server, config.control_port
        );
        let stream =
            transport::connect(&config.server, config.control_port, config.timeout).await?;
        let mut conn = FramedConnection::with_timeout(stream, config.timeout);

        if let Some(auth) = &auth {
            auth.client_handshake(&mut conn).await?;
            debug!("Control connection authenticated");
        }

        conn.send(&ClientMessage::Hello(config.desired_port)).await?;

        let remote_port = match conn.receive_message(true).await? {
            Some(ServerMessage::Hello(port)) => port,
            Some(ServerMessage::Error(text)) => {
                error!("Relay rejected the tunnel: {}", text);
                return Err(TunnelError::ServerRejected(text));
            }
            Some(ServerMessage::Challenge(_)) if auth.is_none() => {
                return Err(TunnelError::AuthenticationRequired);
            }
            Some(other) => {
                return Err(TunnelError::UnexpectedInitialMessage(
                    other.kind().to_string(),
                ))
            }
            None => return Err(TunnelError::UnexpectedEof),
        };

        info!(
            "Listening at {}:{}, forwarding to {}:{}",
            config.server, remote_port, config.local_host, config.local_port
        );

        let status = Arc::new(TunnelStatus::new());
        status.set_connected(true);

        Ok(Self {
            conn: Mutex::new(Some(conn)),
            context: Arc::new(ProxyContext {
                config,
                auth,
                status,
            }),
            remote_port,
            close_once: Once::new(),
            shutdown: CancellationToken::new(),
        })
    }

    /// Serve the control connection.
    ///
    /// Returns `Ok(())` when the relay closes the connection or `cancel`
    /// fires, and the relay's text as [`TunnelError::Server`] when it sends an
    /// error. The client is closed on every exit path. Proxy sessions that
    /// are already running are left to finish on their own.
    ///
    /// Only one call per client can succeed; later calls fail with
    /// [`TunnelError::InvalidState`].
    pub async fn listen(&self, cancel: CancellationToken) -> Result<()> {
        let mut conn = self
            .conn
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .ok_or_else(|| {
                TunnelError::InvalidState("control connection already in use or closed".into())
            })?;
        let _close = CloseOnExit(self);

        let result = self.receive_loop(&mut conn, cancel).await;
        drop(conn);
        result
    }

    async fn receive_loop(
        &self,
        conn: &mut FramedConnection,
        cancel: CancellationToken,
    ) -> Result<()> {
        let stop_requested = cancel.cancelled_owned();
        let closed = self.shutdown.cancelled();
        tokio::pin!(stop_requested, closed);

        loop {
            let message = tokio::select! {
                () = &mut stop_requested => {
                    info!("Stop requested, closing control connection");
                    return Ok(());
                }
                () = &mut closed => return Ok(()),
                message = conn.receive_message(false) => message?,
            };

            match message {
                None => {
                    info!("Control connection closed by relay");
                    return Ok(());
                }
                Some(ServerMessage::Heartbeat) => {
                    trace!("Heartbeat");
                    self.context.status.record_heartbeat();
                }
                Some(ServerMessage::Connection(id)) => {
                    debug!(session_id = %id, "New inbound connection");
                    tokio::spawn(proxy::run_session(Arc::clone(&self.context), id));
                }
                Some(message @ (ServerMessage::Hello(_) | ServerMessage::Challenge(_))) => {
                    warn!(kind = message.kind(), "Ignoring unexpected control message");
                }
                Some(ServerMessage::Error(text)) => {
                    error!("Relay error: {}", text);
                    return Err(TunnelError::Server(text));
                }
            }
        }
    }

    /// Close the control connection. Safe to call any number of times, from
    /// any number of threads; the socket is released once.
    pub fn close(&self) {
        self.close_once.call_once(|| {
            self.context.status.set_connected(false);
            self.shutdown.cancel();
            let conn = self
                .conn
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .take();
            drop(conn);
            debug!("Control connection closed");
        });
    }

    /// Public port assigned by the relay
    pub fn remote_port(&self) -> u16 {
        self.remote_port
    }

    pub fn connected(&self) -> bool {
        self.context.status.connected()
    }

    pub fn active_proxy_count(&self) -> usize {
        self.context.status.active_proxies()
    }

    pub fn last_heartbeat(&self) -> Option<SystemTime> {
        self.context.status.last_heartbeat()
    }

    /// Shared status handle, readable after the client itself is gone.
    pub fn status(&self) -> Arc<TunnelStatus> {
        Arc::clone(&self.context.status)
    }

    pub fn config(&self) -> &ClientConfig {
        &self.context.config
    }
}

impl Drop for TunnelClient {
    fn drop(&mut self) {
        self.close();
    }
}

/// Closes the client when `listen` exits, including when its future is
/// dropped mid-await.
struct CloseOnExit<'a>(&'a TunnelClient);

impl Drop for CloseOnExit<'_> {
    fn drop(&mut self) {
        self.0.close();
    }
}
