//! Embeddable tunnel client with builder pattern.
//!
//! # Example
//!
//! ```rust,no_run
//! use porthole::Client;
//!
//! # async fn example() -> porthole::Result<()> {
//! let mut client = Client::builder()
//!     .server("relay.example.com")
//!     .local_port(8080)
//!     .secret("my-secret")
//!     .build()?;
//!
//! let info = client.start().await?;
//! println!("Listening at {}", info.public_addr());
//! # Ok(())
//! # }
//! ```

use porthole_common::{ClientConfig, ErrorKind, ResilienceConfig, Result, TunnelError};
use porthole_core::{Backoff, CancellationToken, StatusSnapshot, TunnelClient, TunnelStatus};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Details of an established tunnel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TunnelInfo {
    /// Public port assigned by the relay
    pub remote_port: u16,
    /// Relay host
    pub server: String,
}

impl TunnelInfo {
    /// `server:port` as seen by the outside world
    pub fn public_addr(&self) -> String {
        format!("{}:{}", self.server, self.remote_port)
    }
}

/// The tunnel currently served by the background task
#[derive(Debug, Clone)]
struct Active {
    remote_port: u16,
    status: Arc<TunnelStatus>,
}

/// A tunnel client that can be embedded in your application.
///
/// Use [`Client::builder()`] to create a new client with the builder pattern.
#[derive(Debug)]
pub struct Client {
    config: ClientConfig,
    auto_reconnect: bool,
    resilience: ResilienceConfig,
    cancel: Option<CancellationToken>,
    task: Option<JoinHandle<()>>,
    active: Option<watch::Receiver<Active>>,
}

/// Builder for constructing a [`Client`] with ergonomic configuration.
#[derive(Debug)]
pub struct ClientBuilder {
    config: ClientConfig,
    auto_reconnect: bool,
    resilience: ResilienceConfig,
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self {
            config: ClientConfig::default(),
            auto_reconnect: true,
            resilience: ResilienceConfig::default(),
        }
    }
}

impl Client {
    pub fn builder() -> ClientBuilder {
        ClientBuilder::default()
    }

    /// Connect to the relay and serve the tunnel in a background task.
    ///
    /// The first connection is made before this returns, so a bad secret or
    /// a refused port is reported here. With `auto_reconnect` enabled, later
    /// losses of the control connection are retried with backoff, asking the
    /// relay for the same public port again.
    ///
    /// # Errors
    ///
    /// Returns an error if the client is already running or the first
    /// connection fails.
    pub async fn start(&mut self) -> Result<TunnelInfo> {
        if self.task.is_some() {
            return Err(TunnelError::InvalidState("client already started".into()));
        }

        let tunnel = TunnelClient::connect(self.config.clone()).await?;
        let info = TunnelInfo {
            remote_port: tunnel.remote_port(),
            server: self.config.server.clone(),
        };

        let (active_tx, active_rx) = watch::channel(Active {
            remote_port: tunnel.remote_port(),
            status: tunnel.status(),
        });
        let cancel = CancellationToken::new();

        let supervisor = Supervisor {
            config: self.config.clone(),
            auto_reconnect: self.auto_reconnect,
            backoff: Backoff::new(self.resilience.clone().into()),
            cancel: cancel.clone(),
            active: active_tx,
        };
        self.task = Some(tokio::spawn(supervisor.run(tunnel)));
        self.cancel = Some(cancel);
        self.active = Some(active_rx);

        Ok(info)
    }

    /// Stop the tunnel and wait for the background task to finish.
    ///
    /// Proxy sessions already running are not interrupted.
    pub async fn shutdown(&mut self) -> Result<()> {
        self.stop();
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
        Ok(())
    }

    /// Signal the client to stop (non-blocking).
    ///
    /// Use [`shutdown()`](Self::shutdown) if you need to wait for cleanup.
    pub fn stop(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel.cancel();
        }
    }

    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    /// Public port of the current (or last) tunnel
    pub fn remote_port(&self) -> Option<u16> {
        self.active.as_ref().map(|rx| rx.borrow().remote_port)
    }

    pub fn connected(&self) -> bool {
        self.with_status(TunnelStatus::connected).unwrap_or(false)
    }

    pub fn active_proxy_count(&self) -> usize {
        self.with_status(TunnelStatus::active_proxies).unwrap_or(0)
    }

    pub fn last_heartbeat(&self) -> Option<SystemTime> {
        self.with_status(TunnelStatus::last_heartbeat).flatten()
    }

    pub fn status(&self) -> Option<StatusSnapshot> {
        self.with_status(TunnelStatus::snapshot)
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    fn with_status<T>(&self, f: impl FnOnce(&TunnelStatus) -> T) -> Option<T> {
        self.active.as_ref().map(|rx| f(&rx.borrow().status))
    }
}

impl Drop for Client {
    fn drop(&mut self) {
        // Best-effort signal shutdown on drop
        self.stop();
    }
}

/// Background task: serves one tunnel at a time, reconnecting as configured
struct Supervisor {
    config: ClientConfig,
    auto_reconnect: bool,
    backoff: Backoff,
    cancel: CancellationToken,
    active: watch::Sender<Active>,
}

impl Supervisor {
    async fn run(mut self, mut tunnel: TunnelClient) {
        loop {
            let result = tunnel.listen(self.cancel.clone()).await;
            let port = tunnel.remote_port();
            drop(tunnel);

            if self.cancel.is_cancelled() {
                info!("Tunnel stopped");
                return;
            }
            match result {
                Ok(()) => info!("Control connection closed"),
                Err(e) => warn!(error = %e, "Control connection failed"),
            }
            if !self.auto_reconnect {
                return;
            }

            tunnel = match self.reconnect(port).await {
                Some(tunnel) => tunnel,
                None => return,
            };
            self.active.send_replace(Active {
                remote_port: tunnel.remote_port(),
                status: tunnel.status(),
            });
        }
    }

    /// Retry until a tunnel is up, the client is stopped, or retrying
    /// cannot help.
    async fn reconnect(&mut self, previous_port: u16) -> Option<TunnelClient> {
        let mut config = self.config.clone();
        config.desired_port = previous_port;

        loop {
            let delay = self.backoff.next_delay();
            info!(
                "Reconnecting in {:?} (attempt {})",
                delay,
                self.backoff.attempts()
            );
            if !self.sleep_unless_cancelled(delay).await {
                return None;
            }

            let attempt = tokio::select! {
                () = self.cancel.cancelled() => return None,
                attempt = TunnelClient::connect(config.clone()) => attempt,
            };

            match attempt {
                Ok(tunnel) => {
                    self.backoff.reset();
                    return Some(tunnel);
                }
                Err(TunnelError::ServerRejected(text))
                    if config.desired_port != self.config.desired_port =>
                {
                    warn!(
                        "Relay refused port {}: {}; asking for the configured port instead",
                        config.desired_port, text
                    );
                    config.desired_port = self.config.desired_port;
                }
                Err(e) if matches!(e.kind(), ErrorKind::Authentication | ErrorKind::Usage) => {
                    warn!(error = %e, "Giving up on reconnecting");
                    return None;
                }
                Err(e) => warn!(error = %e, "Reconnect failed"),
            }
        }
    }

    async fn sleep_unless_cancelled(&self, delay: Duration) -> bool {
        tokio::select! {
            () = self.cancel.cancelled() => false,
            () = tokio::time::sleep(delay) => true,
        }
    }
}

impl ClientBuilder {
    /// Relay host, without a port.
    #[must_use]
    pub fn server(mut self, server: impl Into<String>) -> Self {
        self.config.server = server.into();
        self
    }

    /// Default: `"localhost"`
    #[must_use]
    pub fn local_host(mut self, host: impl Into<String>) -> Self {
        self.config.local_host = host.into();
        self
    }

    #[must_use]
    pub fn local_port(mut self, port: u16) -> Self {
        self.config.local_port = port;
        self
    }

    /// Public port to request. Default: 0, the relay chooses.
    #[must_use]
    pub fn port(mut self, port: u16) -> Self {
        self.config.desired_port = port;
        self
    }

    /// Shared secret. An empty secret disables authentication.
    #[must_use]
    pub fn secret(mut self, secret: impl Into<String>) -> Self {
        self.config.secret = Some(secret.into());
        self
    }

    /// Default: 7835
    #[must_use]
    pub fn control_port(mut self, port: u16) -> Self {
        self.config.control_port = port;
        self
    }

    /// Bound on dialing and handshake steps. Default: 3 seconds
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    /// Default: `true`
    #[must_use]
    pub fn auto_reconnect(mut self, enabled: bool) -> Self {
        self.auto_reconnect = enabled;
        self
    }

    #[must_use]
    pub fn resilience(mut self, resilience: ResilienceConfig) -> Self {
        self.resilience = resilience;
        self
    }

    /// # Errors
    ///
    /// Returns an error if the server or local port is missing, or a port or
    /// timeout is zero.
    pub fn build(self) -> Result<Client> {
        let config = self.config.normalized();
        config.validate()?;
        Ok(Client {
            config,
            auto_reconnect: self.auto_reconnect,
            resilience: self.resilience,
            cancel: None,
            task: None,
            active: None,
        })
    }
}
