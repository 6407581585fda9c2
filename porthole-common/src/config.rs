//! Configuration types for `porthole`

use crate::constants::{CONTROL_PORT, DEFAULT_LOCAL_HOST, DEFAULT_SERVER_PORT, NETWORK_TIMEOUT};
use crate::error::{Result, TunnelError};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Immutable session configuration of a tunnel client
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Host of the local service to expose
    pub local_host: String,
    /// Port of the local service to expose
    pub local_port: u16,
    /// Relay host (no port; see `control_port`)
    pub server: String,
    /// Public port to request; `0` lets the relay choose
    pub desired_port: u16,
    /// Shared secret; `None` skips authentication
    pub secret: Option<String>,
    /// Relay port used for the control connection and every tunnel socket
    pub control_port: u16,
    /// Bound on dialing, handshake reads and control writes
    pub timeout: Duration,
}

impl ClientConfig {
    pub fn new(local_port: u16, server: impl Into<String>) -> Self {
        Self {
            local_port,
            server: server.into(),
            ..Self::default()
        }
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.server.is_empty() {
            return Err(TunnelError::Config("server is required".into()));
        }
        if self.local_host.is_empty() {
            return Err(TunnelError::Config("local_host is required".into()));
        }
        if self.local_port == 0 {
            return Err(TunnelError::Config("local_port must be non-zero".into()));
        }
        if self.control_port == 0 {
            return Err(TunnelError::Config("control_port must be non-zero".into()));
        }
        if self.timeout.is_zero() {
            return Err(TunnelError::Config("timeout must be non-zero".into()));
        }
        Ok(())
    }

    /// An empty secret means "no authentication".
    #[must_use]
    pub fn normalized(mut self) -> Self {
        if self.secret.as_deref().is_some_and(str::is_empty) {
            self.secret = None;
        }
        self
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            local_host: DEFAULT_LOCAL_HOST.to_string(),
            local_port: 0,
            server: String::new(),
            desired_port: DEFAULT_SERVER_PORT,
            secret: None,
            control_port: CONTROL_PORT,
            timeout: NETWORK_TIMEOUT,
        }
    }
}

/// Reconnection policy for callers that keep a tunnel alive
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResilienceConfig {
    /// Base delay for reconnection backoff
    pub reconnect_base: Duration,
    /// Maximum delay for reconnection backoff
    pub reconnect_max: Duration,
    /// Jitter factor (0.0 - 1.0)
    pub jitter_factor: f64,
}

impl Default for ResilienceConfig {
    fn default() -> Self {
        Self {
            reconnect_base: Duration::from_secs(1),
            reconnect_max: Duration::from_secs(60),
            jitter_factor: 0.3,
        }
    }
}
