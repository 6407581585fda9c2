//! Core tunnel client for `porthole`
//!
//! Dials the relay, answers its authentication challenge, holds the control
//! connection open and runs one proxy session per inbound connection the
//! relay announces.

pub mod auth;
pub mod reconnect;
pub mod transport;
pub mod tunnel;

pub use auth::Authenticator;
pub use reconnect::{Backoff, BackoffConfig};
pub use transport::FramedConnection;
pub use tunnel::{StatusSnapshot, TunnelClient, TunnelStatus};

pub use tokio_util::sync::CancellationToken;
