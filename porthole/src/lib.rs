//! # porthole
//!
//! Expose a local TCP service through a remote relay speaking the `bore`
//! protocol.
//!
//! The client keeps a control connection open to the relay, which assigns a
//! public port. Every connection the relay accepts on that port is announced
//! over the control connection; the client then opens a dedicated tunnel
//! socket back to the relay and pipes it to the local service.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use porthole::prelude::*;
//!
//! # async fn example() -> porthole::Result<()> {
//! let mut client = Client::builder()
//!     .server("relay.example.com")
//!     .local_port(3000)
//!     .build()?;
//! let info = client.start().await?;
//! println!("Listening at {}", info.public_addr());
//! client.shutdown().await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - [`porthole-protocol`](protocol) - Frame codec and message types
//! - [`porthole-common`](common) - Errors and configuration
//! - [`porthole-core`](tunnel) - Control connection, authentication, proxy sessions

pub mod client;

pub use porthole_common as common;
pub use porthole_core as tunnel;
pub use porthole_protocol as protocol;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::client::{Client, ClientBuilder, TunnelInfo};
    pub use crate::common::{ClientConfig, ResilienceConfig, Result, TunnelError};
    pub use crate::tunnel::{CancellationToken, StatusSnapshot, TunnelClient};
}

pub use client::{Client, ClientBuilder, TunnelInfo};
pub use common::{ClientConfig, ErrorKind, ResilienceConfig, Result, TunnelError};
pub use tunnel::{Authenticator, CancellationToken, StatusSnapshot, TunnelClient};
