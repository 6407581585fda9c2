//! Common utilities and types for `porthole`

pub mod config;
pub mod constants;
pub mod error;

pub use config::{ClientConfig, ResilienceConfig};
pub use constants::{DEFAULT_LOCAL_HOST, DEFAULT_METRICS_BIND, DEFAULT_SERVER_PORT};
pub use error::{ErrorKind, Result, TunnelError};
