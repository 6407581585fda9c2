//! Defaults shared by the library, facade and CLI.
//!
//! Use these constants instead of magic numbers so defaults stay consistent
//! across crates.

pub use porthole_protocol::constants::{CONTROL_PORT, NETWORK_TIMEOUT};

/// Host the local service is dialed on when none is given.
pub const DEFAULT_LOCAL_HOST: &str = "localhost";

/// Public port requested when none is given; `0` lets the relay choose.
pub const DEFAULT_SERVER_PORT: u16 = 0;

/// Default bind address for the Prometheus endpoint as a string.
pub const DEFAULT_METRICS_BIND: &str = "127.0.0.1:9090";
