pub mod client;
mod proxy;
pub mod relay;
pub mod status;

pub use client::TunnelClient;
pub use relay::{relay, RelayStats};
pub use status::{StatusSnapshot, TunnelStatus};
