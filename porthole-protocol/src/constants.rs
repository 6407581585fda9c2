//! Protocol constants

use std::time::Duration;

/// TCP port the relay listens on for control and tunnel connections.
pub const CONTROL_PORT: u16 = 7835;

/// Maximum encoded length of a frame, not counting the zero-byte terminator.
pub const MAX_FRAME_LENGTH: usize = 256;

/// Frame terminator.
pub const FRAME_DELIMITER: u8 = 0;

/// Bound applied to dialing and to the handshake / initial-response reads.
pub const NETWORK_TIMEOUT: Duration = Duration::from_secs(3);
