//! Version subcommand implementation

use porthole::protocol::constants::{CONTROL_PORT, MAX_FRAME_LENGTH};

pub fn run() {
    println!("porthole {}", env!("CARGO_PKG_VERSION"));
    println!("protocol: bore (control port {CONTROL_PORT}, max frame {MAX_FRAME_LENGTH} bytes)");

    #[cfg(target_os = "linux")]
    println!("target: linux");
    #[cfg(target_os = "macos")]
    println!("target: macos");
    #[cfg(target_os = "windows")]
    println!("target: windows");
    #[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "windows")))]
    println!("target: unknown");
}
