//! porthole command-line client
//!
//! Exposes a local TCP port through a remote relay.

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "porthole",
    author,
    version,
    about = "Expose a local TCP port through a remote relay",
    long_about = "porthole keeps a control connection open to a bore-compatible relay and \
                  forwards every connection the relay accepts on its public port to a \
                  local service.",
    propagate_version = true
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Expose a local port through the relay
    Local(commands::local::LocalArgs),

    /// Show version information
    Version,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Local(args) => commands::local::run(args).await,
        Commands::Version => {
            commands::version::run();
            Ok(())
        }
    }
}
