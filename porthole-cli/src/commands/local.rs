//! Local subcommand implementation

use anyhow::{bail, Context, Result};
use clap::Args;
use porthole::common::constants::{CONTROL_PORT, DEFAULT_LOCAL_HOST, DEFAULT_METRICS_BIND};
use porthole::Client;
use porthole_observability::{
    init_metrics, init_minimal_logging, init_tracing, serve_metrics, shutdown_tracing,
    TracingConfig,
};
use std::net::SocketAddr;
use std::time::{Duration, SystemTime};
use tracing::{debug, error, info, warn};

const STATUS_INTERVAL: Duration = Duration::from_secs(2);

#[derive(Args, Debug)]
#[allow(clippy::struct_excessive_bools)]
pub struct LocalArgs {
    /// The local port to expose
    #[arg(env = "PORTHOLE_LOCAL_PORT")]
    local_port: u16,

    /// The local host to expose
    #[arg(short, long, value_name = "HOST", default_value = DEFAULT_LOCAL_HOST)]
    local_host: String,

    /// Address of the remote relay
    #[arg(short, long, env = "PORTHOLE_SERVER")]
    to: String,

    /// Public port to request on the relay (0 lets the relay choose)
    #[arg(short, long, default_value_t = 0)]
    port: u16,

    /// Shared secret for authentication
    #[arg(short, long, env = "PORTHOLE_SECRET", hide_env_values = true)]
    secret: Option<String>,

    /// Relay control port
    #[arg(long, default_value_t = CONTROL_PORT, env = "PORTHOLE_CONTROL_PORT")]
    control_port: u16,

    /// Reconnect with backoff when the control connection is lost
    #[arg(long, env = "PORTHOLE_RECONNECT")]
    reconnect: bool,

    /// Emit logs as JSON
    #[arg(long, env = "PORTHOLE_LOG_JSON")]
    log_json: bool,

    /// Export traces to this OTLP endpoint
    #[arg(long, env = "OTEL_EXPORTER_OTLP_ENDPOINT")]
    otlp_endpoint: Option<String>,

    /// Serve Prometheus metrics
    #[arg(long, env = "PORTHOLE_METRICS")]
    metrics: bool,

    /// Address of the metrics endpoint
    #[arg(
        long,
        value_name = "ADDR",
        default_value = DEFAULT_METRICS_BIND,
        env = "PORTHOLE_METRICS_BIND"
    )]
    metrics_bind: SocketAddr,
}

pub async fn run(args: LocalArgs) -> Result<()> {
    init_logging(&args)?;
    info!("Starting porthole v{}", env!("CARGO_PKG_VERSION"));

    if args.metrics {
        let addr = args.metrics_bind;
        init_metrics();
        tokio::spawn(async move {
            if let Err(e) = serve_metrics(addr).await {
                error!("Metrics endpoint failed: {:#}", e);
            }
        });
    }

    let mut builder = Client::builder()
        .server(args.to.as_str())
        .local_host(args.local_host.as_str())
        .local_port(args.local_port)
        .port(args.port)
        .control_port(args.control_port)
        .auto_reconnect(args.reconnect);
    if let Some(secret) = &args.secret {
        builder = builder.secret(secret.as_str());
    }
    let mut client = builder.build().context("invalid tunnel configuration")?;

    let info = client
        .start()
        .await
        .with_context(|| format!("could not open a tunnel through {}", args.to))?;
    info!(
        "Forwarding {} -> {}:{}",
        info.public_addr(),
        args.local_host,
        args.local_port
    );

    let outcome = supervise(&client).await;

    client.shutdown().await?;
    shutdown_tracing();
    outcome
}

/// Wait for Ctrl-C or for the tunnel to end on its own.
async fn supervise(client: &Client) -> Result<()> {
    let mut ticker = tokio::time::interval(STATUS_INTERVAL);
    ticker.tick().await;

    loop {
        tokio::select! {
            signal = tokio::signal::ctrl_c() => {
                signal.context("failed to listen for Ctrl-C")?;
                info!("Shutting down");
                return Ok(());
            }
            _ = ticker.tick() => {
                if !client.is_running() {
                    warn!("Tunnel closed");
                    bail!("connection to the relay was lost");
                }
                if let Some(status) = client.status() {
                    debug!(
                        connected = status.connected,
                        active_proxies = status.active_proxies,
                        last_heartbeat_secs = ?status.last_heartbeat.map(seconds_ago),
                        "Tunnel status"
                    );
                }
            }
        }
    }
}

fn seconds_ago(at: SystemTime) -> u64 {
    SystemTime::now()
        .duration_since(at)
        .map_or(0, |elapsed| elapsed.as_secs())
}

fn init_logging(args: &LocalArgs) -> Result<()> {
    if !args.log_json && args.otlp_endpoint.is_none() {
        init_minimal_logging();
        return Ok(());
    }

    let mut config = TracingConfig::new("porthole");
    config.json = args.log_json;
    config.otlp_endpoint.clone_from(&args.otlp_endpoint);
    init_tracing(config).context("failed to initialise tracing")
}
