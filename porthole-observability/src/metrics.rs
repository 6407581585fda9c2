//! Prometheus metrics for a running tunnel client.
//!
//! Metrics are opt-in: nothing is registered until [`init_metrics`] runs, and
//! [`tunnel_metrics`] returns `None` until then so instrumented code can skip
//! recording entirely.

use prometheus::{Encoder, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};
use std::sync::OnceLock;

static METRICS: OnceLock<TunnelMetrics> = OnceLock::new();

/// Metric set for one process
pub struct TunnelMetrics {
    registry: Registry,
    control_connected: IntGauge,
    proxy_sessions_active: IntGauge,
    proxy_sessions_total: IntCounter,
    proxy_session_failures: IntCounter,
    heartbeats_total: IntCounter,
    relayed_bytes: IntCounterVec,
}

impl TunnelMetrics {
    fn new() -> Self {
        let registry = Registry::new_custom(Some("porthole".to_string()), None)
            .expect("static metric prefix is valid");

        let control_connected = IntGauge::new(
            "control_connected",
            "1 while the control connection to the relay is up",
        )
        .expect("valid metric");
        let proxy_sessions_active =
            IntGauge::new("proxy_sessions_active", "Proxy sessions currently relaying")
                .expect("valid metric");
        let proxy_sessions_total =
            IntCounter::new("proxy_sessions_total", "Proxy sessions started").expect("valid metric");
        let proxy_session_failures = IntCounter::new(
            "proxy_session_failures_total",
            "Proxy sessions that ended with an error",
        )
        .expect("valid metric");
        let heartbeats_total =
            IntCounter::new("heartbeats_total", "Heartbeats received from the relay")
                .expect("valid metric");
        let relayed_bytes = IntCounterVec::new(
            Opts::new("relayed_bytes_total", "Bytes copied between relay and local service"),
            &["direction"],
        )
        .expect("valid metric");

        registry
            .register(Box::new(control_connected.clone()))
            .expect("unique metric");
        registry
            .register(Box::new(proxy_sessions_active.clone()))
            .expect("unique metric");
        registry
            .register(Box::new(proxy_sessions_total.clone()))
            .expect("unique metric");
        registry
            .register(Box::new(proxy_session_failures.clone()))
            .expect("unique metric");
        registry
            .register(Box::new(heartbeats_total.clone()))
            .expect("unique metric");
        registry
            .register(Box::new(relayed_bytes.clone()))
            .expect("unique metric");

        #[cfg(target_os = "linux")]
        {
            let _ = registry.register(Box::new(
                prometheus::process_collector::ProcessCollector::for_self(),
            ));
        }

        Self {
            registry,
            control_connected,
            proxy_sessions_active,
            proxy_sessions_total,
            proxy_session_failures,
            heartbeats_total,
            relayed_bytes,
        }
    }

    pub fn set_connected(&self, connected: bool) {
        self.control_connected.set(i64::from(connected));
    }

    pub fn proxy_started(&self) {
        self.proxy_sessions_total.inc();
        self.proxy_sessions_active.inc();
    }

    pub fn proxy_finished(&self, failed: bool) {
        self.proxy_sessions_active.dec();
        if failed {
            self.proxy_session_failures.inc();
        }
    }

    pub fn heartbeat(&self) {
        self.heartbeats_total.inc();
    }

    /// `direction` is `"inbound"` (relay to local) or `"outbound"`.
    pub fn record_relayed(&self, direction: &str, bytes: u64) {
        self.relayed_bytes
            .with_label_values(&[direction])
            .inc_by(bytes);
    }
}

/// Register the metric set; later calls return the same instance.
pub fn init_metrics() -> &'static TunnelMetrics {
    METRICS.get_or_init(TunnelMetrics::new)
}

pub fn metrics_enabled() -> bool {
    METRICS.get().is_some()
}

pub fn tunnel_metrics() -> Option<&'static TunnelMetrics> {
    METRICS.get()
}

/// Render all metrics in the Prometheus text format (empty when disabled)
pub fn gather_metrics() -> String {
    let Some(metrics) = tunnel_metrics() else {
        return String::new();
    };
    let mut buffer = Vec::new();
    if let Err(e) = TextEncoder::new().encode(&metrics.registry.gather(), &mut buffer) {
        tracing::error!("Failed to encode metrics: {}", e);
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}

/// Serve `GET /metrics` until the listener fails
#[cfg(feature = "axum")]
pub async fn serve_metrics(addr: std::net::SocketAddr) -> Result<(), anyhow::Error> {
    use axum::routing::get;

    let app = axum::Router::new().route("/metrics", get(|| async { gather_metrics() }));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Metrics available at http://{}/metrics", addr);
    axum::serve(listener, app).await?;
    Ok(())
}
