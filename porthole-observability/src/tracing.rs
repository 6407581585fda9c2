use opentelemetry::global;
use opentelemetry::trace::TracerProvider;
use opentelemetry_otlp::{SpanExporter, WithExportConfig};
use opentelemetry_sdk::propagation::TraceContextPropagator;
use opentelemetry_sdk::trace::{SdkTracerProvider, Tracer};
use opentelemetry_sdk::Resource;
use std::sync::OnceLock;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry};

/// Initialization options for tracing
#[derive(Debug, Clone)]
pub struct TracingConfig {
    pub service_name: String,
    /// OTLP gRPC endpoint; spans are only exported when set
    pub otlp_endpoint: Option<String>,
    /// Emit log lines as JSON objects instead of human-readable text
    pub json: bool,
}

impl TracingConfig {
    pub fn new(service_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
            otlp_endpoint: std::env::var("OTEL_EXPORTER_OTLP_ENDPOINT").ok(),
            json: false,
        }
    }
}

static TRACER_PROVIDER: OnceLock<SdkTracerProvider> = OnceLock::new();

/// Install the global subscriber: `RUST_LOG` filter, fmt or JSON output, and an
/// OTLP span exporter when an endpoint is configured.
pub fn init_tracing(config: TracingConfig) -> Result<(), anyhow::Error> {
    // "debug" is noisy on busy tunnels; opt in with RUST_LOG=debug
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let fmt_layer = if config.json {
        tracing_subscriber::fmt::layer()
            .json()
            .with_current_span(true)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .with_thread_ids(true)
            .with_target(true)
            .boxed()
    };

    let otel_layer = match config.otlp_endpoint.as_deref() {
        Some(endpoint) => {
            global::set_text_map_propagator(TraceContextPropagator::new());
            let tracer = build_tracer(&config.service_name, endpoint)?;
            Some(tracing_opentelemetry::layer().with_tracer(tracer))
        }
        None => None,
    };

    Registry::default()
        .with(env_filter)
        .with(fmt_layer)
        .with(otel_layer)
        .try_init()?;

    tracing::info!(
        service = %config.service_name,
        otlp = config.otlp_endpoint.is_some(),
        "Tracing initialized"
    );
    Ok(())
}

fn build_tracer(service_name: &str, endpoint: &str) -> Result<Tracer, anyhow::Error> {
    let exporter = SpanExporter::builder()
        .with_tonic()
        .with_endpoint(endpoint)
        .build()?;

    let resource = Resource::builder()
        .with_service_name(service_name.to_string())
        .build();

    let provider = SdkTracerProvider::builder()
        .with_resource(resource)
        .with_batch_exporter(exporter)
        .build();

    let tracer = provider.tracer("porthole");
    let _ = TRACER_PROVIDER.set(provider.clone());
    global::set_tracer_provider(provider);

    Ok(tracer)
}

/// Flush and shut down the span exporter, if one was installed
pub fn shutdown_tracing() {
    if let Some(provider) = TRACER_PROVIDER.get() {
        if let Err(e) = provider.shutdown() {
            tracing::error!("Failed to shutdown tracer provider: {}", e);
        }
    }
}
