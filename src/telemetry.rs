//! Telemetry logic.
//! Support logging and metrics.
use std::path::Path;

use metrics::Unit;
use metrics_exporter_prometheus::{
    BuildError, PrometheusBuilder, PrometheusHandle,
};
use opentelemetry_appender_tracing::layer::OpenTelemetryTracingBridge;
use opentelemetry_otlp::{LogExporter, WithExportConfig};
use opentelemetry_sdk::Resource;
use opentelemetry_sdk::logs::{SdkLogger, SdkLoggerProvider};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

fn ressources() -> Resource {
    Resource::builder().with_service_name("adsync").build()
}

/// Install the global `tracing` subscriber.
///
/// `RUST_LOG` takes precedence over `level`. Logs are also exported to
/// `otlp_endpoint` when set; the returned provider must then be shut
/// down before exiting.
pub fn init_logging(
    level: &str,
    otlp_endpoint: Option<&str>,
) -> Result<Option<SdkLoggerProvider>, BoxError> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))?;

    let (bridge, provider) = match otlp_endpoint {
        Some(endpoint) => {
            let (bridge, provider) = setup_logging(endpoint)?;
            (Some(bridge), Some(provider))
        },
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(bridge)
        .try_init()?;

    Ok(provider)
}

/// Create OLTP exporter for logs.
pub fn setup_logging(
    endpoint: &str,
) -> Result<
    (
        OpenTelemetryTracingBridge<SdkLoggerProvider, SdkLogger>,
        SdkLoggerProvider,
    ),
    BoxError,
> {
    let exporter = LogExporter::builder()
        .with_tonic()
        .with_endpoint(endpoint)
        .build()?;
    let provider: SdkLoggerProvider = SdkLoggerProvider::builder()
        .with_resource(ressources())
        .with_batch_exporter(exporter)
        .build();

    Ok((OpenTelemetryTracingBridge::new(&provider), provider))
}

/// Describe every metric recorded by the crate.
pub fn describe_metrics() {
    metrics::describe_counter!(
        "directory_binds_total",
        Unit::Count,
        "Bind attempts, labelled by outcome."
    );
    metrics::describe_counter!(
        "directory_search_pages_total",
        Unit::Count,
        "Pages received from paged searches."
    );
    metrics::describe_counter!(
        "directory_search_entries_total",
        Unit::Count,
        "Entries received from paged searches."
    );
    metrics::describe_counter!(
        "directory_search_references_total",
        Unit::Count,
        "Continuation references skipped by paged searches."
    );
    metrics::describe_counter!(
        "directory_connections_released_total",
        Unit::Count,
        "Released connections, labelled by release path."
    );
}

/// Create recorder for Prometheus metrics.
pub fn setup_metrics_recorder() -> Result<PrometheusHandle, BuildError> {
    let handle = PrometheusBuilder::new().install_recorder()?;
    describe_metrics();

    Ok(handle)
}

/// Write the text exposition to `path`, for a textfile collector.
pub fn write_metrics(handle: &PrometheusHandle, path: &Path) -> std::io::Result<()> {
    std::fs::write(path, handle.render())
}
