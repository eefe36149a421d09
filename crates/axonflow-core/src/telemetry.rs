//! Telemetry: structured logging and optional OTLP trace export.
//!
//! Instruments request routing, provider dispatch, health transitions,
//! and config refreshes.

use opentelemetry::trace::TracerProvider as _;
use opentelemetry::KeyValue;
use opentelemetry_otlp::WithExportConfig;
use serde::{Deserialize, Serialize};
use tracing::Subscriber;
use tracing_opentelemetry::OpenTelemetryLayer;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Default directives when `RUST_LOG` is unset: this workspace's crates
/// at debug, everything else at info.
const LOG_DIRECTIVES: [&str; 3] = ["info", "axonflow_core=debug", "axonflow_llm=debug"];

/// Telemetry/observability configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// Whether to export traces.
    #[serde(default)]
    pub export_enabled: bool,

    /// OTLP exporter endpoint.
    #[serde(default = "default_otlp_endpoint")]
    pub otlp_endpoint: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            export_enabled: false,
            otlp_endpoint: default_otlp_endpoint(),
        }
    }
}

fn default_otlp_endpoint() -> String {
    "http://localhost:4317".into()
}

/// Initialize the telemetry pipeline: JSON logs filtered from the
/// environment, with an OTLP span layer stacked on top when export is
/// enabled.
pub fn init_telemetry(config: &TelemetryConfig) -> anyhow::Result<()> {
    let span_export = if config.export_enabled {
        Some(otlp_layer(&config.otlp_endpoint)?)
    } else {
        None
    };

    tracing_subscriber::registry()
        .with(log_filter())
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_target(true)
                .with_file(true)
                .with_line_number(true),
        )
        .with(span_export)
        .init();
    Ok(())
}

fn log_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(LOG_DIRECTIVES.join(",")))
}

/// Span layer exporting to an OTLP collector.
fn otlp_layer<S>(
    endpoint: &str,
) -> anyhow::Result<OpenTelemetryLayer<S, opentelemetry_sdk::trace::Tracer>>
where
    S: Subscriber + for<'span> LookupSpan<'span>,
{
    let exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_tonic()
        .with_endpoint(endpoint)
        .build()?;

    let tracer_provider = opentelemetry_sdk::trace::TracerProvider::builder()
        .with_simple_exporter(exporter)
        .with_resource(opentelemetry_sdk::Resource::new([
            KeyValue::new("service.name", "axonflow"),
            KeyValue::new("service.version", env!("CARGO_PKG_VERSION")),
        ]))
        .build();

    Ok(tracing_opentelemetry::layer().with_tracer(tracer_provider.tracer("axonflow")))
}
