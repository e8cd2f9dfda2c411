//! Telemetry setup for OpenTelemetry integration

use anyhow::Result;
use tracing::Subscriber;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::Layer;

pub type BoxedLayer<S> = Box<dyn Layer<S> + Send + Sync + 'static>;

const ENDPOINT_VAR: &str = "OTEL_EXPORTER_OTLP_ENDPOINT";

/// Endpoint configured for OTLP export, if any
pub fn otlp_endpoint() -> Option<String> {
    std::env::var(ENDPOINT_VAR).ok().filter(|e| !e.trim().is_empty())
}

/// Build the OpenTelemetry layer if enabled
///
/// # Environment Variables
///
/// - `OTEL_EXPORTER_OTLP_ENDPOINT`: OTLP endpoint (e.g., http://localhost:4317)
/// - `OTEL_SERVICE_NAME`: Service name (default: groupq-daemon)
///
/// Returns `None` when no endpoint is set or the `telemetry` feature is off.
pub fn otel_layer<S>() -> Result<Option<BoxedLayer<S>>>
where
    S: Subscriber + for<'a> LookupSpan<'a> + Send + Sync,
{
    let Some(endpoint) = otlp_endpoint() else {
        return Ok(None);
    };

    #[cfg(feature = "telemetry")]
    {
        init_telemetry_impl(&endpoint).map(Some)
    }

    #[cfg(not(feature = "telemetry"))]
    {
        let _ = endpoint;
        Ok(None)
    }
}

/// Flush pending spans before exit
pub fn shutdown() {
    #[cfg(feature = "telemetry")]
    opentelemetry::global::shutdown_tracer_provider();
}

#[cfg(feature = "telemetry")]
fn init_telemetry_impl<S>(endpoint: &str) -> Result<BoxedLayer<S>>
where
    S: Subscriber + for<'a> LookupSpan<'a> + Send + Sync,
{
    use opentelemetry::trace::TracerProvider as _;
    use opentelemetry::KeyValue;
    use opentelemetry_otlp::{SpanExporter, WithExportConfig};
    use opentelemetry_sdk::trace::TracerProvider;
    use opentelemetry_sdk::{runtime, Resource};

    let service_name =
        std::env::var("OTEL_SERVICE_NAME").unwrap_or_else(|_| "groupq-daemon".to_string());

    let exporter = SpanExporter::builder()
        .with_tonic()
        .with_endpoint(endpoint)
        .build()?;

    let provider = TracerProvider::builder()
        .with_batch_exporter(exporter, runtime::Tokio)
        .with_resource(Resource::new(vec![KeyValue::new(
            "service.name",
            service_name.clone(),
        )]))
        .build();

    let tracer = provider.tracer(service_name);
    opentelemetry::global::set_tracer_provider(provider);

    Ok(tracing_opentelemetry::layer().with_tracer(tracer).boxed())
}
