use crate::config::{LogFormat, TelemetryConfig};
use opentelemetry::{KeyValue, global};
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::{Resource, metrics::SdkMeterProvider, trace::SdkTracerProvider};
use opentelemetry_semantic_conventions::resource::{SERVICE_NAME, SERVICE_VERSION};
use tracing_opentelemetry::OpenTelemetryLayer;
use tracing_subscriber::{EnvFilter, Registry, layer::SubscriberExt, util::SubscriberInitExt};

const SERVICE: &str = "respect-client";

/// Keeps the exporters alive; call `shutdown` before exiting to flush them.
#[derive(Debug, Default)]
pub struct TelemetryGuard {
    tracer_provider: Option<SdkTracerProvider>,
    meter_provider: Option<SdkMeterProvider>,
}

impl TelemetryGuard {
    pub fn shutdown(self) {
        if let Some(provider) = self.tracer_provider
            && let Err(e) = provider.shutdown()
        {
            tracing::warn!(error = %e, "Failed to flush traces");
        }
        if let Some(provider) = self.meter_provider
            && let Err(e) = provider.shutdown()
        {
            tracing::warn!(error = %e, "Failed to flush metrics");
        }
    }
}

/// Installs the global tracing subscriber, with an OTLP layer and meter
/// provider when an endpoint is configured.
///
/// # Errors
/// Returns an error if an exporter cannot be built or a filter directive is invalid.
pub fn init_telemetry(config: &TelemetryConfig, debug: bool) -> anyhow::Result<TelemetryGuard> {
    let default_level = if debug { "info,respect_client=debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| default_level.into())
        .add_directive("hyper=warn".parse()?)
        .add_directive("reqwest=warn".parse()?);

    let registry = Registry::default().with(filter);
    let mut guard = TelemetryGuard::default();

    let otel_layer = if let Some(endpoint) = &config.otlp_endpoint {
        let resource = Resource::builder()
            .with_attributes(vec![
                KeyValue::new(SERVICE_NAME, SERVICE),
                KeyValue::new(SERVICE_VERSION, env!("CARGO_PKG_VERSION")),
            ])
            .build();

        let tracer_provider = SdkTracerProvider::builder()
            .with_resource(resource.clone())
            .with_batch_exporter(
                opentelemetry_otlp::SpanExporter::builder().with_tonic().with_endpoint(endpoint).build()?,
            )
            .build();
        let tracer = opentelemetry::trace::TracerProvider::tracer(&tracer_provider, SERVICE);
        global::set_tracer_provider(tracer_provider.clone());

        let exporter = opentelemetry_otlp::MetricExporter::builder().with_tonic().with_endpoint(endpoint).build()?;
        let meter_provider = SdkMeterProvider::builder().with_resource(resource).with_periodic_exporter(exporter).build();
        global::set_meter_provider(meter_provider.clone());

        guard.tracer_provider = Some(tracer_provider);
        guard.meter_provider = Some(meter_provider);
        Some(OpenTelemetryLayer::new(tracer))
    } else {
        None
    };

    let registry = registry.with(otel_layer);

    match config.log_format {
        LogFormat::Text => {
            registry.with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr)).try_init()?;
        }
        LogFormat::Json => {
            registry.with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr)).try_init()?;
        }
    }

    Ok(guard)
}
