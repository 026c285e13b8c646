use opentelemetry::trace::TracerProvider;
use opentelemetry::KeyValue;
use opentelemetry_otlp::{SpanExporter, WithExportConfig};
use opentelemetry_sdk::{trace as sdktrace, Resource};
use opentelemetry_semantic_conventions::resource::{SERVICE_NAME, SERVICE_VERSION};
use tracing_opentelemetry::OpenTelemetryLayer;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use crate::config::AppConfig;

pub struct TelemetryConfig {
    pub service_name: String,
    pub service_version: String,
    pub environment: String,
    pub otlp_endpoint: String,
}

impl From<&AppConfig> for TelemetryConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            service_name: config.telemetry_service_name.clone(),
            service_version: config.telemetry_service_version.clone(),
            environment: config.telemetry_environment.clone(),
            otlp_endpoint: config.telemetry_otlp_endpoint.clone(),
        }
    }
}

/// Keeps the tracer provider alive; spans still buffered are flushed on drop.
pub struct TelemetryGuard {
    provider: Option<sdktrace::SdkTracerProvider>,
}

impl Drop for TelemetryGuard {
    fn drop(&mut self) {
        if let Some(provider) = self.provider.take() {
            if let Err(e) = provider.shutdown() {
                eprintln!("failed to shut down tracer provider: {e}");
            }
        }
    }
}

/// Installs the global subscriber: JSON logs always, OTLP spans when enabled.
/// Falls back to plain logging if the exporter cannot be built.
pub fn init(config: &AppConfig) -> TelemetryGuard {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    if !config.telemetry_enabled {
        init_subscriber_without_telemetry(env_filter);
        return TelemetryGuard { provider: None };
    }

    let telemetry_config = TelemetryConfig::from(config);
    match build_provider(&telemetry_config) {
        Ok(provider) => {
            let tracer = provider.tracer(telemetry_config.service_name.clone());
            opentelemetry::global::set_tracer_provider(provider.clone());

            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().json())
                .with(OpenTelemetryLayer::new(tracer))
                .init();

            tracing::info!(
                service = %telemetry_config.service_name,
                endpoint = %telemetry_config.otlp_endpoint,
                "OpenTelemetry initialized"
            );
            TelemetryGuard {
                provider: Some(provider),
            }
        }
        Err(e) => {
            init_subscriber_without_telemetry(env_filter);
            tracing::warn!(error = %e, "failed to build OTLP exporter, tracing export disabled");
            TelemetryGuard { provider: None }
        }
    }
}

fn build_provider(
    config: &TelemetryConfig,
) -> Result<sdktrace::SdkTracerProvider, Box<dyn std::error::Error>> {
    let resource = Resource::builder_empty()
        .with_attribute(KeyValue::new(SERVICE_NAME, config.service_name.clone()))
        .with_attribute(KeyValue::new(SERVICE_VERSION, config.service_version.clone()))
        .with_attribute(KeyValue::new(
            "deployment.environment.name",
            config.environment.clone(),
        ))
        .build();

    let exporter = SpanExporter::builder()
        .with_tonic()
        .with_endpoint(&config.otlp_endpoint)
        .build()?;

    Ok(sdktrace::SdkTracerProvider::builder()
        .with_batch_exporter(exporter)
        .with_resource(resource)
        .build())
}

fn init_subscriber_without_telemetry(env_filter: EnvFilter) {
    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().json())
        .init();
}
