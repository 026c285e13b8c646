use config::{Config, ConfigError, Environment};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub database_max_connections: u32,
    #[serde(default = "default_nats_url")]
    pub nats_url: String,
    #[serde(default = "default_nats_stream")]
    pub nats_stream: String,
    #[serde(default = "default_nats_subject")]
    pub nats_subject: String,
    #[serde(default = "default_nats_consumer")]
    pub nats_consumer: String,
    #[serde(default = "default_worker_batch_size")]
    pub worker_batch_size: usize,
    #[serde(default = "default_worker_concurrency")]
    pub worker_concurrency: usize,
    #[serde(default = "default_push_gateway_url")]
    pub push_gateway_url: String,
    #[serde(default)]
    pub push_api_key: Option<String>,
    #[serde(default = "default_push_timeout_secs")]
    pub push_timeout_secs: u64,
    #[serde(default = "default_http_port")]
    pub http_port: u16,
    #[serde(default)]
    pub telemetry_enabled: bool,
    #[serde(default = "default_telemetry_service_name")]
    pub telemetry_service_name: String,
    #[serde(default = "default_telemetry_service_version")]
    pub telemetry_service_version: String,
    #[serde(default = "default_telemetry_environment")]
    pub telemetry_environment: String,
    #[serde(default = "default_telemetry_otlp_endpoint")]
    pub telemetry_otlp_endpoint: String,
}

fn default_nats_url() -> String {
    "nats://localhost:4222".to_string()
}

fn default_nats_stream() -> String {
    "CHANGES".to_string()
}

fn default_nats_subject() -> String {
    "changes.>".to_string()
}

fn default_nats_consumer() -> String {
    "notifier".to_string()
}

fn default_worker_batch_size() -> usize {
    10
}

fn default_worker_concurrency() -> usize {
    4
}

fn default_push_gateway_url() -> String {
    "http://push-gateway:8080".to_string()
}

fn default_push_timeout_secs() -> u64 {
    10
}

fn default_http_port() -> u16 {
    8080
}

fn default_telemetry_service_name() -> String {
    "school-notifier".to_string()
}

fn default_telemetry_service_version() -> String {
    "1.0.0".to_string()
}

fn default_telemetry_environment() -> String {
    "production".to_string()
}

fn default_telemetry_otlp_endpoint() -> String {
    "http://otel-collector.observability.svc.cluster.local:4317".to_string()
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_environment(Environment::default())
    }

    fn from_environment(source: Environment) -> Result<Self, ConfigError> {
        Config::builder()
            .set_default("database_max_connections", 5)?
            .add_source(source)
            .build()?
            .try_deserialize()
    }
}
