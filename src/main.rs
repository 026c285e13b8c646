mod config;
mod domain;
mod repository;
mod telemetry;
mod usecase;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use axum::{extract::State, routing::get, Router};
use futures::StreamExt;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use tower_http::trace::TraceLayer;

use crate::config::AppConfig;
use crate::domain::change::DocumentChange;
use crate::repository::postgres::{
    create_pool, PostgresNotificationRepository, PostgresSchoolDirectory,
};
use crate::usecase::events::EventsUseCase;
use crate::usecase::notifications::NotificationsUseCase;
use crate::usecase::push_gateway::HttpPushGateway;

type Events =
    EventsUseCase<PostgresSchoolDirectory, PostgresNotificationRepository, HttpPushGateway>;

pub struct AppState {
    pub metrics_handle: PrometheusHandle,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::from_env().context("failed to load configuration")?;
    let _telemetry = telemetry::init(&config);
    tracing::info!("starting the notifier service");

    let metrics_handle = PrometheusBuilder::new()
        .install_recorder()
        .context("failed to install Prometheus recorder")?;
    metrics_process::Collector::default().describe();
    tracing::info!("prometheus metrics initialized");

    let pool = create_pool(&config.database_url, config.database_max_connections)
        .await
        .context("failed to connect to database")?;
    tracing::info!("database pool created");

    sqlx::migrate!().run(&pool).await?;
    tracing::info!("database migrations applied");

    let push_gateway = HttpPushGateway::new(
        &config.push_gateway_url,
        config.push_api_key.clone(),
        Duration::from_secs(config.push_timeout_secs),
    )
    .context("failed to build push gateway client")?;

    let events: Events = EventsUseCase::new(NotificationsUseCase::new(
        PostgresSchoolDirectory::new(pool.clone()),
        PostgresNotificationRepository::new(pool),
        push_gateway,
    ));

    let router = Router::new()
        .route("/healthz", get(healthz))
        .route("/metrics", get(metrics))
        .layer(TraceLayer::new_for_http())
        .with_state(Arc::new(AppState { metrics_handle }));
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", config.http_port))
        .await
        .context("failed to bind ops listener")?;
    tracing::info!(port = config.http_port, "ops endpoints listening");
    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, router).await {
            tracing::error!(error = %e, "ops server stopped");
        }
    });

    let nats_client = async_nats::connect(&config.nats_url)
        .await
        .context("failed to connect to NATS")?;
    tracing::info!(nats_url = %config.nats_url, "connected to NATS");

    let jetstream = async_nats::jetstream::new(nats_client);
    let stream = jetstream
        .get_or_create_stream(async_nats::jetstream::stream::Config {
            name: config.nats_stream.clone(),
            subjects: vec![config.nats_subject.clone()],
            ..Default::default()
        })
        .await
        .context("failed to get change stream")?;
    tracing::info!(stream = %config.nats_stream, "change stream ready");

    // Events are acked once handled and never redelivered.
    let consumer = stream
        .get_or_create_consumer(
            &config.nats_consumer,
            async_nats::jetstream::consumer::pull::Config {
                durable_name: Some(config.nats_consumer.clone()),
                ack_wait: Duration::from_secs(60),
                max_deliver: 1,
                ..Default::default()
            },
        )
        .await
        .context("failed to create consumer")?;
    tracing::info!(consumer = %config.nats_consumer, "consumer ready, starting message loop");

    loop {
        let batch = tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("shutdown signal received");
                break;
            }
            batch = consumer
                .fetch()
                .max_messages(config.worker_batch_size)
                .expires(Duration::from_secs(5))
                .messages() => batch,
        };

        let messages = match batch {
            Ok(msgs) => msgs,
            Err(e) => {
                tracing::error!(error = %e, "failed to fetch messages");
                tokio::time::sleep(Duration::from_secs(5)).await;
                continue;
            }
        };

        messages
            .for_each_concurrent(config.worker_concurrency, |msg_result| {
                let events = &events;
                async move {
                    match msg_result {
                        Ok(msg) => process_message(events, &msg).await,
                        Err(e) => tracing::error!(error = %e, "error receiving message"),
                    }
                }
            })
            .await;
    }

    Ok(())
}

async fn process_message(events: &Events, msg: &async_nats::jetstream::message::Message) {
    match serde_json::from_slice::<DocumentChange>(&msg.payload) {
        Ok(change) => {
            events.handle(&change).await;
        }
        Err(e) => {
            tracing::error!(subject = %msg.subject, error = %e, "failed to decode change event, dropping");
        }
    }

    if let Err(e) = msg.ack().await {
        tracing::error!(subject = %msg.subject, error = %e, "failed to ack message");
    }
}

async fn metrics(State(state): State<Arc<AppState>>) -> String {
    metrics_process::Collector::default().collect();
    state.metrics_handle.render()
}

#[tracing::instrument]
async fn healthz() -> &'static str {
    "OK"
}
