use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde::Serialize;
use thiserror::Error;

use crate::domain::push::PushMessage;
use crate::usecase::contracts::PushGateway;

#[derive(Debug, Error)]
pub enum PushError {
    #[error("push request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("push gateway rejected message with status {status}: {body}")]
    Rejected { status: StatusCode, body: String },
}

#[derive(Serialize)]
struct SendRequest<'a> {
    message: &'a PushMessage,
}

/// Client for an FCM v1 compatible `messages:send` endpoint.
pub struct HttpPushGateway {
    client: Client,
    send_url: String,
    api_key: Option<String>,
}

impl HttpPushGateway {
    pub fn new(base_url: &str, api_key: Option<String>, timeout: Duration) -> Result<Self, PushError> {
        let client = Client::builder()
            .user_agent("SchoolNotifier/1.0")
            .timeout(timeout)
            .build()?;
        let send_url = format!("{}/v1/messages:send", base_url.trim_end_matches('/'));

        tracing::info!(%send_url, "push gateway client created");

        Ok(Self {
            client,
            send_url,
            api_key,
        })
    }
}

impl PushGateway for HttpPushGateway {
    #[tracing::instrument(skip(self, message), fields(title = %message.notification.title))]
    async fn send(&self, message: &PushMessage) -> Result<(), PushError> {
        let mut request = self.client.post(&self.send_url).json(&SendRequest { message });
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PushError::Rejected { status, body });
        }

        tracing::debug!(%status, "push accepted by gateway");
        Ok(())
    }
}
