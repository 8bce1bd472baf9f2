//! Alert channel transports.

use async_trait::async_trait;
use sentinel_core::error::{Result, SentinelError};
use sentinel_core::traits::AlertChannel;
use tracing::info;

/// Prints alerts to stdout. Always configured.
pub struct ConsoleChannel;

#[async_trait]
impl AlertChannel for ConsoleChannel {
    fn name(&self) -> &str {
        "console"
    }

    async fn deliver(&self, rendered: &str) -> Result<()> {
        println!("\n{rendered}\n");
        Ok(())
    }
}

/// POSTs alerts to a generic webhook endpoint as `{"text": ...}`.
pub struct WebhookChannel {
    url: String,
    client: reqwest::Client,
}

impl WebhookChannel {
    #[must_use]
    pub fn new(url: String) -> Self {
        Self {
            url,
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl AlertChannel for WebhookChannel {
    fn name(&self) -> &str {
        "webhook"
    }

    async fn deliver(&self, rendered: &str) -> Result<()> {
        let body = serde_json::json!({ "text": rendered });
        let response = self
            .client
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .map_err(|e| SentinelError::ChannelError(e.to_string()))?;

        if !response.status().is_success() {
            return Err(SentinelError::ChannelError(format!(
                "webhook returned {}",
                response.status()
            )));
        }
        info!(url = %self.url, "alert delivered to webhook");
        Ok(())
    }
}
