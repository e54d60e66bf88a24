use std::time::Duration;

use crate::notification::interface::{CommentNotification, Notifier};
use anyhow::Result;
use reqwest::Client;

/// Posts each notification as JSON to a relay endpoint.
pub struct WebhookNotifier {
    client: Client,
    url: String,
}

impl WebhookNotifier {
    /// Each delivery, connection included, gives up after `timeout`.
    pub fn new(url: String, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client, url })
    }
}

#[async_trait::async_trait]
impl Notifier for WebhookNotifier {
    async fn send(&self, notification: &CommentNotification) -> Result<()> {
        ::log::debug!(
            "Posting notification for {} to {}",
            notification.to_addr,
            self.url
        );

        let response = self
            .client
            .post(&self.url)
            .json(notification)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(anyhow::anyhow!(
                "notification webhook returned error: {} - {}",
                status,
                text
            ));
        }

        Ok(())
    }

    fn name(&self) -> &str {
        "webhook"
    }
}
