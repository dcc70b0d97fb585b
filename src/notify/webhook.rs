use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use tracing::warn;

use crate::config::WebhookConfig;
use crate::models::{AlertType, NotificationChannel, Watcher};
use crate::notify::{alert_label, NotificationSink};

/// Discord-compatible webhook delivery channel.
pub struct WebhookSink {
    client: Client,
    url: String,
    username: String,
}

impl WebhookSink {
    /// None unless a webhook URL is configured.
    pub fn from_config(config: &WebhookConfig) -> Option<Self> {
        let url = config.url.clone()?;
        Some(Self {
            client: Client::new(),
            url,
            username: config.username.clone(),
        })
    }

    fn payload(&self, watcher: &Watcher, alert_type: AlertType, message: &str) -> serde_json::Value {
        json!({
            "username": self.username,
            "content": format!(
                "**{}** | {}\n{}\n{}",
                alert_label(alert_type),
                watcher.name,
                message,
                watcher.url
            ),
        })
    }
}

#[async_trait]
impl NotificationSink for WebhookSink {
    fn channel(&self) -> NotificationChannel {
        NotificationChannel::Webhook
    }

    async fn send(&self, watcher: &Watcher, alert_type: AlertType, message: &str) -> bool {
        let payload = self.payload(watcher, alert_type, message);

        match self.client.post(&self.url).json(&payload).send().await {
            Ok(response) if response.status().is_success() => true,
            Ok(response) => {
                warn!(
                    watcher = %watcher.id,
                    status = %response.status(),
                    "Webhook rejected alert"
                );
                false
            }
            Err(e) => {
                warn!(watcher = %watcher.id, "Failed to post webhook alert: {}", e);
                false
            }
        }
    }
}
