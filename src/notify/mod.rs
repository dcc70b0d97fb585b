use async_trait::async_trait;
use std::sync::Arc;
use tracing::{info, warn};

use crate::models::{AlertType, DeliveryStatus, Notification, NotificationChannel, Watcher};
use crate::store::Store;

pub mod email;
pub mod webhook;

pub use email::EmailSink;
pub use webhook::WebhookSink;

/// Outbound delivery channel for a fully-formed alert message.
///
/// Implementations report delivery as a boolean; they never propagate errors.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    fn channel(&self) -> NotificationChannel;

    /// Returns true when the message was handed off to the channel.
    async fn send(&self, watcher: &Watcher, alert_type: AlertType, message: &str) -> bool;
}

/// Fans an alert out to every configured sink and records one notification
/// row per delivery attempt. Delivery failures are swallowed; a check must
/// never fail because an alert could not be sent.
pub struct AlertDispatcher {
    store: Store,
    sinks: Vec<Arc<dyn NotificationSink>>,
}

impl AlertDispatcher {
    pub fn new(store: Store, sinks: Vec<Arc<dyn NotificationSink>>) -> Self {
        Self { store, sinks }
    }

    pub async fn dispatch(&self, watcher: &Watcher, alert_type: AlertType, message: &str) {
        info!(
            watcher = %watcher.name,
            alert = ?alert_type,
            "{}",
            message
        );

        if self.sinks.is_empty() {
            // No channel configured; the firing is still recorded.
            self.record(
                watcher,
                alert_type,
                NotificationChannel::Email,
                DeliveryStatus::Failed,
                message,
            )
            .await;
            return;
        }

        for sink in &self.sinks {
            let delivered = sink.send(watcher, alert_type, message).await;
            let status = if delivered {
                DeliveryStatus::Sent
            } else {
                DeliveryStatus::Failed
            };
            self.record(watcher, alert_type, sink.channel(), status, message)
                .await;
        }
    }

    async fn record(
        &self,
        watcher: &Watcher,
        alert_type: AlertType,
        channel: NotificationChannel,
        status: DeliveryStatus,
        message: &str,
    ) {
        let notification = Notification::new(
            &watcher.id,
            alert_type,
            channel,
            status,
            message.to_string(),
        );
        if let Err(e) = self.store.insert_notification(&notification).await {
            warn!(watcher = %watcher.id, "Failed to record notification: {}", e);
        }
    }
}

/// Human-readable label used in subjects and webhook payloads.
pub fn alert_label(alert_type: AlertType) -> &'static str {
    match alert_type {
        AlertType::PriceDrop => "Price Drop",
        AlertType::TargetReached => "Target Reached",
        AlertType::BackInStock => "Back In Stock",
    }
}
