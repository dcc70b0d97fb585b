use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::models::{generate_id, AlertType, DeliveryStatus, NotificationChannel};

/// A record of an alert condition firing. Append-only; removed only when the
/// owning watcher is deleted.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
pub struct Notification {
    pub id: String,
    pub watcher_id: String,
    pub alert_type: AlertType,
    pub channel: NotificationChannel,
    pub status: DeliveryStatus,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

impl Notification {
    pub fn new(
        watcher_id: &str,
        alert_type: AlertType,
        channel: NotificationChannel,
        status: DeliveryStatus,
        message: String,
    ) -> Self {
        Self {
            id: generate_id(),
            watcher_id: watcher_id.to_string(),
            alert_type,
            channel,
            status,
            message,
            created_at: Utc::now(),
        }
    }
}
