use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::extract::CheckOutcome;
use crate::models::{generate_id, CheckStatus};

/// One immutable observation of a watcher. Ordered by creation time;
/// most-recent-first is the canonical read order.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
pub struct Check {
    pub id: String,
    pub watcher_id: String,
    pub price_value: Option<i64>,
    pub price_text: Option<String>,
    /// None means stock could not be inferred; a valid state, not an error.
    pub in_stock: Option<bool>,
    pub status: CheckStatus,
    pub error_message: Option<String>,
    pub raw_excerpt: Option<String>,
    pub response_time_ms: i64,
    pub created_at: DateTime<Utc>,
}

impl Check {
    pub fn from_outcome(watcher_id: &str, outcome: CheckOutcome, response_time_ms: i64) -> Self {
        Self {
            id: generate_id(),
            watcher_id: watcher_id.to_string(),
            price_value: outcome.price_value,
            price_text: outcome.price_text,
            in_stock: outcome.in_stock,
            status: outcome.status,
            error_message: outcome.error_message,
            raw_excerpt: outcome.raw_excerpt,
            response_time_ms,
            created_at: Utc::now(),
        }
    }
}
