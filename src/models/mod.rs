use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub mod check;
pub mod notification;
pub mod watcher;

// Re-exports for convenience
pub use check::*;
pub use notification::*;
pub use watcher::*;

// Common enums used across models

/// Terminal status of a single check attempt.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, sqlx::Type)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(type_name = "TEXT")]
pub enum CheckStatus {
    #[sqlx(rename = "OK")]
    Ok,
    #[sqlx(rename = "FAILED")]
    Failed,
    #[sqlx(rename = "BLOCKED")]
    Blocked,
}

/// How in-stock is inferred once the price has been extracted.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, sqlx::Type)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(type_name = "TEXT")]
pub enum AvailabilityStrategy {
    /// A resolvable price selector is taken as proof of stock.
    #[sqlx(rename = "PRICE_SELECTOR_ONLY")]
    PriceSelectorOnly,
    /// Out-of-stock keywords anywhere in the page body mean no stock.
    #[sqlx(rename = "OUT_OF_STOCK_TEXT_PRESENT")]
    OutOfStockTextPresent,
    /// Keywords are matched only against the text of a dedicated selector.
    #[sqlx(rename = "STOCK_TEXT_SELECTOR")]
    StockTextSelector,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, sqlx::Type)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(type_name = "TEXT")]
pub enum AlertType {
    #[sqlx(rename = "PRICE_DROP")]
    PriceDrop,
    #[sqlx(rename = "TARGET_REACHED")]
    TargetReached,
    #[sqlx(rename = "BACK_IN_STOCK")]
    BackInStock,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, sqlx::Type)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(type_name = "TEXT")]
pub enum NotificationChannel {
    #[sqlx(rename = "EMAIL")]
    Email,
    #[sqlx(rename = "WEBHOOK")]
    Webhook,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, sqlx::Type)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(type_name = "TEXT")]
pub enum DeliveryStatus {
    #[sqlx(rename = "SENT")]
    Sent,
    #[sqlx(rename = "FAILED")]
    Failed,
}

// Helper function to generate UUIDs in the format expected by the database
pub fn generate_id() -> String {
    Uuid::new_v4().simple().to_string()
}
