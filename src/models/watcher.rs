use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use url::Url;
use validator::Validate;

use crate::models::{generate_id, AvailabilityStrategy};
use crate::utils::error::AppError;

/// A user's monitoring configuration for one product page.
///
/// The origin (URL hostname) is derived at creation/update time and is the
/// unit of per-origin throttling and block cooldown. The scheduler never
/// mutates a watcher; it only reads them.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
pub struct Watcher {
    pub id: String,
    pub name: String,
    pub url: String,
    pub origin: String,
    pub currency: String,

    // Extraction rule
    pub price_selector: String,
    pub stock_selector: Option<String>,
    pub availability_strategy: AvailabilityStrategy,
    /// JSON array of phrases, or a single bare phrase.
    pub out_of_stock_keywords: Option<String>,

    // Alerting
    pub target_price: Option<i64>,
    pub alert_on_drop: bool,
    pub alert_on_back_in_stock: bool,

    // Schedule
    pub check_interval_minutes: i64,
    pub enabled: bool,

    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct NewWatcher {
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    #[validate(url)]
    pub url: String,
    pub currency: Option<String>,
    #[validate(length(min = 1))]
    pub price_selector: String,
    pub stock_selector: Option<String>,
    pub availability_strategy: AvailabilityStrategy,
    pub out_of_stock_keywords: Option<String>,
    pub target_price: Option<i64>,
    pub alert_on_drop: Option<bool>,
    pub alert_on_back_in_stock: Option<bool>,
    #[validate(range(min = 1))]
    pub check_interval_minutes: Option<i64>,
    pub enabled: Option<bool>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateWatcher {
    pub name: Option<String>,
    pub url: Option<String>,
    pub currency: Option<String>,
    pub price_selector: Option<String>,
    pub stock_selector: Option<Option<String>>,
    pub availability_strategy: Option<AvailabilityStrategy>,
    pub out_of_stock_keywords: Option<Option<String>>,
    pub target_price: Option<Option<i64>>,
    pub alert_on_drop: Option<bool>,
    pub alert_on_back_in_stock: Option<bool>,
    pub check_interval_minutes: Option<i64>,
    pub enabled: Option<bool>,
}

/// Hostname portion of a watcher URL; the throttling key.
pub fn origin_from_url(url: &str) -> Result<String, AppError> {
    let parsed = Url::parse(url).map_err(|e| AppError::InvalidUrl(format!("{}: {}", url, e)))?;
    parsed
        .host_str()
        .map(|h| h.to_string())
        .ok_or_else(|| AppError::InvalidUrl(format!("{}: no host", url)))
}

impl Watcher {
    pub fn new(new_watcher: NewWatcher) -> Result<Self, AppError> {
        let origin = origin_from_url(&new_watcher.url)?;

        Ok(Self {
            id: generate_id(),
            name: new_watcher.name,
            url: new_watcher.url,
            origin,
            currency: new_watcher.currency.unwrap_or_else(|| "CLP".to_string()),
            price_selector: new_watcher.price_selector,
            stock_selector: new_watcher.stock_selector,
            availability_strategy: new_watcher.availability_strategy,
            out_of_stock_keywords: new_watcher.out_of_stock_keywords,
            target_price: new_watcher.target_price,
            alert_on_drop: new_watcher.alert_on_drop.unwrap_or(false),
            alert_on_back_in_stock: new_watcher.alert_on_back_in_stock.unwrap_or(false),
            check_interval_minutes: new_watcher.check_interval_minutes.unwrap_or(60),
            enabled: new_watcher.enabled.unwrap_or(true),
            created_at: Utc::now(),
        })
    }

    /// Applies a partial update; the origin is re-derived when the URL changes.
    pub fn update(&mut self, update: UpdateWatcher) -> Result<(), AppError> {
        if let Some(url) = update.url {
            self.origin = origin_from_url(&url)?;
            self.url = url;
        }
        if let Some(name) = update.name {
            self.name = name;
        }
        if let Some(currency) = update.currency {
            self.currency = currency;
        }
        if let Some(price_selector) = update.price_selector {
            self.price_selector = price_selector;
        }
        if let Some(stock_selector) = update.stock_selector {
            self.stock_selector = stock_selector;
        }
        if let Some(strategy) = update.availability_strategy {
            self.availability_strategy = strategy;
        }
        if let Some(keywords) = update.out_of_stock_keywords {
            self.out_of_stock_keywords = keywords;
        }
        if let Some(target_price) = update.target_price {
            self.target_price = target_price;
        }
        if let Some(alert_on_drop) = update.alert_on_drop {
            self.alert_on_drop = alert_on_drop;
        }
        if let Some(alert_on_back_in_stock) = update.alert_on_back_in_stock {
            self.alert_on_back_in_stock = alert_on_back_in_stock;
        }
        if let Some(interval) = update.check_interval_minutes {
            self.check_interval_minutes = interval;
        }
        if let Some(enabled) = update.enabled {
            self.enabled = enabled;
        }

        Ok(())
    }
}
