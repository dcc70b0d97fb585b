use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::config::RunnerConfig;
use crate::extract::{CheckOutcome, ExtractionRule, Extractor};
use crate::models::{AlertType, Check, CheckStatus, Watcher};
use crate::notify::AlertDispatcher;
use crate::render::PageRenderer;
use crate::scheduler::OriginThrottle;
use crate::store::Store;

/// Delay primitive for retry backoff, injectable so tests run without
/// wall-clock waits.
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Orchestrates one watcher's check: render, extract, persist every attempt,
/// retry FAILED with linear backoff, mark the origin on BLOCKED, and fire
/// alerts after an OK result.
pub struct CheckRunner {
    store: Store,
    renderer: Arc<dyn PageRenderer>,
    extractor: Extractor,
    dispatcher: AlertDispatcher,
    throttle: Arc<OriginThrottle>,
    config: RunnerConfig,
    sleeper: Arc<dyn Sleeper>,
}

impl CheckRunner {
    pub fn new(
        store: Store,
        renderer: Arc<dyn PageRenderer>,
        extractor: Extractor,
        dispatcher: AlertDispatcher,
        throttle: Arc<OriginThrottle>,
        config: RunnerConfig,
        sleeper: Arc<dyn Sleeper>,
    ) -> Self {
        Self {
            store,
            renderer,
            extractor,
            dispatcher,
            throttle,
            config,
            sleeper,
        }
    }

    /// Runs the full bounded-retry check for one watcher. Never returns an
    /// error: every failure mode ends up as a persisted check row, so a bad
    /// watcher cannot take the scheduler down with it.
    pub async fn run_watcher_check(&self, watcher: &Watcher) {
        debug!("Running check for {}", watcher.name);
        let mut attempt: u32 = 0;

        while attempt < self.config.max_attempts {
            let started = Instant::now();
            let outcome = self.attempt(watcher).await;
            let response_time_ms = started.elapsed().as_millis() as i64;

            // The previous OK result must be read before the new row lands.
            let previous_ok = match self.store.latest_ok_check(&watcher.id).await {
                Ok(previous) => previous,
                Err(e) => {
                    error!("Failed to load previous check for {}: {}", watcher.name, e);
                    None
                }
            };

            let check = Check::from_outcome(&watcher.id, outcome, response_time_ms);
            if let Err(e) = self.store.insert_check(&check).await {
                error!("Failed to persist check for {}: {}", watcher.name, e);
            }

            match check.status {
                CheckStatus::Blocked => {
                    // Deliberate origin-level signal, not a transient fault;
                    // cool the origin down instead of retrying.
                    warn!(
                        "Check blocked for {}: {}",
                        watcher.name,
                        check.error_message.as_deref().unwrap_or("unknown")
                    );
                    self.throttle.block(&watcher.origin).await;
                    return;
                }
                CheckStatus::Ok => {
                    info!(
                        "Check ok for {}: price={:?} in_stock={:?}",
                        watcher.name, check.price_value, check.in_stock
                    );
                    self.evaluate_alerts(watcher, &check, previous_ok.as_ref())
                        .await;
                    return;
                }
                CheckStatus::Failed => {
                    warn!(
                        "Check failed for {} (attempt {}): {}",
                        watcher.name,
                        attempt + 1,
                        check.error_message.as_deref().unwrap_or("unknown")
                    );
                    attempt += 1;
                    if attempt < self.config.max_attempts {
                        let backoff =
                            Duration::from_millis(u64::from(attempt) * self.config.backoff_step_ms);
                        self.sleeper.sleep(backoff).await;
                    }
                }
            }
        }

        debug!(
            "All {} attempts exhausted for {}",
            self.config.max_attempts, watcher.name
        );
    }

    async fn attempt(&self, watcher: &Watcher) -> CheckOutcome {
        let rule = ExtractionRule::from(watcher);
        match self
            .renderer
            .render(&watcher.url, Some(&watcher.price_selector))
            .await
        {
            Ok(page) => self.extractor.extract(&page, &rule),
            // Render errors become FAILED with the message kept verbatim.
            Err(e) => CheckOutcome::failed(e.to_string()),
        }
    }

    async fn evaluate_alerts(&self, watcher: &Watcher, check: &Check, previous: Option<&Check>) {
        if watcher.alert_on_drop {
            if let (Some(new_price), Some(previous_price)) = (
                check.price_value,
                previous.and_then(|p| p.price_value),
            ) {
                if new_price < previous_price {
                    let message = format!(
                        "Price dropped from ${} to ${}",
                        previous_price, new_price
                    );
                    self.dispatcher
                        .dispatch(watcher, AlertType::PriceDrop, &message)
                        .await;
                }
            }
        }

        if let (Some(target), Some(new_price)) = (watcher.target_price, check.price_value) {
            if new_price <= target {
                let message = format!(
                    "Price reached target: ${} (Target: ${})",
                    new_price, target
                );
                self.dispatcher
                    .dispatch(watcher, AlertType::TargetReached, &message)
                    .await;
            }
        }

        // Only an explicit false counts as previously out of stock.
        if watcher.alert_on_back_in_stock
            && check.in_stock == Some(true)
            && previous.and_then(|p| p.in_stock) == Some(false)
        {
            self.dispatcher
                .dispatch(watcher, AlertType::BackInStock, "Item is back in stock!")
                .await;
        }
    }
}
