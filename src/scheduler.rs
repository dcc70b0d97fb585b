use chrono::{Duration as ChronoDuration, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{debug, error, info, warn};

use crate::config::SchedulerConfig;
use crate::runner::CheckRunner;
use crate::store::Store;
use crate::Result;

/// Origin-keyed throttle state owned by the scheduler: when each origin was
/// last dispatched and until when a blocked origin is suppressed.
///
/// Process-lifetime only; both tables reset on restart. Races between ticks
/// and runners only push timestamps forward, so the worst case is a check
/// running slightly off-schedule.
pub struct OriginThrottle {
    min_interval: Duration,
    block_cooldown: Duration,
    last_dispatch: Mutex<HashMap<String, Instant>>,
    blocked_until: Mutex<HashMap<String, Instant>>,
}

impl OriginThrottle {
    pub fn new(config: &SchedulerConfig) -> Self {
        Self {
            min_interval: Duration::from_secs(config.origin_min_interval_secs),
            block_cooldown: Duration::from_secs(config.origin_block_cooldown_secs),
            last_dispatch: Mutex::new(HashMap::new()),
            blocked_until: Mutex::new(HashMap::new()),
        }
    }

    pub async fn is_blocked(&self, origin: &str) -> bool {
        let blocked = self.blocked_until.lock().await;
        blocked
            .get(origin)
            .map(|until| *until > Instant::now())
            .unwrap_or(false)
    }

    /// Suppresses the whole origin for the cooldown window. One watcher being
    /// blocked silences every watcher sharing the origin.
    pub async fn block(&self, origin: &str) {
        let until = Instant::now() + self.block_cooldown;
        self.blocked_until
            .lock()
            .await
            .insert(origin.to_string(), until);
        warn!(
            "Origin {} marked as blocked for {}s",
            origin,
            self.block_cooldown.as_secs()
        );
    }

    /// Records a dispatch for the origin unless one happened within the
    /// minimum interval. Check-and-set under one lock so two due watchers on
    /// the same origin cannot both pass in a single tick.
    pub async fn try_mark_dispatched(&self, origin: &str) -> bool {
        let mut last = self.last_dispatch.lock().await;
        let now = Instant::now();

        if let Some(previous) = last.get(origin) {
            if now.duration_since(*previous) < self.min_interval {
                return false;
            }
        }

        last.insert(origin.to_string(), now);
        true
    }
}

/// Scans all enabled watchers on a fixed tick and dispatches the due ones,
/// never overlapping the same origin too tightly.
pub struct CheckScheduler {
    store: Store,
    runner: Arc<CheckRunner>,
    throttle: Arc<OriginThrottle>,
    config: SchedulerConfig,
}

impl CheckScheduler {
    pub fn new(
        store: Store,
        runner: Arc<CheckRunner>,
        throttle: Arc<OriginThrottle>,
        config: SchedulerConfig,
    ) -> Self {
        Self {
            store,
            runner,
            throttle,
            config,
        }
    }

    /// One due-task pass. Dispatched checks run on their own tasks; the tick
    /// never waits for them, so it is safe to invoke while a previous tick's
    /// checks are still in flight. Returns how many checks were dispatched.
    pub async fn tick(&self) -> Result<usize> {
        let watchers = self.store.enabled_watchers().await?;
        let now = Utc::now();
        let mut dispatched = 0;

        for watcher in watchers {
            if self.throttle.is_blocked(&watcher.origin).await {
                debug!("Skipping {}: origin {} cooling down", watcher.name, watcher.origin);
                continue;
            }

            // Due time counts from the most recent check of any status; a
            // watcher with no history is due immediately.
            if let Some(last) = self.store.latest_check(&watcher.id).await? {
                let due_at =
                    last.created_at + ChronoDuration::minutes(watcher.check_interval_minutes);
                if now < due_at {
                    continue;
                }
            }

            if !self.throttle.try_mark_dispatched(&watcher.origin).await {
                debug!(
                    "Skipping {}: origin {} dispatched too recently",
                    watcher.name, watcher.origin
                );
                continue;
            }

            let runner = Arc::clone(&self.runner);
            tokio::spawn(async move {
                runner.run_watcher_check(&watcher).await;
            });
            dispatched += 1;
        }

        Ok(dispatched)
    }
}

/// Wires the tick to a cron job and starts it. The returned scheduler handle
/// keeps the job alive; dropping it stops the ticks.
pub async fn start(scheduler: Arc<CheckScheduler>) -> anyhow::Result<JobScheduler> {
    let mut job_scheduler = JobScheduler::new().await?;

    let tick_cron = scheduler.config.tick_cron.clone();
    let job = Job::new_async(tick_cron.as_str(), move |_uuid, _l| {
        let scheduler = Arc::clone(&scheduler);
        Box::pin(async move {
            match scheduler.tick().await {
                Ok(count) if count > 0 => info!("Tick dispatched {} checks", count),
                Ok(_) => {}
                Err(e) => error!("Scheduler tick failed: {}", e),
            }
        })
    })?;

    job_scheduler.add(job).await?;
    job_scheduler.start().await?;
    info!("Scheduler started");

    Ok(job_scheduler)
}
