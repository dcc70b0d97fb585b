// Shared helpers for the integration suite: an in-memory store, scripted
// renderers standing in for the browser, and a fully wired application state.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use pricewatch::config::{
    AppConfig, DatabaseConfig, NotificationsConfig, RenderConfig, RunnerConfig, SchedulerConfig,
    ServerConfig, SmtpConfig, WebhookConfig,
};
use pricewatch::extract::Extractor;
use pricewatch::models::{AvailabilityStrategy, NewWatcher, Watcher};
use pricewatch::notify::AlertDispatcher;
use pricewatch::render::{PageRenderer, RenderedPage};
use pricewatch::runner::{CheckRunner, Sleeper};
use pricewatch::scheduler::{CheckScheduler, OriginThrottle};
use pricewatch::store::Store;
use pricewatch::web::AppState;

pub mod api_tests;
pub mod scheduler_tests;

/// Replays a fixed sequence of render results, then errors.
pub struct ScriptedRenderer {
    script: Mutex<VecDeque<anyhow::Result<RenderedPage>>>,
}

impl ScriptedRenderer {
    pub fn new(script: Vec<anyhow::Result<RenderedPage>>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
        })
    }
}

#[async_trait]
impl PageRenderer for ScriptedRenderer {
    async fn render(&self, _url: &str, _wait_for: Option<&str>) -> anyhow::Result<RenderedPage> {
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(anyhow::anyhow!("render script exhausted")))
    }
}

/// Serves the same snapshot for every render.
pub struct StaticRenderer {
    page: RenderedPage,
}

impl StaticRenderer {
    pub fn new(status_code: u16, html: &str) -> Arc<Self> {
        Arc::new(Self {
            page: RenderedPage::new(status_code, html),
        })
    }
}

#[async_trait]
impl PageRenderer for StaticRenderer {
    async fn render(&self, _url: &str, _wait_for: Option<&str>) -> anyhow::Result<RenderedPage> {
        Ok(self.page.clone())
    }
}

pub struct NoopSleeper;

#[async_trait]
impl Sleeper for NoopSleeper {
    async fn sleep(&self, _duration: Duration) {}
}

pub fn test_config() -> AppConfig {
    AppConfig {
        server: ServerConfig {
            host: "localhost".to_string(),
            port: 3001,
        },
        database: DatabaseConfig {
            url: "sqlite::memory:".to_string(),
            max_connections: 1,
        },
        render: RenderConfig {
            user_agent: "TestAgent/1.0".to_string(),
            chrome_path: None,
            selector_timeout_secs: 1,
            block_detection: true,
        },
        runner: RunnerConfig {
            max_attempts: 3,
            backoff_step_ms: 5000,
        },
        scheduler: SchedulerConfig {
            tick_cron: "0 * * * * *".to_string(),
            origin_min_interval_secs: 60,
            origin_block_cooldown_secs: 7200,
        },
        notifications: NotificationsConfig {
            smtp: SmtpConfig {
                host: "localhost".to_string(),
                port: 587,
                username: None,
                password: None,
                from_address: None,
                from_name: "PriceWatch".to_string(),
                to_address: None,
                use_tls: false,
            },
            webhook: WebhookConfig {
                url: None,
                username: "PriceWatch".to_string(),
            },
        },
    }
}

pub async fn test_store() -> Store {
    let store = Store::connect("sqlite::memory:", 1)
        .await
        .expect("in-memory store");
    store.migrate().await.expect("migrations");
    store
}

pub fn sample_watcher(name: &str, url: &str) -> Watcher {
    Watcher::new(NewWatcher {
        name: name.to_string(),
        url: url.to_string(),
        currency: Some("CLP".to_string()),
        price_selector: ".price".to_string(),
        stock_selector: None,
        availability_strategy: AvailabilityStrategy::PriceSelectorOnly,
        out_of_stock_keywords: None,
        target_price: None,
        alert_on_drop: Some(true),
        alert_on_back_in_stock: Some(true),
        check_interval_minutes: Some(60),
        enabled: Some(true),
    })
    .expect("valid watcher")
}

pub fn build_runner(store: &Store, renderer: Arc<dyn PageRenderer>) -> (Arc<CheckRunner>, Arc<OriginThrottle>) {
    let config = test_config();
    let throttle = Arc::new(OriginThrottle::new(&config.scheduler));
    let runner = Arc::new(CheckRunner::new(
        store.clone(),
        renderer,
        Extractor::new(config.render.block_detection),
        AlertDispatcher::new(store.clone(), vec![]),
        Arc::clone(&throttle),
        config.runner,
        Arc::new(NoopSleeper),
    ));
    (runner, throttle)
}

pub async fn build_app_state(store: Store, renderer: Arc<dyn PageRenderer>) -> AppState {
    let config = test_config();
    let (runner, throttle) = build_runner(&store, Arc::clone(&renderer));
    let scheduler = Arc::new(CheckScheduler::new(
        store.clone(),
        runner,
        throttle,
        config.scheduler.clone(),
    ));

    AppState {
        store,
        scheduler,
        renderer,
        config,
    }
}

/// Polls until the watcher has at least `expected` check rows, or panics.
/// Dispatched checks run on background tasks, so assertions must wait.
pub async fn wait_for_checks(store: &Store, watcher_id: &str, expected: i64) {
    for _ in 0..200 {
        if store.count_checks(watcher_id).await.expect("count") >= expected {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!(
        "watcher {} never reached {} persisted checks",
        watcher_id, expected
    );
}

pub fn price_page(price: &str) -> String {
    format!(
        r#"<html><body><div class="price">{}</div></body></html>"#,
        price
    )
}
