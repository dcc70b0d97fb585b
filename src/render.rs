use anyhow::{anyhow, Result};
use async_trait::async_trait;
use headless_chrome::{Browser, LaunchOptions, Tab};
use std::time::Duration;

use crate::config::RenderConfig;

/// Snapshot of a rendered page. All selector logic runs on the snapshot, so
/// everything downstream of the renderer works without a browser.
#[derive(Debug, Clone)]
pub struct RenderedPage {
    pub status_code: u16,
    pub html: String,
}

impl RenderedPage {
    pub fn new(status_code: u16, html: impl Into<String>) -> Self {
        Self {
            status_code,
            html: html.into(),
        }
    }
}

/// Rendering collaborator consumed by the check runner and the detector.
#[async_trait]
pub trait PageRenderer: Send + Sync {
    /// Renders the URL and snapshots the result. `wait_for` bounds a wait for
    /// the given selector before the snapshot is taken; the selector being
    /// absent is not a render error.
    async fn render(&self, url: &str, wait_for: Option<&str>) -> Result<RenderedPage>;
}

/// Headless-Chrome renderer. A browser is launched per render and closed when
/// the snapshot is taken, so no browser state outlives a check.
pub struct ChromeRenderer {
    config: RenderConfig,
}

impl ChromeRenderer {
    pub fn new(config: RenderConfig) -> Self {
        Self { config }
    }

    fn launch(&self) -> Result<Browser> {
        let mut launch_options = LaunchOptions::default_builder()
            .headless(true)
            .sandbox(false) // Often needed in containerized environments
            .args(vec![
                std::ffi::OsStr::new("--no-sandbox"),
                std::ffi::OsStr::new("--disable-dev-shm-usage"),
                std::ffi::OsStr::new("--disable-gpu"),
                std::ffi::OsStr::new("--disable-extensions"),
            ])
            .build()
            .map_err(|e| anyhow!("Failed to create launch options: {}", e))?;

        if let Some(chrome_path) = &self.config.chrome_path {
            launch_options.path = Some(std::path::PathBuf::from(chrome_path));
        }

        Browser::new(launch_options).map_err(|e| anyhow!("Failed to launch browser: {}", e))
    }

    fn read_status(&self, tab: &Tab) -> u16 {
        // Chrome exposes the document response status on the navigation
        // timing entry; default to 200 when the entry is unavailable.
        const STATUS_JS: &str =
            "(performance.getEntriesByType('navigation')[0] || {}).responseStatus || 200";

        match tab.evaluate(STATUS_JS, false) {
            Ok(result) => result
                .value
                .and_then(|v| v.as_u64())
                .map(|v| v as u16)
                .unwrap_or(200),
            Err(_) => 200,
        }
    }
}

#[async_trait]
impl PageRenderer for ChromeRenderer {
    async fn render(&self, url: &str, wait_for: Option<&str>) -> Result<RenderedPage> {
        let browser = self.launch()?;

        let tab = browser
            .new_tab()
            .map_err(|e| anyhow!("Failed to create tab: {}", e))?;

        tab.set_user_agent(&self.config.user_agent, None, None)
            .map_err(|e| anyhow!("Failed to set user agent: {}", e))?;

        tab.navigate_to(url)
            .map_err(|e| anyhow!("Navigation failed: {}", e))?;

        tab.wait_until_navigated()
            .map_err(|e| anyhow!("Page load failed: {}", e))?;

        if let Some(selector) = wait_for {
            // Bounded wait; whether the selector is present is decided on the
            // snapshot by the extraction engine.
            let _ = tab.wait_for_element_with_custom_timeout(
                selector,
                Duration::from_secs(self.config.selector_timeout_secs),
            );
        }

        let status_code = self.read_status(&tab);

        let html = tab
            .get_content()
            .map_err(|e| anyhow!("Failed to get page content: {}", e))?;

        let _ = tab.close(true);

        Ok(RenderedPage { status_code, html })
    }
}
