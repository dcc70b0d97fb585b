use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::env;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub render: RenderConfig,
    pub runner: RunnerConfig,
    pub scheduler: SchedulerConfig,
    pub notifications: NotificationsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderConfig {
    pub user_agent: String,
    pub chrome_path: Option<String>,
    /// Bounded wait for the price selector before the page is snapshotted.
    pub selector_timeout_secs: u64,
    /// Gate that short-circuits checks on anti-bot page content. Disabled in
    /// constrained test environments where fixture pages mention vendors.
    pub block_detection: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunnerConfig {
    pub max_attempts: u32,
    pub backoff_step_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Cron expression for the due-task tick (6-field, seconds first).
    pub tick_cron: String,
    pub origin_min_interval_secs: u64,
    pub origin_block_cooldown_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationsConfig {
    pub smtp: SmtpConfig,
    pub webhook: WebhookConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub from_address: Option<String>,
    pub from_name: String,
    pub to_address: Option<String>,
    pub use_tls: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookConfig {
    pub url: Option<String>,
    pub username: String,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = Config::builder()
            // Start with default configuration
            .add_source(File::with_name("config/default"))
            // Add environment-specific config
            .add_source(File::with_name(&format!("config/{}", run_mode)).required(false))
            // Add local config (ignored by git)
            .add_source(File::with_name("config/local").required(false))
            // Add environment variables with prefix "PRICEWATCH_"
            .add_source(Environment::with_prefix("PRICEWATCH").separator("__"))
            .build()?;

        let mut config: AppConfig = s.try_deserialize()?;

        // Chrome path may come from the conventional env var instead
        if config.render.chrome_path.is_none() {
            config.render.chrome_path = env::var("CHROME_PATH").ok();
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::Message(
                "Server port must be greater than 0".into(),
            ));
        }

        if self.database.max_connections == 0 {
            return Err(ConfigError::Message(
                "Database max_connections must be greater than 0".into(),
            ));
        }

        if self.runner.max_attempts == 0 {
            return Err(ConfigError::Message(
                "Runner max_attempts must be greater than 0".into(),
            ));
        }

        if !is_valid_cron(&self.scheduler.tick_cron) {
            return Err(ConfigError::Message(
                "Invalid cron expression in scheduler.tick_cron".into(),
            ));
        }

        if self.scheduler.origin_min_interval_secs == 0 {
            return Err(ConfigError::Message(
                "Scheduler origin_min_interval_secs must be greater than 0".into(),
            ));
        }

        if self.notifications.smtp.port == 0 {
            return Err(ConfigError::Message(
                "SMTP port must be greater than 0".into(),
            ));
        }

        if let Some(url) = &self.notifications.webhook.url {
            if url::Url::parse(url).is_err() {
                return Err(ConfigError::Message(
                    "Invalid webhook URL format".into(),
                ));
            }
        }

        Ok(())
    }
}

// Tick expressions carry a seconds field, so 6 parts (7 with the year).
fn is_valid_cron(cron_expr: &str) -> bool {
    let parts: Vec<&str> = cron_expr.split_whitespace().collect();
    if !(6..=7).contains(&parts.len()) {
        return false;
    }

    for part in parts {
        if part.is_empty() {
            return false;
        }
        // Allow numbers, ranges, lists, wildcards, and steps
        if !part
            .chars()
            .all(|c| c.is_ascii_digit() || c == '*' || c == '-' || c == ',' || c == '/')
        {
            return false;
        }
    }

    true
}
