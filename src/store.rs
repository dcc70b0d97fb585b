use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::str::FromStr;

use crate::models::{Check, Notification, Watcher};
use crate::utils::error::AppError;
use crate::Result;

/// Durable store for watchers, checks, and notifications.
///
/// Watchers own their checks and notifications; deleting a watcher cascades.
/// Check and notification inserts are append-only.
#[derive(Clone)]
pub struct Store {
    pool: SqlitePool,
}

impl Store {
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(url)
            .map_err(AppError::Database)?
            .create_if_missing(true)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await?;

        Ok(Self { pool })
    }

    /// Idempotent schema creation.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS watchers (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                url TEXT NOT NULL,
                origin TEXT NOT NULL,
                currency TEXT NOT NULL,
                price_selector TEXT NOT NULL,
                stock_selector TEXT,
                availability_strategy TEXT NOT NULL,
                out_of_stock_keywords TEXT,
                target_price INTEGER,
                alert_on_drop INTEGER NOT NULL DEFAULT 0,
                alert_on_back_in_stock INTEGER NOT NULL DEFAULT 0,
                check_interval_minutes INTEGER NOT NULL DEFAULT 60,
                enabled INTEGER NOT NULL DEFAULT 1,
                created_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS checks (
                id TEXT PRIMARY KEY,
                watcher_id TEXT NOT NULL
                    REFERENCES watchers(id) ON DELETE CASCADE,
                price_value INTEGER,
                price_text TEXT,
                in_stock INTEGER,
                status TEXT NOT NULL,
                error_message TEXT,
                raw_excerpt TEXT,
                response_time_ms INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_checks_watcher_created
            ON checks (watcher_id, created_at DESC)
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS notifications (
                id TEXT PRIMARY KEY,
                watcher_id TEXT NOT NULL
                    REFERENCES watchers(id) ON DELETE CASCADE,
                alert_type TEXT NOT NULL,
                channel TEXT NOT NULL,
                status TEXT NOT NULL,
                message TEXT NOT NULL,
                created_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Seeds two example watchers with some history the first time the
    /// database comes up empty. A no-op otherwise.
    pub async fn ensure_seed_data(&self) -> Result<()> {
        use crate::extract::CheckOutcome;
        use crate::models::{AvailabilityStrategy, NewWatcher};

        if self.count_watchers().await? > 0 {
            return Ok(());
        }

        let falabella = Watcher::new(NewWatcher {
            name: "Ejemplo Falabella".to_string(),
            url: "https://www.ejemplo-falabella.cl/producto-placeholder".to_string(),
            currency: Some("CLP".to_string()),
            price_selector: ".product-price".to_string(),
            stock_selector: None,
            availability_strategy: AvailabilityStrategy::PriceSelectorOnly,
            out_of_stock_keywords: Some(r#"["agotado","sin stock"]"#.to_string()),
            target_price: None,
            alert_on_drop: Some(true),
            alert_on_back_in_stock: Some(true),
            check_interval_minutes: Some(60),
            enabled: Some(true),
        })?;

        let mercadolibre = Watcher::new(NewWatcher {
            name: "Ejemplo MercadoLibre".to_string(),
            url: "https://www.ejemplo-mercadolibre.cl/producto-placeholder".to_string(),
            currency: Some("CLP".to_string()),
            price_selector: ".price-tag-fraction".to_string(),
            stock_selector: None,
            availability_strategy: AvailabilityStrategy::OutOfStockTextPresent,
            out_of_stock_keywords: Some(r#"["agotado","sin stock"]"#.to_string()),
            target_price: None,
            alert_on_drop: Some(true),
            alert_on_back_in_stock: Some(true),
            check_interval_minutes: Some(45),
            enabled: Some(true),
        })?;

        self.insert_watcher(&falabella).await?;
        self.insert_watcher(&mercadolibre).await?;

        let history = [
            (
                &falabella,
                599_990,
                "$599.990",
                true,
                "Precio normal: $599.990",
            ),
            (&falabella, 549_990, "$549.990", true, "Oferta: $549.990"),
            (
                &mercadolibre,
                129_999,
                "$129.999",
                false,
                "Producto agotado",
            ),
            (
                &mercadolibre,
                119_999,
                "$119.999",
                true,
                "Stock disponible",
            ),
        ];
        for (watcher, price, text, in_stock, excerpt) in history {
            let outcome = CheckOutcome::ok(
                Some(price),
                Some(text.to_string()),
                Some(in_stock),
                Some(excerpt.to_string()),
            );
            self.insert_check(&Check::from_outcome(&watcher.id, outcome, 0))
                .await?;
        }

        tracing::info!("Seeded {} example watchers", 2);
        Ok(())
    }

    // Watcher CRUD

    pub async fn insert_watcher(&self, watcher: &Watcher) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO watchers (
                id, name, url, origin, currency, price_selector, stock_selector,
                availability_strategy, out_of_stock_keywords, target_price,
                alert_on_drop, alert_on_back_in_stock, check_interval_minutes,
                enabled, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&watcher.id)
        .bind(&watcher.name)
        .bind(&watcher.url)
        .bind(&watcher.origin)
        .bind(&watcher.currency)
        .bind(&watcher.price_selector)
        .bind(&watcher.stock_selector)
        .bind(watcher.availability_strategy)
        .bind(&watcher.out_of_stock_keywords)
        .bind(watcher.target_price)
        .bind(watcher.alert_on_drop)
        .bind(watcher.alert_on_back_in_stock)
        .bind(watcher.check_interval_minutes)
        .bind(watcher.enabled)
        .bind(watcher.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn update_watcher(&self, watcher: &Watcher) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE watchers SET
                name = ?, url = ?, origin = ?, currency = ?, price_selector = ?,
                stock_selector = ?, availability_strategy = ?,
                out_of_stock_keywords = ?, target_price = ?, alert_on_drop = ?,
                alert_on_back_in_stock = ?, check_interval_minutes = ?, enabled = ?
            WHERE id = ?
            "#,
        )
        .bind(&watcher.name)
        .bind(&watcher.url)
        .bind(&watcher.origin)
        .bind(&watcher.currency)
        .bind(&watcher.price_selector)
        .bind(&watcher.stock_selector)
        .bind(watcher.availability_strategy)
        .bind(&watcher.out_of_stock_keywords)
        .bind(watcher.target_price)
        .bind(watcher.alert_on_drop)
        .bind(watcher.alert_on_back_in_stock)
        .bind(watcher.check_interval_minutes)
        .bind(watcher.enabled)
        .bind(&watcher.id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound {
                resource: "Watcher".to_string(),
            });
        }
        Ok(())
    }

    pub async fn get_watcher(&self, id: &str) -> Result<Option<Watcher>> {
        let watcher = sqlx::query_as::<_, Watcher>("SELECT * FROM watchers WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(watcher)
    }

    /// All watchers, newest first.
    pub async fn list_watchers(&self) -> Result<Vec<Watcher>> {
        let watchers =
            sqlx::query_as::<_, Watcher>("SELECT * FROM watchers ORDER BY created_at DESC")
                .fetch_all(&self.pool)
                .await?;
        Ok(watchers)
    }

    pub async fn enabled_watchers(&self) -> Result<Vec<Watcher>> {
        let watchers = sqlx::query_as::<_, Watcher>(
            "SELECT * FROM watchers WHERE enabled = 1 ORDER BY created_at",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(watchers)
    }

    /// Removes the watcher and, via cascade, its checks and notifications.
    pub async fn delete_watcher(&self, id: &str) -> Result<()> {
        let result = sqlx::query("DELETE FROM watchers WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound {
                resource: "Watcher".to_string(),
            });
        }
        Ok(())
    }

    pub async fn count_watchers(&self) -> Result<i64> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM watchers")
            .fetch_one(&self.pool)
            .await?;
        Ok(count.0)
    }

    // Checks (append-only)

    pub async fn insert_check(&self, check: &Check) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO checks (
                id, watcher_id, price_value, price_text, in_stock, status,
                error_message, raw_excerpt, response_time_ms, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&check.id)
        .bind(&check.watcher_id)
        .bind(check.price_value)
        .bind(&check.price_text)
        .bind(check.in_stock)
        .bind(check.status)
        .bind(&check.error_message)
        .bind(&check.raw_excerpt)
        .bind(check.response_time_ms)
        .bind(check.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Most recent check of any status. Rowid breaks same-timestamp ties from
    /// retry bursts.
    pub async fn latest_check(&self, watcher_id: &str) -> Result<Option<Check>> {
        let check = sqlx::query_as::<_, Check>(
            r#"
            SELECT * FROM checks WHERE watcher_id = ?
            ORDER BY created_at DESC, rowid DESC LIMIT 1
            "#,
        )
        .bind(watcher_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(check)
    }

    pub async fn latest_ok_check(&self, watcher_id: &str) -> Result<Option<Check>> {
        let check = sqlx::query_as::<_, Check>(
            r#"
            SELECT * FROM checks WHERE watcher_id = ? AND status = 'OK'
            ORDER BY created_at DESC, rowid DESC LIMIT 1
            "#,
        )
        .bind(watcher_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(check)
    }

    pub async fn recent_checks(&self, watcher_id: &str, limit: i64) -> Result<Vec<Check>> {
        let checks = sqlx::query_as::<_, Check>(
            r#"
            SELECT * FROM checks WHERE watcher_id = ?
            ORDER BY created_at DESC, rowid DESC LIMIT ?
            "#,
        )
        .bind(watcher_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(checks)
    }

    pub async fn count_checks(&self, watcher_id: &str) -> Result<i64> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM checks WHERE watcher_id = ?")
            .bind(watcher_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(count.0)
    }

    // Notifications (append-only)

    pub async fn insert_notification(&self, notification: &Notification) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO notifications (
                id, watcher_id, alert_type, channel, status, message, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&notification.id)
        .bind(&notification.watcher_id)
        .bind(notification.alert_type)
        .bind(notification.channel)
        .bind(notification.status)
        .bind(&notification.message)
        .bind(notification.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn recent_notifications(
        &self,
        watcher_id: &str,
        limit: i64,
    ) -> Result<Vec<Notification>> {
        let notifications = sqlx::query_as::<_, Notification>(
            r#"
            SELECT * FROM notifications WHERE watcher_id = ?
            ORDER BY created_at DESC, rowid DESC LIMIT ?
            "#,
        )
        .bind(watcher_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(notifications)
    }
}
