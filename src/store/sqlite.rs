use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::types::Json;
use sqlx::{FromRow, Row, SqlitePool};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use super::{AuditSink, ProductStore};
use crate::config::DatabaseConfig;
use crate::models::{
    Product, ProductUpdate, ProductWithConfig, SyncConfig, SyncConfigUpdate, SyncLogEntry, SyncStatus,
};
use crate::utils::error::{AppError, Result};

/// SQLite-backed product, config and audit storage.
///
/// Prices and margins are stored as decimal text so nothing is lost to
/// floating point; enums are stored as their kebab/lowercase names.
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        let in_memory = config.url.contains(":memory:");
        if !in_memory {
            ensure_parent_dir(&config.url)?;
        }

        let options = SqliteConnectOptions::from_str(&config.url)?
            .create_if_missing(true)
            .foreign_keys(true);

        // Every in-memory connection is its own database, so keep exactly one alive.
        let mut pool_options = SqlitePoolOptions::new()
            .acquire_timeout(Duration::from_secs(config.acquire_timeout));
        pool_options = if in_memory {
            pool_options
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            pool_options
                .max_connections(config.max_connections)
                .min_connections(config.min_connections)
        };

        let pool = pool_options.connect_with(options).await?;
        tracing::debug!("Connected to {}", config.url);
        Ok(Self { pool })
    }

    pub fn from_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Create the products, product_sync_config and sync_logs tables if missing.
    pub async fn init_schema(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| AppError::Store(format!("schema migration failed: {}", e)))?;
        Ok(())
    }

    /// Insert or replace a catalog product. Catalog management owns products;
    /// this exists for seeding and tests.
    pub async fn upsert_product(&self, product: &Product) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO products (id, name, price, stock_quantity, stock_status, images, source_price, source_stock, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                price = excluded.price,
                stock_quantity = excluded.stock_quantity,
                stock_status = excluded.stock_status,
                images = excluded.images,
                source_price = excluded.source_price,
                source_stock = excluded.source_stock,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&product.id)
        .bind(&product.name)
        .bind(product.price.to_string())
        .bind(i64::from(product.stock_quantity))
        .bind(product.stock_status)
        .bind(Json(&product.images))
        .bind(product.source_price.map(|p| p.to_string()))
        .bind(product.source_stock.map(i64::from))
        .bind(product.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn upsert_sync_config(&self, config: &SyncConfig) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO product_sync_config (product_id, source_url, sync_enabled, auto_update_price, auto_update_stock, last_synced_at, price_margin)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(product_id) DO UPDATE SET
                source_url = excluded.source_url,
                sync_enabled = excluded.sync_enabled,
                auto_update_price = excluded.auto_update_price,
                auto_update_stock = excluded.auto_update_stock,
                last_synced_at = excluded.last_synced_at,
                price_margin = excluded.price_margin
            "#,
        )
        .bind(&config.product_id)
        .bind(config.source_url.as_deref())
        .bind(config.sync_enabled)
        .bind(config.auto_update_price)
        .bind(config.auto_update_stock)
        .bind(config.last_synced_at)
        .bind(config.price_margin.map(|m| m.to_string()))
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

fn ensure_parent_dir(url: &str) -> Result<()> {
    let path = url
        .trim_start_matches("sqlite://")
        .trim_start_matches("sqlite:")
        .split('?')
        .next()
        .unwrap_or_default();

    if let Some(parent) = Path::new(path).parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    Ok(())
}

fn decode_error(column: &str, source: impl std::error::Error + Send + Sync + 'static) -> sqlx::Error {
    sqlx::Error::ColumnDecode {
        index: column.to_string(),
        source: Box::new(source),
    }
}

// Decimals live in TEXT columns, which sqlx cannot decode for SQLite on its own.
fn decimal_column(row: &SqliteRow, column: &str) -> sqlx::Result<Option<Decimal>> {
    let raw: Option<String> = row.try_get(column)?;
    raw.map(|text| Decimal::from_str(&text).map_err(|e| decode_error(column, e)))
        .transpose()
}

fn count_column(row: &SqliteRow, column: &str) -> sqlx::Result<Option<u32>> {
    let raw: Option<i64> = row.try_get(column)?;
    raw.map(|value| u32::try_from(value).map_err(|e| decode_error(column, e)))
        .transpose()
}

impl FromRow<'_, SqliteRow> for Product {
    fn from_row(row: &SqliteRow) -> sqlx::Result<Self> {
        let Json(images): Json<Vec<String>> = row.try_get("images")?;

        Ok(Product {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            price: decimal_column(row, "price")?.unwrap_or_default(),
            stock_quantity: count_column(row, "stock_quantity")?.unwrap_or(0),
            stock_status: row.try_get("stock_status")?,
            images,
            source_price: decimal_column(row, "source_price")?,
            source_stock: count_column(row, "source_stock")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

impl FromRow<'_, SqliteRow> for SyncConfig {
    fn from_row(row: &SqliteRow) -> sqlx::Result<Self> {
        Ok(SyncConfig {
            product_id: row.try_get("product_id")?,
            source_url: row.try_get("source_url")?,
            sync_enabled: row.try_get("sync_enabled")?,
            auto_update_price: row.try_get("auto_update_price")?,
            auto_update_stock: row.try_get("auto_update_stock")?,
            last_synced_at: row.try_get("last_synced_at")?,
            price_margin: decimal_column(row, "price_margin")?,
        })
    }
}

#[async_trait]
impl ProductStore for SqliteStore {
    async fn get_product_with_config(&self, product_id: &str) -> Result<Option<ProductWithConfig>> {
        let Some(product) = sqlx::query_as::<_, Product>("SELECT * FROM products WHERE id = ?")
            .bind(product_id)
            .fetch_optional(&self.pool)
            .await?
        else {
            return Ok(None);
        };

        let config = sqlx::query_as::<_, SyncConfig>("SELECT * FROM product_sync_config WHERE product_id = ?")
            .bind(product_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(Some(ProductWithConfig { product, config }))
    }

    async fn update_product(&self, product_id: &str, update: &ProductUpdate) -> Result<()> {
        if update.is_empty() {
            return Ok(());
        }

        let result = sqlx::query(
            r#"
            UPDATE products SET
                price = COALESCE(?, price),
                stock_quantity = COALESCE(?, stock_quantity),
                stock_status = COALESCE(?, stock_status),
                images = COALESCE(?, images),
                source_price = COALESCE(?, source_price),
                source_stock = COALESCE(?, source_stock),
                updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(update.price.map(|p| p.to_string()))
        .bind(update.stock_quantity.map(i64::from))
        .bind(update.stock_status)
        .bind(update.images.as_ref().map(Json))
        .bind(update.source_price.map(|p| p.to_string()))
        .bind(update.source_stock.map(i64::from))
        .bind(Utc::now())
        .bind(product_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::ProductNotFound);
        }
        Ok(())
    }

    async fn update_sync_config(&self, product_id: &str, update: &SyncConfigUpdate) -> Result<()> {
        let result = sqlx::query(
            "UPDATE product_sync_config SET last_synced_at = COALESCE(?, last_synced_at) WHERE product_id = ?",
        )
        .bind(update.last_synced_at)
        .bind(product_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::Store(format!("no sync config for product {}", product_id)));
        }
        Ok(())
    }

    async fn list_stale_enabled_configs(&self, older_than: DateTime<Utc>) -> Result<Vec<String>> {
        let rows = sqlx::query(
            r#"
            SELECT product_id FROM product_sync_config
            WHERE sync_enabled = 1
              AND source_url IS NOT NULL AND TRIM(source_url) != ''
              AND (last_synced_at IS NULL OR last_synced_at < ?)
            ORDER BY last_synced_at IS NOT NULL, last_synced_at, product_id
            "#,
        )
        .bind(older_than)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| row.try_get("product_id").map_err(AppError::from))
            .collect()
    }

    async fn count_sync_enabled(&self) -> Result<u64> {
        let row = sqlx::query("SELECT COUNT(*) AS count FROM product_sync_config WHERE sync_enabled = 1")
            .fetch_one(&self.pool)
            .await?;
        let count: i64 = row.try_get("count")?;
        Ok(count.max(0) as u64)
    }
}

#[async_trait]
impl AuditSink for SqliteStore {
    async fn append_log(&self, entry: &SyncLogEntry) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO sync_logs (id, product_id, sync_type, old_value, new_value, status, error_message, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&entry.id)
        .bind(&entry.product_id)
        .bind(entry.sync_type)
        .bind(entry.old_value.as_ref().map(Json))
        .bind(entry.new_value.as_ref().map(Json))
        .bind(entry.status)
        .bind(entry.error_message.as_deref())
        .bind(entry.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_logs(&self, product_id: &str, limit: u32) -> Result<Vec<SyncLogEntry>> {
        let entries = sqlx::query_as::<_, SyncLogEntry>(
            "SELECT * FROM sync_logs WHERE product_id = ? ORDER BY created_at DESC, rowid DESC LIMIT ?",
        )
        .bind(product_id)
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;
        Ok(entries)
    }

    async fn count_since(&self, status: SyncStatus, since: DateTime<Utc>) -> Result<u64> {
        let row = sqlx::query("SELECT COUNT(*) AS count FROM sync_logs WHERE status = ? AND created_at >= ?")
            .bind(status)
            .bind(since)
            .fetch_one(&self.pool)
            .await?;
        let count: i64 = row.try_get("count")?;
        Ok(count.max(0) as u64)
    }
}
