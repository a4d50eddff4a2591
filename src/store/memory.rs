use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;

use super::{AuditSink, ProductStore};
use crate::models::{
    Product, ProductUpdate, ProductWithConfig, SyncConfig, SyncConfigUpdate, SyncLogEntry, SyncStatus,
};
use crate::utils::error::{AppError, Result};

/// Process-local store for tests and embedding.
#[derive(Default)]
pub struct InMemoryStore {
    products: RwLock<HashMap<String, Product>>,
    configs: RwLock<HashMap<String, SyncConfig>>,
    logs: RwLock<Vec<SyncLogEntry>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_product(&self, product: Product) {
        self.products.write().await.insert(product.id.clone(), product);
    }

    pub async fn insert_config(&self, config: SyncConfig) {
        self.configs.write().await.insert(config.product_id.clone(), config);
    }

    pub async fn product(&self, product_id: &str) -> Option<Product> {
        self.products.read().await.get(product_id).cloned()
    }

    pub async fn config(&self, product_id: &str) -> Option<SyncConfig> {
        self.configs.read().await.get(product_id).cloned()
    }

    /// Every log entry in insertion order.
    pub async fn logs(&self) -> Vec<SyncLogEntry> {
        self.logs.read().await.clone()
    }
}

#[async_trait]
impl ProductStore for InMemoryStore {
    async fn get_product_with_config(&self, product_id: &str) -> Result<Option<ProductWithConfig>> {
        let Some(product) = self.product(product_id).await else {
            return Ok(None);
        };
        let config = self.config(product_id).await;
        Ok(Some(ProductWithConfig { product, config }))
    }

    async fn update_product(&self, product_id: &str, update: &ProductUpdate) -> Result<()> {
        if update.is_empty() {
            return Ok(());
        }

        let mut products = self.products.write().await;
        let product = products.get_mut(product_id).ok_or(AppError::ProductNotFound)?;
        product.apply(update);
        Ok(())
    }

    async fn update_sync_config(&self, product_id: &str, update: &SyncConfigUpdate) -> Result<()> {
        let mut configs = self.configs.write().await;
        let config = configs
            .get_mut(product_id)
            .ok_or_else(|| AppError::Store(format!("no sync config for product {}", product_id)))?;

        if let Some(last_synced_at) = update.last_synced_at {
            config.last_synced_at = Some(last_synced_at);
        }
        Ok(())
    }

    async fn list_stale_enabled_configs(&self, older_than: DateTime<Utc>) -> Result<Vec<String>> {
        let configs = self.configs.read().await;
        let mut due: Vec<&SyncConfig> = configs
            .values()
            .filter(|config| config.sync_enabled && config.source_url().is_some())
            .filter(|config| config.last_synced_at.is_none_or(|last| last < older_than))
            .collect();

        // Never-synced first, then oldest first, matching the SQLite ordering.
        due.sort_by(|a, b| {
            a.last_synced_at
                .cmp(&b.last_synced_at)
                .then_with(|| a.product_id.cmp(&b.product_id))
        });
        Ok(due.into_iter().map(|config| config.product_id.clone()).collect())
    }

    async fn count_sync_enabled(&self) -> Result<u64> {
        let configs = self.configs.read().await;
        Ok(configs.values().filter(|config| config.sync_enabled).count() as u64)
    }
}

#[async_trait]
impl AuditSink for InMemoryStore {
    async fn append_log(&self, entry: &SyncLogEntry) -> Result<()> {
        self.logs.write().await.push(entry.clone());
        Ok(())
    }

    async fn list_logs(&self, product_id: &str, limit: u32) -> Result<Vec<SyncLogEntry>> {
        let logs = self.logs.read().await;
        Ok(logs
            .iter()
            .rev()
            .filter(|entry| entry.product_id == product_id)
            .take(limit as usize)
            .cloned()
            .collect())
    }

    async fn count_since(&self, status: SyncStatus, since: DateTime<Utc>) -> Result<u64> {
        let logs = self.logs.read().await;
        Ok(logs
            .iter()
            .filter(|entry| entry.status == status && entry.created_at >= since)
            .count() as u64)
    }
}
