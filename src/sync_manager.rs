use chrono::Utc;
use futures::FutureExt;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::config::SyncSettings;
use crate::extractors::ExtractorRegistry;
use crate::models::{
    NewSyncLogEntry, Product, ProductUpdate, ProductWithConfig, ScrapedSnapshot, StockStatus, SyncConfig,
    SyncConfigUpdate, SyncLogEntry, SyncStatus, SyncType,
};
use crate::pacing::HostPacer;
use crate::store::{AuditSink, ProductStore};
use crate::utils::error::{AppError, Result};

pub const SYNC_DISABLED: &str = "sync disabled for this product";

/// Per-invocation overrides. `update_price`/`update_stock` replace the
/// product's config flags for this call only and are never persisted.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncOptions {
    #[serde(default)]
    pub force_update: bool,
    pub update_price: Option<bool>,
    pub update_stock: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncResult {
    pub product_id: String,
    pub status: SyncStatus,
    pub success: bool,
    pub price_updated: bool,
    pub stock_updated: bool,
    pub image_updated: bool,
    pub old_price: Option<Decimal>,
    pub new_price: Option<Decimal>,
    pub old_stock: Option<u32>,
    pub new_stock: Option<u32>,
    pub error: Option<String>,
    pub snapshot: Option<ScrapedSnapshot>,
}

impl SyncResult {
    fn new(product_id: &str, status: SyncStatus) -> Self {
        Self {
            product_id: product_id.to_string(),
            status,
            success: status == SyncStatus::Success,
            price_updated: false,
            stock_updated: false,
            image_updated: false,
            old_price: None,
            new_price: None,
            old_stock: None,
            new_stock: None,
            error: None,
            snapshot: None,
        }
    }

    pub fn failed(product_id: &str, error: impl Into<String>) -> Self {
        let mut result = Self::new(product_id, SyncStatus::Failed);
        result.error = Some(error.into());
        result
    }

    pub fn skipped(product_id: &str, reason: impl Into<String>) -> Self {
        let mut result = Self::new(product_id, SyncStatus::Skipped);
        result.error = Some(reason.into());
        result
    }
}

/// Aggregate outcome of a batch run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchSummary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
    pub price_updates: usize,
    pub stock_updates: usize,
}

impl BatchSummary {
    pub fn from_results(results: &[SyncResult]) -> Self {
        results.iter().fold(Self::default(), |mut summary, result| {
            summary.total += 1;
            match result.status {
                SyncStatus::Success => summary.succeeded += 1,
                SyncStatus::Failed => summary.failed += 1,
                SyncStatus::Skipped => summary.skipped += 1,
            }
            summary.price_updates += usize::from(result.price_updated);
            summary.stock_updates += usize::from(result.stock_updated);
            summary
        })
    }
}

/// Field writes computed from one snapshot, plus what changed.
#[derive(Debug, Default)]
struct SyncPlan {
    update: ProductUpdate,
    old_price: Option<Decimal>,
    new_price: Option<Decimal>,
    old_stock: Option<u32>,
    new_stock: Option<u32>,
    image_updated: bool,
}

impl SyncPlan {
    fn old_value(&self) -> serde_json::Value {
        json!({ "oldPrice": self.old_price, "oldStock": self.old_stock })
    }

    fn new_value(&self, snapshot: &ScrapedSnapshot) -> serde_json::Value {
        json!({
            "newPrice": self.new_price,
            "newStock": self.new_stock,
            "imageUpdated": self.image_updated,
            "scraped": snapshot,
        })
    }
}

/// What the audit entry needs, collected while an attempt progresses so a
/// failure part-way through still logs whatever was known.
struct AttemptTrace {
    sync_type: SyncType,
    old_value: Option<serde_json::Value>,
    new_value: Option<serde_json::Value>,
    snapshot: Option<ScrapedSnapshot>,
}

impl Default for AttemptTrace {
    fn default() -> Self {
        Self {
            sync_type: SyncType::Full,
            old_value: None,
            new_value: None,
            snapshot: None,
        }
    }
}

/// Keeps stored price and stock in step with each product's marketplace listing.
///
/// The only writer of product commercial fields in this crate. Every attempt
/// ends in a [`SyncResult`] and exactly one audit entry, whatever happens.
pub struct SyncManager {
    store: Arc<dyn ProductStore>,
    audit: Arc<dyn AuditSink>,
    registry: ExtractorRegistry,
    settings: SyncSettings,
    pacer: HostPacer,
}

impl SyncManager {
    pub fn new(
        store: Arc<dyn ProductStore>,
        audit: Arc<dyn AuditSink>,
        registry: ExtractorRegistry,
        settings: SyncSettings,
    ) -> Self {
        let pacer = HostPacer::new(settings.min_host_spacing());

        Self {
            store,
            audit,
            registry,
            settings,
            pacer,
        }
    }

    pub fn registry(&self) -> &ExtractorRegistry {
        &self.registry
    }

    pub fn settings(&self) -> &SyncSettings {
        &self.settings
    }

    /// Sync a single product. Never returns an error: every failure,
    /// including a panic inside the attempt, becomes a failed result.
    pub async fn sync_one(&self, product_id: &str, options: &SyncOptions) -> SyncResult {
        let started = Instant::now();
        let mut trace = AttemptTrace::default();

        let outcome = AssertUnwindSafe(self.attempt(product_id, options, &mut trace))
            .catch_unwind()
            .await;

        let mut result = match outcome {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => SyncResult::failed(product_id, e.to_string()),
            Err(panic) => SyncResult::failed(product_id, panic_message(panic)),
        };
        if result.snapshot.is_none() {
            result.snapshot = trace.snapshot.clone();
        }

        self.record(product_id, &trace, &result).await;

        match result.status {
            SyncStatus::Success => tracing::info!(
                "Synced product {} in {:?}: price_updated={} stock_updated={}",
                product_id,
                started.elapsed(),
                result.price_updated,
                result.stock_updated
            ),
            SyncStatus::Skipped => tracing::info!("Skipped product {}: {}", product_id, SYNC_DISABLED),
            SyncStatus::Failed => tracing::info!(
                "Sync failed for product {}: {}",
                product_id,
                result.error.as_deref().unwrap_or("unknown error")
            ),
        }

        result
    }

    async fn attempt(&self, product_id: &str, options: &SyncOptions, trace: &mut AttemptTrace) -> Result<SyncResult> {
        let ProductWithConfig { product, config } = self
            .store
            .get_product_with_config(product_id)
            .await?
            .ok_or(AppError::ProductNotFound)?;

        let config = config.ok_or(AppError::NoSourceConfigured)?;
        let source_url = config.source_url().ok_or(AppError::NoSourceConfigured)?.to_string();

        let update_price = options.update_price.unwrap_or(config.auto_update_price);
        let update_stock = options.update_stock.unwrap_or(config.auto_update_stock);
        trace.sync_type = SyncType::from_flags(update_price, update_stock);

        if !config.sync_enabled && !options.force_update {
            return Ok(SyncResult::skipped(product_id, SYNC_DISABLED));
        }

        let extractor = self
            .registry
            .get_extractor(&source_url)
            .ok_or_else(|| AppError::NoExtractor { url: source_url.clone() })?;

        self.pacer.wait_if_needed(&source_url).await;
        let snapshot = extractor.scrape(&source_url).await?;
        trace.snapshot = Some(snapshot.clone());

        if !snapshot.has_data() {
            tracing::warn!(
                "{} returned no product data for {} ({})",
                extractor.name(),
                product_id,
                source_url
            );
            trace.new_value = Some(json!({ "scraped": snapshot }));
            return Err(AppError::NoData);
        }

        let plan = self.plan(&product, &config, &snapshot, update_price, update_stock)?;
        trace.old_value = Some(plan.old_value());
        trace.new_value = Some(plan.new_value(&snapshot));

        self.store.update_product(product_id, &plan.update).await?;
        self.store
            .update_sync_config(
                product_id,
                &SyncConfigUpdate {
                    last_synced_at: Some(Utc::now()),
                },
            )
            .await?;

        let mut result = SyncResult::new(product_id, SyncStatus::Success);
        result.price_updated = plan.new_price.is_some();
        result.stock_updated = plan.new_stock.is_some();
        result.image_updated = plan.image_updated;
        result.old_price = plan.old_price;
        result.new_price = plan.new_price;
        result.old_stock = plan.old_stock;
        result.new_stock = plan.new_stock;
        result.snapshot = Some(snapshot);
        Ok(result)
    }

    fn plan(
        &self,
        product: &Product,
        config: &SyncConfig,
        snapshot: &ScrapedSnapshot,
        update_price: bool,
        update_stock: bool,
    ) -> Result<SyncPlan> {
        let mut plan = SyncPlan::default();
        let observed_stock = self.observed_quantity(snapshot);

        plan.update.source_price = snapshot.price;
        plan.update.source_stock = Some(observed_stock);

        if update_price {
            if let Some(source_price) = snapshot.price {
                let margin = config.price_margin.unwrap_or(self.settings.default_price_margin);
                let new_price = apply_margin(source_price, margin)?;
                if new_price != product.price {
                    plan.old_price = Some(product.price);
                    plan.new_price = Some(new_price);
                    plan.update.price = Some(new_price);
                }
            }
        }

        if update_stock && observed_stock != product.stock_quantity {
            plan.old_stock = Some(product.stock_quantity);
            plan.new_stock = Some(observed_stock);
            plan.update.stock_quantity = Some(observed_stock);
            plan.update.stock_status = Some(StockStatus::from_quantity(
                observed_stock,
                self.settings.low_stock_threshold,
            ));
        }

        if let Some(image_url) = snapshot.image_url.as_deref() {
            if product.primary_image() != Some(image_url) {
                plan.update.images = Some(replace_primary_image(&product.images, image_url));
                plan.image_updated = true;
            }
        }

        Ok(plan)
    }

    /// Quantity implied by a snapshot: the scraped count when in stock, the
    /// assumed quantity when in stock without a count, zero otherwise.
    fn observed_quantity(&self, snapshot: &ScrapedSnapshot) -> u32 {
        if !snapshot.in_stock {
            return 0;
        }
        snapshot
            .stock_quantity
            .filter(|quantity| *quantity > 0)
            .unwrap_or(self.settings.assumed_in_stock_quantity)
    }

    async fn record(&self, product_id: &str, trace: &AttemptTrace, result: &SyncResult) {
        let entry = SyncLogEntry::new(NewSyncLogEntry {
            product_id: product_id.to_string(),
            sync_type: trace.sync_type,
            old_value: trace.old_value.clone(),
            new_value: trace.new_value.clone(),
            status: result.status,
            error_message: result.error.clone(),
        });

        if let Err(e) = self.audit.append_log(&entry).await {
            tracing::warn!("Failed to write sync log for product {}: {}", product_id, e);
        }
    }

    /// Sync products one after another with the configured delay between them.
    pub async fn sync_many(&self, product_ids: &[String], options: &SyncOptions) -> Vec<SyncResult> {
        self.sync_many_with_cancel(product_ids, options, &CancellationToken::new())
            .await
    }

    /// Like [`sync_many`](Self::sync_many), but stops between products once
    /// `cancel` fires. A product already in flight always finishes. Results
    /// cover only the products that were attempted.
    pub async fn sync_many_with_cancel(
        &self,
        product_ids: &[String],
        options: &SyncOptions,
        cancel: &CancellationToken,
    ) -> Vec<SyncResult> {
        let mut results = Vec::with_capacity(product_ids.len());

        for (index, product_id) in product_ids.iter().enumerate() {
            if index > 0 {
                tokio::select! {
                    _ = cancel.cancelled() => {}
                    _ = tokio::time::sleep(self.settings.inter_request_delay()) => {}
                }
            }
            if cancel.is_cancelled() {
                tracing::warn!(
                    "Batch cancelled after {} of {} products",
                    results.len(),
                    product_ids.len()
                );
                break;
            }

            results.push(self.sync_one(product_id, options).await);
        }

        results
    }

    pub async fn sync_stale(&self, options: &SyncOptions) -> Result<Vec<SyncResult>> {
        self.sync_stale_with_cancel(options, &CancellationToken::new())
            .await
    }

    /// Sync every enabled product with a source that was never synced or
    /// not synced within the staleness window. Fails with
    /// [`AppError::Cancelled`] when `cancel` has already fired.
    pub async fn sync_stale_with_cancel(
        &self,
        options: &SyncOptions,
        cancel: &CancellationToken,
    ) -> Result<Vec<SyncResult>> {
        if cancel.is_cancelled() {
            return Err(AppError::Cancelled);
        }

        let older_than = Utc::now() - self.settings.stale_after();
        let product_ids = self.store.list_stale_enabled_configs(older_than).await?;

        if product_ids.is_empty() {
            tracing::info!("No stale products to sync");
            return Ok(Vec::new());
        }

        tracing::info!("Syncing {} stale products", product_ids.len());
        let results = self.sync_many_with_cancel(&product_ids, options, cancel).await;
        let summary = BatchSummary::from_results(&results);
        tracing::info!(
            "Stale sync finished: {} succeeded, {} failed, {} skipped",
            summary.succeeded,
            summary.failed,
            summary.skipped
        );
        Ok(results)
    }
}

/// `source * (1 + margin / 100)`, rounded to a whole unit, halves away from zero.
pub fn apply_margin(source_price: Decimal, margin_percent: Decimal) -> Result<Decimal> {
    let factor = Decimal::ONE + margin_percent / Decimal::ONE_HUNDRED;
    source_price
        .checked_mul(factor)
        .map(|price| price.round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero))
        .ok_or_else(|| AppError::Internal(format!("price overflow applying {}% to {}", margin_percent, source_price)))
}

/// New image list with `primary` first and the previous non-primary images kept in order.
pub fn replace_primary_image(images: &[String], primary: &str) -> Vec<String> {
    std::iter::once(primary.to_string())
        .chain(images.iter().skip(1).filter(|image| *image != primary).cloned())
        .collect()
}

fn panic_message(panic: Box<dyn Any + Send>) -> String {
    let detail = panic
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string());
    format!("sync attempt panicked: {}", detail)
}
