// Integration tests for storefront-sync
// These tests drive the sync engine end to end over fixture pages

pub mod audit_tests;
pub mod batch_tests;
pub mod sqlite_store_tests;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use storefront_sync::config::{DatabaseConfig, SyncSettings};
use storefront_sync::fetcher::PageFetcher;
use storefront_sync::models::{
    Product, ProductUpdate, ProductWithConfig, StockStatus, SyncConfig, SyncConfigUpdate, SyncLogEntry, SyncStatus,
};
use storefront_sync::{AppError, AuditSink, ExtractorRegistry, InMemoryStore, ProductStore, SyncManager};

pub const AMAZON_URL: &str = "https://www.amazon.eg/dp/B0STROLLER";
pub const NOON_URL: &str = "https://www.noon.com/egypt-en/car-seat/N123/p/";
pub const JUMIA_URL: &str = "https://www.jumia.com.eg/graco-monitor-456.html";

/// Amazon listing at 90, in stock, no explicit quantity.
pub const AMAZON_IN_STOCK_90: &str = r#"<html><body>
    <span id="productTitle">Joie Pact Lite Stroller</span>
    <span class="a-price-whole">90</span>
    <div id="availability"><span>In Stock</span></div>
    <input id="add-to-cart-button" type="submit">
</body></html>"#;

/// Stale cached add-to-cart markup next to an unavailable notice.
pub const AMAZON_CONFLICTING_STOCK: &str = r#"<html><body>
    <span class="a-price-whole">90</span>
    <input id="add-to-cart-button" type="submit">
    <div id="availability"><span>Currently unavailable.</span></div>
</body></html>"#;

pub fn noon_page(price: &str) -> String {
    format!(r#"<html><body><h1>Car Seat</h1><div data-qa="price-now"><strong>EGP {}</strong></div></body></html>"#, price)
}

pub const JUMIA_PAGE: &str = r#"<html><body>
    <h1 class="-fs20 -pts">Graco Baby Monitor</h1>
    <span class="-b -ubpt -tal -fs24 -prxs">EGP 1,000</span>
    <p>3 units left</p>
</body></html>"#;

pub fn dec(value: &str) -> Decimal {
    value.parse().expect("decimal literal")
}

/// No pacing, no inter-request delay.
pub fn test_settings() -> SyncSettings {
    SyncSettings {
        inter_request_delay_ms: 0,
        min_host_spacing_ms: 0,
        ..SyncSettings::default()
    }
}

pub fn memory_database() -> DatabaseConfig {
    DatabaseConfig {
        url: "sqlite::memory:".to_string(),
        max_connections: 1,
        min_connections: 1,
        acquire_timeout: 10,
    }
}

pub fn product(id: &str, price: &str) -> Product {
    Product {
        id: id.to_string(),
        name: format!("Product {}", id),
        price: dec(price),
        stock_quantity: 0,
        stock_status: StockStatus::OutOfStock,
        images: vec![],
        source_price: None,
        source_stock: None,
        updated_at: Utc::now(),
    }
}

pub fn config(id: &str, url: &str, margin: &str) -> SyncConfig {
    let mut config = SyncConfig::new(id, Some(url.to_string()));
    config.price_margin = Some(dec(margin));
    config
}

pub async fn seed(store: &InMemoryStore, id: &str, price: &str, url: &str, margin: &str) {
    store.insert_product(product(id, price)).await;
    store.insert_config(config(id, url, margin)).await;
}

/// Serves recorded pages, counts requests and panics on demand.
#[derive(Default)]
pub struct FixtureFetcher {
    pages: Mutex<HashMap<String, String>>,
    panicking: Mutex<HashSet<String>>,
    requests: Mutex<Vec<String>>,
}

impl FixtureFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn page(self, url: &str, body: &str) -> Self {
        self.pages.lock().unwrap().insert(url.to_string(), body.to_string());
        self
    }

    pub fn panics_on(self, url: &str) -> Self {
        self.panicking.lock().unwrap().insert(url.to_string());
        self
    }

    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl PageFetcher for FixtureFetcher {
    async fn fetch(&self, url: &str) -> storefront_sync::Result<String> {
        self.requests.lock().unwrap().push(url.to_string());

        let should_panic = self.panicking.lock().unwrap().contains(url);
        if should_panic {
            panic!("parser blew up on {}", url);
        }

        let body = self.pages.lock().unwrap().get(url).cloned();
        body.ok_or_else(|| AppError::Fetch {
            url: url.to_string(),
            attempts: 3,
            message: "HTTP 503: Service Unavailable".to_string(),
        })
    }
}

pub fn manager(store: Arc<InMemoryStore>, fetcher: Arc<FixtureFetcher>, settings: SyncSettings) -> SyncManager {
    let registry = ExtractorRegistry::with_default_extractors(fetcher, &settings.home_currency);
    SyncManager::new(store.clone(), store, registry, settings)
}

/// Audit sink that rejects every write.
pub struct BrokenAuditSink;

#[async_trait]
impl AuditSink for BrokenAuditSink {
    async fn append_log(&self, _entry: &SyncLogEntry) -> storefront_sync::Result<()> {
        Err(AppError::Store("audit table is read-only".to_string()))
    }

    async fn list_logs(&self, _product_id: &str, _limit: u32) -> storefront_sync::Result<Vec<SyncLogEntry>> {
        Ok(Vec::new())
    }

    async fn count_since(&self, _status: SyncStatus, _since: DateTime<Utc>) -> storefront_sync::Result<u64> {
        Ok(0)
    }
}

/// Reads through to an in-memory store but fails every product write.
pub struct ReadOnlyProducts(pub Arc<InMemoryStore>);

#[async_trait]
impl ProductStore for ReadOnlyProducts {
    async fn get_product_with_config(&self, product_id: &str) -> storefront_sync::Result<Option<ProductWithConfig>> {
        self.0.get_product_with_config(product_id).await
    }

    async fn update_product(&self, _product_id: &str, _update: &ProductUpdate) -> storefront_sync::Result<()> {
        Err(AppError::Store("database is locked".to_string()))
    }

    async fn update_sync_config(&self, product_id: &str, update: &SyncConfigUpdate) -> storefront_sync::Result<()> {
        self.0.update_sync_config(product_id, update).await
    }

    async fn list_stale_enabled_configs(&self, older_than: DateTime<Utc>) -> storefront_sync::Result<Vec<String>> {
        self.0.list_stale_enabled_configs(older_than).await
    }

    async fn count_sync_enabled(&self) -> storefront_sync::Result<u64> {
        self.0.count_sync_enabled().await
    }
}
