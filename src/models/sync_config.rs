use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Per-product synchronization settings, one-to-one with a product.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SyncConfig {
    pub product_id: String,
    pub source_url: Option<String>,
    pub sync_enabled: bool,
    pub auto_update_price: bool,
    pub auto_update_stock: bool,
    pub last_synced_at: Option<DateTime<Utc>>,
    /// Percentage markup over the observed source price. Falls back to the engine default.
    pub price_margin: Option<Decimal>,
}

impl SyncConfig {
    pub fn new(product_id: impl Into<String>, source_url: Option<String>) -> Self {
        Self {
            product_id: product_id.into(),
            source_url,
            sync_enabled: true,
            auto_update_price: true,
            auto_update_stock: true,
            last_synced_at: None,
            price_margin: None,
        }
    }

    /// The configured source URL, treating a blank string as absent.
    pub fn source_url(&self) -> Option<&str> {
        self.source_url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
    }

    pub fn is_stale(&self, now: DateTime<Utc>, window: Duration) -> bool {
        match self.last_synced_at {
            Some(last) => last < now - window,
            None => true,
        }
    }

    /// Enabled, has a source, and has not been synced within `window`.
    pub fn is_due(&self, now: DateTime<Utc>, window: Duration) -> bool {
        self.sync_enabled && self.source_url().is_some() && self.is_stale(now, window)
    }
}

/// Config fields the orchestrator is allowed to write.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SyncConfigUpdate {
    pub last_synced_at: Option<DateTime<Utc>>,
}
