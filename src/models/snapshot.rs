use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Normalized result of one extraction attempt. Never persisted on its own
/// and never reused across attempts.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ScrapedSnapshot {
    pub price: Option<Decimal>,
    pub original_price: Option<Decimal>,
    pub currency: String,
    pub in_stock: bool,
    /// True when an explicit availability signal was seen, false when `in_stock` is the extractor default.
    pub stock_signal: bool,
    pub stock_quantity: Option<u32>,
    pub title: Option<String>,
    pub image_url: Option<String>,
    pub observed_at: DateTime<Utc>,
}

impl ScrapedSnapshot {
    pub fn empty(currency: impl Into<String>) -> Self {
        Self {
            price: None,
            original_price: None,
            currency: currency.into(),
            in_stock: false,
            stock_signal: false,
            stock_quantity: None,
            title: None,
            image_url: None,
            observed_at: Utc::now(),
        }
    }

    /// Whether at least one field came from the page rather than a default.
    pub fn has_data(&self) -> bool {
        self.price.is_some()
            || self.original_price.is_some()
            || self.stock_signal
            || self.stock_quantity.is_some()
            || self.title.is_some()
            || self.image_url.is_some()
    }
}
