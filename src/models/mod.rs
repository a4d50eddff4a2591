use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub mod product;
pub mod snapshot;
pub mod sync_config;
pub mod sync_log;

// Re-exports for convenience
pub use product::*;
pub use snapshot::*;
pub use sync_config::*;
pub use sync_log::*;

/// Derived availability classification of a stored quantity.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, sqlx::Type)]
#[serde(rename_all = "kebab-case")]
#[sqlx(type_name = "TEXT")]
pub enum StockStatus {
    #[sqlx(rename = "in-stock")]
    InStock,
    #[sqlx(rename = "low-stock")]
    LowStock,
    #[sqlx(rename = "out-of-stock")]
    OutOfStock,
}

impl StockStatus {
    /// `0` is out of stock, anything below `low_threshold` is low, the rest is in stock.
    pub fn from_quantity(quantity: u32, low_threshold: u32) -> Self {
        if quantity == 0 {
            StockStatus::OutOfStock
        } else if quantity < low_threshold {
            StockStatus::LowStock
        } else {
            StockStatus::InStock
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "TEXT")]
pub enum SyncType {
    #[sqlx(rename = "price")]
    Price,
    #[sqlx(rename = "stock")]
    Stock,
    #[sqlx(rename = "full")]
    Full,
}

impl SyncType {
    pub fn from_flags(update_price: bool, update_stock: bool) -> Self {
        match (update_price, update_stock) {
            (true, false) => SyncType::Price,
            (false, true) => SyncType::Stock,
            _ => SyncType::Full,
        }
    }
}

/// Terminal state of one sync attempt.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "TEXT")]
pub enum SyncStatus {
    #[sqlx(rename = "success")]
    Success,
    #[sqlx(rename = "failed")]
    Failed,
    #[sqlx(rename = "skipped")]
    Skipped,
}

pub fn generate_id() -> String {
    Uuid::new_v4().simple().to_string()
}
