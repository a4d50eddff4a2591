use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::models::{StockStatus, SyncConfig};

/// Catalog product as seen by the sync engine. Only the commercial fields
/// below are ever written from here.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Product {
    pub id: String,
    pub name: String,
    pub price: Decimal,
    pub stock_quantity: u32,
    pub stock_status: StockStatus,
    pub images: Vec<String>,

    // Last raw values observed on the marketplace, kept apart from the public price
    pub source_price: Option<Decimal>,
    pub source_stock: Option<u32>,

    pub updated_at: DateTime<Utc>,
}

impl Product {
    pub fn primary_image(&self) -> Option<&str> {
        self.images.first().map(String::as_str)
    }

    pub fn apply(&mut self, update: &ProductUpdate) {
        if let Some(price) = update.price {
            self.price = price;
        }
        if let Some(quantity) = update.stock_quantity {
            self.stock_quantity = quantity;
        }
        if let Some(status) = update.stock_status {
            self.stock_status = status;
        }
        if let Some(images) = &update.images {
            self.images = images.clone();
        }
        if let Some(source_price) = update.source_price {
            self.source_price = Some(source_price);
        }
        if let Some(source_stock) = update.source_stock {
            self.source_stock = Some(source_stock);
        }

        self.updated_at = Utc::now();
    }
}

/// Field-level changes staged by one sync attempt. `None` leaves a field untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ProductUpdate {
    pub price: Option<Decimal>,
    pub stock_quantity: Option<u32>,
    pub stock_status: Option<StockStatus>,
    pub images: Option<Vec<String>>,
    pub source_price: Option<Decimal>,
    pub source_stock: Option<u32>,
}

impl ProductUpdate {
    pub fn is_empty(&self) -> bool {
        self.price.is_none()
            && self.stock_quantity.is_none()
            && self.stock_status.is_none()
            && self.images.is_none()
            && self.source_price.is_none()
            && self.source_stock.is_none()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProductWithConfig {
    pub product: Product,
    pub config: Option<SyncConfig>,
}
