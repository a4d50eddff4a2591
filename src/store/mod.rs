//! Persistence seams consumed by the sync manager and the audit reader.
//!
//! The engine only ever talks to these two traits; [`SqliteStore`] and
//! [`InMemoryStore`] are the bundled implementations.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::models::{ProductUpdate, ProductWithConfig, SyncConfigUpdate, SyncLogEntry, SyncStatus};
use crate::utils::error::Result;

pub mod memory;
pub mod sqlite;

pub use memory::InMemoryStore;
pub use sqlite::SqliteStore;

#[async_trait]
pub trait ProductStore: Send + Sync {
    async fn get_product_with_config(&self, product_id: &str) -> Result<Option<ProductWithConfig>>;

    /// Write only the fields staged in `update`. An empty update is a no-op.
    async fn update_product(&self, product_id: &str, update: &ProductUpdate) -> Result<()>;

    async fn update_sync_config(&self, product_id: &str, update: &SyncConfigUpdate) -> Result<()>;

    /// Ids of products whose config is enabled, has a source URL and was
    /// never synced or last synced before `older_than`.
    async fn list_stale_enabled_configs(&self, older_than: DateTime<Utc>) -> Result<Vec<String>>;

    async fn count_sync_enabled(&self) -> Result<u64>;
}

/// Append-only sink for sync attempts.
#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn append_log(&self, entry: &SyncLogEntry) -> Result<()>;

    /// Most recent first.
    async fn list_logs(&self, product_id: &str, limit: u32) -> Result<Vec<SyncLogEntry>>;

    async fn count_since(&self, status: SyncStatus, since: DateTime<Utc>) -> Result<u64>;
}
