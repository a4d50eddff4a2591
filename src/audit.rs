use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::models::{SyncLogEntry, SyncStatus};
use crate::store::{AuditSink, ProductStore};
use crate::utils::error::Result;

pub const DEFAULT_HISTORY_LIMIT: u32 = 10;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncStats {
    pub total_sync_enabled: u64,
    pub last_24h_success: u64,
    pub last_24h_failed: u64,
}

/// Read-only view over the sync audit trail.
pub struct SyncAuditReader {
    store: Arc<dyn ProductStore>,
    audit: Arc<dyn AuditSink>,
}

impl SyncAuditReader {
    pub fn new(store: Arc<dyn ProductStore>, audit: Arc<dyn AuditSink>) -> Self {
        Self { store, audit }
    }

    /// Most recent attempts for a product, newest first.
    pub async fn history(&self, product_id: &str, limit: u32) -> Result<Vec<SyncLogEntry>> {
        self.audit.list_logs(product_id, limit).await
    }

    pub async fn stats(&self) -> Result<SyncStats> {
        let since = Utc::now() - Duration::hours(24);

        Ok(SyncStats {
            total_sync_enabled: self.store.count_sync_enabled().await?,
            last_24h_success: self.audit.count_since(SyncStatus::Success, since).await?,
            last_24h_failed: self.audit.count_since(SyncStatus::Failed, since).await?,
        })
    }
}
