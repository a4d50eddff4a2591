use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::models::{SyncStatus, SyncType, generate_id};

/// Append-only audit record, one per sync attempt.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
pub struct SyncLogEntry {
    pub id: String,
    pub product_id: String,
    pub sync_type: SyncType,
    pub old_value: Option<serde_json::Value>,
    pub new_value: Option<serde_json::Value>,
    pub status: SyncStatus,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewSyncLogEntry {
    pub product_id: String,
    pub sync_type: SyncType,
    pub old_value: Option<serde_json::Value>,
    pub new_value: Option<serde_json::Value>,
    pub status: SyncStatus,
    pub error_message: Option<String>,
}

impl SyncLogEntry {
    pub fn new(new_entry: NewSyncLogEntry) -> Self {
        Self {
            id: generate_id(),
            product_id: new_entry.product_id,
            sync_type: new_entry.sync_type,
            old_value: new_entry.old_value,
            new_value: new_entry.new_value,
            status: new_entry.status,
            error_message: new_entry.error_message,
            created_at: Utc::now(),
        }
    }
}
