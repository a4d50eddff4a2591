pub mod audit;
pub mod config;
pub mod extractors;
pub mod fetcher;
pub mod models;
pub mod pacing;
pub mod scheduler;
pub mod store;
pub mod sync_manager;
pub mod utils;

// Re-export commonly used types
pub use audit::{SyncAuditReader, SyncStats};
pub use config::AppConfig;
pub use extractors::{ExtractorRegistry, Platform, SourceExtractor};
pub use fetcher::{HttpFetcher, PageFetcher};
pub use store::{AuditSink, InMemoryStore, ProductStore, SqliteStore};
pub use sync_manager::{BatchSummary, SyncManager, SyncOptions, SyncResult};
pub use utils::error::{AppError, Result};
