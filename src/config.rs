use config::{Config, ConfigError, Environment, File};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;
use validator::Validate;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub scraper: ScraperConfig,
    pub sync: SyncSettings,
    pub scheduler: SchedulerConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct DatabaseConfig {
    pub url: String,
    #[validate(range(min = 1))]
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout: u64,
}

/// Fetch behaviour shared by every source extractor.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ScraperConfig {
    #[validate(range(min = 1, max = 120))]
    pub request_timeout_secs: u64,
    #[validate(range(min = 1, max = 10))]
    pub retry_attempts: u32,
    pub backoff_base_ms: u64,
    #[validate(length(min = 1))]
    pub user_agent: String,
    pub accept_language: String,
}

impl ScraperConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn backoff_base(&self) -> Duration {
        Duration::from_millis(self.backoff_base_ms)
    }
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: 10,
            retry_attempts: 3,
            backoff_base_ms: 1000,
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36".to_string(),
            accept_language: "en-US,en;q=0.9,ar;q=0.8".to_string(),
        }
    }
}

/// Orchestrator tunables.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SyncSettings {
    /// Percent markup for products without their own margin. A value outside
    /// the decimal range fails to load.
    pub default_price_margin: Decimal,
    pub assumed_in_stock_quantity: u32,
    #[validate(range(min = 1))]
    pub low_stock_threshold: u32,
    pub inter_request_delay_ms: u64,
    pub min_host_spacing_ms: u64,
    #[validate(range(min = 1))]
    pub stale_after_hours: i64,
    #[validate(length(equal = 3))]
    pub home_currency: String,
}

impl SyncSettings {
    pub fn inter_request_delay(&self) -> Duration {
        Duration::from_millis(self.inter_request_delay_ms)
    }

    pub fn min_host_spacing(&self) -> Duration {
        Duration::from_millis(self.min_host_spacing_ms)
    }

    pub fn stale_after(&self) -> chrono::Duration {
        chrono::Duration::hours(self.stale_after_hours)
    }
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            default_price_margin: Decimal::from(20),
            assumed_in_stock_quantity: 99,
            low_stock_threshold: 5,
            inter_request_delay_ms: 2000,
            min_host_spacing_ms: 2000,
            stale_after_hours: 24,
            home_currency: "EGP".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    pub enabled: bool,
    /// Six-field cron (seconds first), as tokio-cron-scheduler expects.
    pub stale_sync_cron: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub filter: String,
    pub directory: Option<String>,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());
        let scraper = ScraperConfig::default();
        let sync = SyncSettings::default();

        let s = Config::builder()
            .set_default("database.url", "sqlite://data/storefront.db?mode=rwc")?
            .set_default("database.max_connections", 5)?
            .set_default("database.min_connections", 1)?
            .set_default("database.acquire_timeout", 30)?
            .set_default("scraper.request_timeout_secs", scraper.request_timeout_secs)?
            .set_default("scraper.retry_attempts", scraper.retry_attempts)?
            .set_default("scraper.backoff_base_ms", scraper.backoff_base_ms)?
            .set_default("scraper.user_agent", scraper.user_agent)?
            .set_default("scraper.accept_language", scraper.accept_language)?
            .set_default("sync.default_price_margin", sync.default_price_margin.to_string())?
            .set_default("sync.assumed_in_stock_quantity", sync.assumed_in_stock_quantity)?
            .set_default("sync.low_stock_threshold", sync.low_stock_threshold)?
            .set_default("sync.inter_request_delay_ms", sync.inter_request_delay_ms)?
            .set_default("sync.min_host_spacing_ms", sync.min_host_spacing_ms)?
            .set_default("sync.stale_after_hours", sync.stale_after_hours)?
            .set_default("sync.home_currency", sync.home_currency)?
            .set_default("scheduler.enabled", true)?
            .set_default("scheduler.stale_sync_cron", "0 0 */6 * * *")?
            .set_default("logging.filter", "storefront_sync=info")?
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", run_mode)).required(false))
            // Local overrides (ignored by git)
            .add_source(File::with_name("config/local").required(false))
            .add_source(Environment::with_prefix("STOREFRONT_SYNC").separator("__"))
            .build()?;

        let config: AppConfig = s.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for result in [
            self.database.validate(),
            self.scraper.validate(),
            self.sync.validate(),
        ] {
            result.map_err(|e| ConfigError::Message(e.to_string()))?;
        }

        if self.database.min_connections > self.database.max_connections {
            return Err(ConfigError::Message("Database min_connections cannot exceed max_connections".into()));
        }

        if self.sync.default_price_margin < Decimal::ZERO {
            return Err(ConfigError::Message("Sync default_price_margin cannot be negative".into()));
        }

        if !self.sync.home_currency.chars().all(|c| c.is_ascii_uppercase()) {
            return Err(ConfigError::Message("Sync home_currency must be an ISO code such as EGP".into()));
        }

        if !is_valid_cron(&self.scheduler.stale_sync_cron) {
            return Err(ConfigError::Message("Invalid cron expression in scheduler.stale_sync_cron".into()));
        }

        Ok(())
    }
}

/// Basic shape check for a six-field cron expression (sec min hour day month weekday).
pub fn is_valid_cron(cron_expr: &str) -> bool {
    let parts: Vec<&str> = cron_expr.split_whitespace().collect();
    if parts.len() != 6 {
        return false;
    }

    parts.iter().all(|part| {
        part.chars()
            .all(|c| c.is_ascii_digit() || c == '*' || c == '-' || c == ',' || c == '/' || c == '?')
    })
}
