use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("product not found")]
    ProductNotFound,

    #[error("no source configured")]
    NoSourceConfigured,

    #[error("no extractor available for this URL")]
    NoExtractor { url: String },

    /// The page was fetched but no field could be read from it.
    #[error("no product data extracted")]
    NoData,

    /// Network failure once every retry has been spent.
    #[error("fetch failed for {url} after {attempts} attempts: {message}")]
    Fetch {
        url: String,
        attempts: u32,
        message: String,
    },

    #[error("Store error: {0}")]
    Store(String),

    #[error("Scheduler error: {0}")]
    Scheduler(String),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        AppError::Validation(format!("{}", err))
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
