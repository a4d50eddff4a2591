use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE, HeaderMap, HeaderValue, USER_AGENT};
use std::future::Future;
use std::time::Duration;
use tokio_retry::Retry;
use tokio_retry::strategy::ExponentialBackoff;

use crate::config::ScraperConfig;
use crate::utils::error::{AppError, Result};

/// Source of raw page bodies. Implementations own their retry and timeout policy.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<String>;
}

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub attempts: u32,
    /// Deadline for each individual attempt.
    pub timeout: Duration,
    /// Delay after the first failure; doubles after each further failure.
    pub backoff_base: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &ScraperConfig) -> Self {
        Self {
            attempts: config.retry_attempts.max(1),
            timeout: config.request_timeout(),
            backoff_base: config.backoff_base(),
        }
    }

    /// Sleeps between attempts: `base`, `2 * base`, `4 * base`, ... one fewer than `attempts`.
    pub fn delays(&self) -> impl Iterator<Item = Duration> {
        let base_ms = u64::try_from(self.backoff_base.as_millis()).unwrap_or(u64::MAX);
        // 2^n * base / 2
        ExponentialBackoff::from_millis(2)
            .factor(base_ms)
            .map(|delay| delay / 2)
            .take(self.attempts.saturating_sub(1) as usize)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&ScraperConfig::default())
    }
}

/// Run `op` until it succeeds or `policy.attempts` is spent, bounding each
/// attempt by `policy.timeout` and sleeping with exponential backoff between attempts.
pub async fn with_retry<T, F, Fut>(policy: &RetryPolicy, url: &str, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let attempts = policy.attempts.max(1);
    let timeout = policy.timeout;
    let mut attempt = 0u32;

    let action = || {
        attempt += 1;
        let current = attempt;
        tracing::debug!("Fetching {} (attempt {}/{})", url, current, attempts);
        let request = op();

        async move {
            let outcome = match tokio::time::timeout(timeout, request).await {
                Ok(Ok(value)) => Ok(value),
                Ok(Err(e)) => Err(e.to_string()),
                Err(_) => Err(format!("request timed out after {}s", timeout.as_secs())),
            };
            outcome.inspect_err(|message| {
                if current < attempts {
                    tracing::warn!("Fetch attempt {}/{} for {} failed: {}; retrying", current, attempts, url, message);
                }
            })
        }
    };

    Retry::spawn(policy.delays(), action)
        .await
        .map_err(|message| AppError::Fetch {
            url: url.to_string(),
            attempts,
            message,
        })
}

/// reqwest-backed fetcher sending browser-like headers.
pub struct HttpFetcher {
    client: Client,
    policy: RetryPolicy,
}

impl HttpFetcher {
    pub fn new(config: &ScraperConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&config.user_agent)
                .map_err(|e| AppError::Validation(format!("Invalid user agent: {}", e)))?,
        );
        headers.insert(
            ACCEPT_LANGUAGE,
            HeaderValue::from_str(&config.accept_language)
                .map_err(|e| AppError::Validation(format!("Invalid accept language: {}", e)))?,
        );
        headers.insert(ACCEPT, HeaderValue::from_static("text/html,application/xhtml+xml"));

        let policy = RetryPolicy::from_config(config);
        let client = Client::builder()
            .default_headers(headers)
            .timeout(policy.timeout)
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()?;

        Ok(Self { client, policy })
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    async fn fetch_once(&self, url: &str) -> Result<String> {
        let response = self.client.get(url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::Internal(format!(
                "HTTP {}: {}",
                status.as_u16(),
                status.canonical_reason().unwrap_or("unexpected status")
            )));
        }

        Ok(response.text().await?)
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<String> {
        with_retry(&self.policy, url, || self.fetch_once(url)).await
    }
}

/// Serves canned bodies by URL. Unknown URLs fail like an exhausted fetch.
#[derive(Debug, Default)]
pub struct StaticFetcher {
    pages: std::sync::RwLock<std::collections::HashMap<String, String>>,
}

impl StaticFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page(self, url: &str, body: &str) -> Self {
        self.set_page(url, body);
        self
    }

    pub fn set_page(&self, url: &str, body: &str) {
        if let Ok(mut pages) = self.pages.write() {
            pages.insert(url.to_string(), body.to_string());
        }
    }
}

#[async_trait]
impl PageFetcher for StaticFetcher {
    async fn fetch(&self, url: &str) -> Result<String> {
        let body = self.pages.read().ok().and_then(|pages| pages.get(url).cloned());
        body.ok_or_else(|| AppError::Fetch {
            url: url.to_string(),
            attempts: 1,
            message: "no page recorded for this URL".to_string(),
        })
    }
}
