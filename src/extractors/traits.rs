use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use url::Url;

use crate::fetcher::PageFetcher;
use crate::models::ScrapedSnapshot;
use crate::utils::error::Result;

/// Marketplaces with a built-in extractor.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Amazon,
    Noon,
    Jumia,
}

impl Platform {
    pub const ALL: [Platform; 3] = [Platform::Amazon, Platform::Noon, Platform::Jumia];

    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Amazon => "amazon",
            Platform::Noon => "noon",
            Platform::Jumia => "jumia",
        }
    }

    /// Loose hostname classification, used for labeling even when no extractor is registered.
    pub fn from_url(url: &str) -> Option<Platform> {
        let host = host_of(url)?;
        Platform::ALL
            .into_iter()
            .find(|platform| host.contains(platform.as_str()))
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lowercased hostname of `url`, or `None` when it does not parse.
pub fn host_of(url: &str) -> Option<String> {
    Url::parse(url.trim())
        .ok()
        .and_then(|parsed| parsed.host_str().map(str::to_lowercase))
}

/// Contract every marketplace extractor implements.
///
/// Extractors never touch persistence: they turn a URL into a snapshot and
/// nothing else.
#[async_trait]
pub trait SourceExtractor: Send + Sync {
    /// Marketplace this extractor handles.
    fn platform(&self) -> Platform;

    fn name(&self) -> &str {
        self.platform().as_str()
    }

    /// Hostname ownership check. Malformed URLs are simply not owned.
    fn is_valid_url(&self, url: &str) -> bool;

    /// Turn a raw page body into a snapshot. Missing fields stay `None`; this never fails.
    fn parse(&self, body: &str) -> ScrapedSnapshot;

    fn fetcher(&self) -> &dyn PageFetcher;

    async fn fetch(&self, url: &str) -> Result<String> {
        self.fetcher().fetch(url).await
    }

    async fn scrape(&self, url: &str) -> Result<ScrapedSnapshot> {
        let body = self.fetch(url).await?;
        let snapshot = self.parse(&body);
        tracing::debug!(
            "{} parsed {}: price={:?} in_stock={} title={:?}",
            self.name(),
            url,
            snapshot.price,
            snapshot.in_stock,
            snapshot.title
        );
        Ok(snapshot)
    }
}
