use std::sync::Arc;

use super::marketplaces::{AmazonExtractor, JumiaExtractor, NoonExtractor};
use super::traits::{Platform, SourceExtractor};
use crate::fetcher::PageFetcher;

pub type ExtractorBox = Box<dyn SourceExtractor>;

/// Name → extractor mapping, built once at startup and handed to the sync manager.
///
/// Lookup walks extractors in registration order, so if two ever claim the
/// same URL the first one registered wins.
#[derive(Default)]
pub struct ExtractorRegistry {
    extractors: Vec<(String, ExtractorBox)>,
}

impl ExtractorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the Amazon, Noon and Jumia extractors sharing one fetcher.
    pub fn with_default_extractors(fetcher: Arc<dyn PageFetcher>, home_currency: &str) -> Self {
        let mut registry = Self::new();
        registry.register(
            Platform::Amazon.as_str(),
            Box::new(AmazonExtractor::new(fetcher.clone(), home_currency)),
        );
        registry.register(
            Platform::Noon.as_str(),
            Box::new(NoonExtractor::new(fetcher.clone(), home_currency)),
        );
        registry.register(
            Platform::Jumia.as_str(),
            Box::new(JumiaExtractor::new(fetcher, home_currency)),
        );
        registry
    }

    /// Register an extractor under `name`. Re-registering a name replaces the
    /// previous extractor but keeps its original lookup position.
    pub fn register(&mut self, name: &str, extractor: ExtractorBox) {
        match self.extractors.iter_mut().find(|(existing, _)| existing == name) {
            Some(slot) => {
                tracing::debug!("Replacing extractor {}", name);
                slot.1 = extractor;
            }
            None => {
                tracing::debug!("Registered extractor {}", name);
                self.extractors.push((name.to_string(), extractor));
            }
        }
    }

    pub fn get_extractor(&self, url: &str) -> Option<&dyn SourceExtractor> {
        self.extractors
            .iter()
            .find(|(_, extractor)| extractor.is_valid_url(url))
            .map(|(_, extractor)| extractor.as_ref())
    }

    /// Hostname classification that works even when no extractor is registered for the platform.
    pub fn platform_from_url(url: &str) -> Option<Platform> {
        Platform::from_url(url)
    }

    pub fn has_extractor(&self, name: &str) -> bool {
        self.extractors.iter().any(|(existing, _)| existing == name)
    }

    pub fn names(&self) -> Vec<&str> {
        self.extractors.iter().map(|(name, _)| name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.extractors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.extractors.is_empty()
    }
}
