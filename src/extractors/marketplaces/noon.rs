use async_trait::async_trait;
use std::sync::Arc;

use crate::extractors::patterns::{CurrencyHints, FieldPattern, MarketplaceRules, PatternChain, StockSignals};
use crate::extractors::traits::{Platform, SourceExtractor, host_of};
use crate::fetcher::PageFetcher;
use crate::models::ScrapedSnapshot;

/// Noon product pages. Listings are assumed purchasable unless the page says otherwise.
pub struct NoonExtractor {
    rules: MarketplaceRules,
    fetcher: Arc<dyn PageFetcher>,
}

impl NoonExtractor {
    pub fn new(fetcher: Arc<dyn PageFetcher>, home_currency: &str) -> Self {
        Self {
            rules: Self::rules(home_currency),
            fetcher,
        }
    }

    fn rules(home_currency: &str) -> MarketplaceRules {
        MarketplaceRules {
            price: PatternChain::regexes(&[
                r#"data-qa="price-now"[^>]*>[\s\S]*?(\d[\d,.]*)"#,
                r#""price":\s*"?(\d[\d,.]*)"#,
                r#"class="priceNow[^"]*"[^>]*>[\s\S]*?(\d[\d,.]*)"#,
                r#"class="sellingPrice[^"]*"[^>]*>[\s\S]*?(\d[\d,.]*)"#,
            ]),
            original_price: PatternChain::regexes(&[
                r#"data-qa="price-was"[^>]*>[\s\S]*?(\d[\d,.]*)"#,
                r#""was":\s*"?(\d[\d,.]*)"#,
                r#"class="priceWas[^"]*"[^>]*>[\s\S]*?(\d[\d,.]*)"#,
            ]),
            quantity: PatternChain::regexes(&[r"(?i)only (\d+) left"]),
            title: PatternChain::new(vec![FieldPattern::css("h1", None)]),
            image: PatternChain::new(vec![
                FieldPattern::css(r#"meta[property="og:image"]"#, Some("content")),
                FieldPattern::regex(r#"og:image"[^>]*content="([^"]+)""#),
            ]),
            stock: StockSignals::new(
                &[r"(?i)add to cart"],
                &[r"(?i)out of stock", r"(?i)sold out", r"غير متوفر", r"نفذت الكمية"],
                true,
            ),
            currency: CurrencyHints::new(home_currency)
                .rule("SAR", &["SAR", "ريال"])
                .rule("AED", &["AED", "درهم"]),
        }
    }
}

#[async_trait]
impl SourceExtractor for NoonExtractor {
    fn platform(&self) -> Platform {
        Platform::Noon
    }

    fn is_valid_url(&self, url: &str) -> bool {
        host_of(url).is_some_and(|host| host.contains("noon.com"))
    }

    fn parse(&self, body: &str) -> ScrapedSnapshot {
        self.rules.parse(body)
    }

    fn fetcher(&self) -> &dyn PageFetcher {
        self.fetcher.as_ref()
    }
}
