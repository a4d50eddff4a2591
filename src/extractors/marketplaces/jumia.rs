use async_trait::async_trait;
use std::sync::Arc;

use crate::extractors::patterns::{CurrencyHints, FieldPattern, MarketplaceRules, PatternChain, StockSignals};
use crate::extractors::traits::{Platform, SourceExtractor, host_of};
use crate::fetcher::PageFetcher;
use crate::models::ScrapedSnapshot;

/// Jumia product pages. Jumia storefronts price in the local currency only.
pub struct JumiaExtractor {
    rules: MarketplaceRules,
    fetcher: Arc<dyn PageFetcher>,
}

impl JumiaExtractor {
    pub fn new(fetcher: Arc<dyn PageFetcher>, home_currency: &str) -> Self {
        Self {
            rules: Self::rules(home_currency),
            fetcher,
        }
    }

    fn rules(home_currency: &str) -> MarketplaceRules {
        MarketplaceRules {
            price: PatternChain::regexes(&[
                r#"class="-b -ubpt -tal -fs24 -prxs"[^>]*>[\s\S]*?(\d[\d,.]*)"#,
                r#"class="price[^"]*"[^>]*>[\s\S]*?(\d[\d,.]*)"#,
                r#""price":\s*"?(\d[\d,.]*)"#,
                r#"itemprop="price"[^>]*content="(\d[\d,.]*)""#,
                r#"-fs24[^>]*>[\s\S]*?EGP\s*(\d[\d,.]*)"#,
            ]),
            original_price: PatternChain::regexes(&[
                r#"class="-tal -gy5 -lthr -fs14 -pvxs"[^>]*>[\s\S]*?(\d[\d,.]*)"#,
                r#"class="oldPrice[^"]*"[^>]*>[\s\S]*?(\d[\d,.]*)"#,
                r#"-lthr[^>]*>[\s\S]*?EGP\s*(\d[\d,.]*)"#,
            ]),
            quantity: PatternChain::regexes(&[r"(?i)(\d+) units? left"]),
            title: PatternChain::new(vec![
                FieldPattern::regex(r#"<h1[^>]*class="-fs20[^"]*"[^>]*>([^<]+)<"#),
                FieldPattern::css("h1", None),
            ]),
            image: PatternChain::new(vec![
                FieldPattern::css(r#"meta[property="og:image"]"#, Some("content")),
                FieldPattern::regex(r#"og:image"[^>]*content="([^"]+)""#),
            ]),
            stock: StockSignals::new(
                &[r"(?i)add to cart"],
                &[r"(?i)out of stock", r"(?i)sold out", r"غير متوفر", r#"(?i)class="out">"#],
                true,
            ),
            currency: CurrencyHints::new(home_currency),
        }
    }
}

#[async_trait]
impl SourceExtractor for JumiaExtractor {
    fn platform(&self) -> Platform {
        Platform::Jumia
    }

    fn is_valid_url(&self, url: &str) -> bool {
        host_of(url).is_some_and(|host| host.contains("jumia."))
    }

    fn parse(&self, body: &str) -> ScrapedSnapshot {
        self.rules.parse(body)
    }

    fn fetcher(&self) -> &dyn PageFetcher {
        self.fetcher.as_ref()
    }
}
