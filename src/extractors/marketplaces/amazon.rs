use async_trait::async_trait;
use std::sync::Arc;

use crate::extractors::patterns::{CurrencyHints, FieldPattern, MarketplaceRules, PatternChain, StockSignals};
use crate::extractors::traits::{Platform, SourceExtractor, host_of};
use crate::fetcher::PageFetcher;
use crate::models::ScrapedSnapshot;

/// Amazon product pages.
///
/// Amazon always renders an availability block for purchasable items, so a
/// page with no stock signal at all is treated as out of stock.
pub struct AmazonExtractor {
    rules: MarketplaceRules,
    fetcher: Arc<dyn PageFetcher>,
}

impl AmazonExtractor {
    pub fn new(fetcher: Arc<dyn PageFetcher>, home_currency: &str) -> Self {
        Self {
            rules: Self::rules(home_currency),
            fetcher,
        }
    }

    fn rules(home_currency: &str) -> MarketplaceRules {
        MarketplaceRules {
            price: PatternChain::regexes(&[
                r#"<span[^>]*id="priceblock_ourprice"[^>]*>([^<]+)<"#,
                r#"<span[^>]*id="priceblock_dealprice"[^>]*>([^<]+)<"#,
                r#"<span[^>]*class="[^"]*a-price-whole[^"]*"[^>]*>([^<]+)<"#,
                r#"<span[^>]*class="[^"]*apexPriceToPay[^"]*"[^>]*>[\s\S]*?<span[^>]*>([^<]+)<"#,
                r#"data-a-color="price"[^>]*>[\s\S]*?<span[^>]*>([^<]+)<"#,
            ]),
            original_price: PatternChain::regexes(&[
                r#"<span[^>]*class="[^"]*a-text-price[^"]*"[^>]*>[\s\S]*?<span[^>]*>([^<]+)<"#,
                r#"class="[^"]*basisPrice[^"]*"[^>]*>[\s\S]*?<span[^>]*class="a-offscreen"[^>]*>([^<]+)<"#,
            ]),
            quantity: PatternChain::regexes(&[r"(?i)only (\d+) left in stock"]),
            title: PatternChain::new(vec![
                FieldPattern::css("#productTitle", None),
                FieldPattern::regex(r#"<span[^>]*id="productTitle"[^>]*>([^<]+)<"#),
            ]),
            image: PatternChain::new(vec![
                FieldPattern::regex(r#"data-old-hires="([^"]+)""#),
                FieldPattern::css(r#"meta[property="og:image"]"#, Some("content")),
            ]),
            stock: StockSignals::new(
                &[
                    r#"(?i)id="availability"[^>]*>[\s\S]*?(in stock|متوفر|متاح)"#,
                    r#"(?i)id="add-to-cart-button""#,
                    r#"(?i)id="buy-now-button""#,
                ],
                &[r"(?i)currently unavailable", r"(?i)out of stock", r"غير متوفر"],
                false,
            ),
            currency: CurrencyHints::new(home_currency)
                .rule("EGP", &["ج.م", "EGP"])
                .rule("EUR", &["€", "EUR"])
                .rule("USD", &["$", "USD"]),
        }
    }
}

#[async_trait]
impl SourceExtractor for AmazonExtractor {
    fn platform(&self) -> Platform {
        Platform::Amazon
    }

    fn is_valid_url(&self, url: &str) -> bool {
        host_of(url).is_some_and(|host| host.contains("amazon."))
    }

    fn parse(&self, body: &str) -> ScrapedSnapshot {
        self.rules.parse(body)
    }

    fn fetcher(&self) -> &dyn PageFetcher {
        self.fetcher.as_ref()
    }
}
