//! Ordered, first-match-wins extraction rules shared by every marketplace.
//!
//! Each field of a [`ScrapedSnapshot`] is filled from its own [`PatternChain`].
//! A chain is tried top to bottom and the first entry producing a usable
//! value wins; a field nobody matches stays `None`. Nothing here fails: a
//! page that matches nothing yields an empty snapshot.

use chrono::Utc;
use regex::Regex;
use rust_decimal::Decimal;
use scraper::{Html, Selector};
use std::str::FromStr;

use crate::models::ScrapedSnapshot;

/// Turn loosely formatted price text into a number.
///
/// The number starts at the first digit, or at a `.` directly followed by
/// one. From there everything except digits, `.` and `,` is dropped and `,`
/// is read as a thousands separator. Text that does not leave a valid number
/// gives `None`, never zero.
pub fn extract_number(text: &str) -> Option<Decimal> {
    let start = text.char_indices().find_map(|(i, c)| {
        let leading_point = c == '.' && text[i + 1..].starts_with(|next: char| next.is_ascii_digit());
        (c.is_ascii_digit() || leading_point).then_some(i)
    })?;

    let cleaned: String = text[start..]
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.')
        .collect();
    let cleaned = cleaned.trim_end_matches('.');

    if cleaned.starts_with('.') {
        Decimal::from_str(&format!("0{}", cleaned)).ok()
    } else {
        Decimal::from_str(cleaned).ok()
    }
}

/// A page body parsed once and shared by every pattern.
pub struct Page<'a> {
    raw: &'a str,
    document: Html,
}

impl<'a> Page<'a> {
    pub fn new(raw: &'a str) -> Self {
        Self {
            raw,
            document: Html::parse_document(raw),
        }
    }

    pub fn raw(&self) -> &str {
        self.raw
    }
}

/// One way of locating a field on a page.
pub enum FieldPattern {
    /// Regex over the raw body; the first capture group is the value.
    Regex(Regex),
    /// CSS selector over the DOM; reads `attribute` when set, element text otherwise.
    Css {
        selector: Selector,
        attribute: Option<&'static str>,
    },
}

impl FieldPattern {
    /// Patterns are compile-time constants of each extractor.
    pub fn regex(pattern: &str) -> Self {
        FieldPattern::Regex(Regex::new(pattern).expect("static extraction pattern"))
    }

    pub fn css(selector: &str, attribute: Option<&'static str>) -> Self {
        FieldPattern::Css {
            selector: Selector::parse(selector).expect("static extraction selector"),
            attribute,
        }
    }

    pub fn find(&self, page: &Page<'_>) -> Option<String> {
        let found = match self {
            FieldPattern::Regex(regex) => regex
                .captures(page.raw)
                .and_then(|captures| captures.get(1))
                .map(|m| m.as_str().to_string()),
            FieldPattern::Css { selector, attribute } => {
                page.document.select(selector).next().and_then(|element| match attribute {
                    Some(name) => element.value().attr(name).map(str::to_string),
                    None => Some(element.text().collect::<Vec<_>>().join(" ")),
                })
            }
        };

        found
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    }
}

/// Ordered fallback list for a single field.
#[derive(Default)]
pub struct PatternChain {
    patterns: Vec<FieldPattern>,
}

impl PatternChain {
    pub fn new(patterns: Vec<FieldPattern>) -> Self {
        Self { patterns }
    }

    pub fn regexes(patterns: &[&str]) -> Self {
        Self::new(patterns.iter().map(|p| FieldPattern::regex(p)).collect())
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    pub fn first_text(&self, page: &Page<'_>) -> Option<String> {
        self.patterns.iter().find_map(|pattern| pattern.find(page))
    }

    /// First match that parses to a positive amount. A zero or unparsable
    /// match falls through to the next pattern.
    pub fn first_amount(&self, page: &Page<'_>) -> Option<Decimal> {
        self.patterns
            .iter()
            .filter_map(|pattern| pattern.find(page))
            .filter_map(|text| extract_number(&text))
            .find(|amount| *amount > Decimal::ZERO)
    }

    pub fn first_count(&self, page: &Page<'_>) -> Option<u32> {
        self.patterns
            .iter()
            .filter_map(|pattern| pattern.find(page))
            .find_map(|text| {
                let digits: String = text.chars().filter(char::is_ascii_digit).collect();
                digits.parse::<u32>().ok()
            })
    }
}

/// Availability inference. Negative signals beat positive ones.
pub struct StockSignals {
    positive: Vec<Regex>,
    negative: Vec<Regex>,
    default_in_stock: bool,
}

impl StockSignals {
    pub fn new(positive: &[&str], negative: &[&str], default_in_stock: bool) -> Self {
        let compile = |patterns: &[&str]| {
            patterns
                .iter()
                .map(|p| Regex::new(p).expect("static stock pattern"))
                .collect::<Vec<Regex>>()
        };

        Self {
            positive: compile(positive),
            negative: compile(negative),
            default_in_stock,
        }
    }

    /// Returns `(in_stock, signal_seen)`.
    pub fn infer(&self, raw: &str) -> (bool, bool) {
        if self.negative.iter().any(|r| r.is_match(raw)) {
            return (false, true);
        }
        if self.positive.iter().any(|r| r.is_match(raw)) {
            return (true, true);
        }
        (self.default_in_stock, false)
    }
}

/// Currency detection by marker strings; the first rule with a marker on the page wins.
pub struct CurrencyHints {
    rules: Vec<(&'static str, &'static [&'static str])>,
    home: String,
}

impl CurrencyHints {
    pub fn new(home: &str) -> Self {
        Self {
            rules: Vec::new(),
            home: home.to_string(),
        }
    }

    pub fn rule(mut self, code: &'static str, markers: &'static [&'static str]) -> Self {
        self.rules.push((code, markers));
        self
    }

    pub fn detect(&self, raw: &str) -> String {
        self.rules
            .iter()
            .find(|(_, markers)| markers.iter().any(|m| raw.contains(m)))
            .map(|(code, _)| code.to_string())
            .unwrap_or_else(|| self.home.clone())
    }
}

/// Full rule set of one marketplace.
pub struct MarketplaceRules {
    pub price: PatternChain,
    pub original_price: PatternChain,
    pub quantity: PatternChain,
    pub title: PatternChain,
    pub image: PatternChain,
    pub stock: StockSignals,
    pub currency: CurrencyHints,
}

impl MarketplaceRules {
    pub fn parse(&self, body: &str) -> ScrapedSnapshot {
        let page = Page::new(body);
        let (in_stock, stock_signal) = self.stock.infer(page.raw());

        ScrapedSnapshot {
            price: self.price.first_amount(&page),
            original_price: self.original_price.first_amount(&page),
            currency: self.currency.detect(page.raw()),
            in_stock,
            stock_signal,
            stock_quantity: self.quantity.first_count(&page),
            title: self.title.first_text(&page),
            image_url: self.image.first_text(&page),
            observed_at: Utc::now(),
        }
    }
}
