use scraper::{Html, Selector};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::models::{AvailabilityStrategy, CheckStatus, Watcher};
use crate::render::RenderedPage;

/// Phrases that mark an anti-bot interstitial rather than a product page.
const BLOCKING_INDICATORS: &[&str] = &[
    "access denied",
    "security check",
    "cloudflare",
    "robot check",
    "captcha",
];

/// Used when a watcher configures no out-of-stock phrases of its own.
const DEFAULT_OOS_KEYWORDS: &[&str] = &["agotado", "sin stock", "out of stock", "unavailable"];

/// Structured-data blocks probed when the price selector is missing, in
/// fallback order.
const JSON_LD_SELECTOR: &str = r#"script[type="application/ld+json"]"#;
const STATE_BLOB_SELECTORS: &[&str] = &[
    "script#__NEXT_DATA__",
    r#"template[data-varname="__STATE__"] script"#,
];

const EXCERPT_MAX_CHARS: usize = 100;

/// Extraction rule for one check: where the price lives, how stock is
/// inferred, and which phrases mean out-of-stock.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionRule {
    pub price_selector: String,
    pub stock_selector: Option<String>,
    pub strategy: AvailabilityStrategy,
    pub out_of_stock_keywords: Option<String>,
}

impl From<&Watcher> for ExtractionRule {
    fn from(watcher: &Watcher) -> Self {
        Self {
            price_selector: watcher.price_selector.clone(),
            stock_selector: watcher.stock_selector.clone(),
            strategy: watcher.availability_strategy,
            out_of_stock_keywords: watcher.out_of_stock_keywords.clone(),
        }
    }
}

/// What one extraction attempt concluded, before it is persisted as a check.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CheckOutcome {
    pub status: CheckStatus,
    pub price_value: Option<i64>,
    pub price_text: Option<String>,
    pub in_stock: Option<bool>,
    pub error_message: Option<String>,
    pub raw_excerpt: Option<String>,
}

impl CheckOutcome {
    pub fn ok(
        price_value: Option<i64>,
        price_text: Option<String>,
        in_stock: Option<bool>,
        raw_excerpt: Option<String>,
    ) -> Self {
        Self {
            status: CheckStatus::Ok,
            price_value,
            price_text,
            in_stock,
            error_message: None,
            raw_excerpt,
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            status: CheckStatus::Failed,
            price_value: None,
            price_text: None,
            in_stock: None,
            error_message: Some(message.into()),
            raw_excerpt: None,
        }
    }

    pub fn failed_with_excerpt(message: impl Into<String>, excerpt: String) -> Self {
        Self {
            raw_excerpt: Some(truncate_excerpt(&excerpt)),
            ..Self::failed(message)
        }
    }

    pub fn blocked(message: impl Into<String>) -> Self {
        Self {
            status: CheckStatus::Blocked,
            price_value: None,
            price_text: None,
            in_stock: None,
            error_message: Some(message.into()),
            raw_excerpt: None,
        }
    }
}

/// Multi-strategy price-and-stock extractor over a rendered-page snapshot.
pub struct Extractor {
    block_detection: bool,
}

impl Extractor {
    pub fn new(block_detection: bool) -> Self {
        Self { block_detection }
    }

    pub fn extract(&self, page: &RenderedPage, rule: &ExtractionRule) -> CheckOutcome {
        // Status gate runs before any content parsing.
        if page.status_code == 403 || page.status_code == 503 {
            return CheckOutcome::blocked(format!("HTTP Status {}", page.status_code));
        }

        if self.block_detection && contains_blocking_content(&page.html) {
            return CheckOutcome::blocked("Detected blocking page content");
        }

        let document = Html::parse_document(&page.html);

        match element_text_at(&document, &rule.price_selector, 0) {
            Some(price_text) => match strip_digits(&price_text) {
                Some(price_value) => {
                    let keywords = resolve_keywords(rule.out_of_stock_keywords.as_deref());
                    let in_stock = infer_stock(&document, rule, &keywords);
                    CheckOutcome::ok(
                        Some(price_value),
                        Some(price_text.clone()),
                        Some(in_stock),
                        Some(truncate_excerpt(&price_text)),
                    )
                }
                None => CheckOutcome::failed_with_excerpt(
                    "Price text contained no digits",
                    price_text,
                ),
            },
            None => match structured_price(&document) {
                // Structured-data fallback carries no stock signal, so
                // in_stock stays unknown.
                Some((price_value, raw)) => CheckOutcome::ok(
                    Some(price_value),
                    Some(raw.clone()),
                    None,
                    Some(truncate_excerpt(&raw)),
                ),
                None => CheckOutcome::failed("Price selector not found"),
            },
        }
    }
}

/// Case-insensitive scan of the full page content for blocking indicators.
pub fn contains_blocking_content(html: &str) -> bool {
    let lower = html.to_lowercase();
    BLOCKING_INDICATORS.iter().any(|phrase| lower.contains(phrase))
}

fn infer_stock(document: &Html, rule: &ExtractionRule, keywords: &[String]) -> bool {
    match rule.strategy {
        AvailabilityStrategy::PriceSelectorOnly => true,
        AvailabilityStrategy::OutOfStockTextPresent => {
            let body = body_text(document).to_lowercase();
            !keyword_hit(&body, keywords)
        }
        AvailabilityStrategy::StockTextSelector => {
            let stock_text = rule
                .stock_selector
                .as_deref()
                .and_then(|selector| element_text_at(document, selector, 0));
            match stock_text {
                Some(text) => !keyword_hit(&text.to_lowercase(), keywords),
                // Cannot prove out-of-stock without the element; assume stock.
                None => true,
            }
        }
    }
}

fn keyword_hit(lower_text: &str, keywords: &[String]) -> bool {
    keywords
        .iter()
        .any(|kw| lower_text.contains(&kw.to_lowercase()))
}

/// Accepts a serialized JSON list or a single bare phrase; a malformed list
/// degrades to the raw string as one keyword instead of failing the check.
pub fn resolve_keywords(raw: Option<&str>) -> Vec<String> {
    match raw {
        None => default_keywords(),
        Some(s) if s.trim().is_empty() => default_keywords(),
        Some(s) => match serde_json::from_str::<Vec<String>>(s) {
            Ok(list) => list,
            Err(_) => vec![s.to_string()],
        },
    }
}

fn default_keywords() -> Vec<String> {
    DEFAULT_OOS_KEYWORDS.iter().map(|s| s.to_string()).collect()
}

/// Joined, trimmed text of the nth element matching `selector`. None when the
/// selector is invalid or has no nth match.
pub fn element_text_at(document: &Html, selector: &str, index: usize) -> Option<String> {
    let parsed = Selector::parse(selector).ok()?;
    document.select(&parsed).nth(index).map(|element| {
        element
            .text()
            .collect::<Vec<_>>()
            .join(" ")
            .trim()
            .to_string()
    })
}

fn body_text(document: &Html) -> String {
    element_text_at(document, "body", 0).unwrap_or_default()
}

/// Concatenates the digits of `text` in original order: "$599.990" → 599990,
/// "$1,234" → 1234. None when no digits survive (or the run overflows i64).
pub fn strip_digits(text: &str) -> Option<i64> {
    let digits: String = text.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        return None;
    }
    digits.parse().ok()
}

pub fn truncate_excerpt(text: &str) -> String {
    text.chars().take(EXCERPT_MAX_CHARS).collect()
}

/// Fallback search order: JSON-LD blocks first, then framework state blobs.
/// Returns the price and the raw text it was coerced from.
pub fn structured_price(document: &Html) -> Option<(i64, String)> {
    if let Some(hit) = script_payload_price(document, JSON_LD_SELECTOR) {
        return Some(hit);
    }
    STATE_BLOB_SELECTORS
        .iter()
        .find_map(|selector| script_payload_price(document, selector))
}

fn script_payload_price(document: &Html, selector: &str) -> Option<(i64, String)> {
    let parsed = Selector::parse(selector).ok()?;
    document.select(&parsed).find_map(|element| {
        let payload = element.text().collect::<String>();
        let json: Value = serde_json::from_str(payload.trim()).ok()?;
        price_from_json(&json)
    })
}

/// Recursive price-shape matcher over a parsed JSON tree. Probes the fields
/// `price`, `amount`, `value` in that order, then `offers` (first element if
/// an array). String prices are stripped of non-numeric characters; numbers
/// are rounded. Only strictly positive results count.
pub fn price_from_json(value: &Value) -> Option<(i64, String)> {
    match value {
        Value::Number(n) => {
            let f = n.as_f64()?;
            if f > 0.0 {
                Some((f.round() as i64, n.to_string()))
            } else {
                None
            }
        }
        Value::String(s) => strip_digits(s).filter(|v| *v > 0).map(|v| (v, s.clone())),
        Value::Object(map) => {
            for key in ["price", "amount", "value"] {
                if let Some(hit) = map.get(key).and_then(price_from_json) {
                    return Some(hit);
                }
            }
            match map.get("offers") {
                Some(Value::Array(items)) => items.first().and_then(price_from_json),
                Some(other) => price_from_json(other),
                None => None,
            }
        }
        // Top-level JSON-LD payloads are often arrays of entities.
        Value::Array(items) => items.iter().find_map(price_from_json),
        Value::Bool(_) | Value::Null => None,
    }
}
