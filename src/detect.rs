use scraper::{Html, Selector};
use serde::{Deserialize, Serialize};

use crate::extract::{strip_digits, structured_price};
use crate::render::RenderedPage;

/// How a candidate selector is read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CandidateKind {
    /// Element text, digit-concatenation integer parse.
    Css,
    /// `content` attribute, strictly positive float parse.
    Meta,
}

struct Candidate {
    name: &'static str,
    selector: &'static str,
    kind: CandidateKind,
}

/// Known storefront-platform signatures, most specific first. The order is a
/// compatibility contract: the first candidate yielding a positive price wins,
/// so reordering changes which selector gets suggested.
const CANDIDATES: &[Candidate] = &[
    Candidate {
        name: "VTEX Standard",
        selector: ".vtex-product-price-1-x-sellingPriceValue",
        kind: CandidateKind::Css,
    },
    Candidate {
        name: "VTEX Container",
        selector: ".vtex-product-price-1-x-sellingPrice",
        kind: CandidateKind::Css,
    },
    Candidate {
        name: "Electrolux Custom",
        selector: ".electrolux-product-prices-4-x-sellingPriceValue",
        kind: CandidateKind::Css,
    },
    Candidate {
        name: "Electrolux Container",
        selector: ".electrolux-product-prices-4-x-sellingPrice",
        kind: CandidateKind::Css,
    },
    Candidate {
        name: "MercadoLibre",
        selector: ".ui-pdp-price__second-line .andes-money-amount__fraction",
        kind: CandidateKind::Css,
    },
    Candidate {
        name: "Ripley",
        selector: ".product-price",
        kind: CandidateKind::Css,
    },
    Candidate {
        name: "Linio",
        selector: ".price-main-md",
        kind: CandidateKind::Css,
    },
    Candidate {
        name: "Schema.org",
        selector: r#"[itemprop="price"]"#,
        kind: CandidateKind::Css,
    },
    Candidate {
        name: "OpenGraph",
        selector: r#"meta[property="product:price:amount"]"#,
        kind: CandidateKind::Meta,
    },
    Candidate {
        name: "Generic ID",
        selector: "#price",
        kind: CandidateKind::Css,
    },
    Candidate {
        name: "Generic Class",
        selector: ".price",
        kind: CandidateKind::Css,
    },
    Candidate {
        name: "Generic Product Price",
        selector: ".product-price",
        kind: CandidateKind::Css,
    },
];

/// Decorative or empty duplicates often rank first; probe this many matches
/// per CSS candidate before giving up on it.
const MATCHES_PROBED: usize = 3;

/// A reusable extraction rule suggested from a page with no prior knowledge
/// of its structure.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Detection {
    pub selector: String,
    pub price: f64,
    pub strategy: String,
}

/// Runs the candidate cascade in discovery mode over a page snapshot.
pub fn detect(page: &RenderedPage) -> Option<Detection> {
    let document = Html::parse_document(&page.html);

    for candidate in CANDIDATES {
        let Ok(selector) = Selector::parse(candidate.selector) else {
            continue;
        };

        match candidate.kind {
            CandidateKind::Meta => {
                let content = document
                    .select(&selector)
                    .next()
                    .and_then(|element| element.value().attr("content"));
                if let Some(value) = content.and_then(parse_leading_float) {
                    if value > 0.0 {
                        return Some(Detection {
                            selector: candidate.selector.to_string(),
                            price: value,
                            strategy: candidate.name.to_string(),
                        });
                    }
                }
            }
            CandidateKind::Css => {
                for element in document.select(&selector).take(MATCHES_PROBED) {
                    let text = element
                        .text()
                        .collect::<Vec<_>>()
                        .join(" ")
                        .trim()
                        .to_string();
                    if let Some(value) = strip_digits(&text).filter(|v| *v > 0) {
                        return Some(Detection {
                            selector: candidate.selector.to_string(),
                            price: value as f64,
                            strategy: candidate.name.to_string(),
                        });
                    }
                }
            }
        }
    }

    // Every candidate exhausted: same structured-data fallback as the engine.
    structured_price(&document).map(|(value, _raw)| Detection {
        selector: r#"script[type="application/ld+json"]"#.to_string(),
        price: value as f64,
        strategy: "Structured Data".to_string(),
    })
}

/// `parseFloat`-style parse: leading numeric prefix, junk after it ignored.
fn parse_leading_float(raw: &str) -> Option<f64> {
    let trimmed = raw.trim_start();
    let end = trimmed
        .char_indices()
        .find(|(i, c)| {
            !(c.is_ascii_digit() || *c == '.' || (*i == 0 && (*c == '-' || *c == '+')))
        })
        .map(|(i, _)| i)
        .unwrap_or(trimmed.len());
    trimmed[..end].parse().ok()
}
