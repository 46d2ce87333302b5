//! Listing extraction.
//!
//! Each category owns an ordered chain of strategies. A strategy inspects the
//! page and returns the raw price text it found (e.g. `"5 500 000 kr"`); the
//! first hit wins and is handed to [`price::parse_price`]. Supporting a new
//! markup variant means appending a [`Strategy`] to the relevant table.

use std::sync::LazyLock;

use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use thiserror::Error;
use tracing::debug;

use crate::category::Category;
use crate::models::Listing;
use crate::price::{self, normalize_whitespace};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExtractError {
    #[error("unknown category: {0}")]
    UnknownCategory(Category),
    #[error("could not extract price")]
    PriceNotFound,
    #[error("failed to parse price: {0}")]
    Unparseable(String),
}

/// A parsed page plus the markup it came from. Some strategies match on
/// the raw text because the price only lives in embedded JSON.
pub struct Page<'a> {
    raw: &'a str,
    doc: Html,
}

impl<'a> Page<'a> {
    pub fn parse(raw: &'a str) -> Self {
        Self {
            raw,
            doc: Html::parse_document(raw),
        }
    }
}

pub struct Strategy {
    pub name: &'static str,
    pub attempt: fn(&Page<'_>) -> Option<String>,
}

const REALESTATE: &[Strategy] = &[
    Strategy {
        name: "total-price field",
        attempt: realestate_total_price_field,
    },
    Strategy {
        name: "Totalpris label",
        attempt: realestate_totalpris_label,
    },
];

const MOBILITY: &[Strategy] = &[
    Strategy {
        name: "Totalpris label",
        attempt: mobility_totalpris_label,
    },
    Strategy {
        name: "styled price span",
        attempt: mobility_price_span,
    },
];

const RECOMMERCE: &[Strategy] = &[
    Strategy {
        name: "markup patterns",
        attempt: recommerce_markup_patterns,
    },
    Strategy {
        name: "Til salgs heading",
        attempt: recommerce_for_sale_heading,
    },
];

/// Price strategy chain for a category, in the order they are tried.
pub fn price_strategies(category: Category) -> &'static [Strategy] {
    match category {
        Category::Realestate => REALESTATE,
        Category::Mobility => MOBILITY,
        Category::Recommerce => RECOMMERCE,
        Category::Unknown => &[],
    }
}

static PRICE_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([0-9][ 0-9]* kr)").expect("static regex"));

static STATUS_PREFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(Til salgs|Utleie|Solgt)\s*[-–]?\s*").expect("static regex")
});

static FOR_SALE_MARKUP: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?is)Til\s+salgs.*?<p[^>]*class="[^"]*m-0[^"]*h2[^"]*"[^>]*>([^<]*[0-9][ 0-9]*\s*kr)</p>"#,
    )
    .expect("static regex")
});

static PRICE_TEXT_JSON: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)"priceText"\s*:\s*"([0-9][ 0-9]* kr)""#).expect("static regex")
});

fn selector(css: &str) -> Selector {
    Selector::parse(css).expect("static selector")
}

static TOTAL_PRICE_FIELD: LazyLock<Selector> =
    LazyLock::new(|| selector(r#"[data-testid="pricing-total-price"]"#));
static LABEL_CANDIDATES: LazyLock<Selector> = LazyLock::new(|| selector("dt, p, span"));
static MOBILITY_LABELS: LazyLock<Selector> = LazyLock::new(|| selector("p, span, div"));
static STYLED_PRICE_SPAN: LazyLock<Selector> = LazyLock::new(|| selector("span.t2"));
static H2: LazyLock<Selector> = LazyLock::new(|| selector("h2"));
static STYLED_PRICE_PARAGRAPH: LazyLock<Selector> = LazyLock::new(|| selector("p.h2"));

static REALESTATE_TITLES: LazyLock<Vec<Selector>> = LazyLock::new(|| {
    [r#"[data-testid="object-title"]"#, "h1.t1", "h1"]
        .into_iter()
        .map(selector)
        .collect()
});
static LISTING_TITLES: LazyLock<Vec<Selector>> =
    LazyLock::new(|| ["h1.t1", "h1"].into_iter().map(selector).collect());
static GENERIC_TITLES: LazyLock<Vec<Selector>> = LazyLock::new(|| vec![selector("h1")]);

fn title_selectors(category: Category) -> &'static [Selector] {
    match category {
        Category::Realestate => &REALESTATE_TITLES,
        Category::Mobility | Category::Recommerce => &LISTING_TITLES,
        Category::Unknown => &GENERIC_TITLES,
    }
}

/// Extract price and title from a listing page.
///
/// Never fails on malformed markup. A missing price is reported through
/// [`Listing::error`]; the title is attempted regardless.
pub fn extract(markup: &str, category: Category, url: &str) -> Listing {
    let page = Page::parse(markup);
    let title = extract_title(&page, category);

    if category == Category::Unknown {
        return Listing {
            price: None,
            title,
            error: Some(ExtractError::UnknownCategory(category)),
        };
    }

    let Some(raw) = find_price_text(&page, category, url) else {
        return Listing {
            price: None,
            title,
            error: Some(ExtractError::PriceNotFound),
        };
    };

    match price::parse_price(&raw) {
        Some(price) => Listing {
            price: Some(price),
            title,
            error: None,
        },
        None => Listing {
            price: None,
            title,
            error: Some(ExtractError::Unparseable(raw)),
        },
    }
}

fn find_price_text(page: &Page<'_>, category: Category, url: &str) -> Option<String> {
    for strategy in price_strategies(category) {
        if let Some(text) = (strategy.attempt)(page) {
            debug!(url, strategy = strategy.name, price = %text, "price strategy matched");
            return Some(text);
        }
        debug!(url, strategy = strategy.name, "price strategy missed");
    }
    None
}

/// First usable heading text for the category, with any listing-status
/// prefix removed.
pub fn extract_title(page: &Page<'_>, category: Category) -> Option<String> {
    title_selectors(category).iter().find_map(|sel| {
        let element = page.doc.select(sel).next()?;
        let text = stripped_text(element);
        let title = STATUS_PREFIX.replace(&text, "").trim().to_string();
        (title.chars().count() > 3).then_some(title)
    })
}

// Text nodes trimmed and concatenated.
fn stripped_text(element: ElementRef<'_>) -> String {
    element.text().map(str::trim).collect()
}

fn full_text(element: ElementRef<'_>) -> String {
    element.text().collect()
}

fn parent(element: ElementRef<'_>) -> Option<ElementRef<'_>> {
    element.parent().and_then(ElementRef::wrap)
}

fn match_price(text: &str) -> Option<String> {
    PRICE_PATTERN
        .captures(&normalize_whitespace(text))
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
}

fn realestate_total_price_field(page: &Page<'_>) -> Option<String> {
    let field = page.doc.select(&TOTAL_PRICE_FIELD).next()?;
    match_price(&stripped_text(field))
}

fn realestate_totalpris_label(page: &Page<'_>) -> Option<String> {
    page.doc
        .select(&LABEL_CANDIDATES)
        .filter(|el| full_text(*el).contains("Totalpris"))
        .find_map(|el| parent(el).and_then(|p| match_price(&full_text(p))))
}

fn mobility_totalpris_label(page: &Page<'_>) -> Option<String> {
    page.doc
        .select(&MOBILITY_LABELS)
        .filter(|el| stripped_text(*el) == "Totalpris")
        .find_map(|el| {
            let span = parent(el)?.select(&STYLED_PRICE_SPAN).next()?;
            match_price(&stripped_text(span))
        })
}

fn mobility_price_span(page: &Page<'_>) -> Option<String> {
    page.doc
        .select(&STYLED_PRICE_SPAN)
        .filter(|span| full_text(*span).contains("kr"))
        .find_map(|span| match_price(&stripped_text(span)))
}

fn recommerce_markup_patterns(page: &Page<'_>) -> Option<String> {
    if let Some(caps) = FOR_SALE_MARKUP.captures(page.raw) {
        if let Some(price) = caps.get(1).and_then(|m| match_price(m.as_str().trim())) {
            return Some(price);
        }
    }
    PRICE_TEXT_JSON
        .captures(page.raw)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
}

fn recommerce_for_sale_heading(page: &Page<'_>) -> Option<String> {
    page.doc
        .select(&H2)
        .filter(|h| stripped_text(*h).contains("Til salgs"))
        .find_map(|h| {
            let paragraph = parent(h)?.select(&STYLED_PRICE_PARAGRAPH).next()?;
            match_price(&stripped_text(paragraph))
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn title_of(html: &str, category: Category) -> Option<String> {
        extract_title(&Page::parse(html), category)
    }

    #[test]
    fn realestate_reads_total_price_field() {
        let html = r#"<html><body>
            <h1>Flott leilighet med utsikt</h1>
            <div data-testid="pricing-total-price"><span>Totalpris</span><span>5&nbsp;500&nbsp;000 kr</span></div>
        </body></html>"#;
        let listing = extract(html, Category::Realestate, "u");
        assert_eq!(listing.price, Some(5_500_000));
        assert_eq!(listing.title.as_deref(), Some("Flott leilighet med utsikt"));
        assert_eq!(listing.error, None);
    }

    #[test]
    fn realestate_falls_back_to_label() {
        let html = r#"<dl><div><dt>Totalpris</dt><dd>4 250 000 kr</dd></div></dl>"#;
        assert_eq!(extract(html, Category::Realestate, "u").price, Some(4_250_000));
    }

    #[test]
    fn realestate_field_without_amount_uses_label() {
        let html = r#"
            <div data-testid="pricing-total-price">Pris på forespørsel</div>
            <section><p>Totalpris</p><p>3 100 000 kr</p></section>"#;
        assert_eq!(extract(html, Category::Realestate, "u").price, Some(3_100_000));
    }

    #[test]
    fn mobility_reads_span_next_to_label() {
        let html = r#"<div><p>Totalpris</p><span class="t2">189&nbsp;900 kr</span></div>"#;
        assert_eq!(extract(html, Category::Mobility, "u").price, Some(189_900));
    }

    #[test]
    fn mobility_falls_back_to_any_styled_span() {
        let html = r#"<span class="t2">2019</span><span class="t2">250 000 kr</span>"#;
        assert_eq!(extract(html, Category::Mobility, "u").price, Some(250_000));
    }

    #[test]
    fn recommerce_reads_price_text_json() {
        let html = r#"<script>{"ad":{"priceText":"1 200 kr","id":1}}</script>"#;
        assert_eq!(extract(html, Category::Recommerce, "u").price, Some(1200));
    }

    #[test]
    fn oversized_price_is_unparseable() {
        let html = r#"<h1>Antikk klokke</h1><script>{"priceText":"123456789012345678901234 kr"}</script>"#;
        let listing = extract(html, Category::Recommerce, "u");
        assert_eq!(listing.price, None);
        assert_eq!(listing.title.as_deref(), Some("Antikk klokke"));
        assert_eq!(
            listing.error,
            Some(ExtractError::Unparseable("123456789012345678901234 kr".into()))
        );
    }

    #[test]
    fn recommerce_reads_for_sale_markup() {
        let html = r#"<div><h2>Til salgs</h2><p class="m-0 h2">7 500 kr</p></div>"#;
        assert_eq!(extract(html, Category::Recommerce, "u").price, Some(7500));
    }

    #[test]
    fn recommerce_heading_fallback() {
        // Class order defeats the raw markup pattern.
        let html = r#"<div><h2>Til salgs</h2><p class="h2 price">950 kr</p></div>"#;
        assert_eq!(extract(html, Category::Recommerce, "u").price, Some(950));
    }

    #[test]
    fn unknown_category_reports_error() {
        let listing = extract("<h1>Something here</h1>", Category::Unknown, "u");
        assert_eq!(listing.price, None);
        assert_eq!(
            listing.error,
            Some(ExtractError::UnknownCategory(Category::Unknown))
        );
    }

    #[test]
    fn missing_price_keeps_title() {
        let listing = extract("<h1>Gaming PC</h1>", Category::Mobility, "u");
        assert_eq!(listing.price, None);
        assert_eq!(listing.title.as_deref(), Some("Gaming PC"));
        assert_eq!(listing.error, Some(ExtractError::PriceNotFound));
    }

    #[test]
    fn malformed_markup_never_panics() {
        for html in ["", "<", "<html><body><div><span class=\"t2\">12", "\u{0}\u{a0}kr", "<h1><span></span></h1>"] {
            for category in [Category::Realestate, Category::Mobility, Category::Recommerce] {
                let listing = extract(html, category, "u");
                assert!(listing.price.is_some() || listing.error.is_some());
            }
        }
    }

    #[test]
    fn strips_status_prefixes() {
        let cases = [
            ("Til salgs - Gaming PC", "Gaming PC"),
            ("Til salgs Gaming PC", "Gaming PC"),
            ("Utleie - Leilighet", "Leilighet"),
            ("TIL SALGS - ITEM", "ITEM"),
            ("Normal title without prefix", "Normal title without prefix"),
        ];
        for (raw, expected) in cases {
            let html = format!("<html><body><h1>{raw}</h1></body></html>");
            assert_eq!(title_of(&html, Category::Recommerce).as_deref(), Some(expected));
        }
    }

    #[test]
    fn too_short_titles_are_dropped() {
        assert_eq!(title_of("<h1>Solgt - Hus</h1>", Category::Recommerce), None);
        assert_eq!(title_of("<h1><span></span></h1>", Category::Recommerce), None);
    }

    #[test]
    fn title_chain_prefers_category_selector() {
        let html = r#"<h1>Generic heading</h1><h2 data-testid="object-title">Enebolig på Nesodden</h2>"#;
        assert_eq!(
            title_of(html, Category::Realestate).as_deref(),
            Some("Enebolig på Nesodden")
        );
        let html = r#"<div class="something">No data-testid</div><h1>Fallback Title</h1>"#;
        assert_eq!(title_of(html, Category::Realestate).as_deref(), Some("Fallback Title"));
    }

    #[test]
    fn unknown_has_no_strategies() {
        assert!(price_strategies(Category::Unknown).is_empty());
        assert_eq!(price_strategies(Category::Realestate).len(), 2);
    }
}
