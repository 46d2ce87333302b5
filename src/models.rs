use serde::Serialize;

use crate::parser::ExtractError;

const TITLE_PREVIEW: usize = 60;

/// One timestamped snapshot of a listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Observation {
    pub price: Option<i64>,
    pub title: Option<String>,
    pub timestamp: String,
}

impl Observation {
    pub fn new(price: Option<i64>, title: Option<String>) -> Self {
        Self {
            price,
            title,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// A detected price change for a previously seen listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Change {
    pub url: String,
    pub old_price: Option<i64>,
    pub new_price: Option<i64>,
    pub title: String,
}

/// What the extractor could read from one page.
#[derive(Debug, Default)]
pub struct Listing {
    pub price: Option<i64>,
    pub title: Option<String>,
    pub error: Option<ExtractError>,
}

/// Title shortened to 60 characters for status lines and reports.
pub fn title_preview(title: &str) -> String {
    if title.chars().count() > TITLE_PREVIEW {
        let head: String = title.chars().take(TITLE_PREVIEW).collect();
        format!("{head}...")
    } else {
        title.to_string()
    }
}
