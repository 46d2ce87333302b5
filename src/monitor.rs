//! One check cycle: fetch every tracked listing, compare with history,
//! record the new observation and collect the changes.

use std::fs;
use std::path::Path;

use tracing::{info, warn};

use crate::archiver::{HistoryError, PriceHistory};
use crate::category::classify;
use crate::fetcher::Fetcher;
use crate::models::{Change, title_preview};
use crate::notifier::{EmailNotifier, Mailer};
use crate::parser;
use crate::price::format_price;

/// How a freshly extracted price relates to the stored one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    FirstEntry,
    Unchanged,
    Changed(Change),
}

/// What one pass over the URL list produced. The changes are valid even
/// when `saved` holds an error.
#[derive(Debug)]
pub struct CheckReport {
    pub changes: Vec<Change>,
    pub saved: Result<(), HistoryError>,
}

/// Tracked URLs from a newline-delimited file. Blank lines and `#` comments
/// are ignored; a missing or unreadable file yields no URLs.
pub fn read_urls(path: &Path) -> Vec<String> {
    if !path.exists() {
        return Vec::new();
    }
    match fs::read_to_string(path) {
        Ok(text) => parse_urls(&text),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "error reading URLs");
            Vec::new()
        }
    }
}

pub fn parse_urls(text: &str) -> Vec<String> {
    text.lines()
        .filter(|line| !line.starts_with('#'))
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

/// Classify a new price against the last stored observation.
pub fn compare(
    url: &str,
    price: Option<i64>,
    title: Option<&str>,
    last_price: Option<i64>,
    last_title: Option<&str>,
) -> Outcome {
    match last_price {
        None => Outcome::FirstEntry,
        Some(prior) if price == Some(prior) => Outcome::Unchanged,
        Some(prior) => Outcome::Changed(Change {
            url: url.to_string(),
            old_price: Some(prior),
            new_price: price,
            title: present(title)
                .or(present(last_title))
                .unwrap_or("Unknown")
                .to_string(),
        }),
    }
}

fn present(title: Option<&str>) -> Option<&str> {
    title.filter(|t| !t.is_empty())
}

/// Check every URL in order and save the history once at the end.
///
/// Fetch and extraction failures skip the URL without touching its history.
pub fn check_urls<F: Fetcher>(
    urls: &[String],
    fetcher: &F,
    history: &mut PriceHistory,
) -> CheckReport {
    info!("Processing {} URLs...", urls.len());
    let mut changes = Vec::new();

    for url in urls {
        let category = classify(url);
        info!(%category, "URL: {url}");

        let markup = match fetcher.fetch(url, category) {
            Ok(markup) => markup,
            Err(e) => {
                warn!(url = %url, error = %e, " Error: {e}");
                continue;
            }
        };

        let listing = parser::extract(&markup, category, url);
        if let Some(e) = &listing.error {
            warn!(url = %url, error = %e, " Error: {e}");
            continue;
        }

        info!(" Price: {}", format_price(listing.price));
        if let Some(title) = &listing.title {
            info!(" Title: {}", title_preview(title));
        }

        let (last_price, last_title) = history.get_last(url);
        match compare(
            url,
            listing.price,
            listing.title.as_deref(),
            last_price,
            last_title.as_deref(),
        ) {
            Outcome::FirstEntry => info!(" First entry"),
            Outcome::Unchanged => info!(" Unchanged"),
            Outcome::Changed(change) => {
                info!(
                    " CHANGED: {} → {}",
                    format_price(change.old_price),
                    format_price(change.new_price)
                );
                changes.push(change);
            }
        }

        history.add(url, listing.price, listing.title);
    }

    CheckReport {
        changes,
        saved: history.save(),
    }
}

/// Full cycle: read URLs, check them, notify on changes.
/// Returns the number of changes found. A failed save is reported only
/// after the changes went out.
pub fn run_check<F: Fetcher, M: Mailer>(
    urls_file: &Path,
    fetcher: &F,
    history: &mut PriceHistory,
    notifier: &EmailNotifier<M>,
) -> anyhow::Result<usize> {
    let urls = read_urls(urls_file);
    if urls.is_empty() {
        info!("No URLs to process");
        return Ok(0);
    }

    let CheckReport { changes, saved } = check_urls(&urls, fetcher, history);

    if changes.is_empty() {
        info!("No changes");
    } else {
        info!("Found {} change(s)", changes.len());
        let sent = notifier.notify(&changes);
        info!(sent, "notification {}", if sent { "delivered" } else { "failed" });
    }
    saved?;
    Ok(changes.len())
}
