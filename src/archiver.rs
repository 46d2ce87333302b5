//! Per-URL price history persisted as pretty-printed JSON.
//!
//! Older files stored each series as a flat `[price, timestamp, ...]` array.
//! Those are decoded into [`Observation`]s once at load time; nothing else
//! sees the legacy shape.

use std::fs;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde::Deserialize;
use serde_json::{Map, Number, Value};
use thiserror::Error;
use tracing::{debug, warn};

use crate::models::Observation;
use crate::price;

#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("failed to write history file {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to encode history: {0}")]
    Json(#[from] serde_json::Error),
}

/// One element of a stored series as found on disk. Objects are kept as
/// raw maps so a record with an odd field type still survives the load.
#[derive(Deserialize)]
#[serde(untagged)]
enum StoredEntry {
    Record(Map<String, Value>),
    Price(Number),
    Other(Value),
}

pub struct PriceHistory {
    path: PathBuf,
    series: IndexMap<String, Vec<Observation>>,
}

impl PriceHistory {
    /// Load the history at `path`. A missing file starts empty; an
    /// unreadable one is logged and also starts empty.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let series = match read_series(&path) {
            Ok(Some(series)) => series,
            Ok(None) => IndexMap::new(),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "could not load history, starting empty");
                IndexMap::new()
            }
        };
        Self { path, series }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Price and title of the most recent observation for `url`.
    pub fn get_last(&self, url: &str) -> (Option<i64>, Option<String>) {
        match self.series.get(url).and_then(|s| s.last()) {
            Some(last) => (last.price, last.title.clone()),
            None => (None, None),
        }
    }

    /// Append an observation stamped with the current UTC time.
    pub fn add(&mut self, url: &str, price: Option<i64>, title: Option<String>) {
        self.series
            .entry(url.to_string())
            .or_default()
            .push(Observation::new(price, title));
    }

    pub fn series(&self, url: &str) -> &[Observation] {
        self.series.get(url).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.series.len()
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }

    /// Overwrite the history file with the full in-memory state.
    pub fn save(&self) -> Result<(), HistoryError> {
        let json = serde_json::to_string_pretty(&self.series)?;
        fs::write(&self.path, json).map_err(|source| HistoryError::Io {
            path: self.path.clone(),
            source,
        })?;
        debug!(path = %self.path.display(), urls = self.series.len(), "history saved");
        Ok(())
    }
}

fn read_series(path: &Path) -> anyhow::Result<Option<IndexMap<String, Vec<Observation>>>> {
    if !path.exists() {
        return Ok(None);
    }
    let text = fs::read_to_string(path)?;
    let raw: IndexMap<String, Vec<StoredEntry>> = serde_json::from_str(&text)?;
    let migrated = raw
        .into_iter()
        .map(|(url, entries)| (url, migrate(entries)))
        .collect();
    Ok(Some(migrated))
}

/// Decode one stored series. Objects with a `price` key become records, a
/// bare number consumes the following element as its timestamp, anything
/// else is skipped.
fn migrate(entries: Vec<StoredEntry>) -> Vec<Observation> {
    let mut out = Vec::with_capacity(entries.len());
    let mut entries = entries.into_iter();

    while let Some(entry) = entries.next() {
        match entry {
            StoredEntry::Record(record) if record.contains_key("price") => {
                out.push(record_observation(record));
            }
            StoredEntry::Record(record) => {
                debug!(entry = %serde_json::Value::Object(record), "skipping history object without price");
            }
            StoredEntry::Price(number) => {
                let timestamp = match entries.next() {
                    Some(next) => legacy_timestamp(next),
                    None => chrono::Utc::now().to_rfc3339(),
                };
                out.push(Observation {
                    price: legacy_price(&number),
                    title: None,
                    timestamp,
                });
            }
            StoredEntry::Other(value) => {
                debug!(entry = %value, "skipping unrecognised history entry");
            }
        }
    }
    out
}

fn record_observation(mut record: Map<String, Value>) -> Observation {
    let price = match record.remove("price") {
        Some(Value::Number(number)) => legacy_price(&number),
        Some(Value::String(text)) => price::parse_price(&text),
        _ => None,
    };
    let title = match record.remove("title") {
        None | Some(Value::Null) => None,
        Some(Value::String(title)) => Some(title),
        Some(other) => Some(other.to_string()),
    };
    let timestamp = match record.remove("timestamp") {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(timestamp)) => timestamp,
        Some(other) => other.to_string(),
    };
    Observation {
        price,
        title,
        timestamp,
    }
}

fn legacy_price(number: &Number) -> Option<i64> {
    number
        .as_i64()
        .or_else(|| number.as_f64().map(|f| f.trunc() as i64))
}

fn legacy_timestamp(entry: StoredEntry) -> String {
    match entry {
        StoredEntry::Other(Value::String(s)) => s,
        StoredEntry::Other(value) => value.to_string(),
        StoredEntry::Price(number) => number.to_string(),
        StoredEntry::Record(record) => Value::Object(record).to_string(),
    }
}
