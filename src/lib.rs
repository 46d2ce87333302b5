//! Price monitor for Finn.no listings.
//!
//! Fetches tracked listing pages, extracts price and title, keeps a per-URL
//! history and emails a report when prices move.

pub mod archiver;
pub mod category;
pub mod config;
pub mod fetcher;
pub mod models;
pub mod monitor;
pub mod notifier;
pub mod parser;
pub mod price;
