use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use chrono::Utc;
use reqwest::blocking::Client;
use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE, HeaderMap, HeaderValue, USER_AGENT};
use reqwest::redirect;
use thiserror::Error;
use tracing::{debug, warn};

use crate::category::Category;

const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 Chrome/120.0.0.0 Safari/537.36";
const ACCEPT_HTML: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8";
const ACCEPT_LANG: &str = "en-US,en;q=0.5";
const MAX_REDIRECTS: usize = 10;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP {0}")]
    Status(u16),
    #[error("timeout")]
    Timeout,
    #[error("transport error: {0}")]
    Transport(String),
}

impl From<reqwest::Error> for FetchError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Timeout
        } else if let Some(status) = e.status() {
            Self::Status(status.as_u16())
        } else {
            Self::Transport(e.to_string())
        }
    }
}

/// Retrieves the markup of a listing page.
pub trait Fetcher {
    fn fetch(&self, url: &str, category: Category) -> Result<String, FetchError>;
}

pub struct HttpFetcher {
    client: Client,
    dump_dir: Option<PathBuf>,
}

impl HttpFetcher {
    /// Build the client. When `dump_dir` is set every fetched page is also
    /// written there for offline inspection.
    pub fn new(timeout: Duration, dump_dir: Option<PathBuf>) -> Result<Self, FetchError> {
        let redirect_policy = redirect::Policy::custom(|attempt| {
            if attempt.previous().len() > MAX_REDIRECTS {
                attempt.error("too many redirects")
            } else {
                attempt.follow()
            }
        });

        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static(BROWSER_USER_AGENT));
        headers.insert(ACCEPT, HeaderValue::from_static(ACCEPT_HTML));
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static(ACCEPT_LANG));

        let client = Client::builder()
            .redirect(redirect_policy)
            .default_headers(headers)
            .timeout(timeout)
            .build()?;

        if let Some(dir) = &dump_dir {
            if let Err(e) = fs::create_dir_all(dir) {
                warn!(dir = %dir.display(), error = %e, "failed to create debug dump directory");
            }
        }

        Ok(Self { client, dump_dir })
    }

    fn dump(&self, url: &str, category: Category, html: &str) {
        let Some(dir) = &self.dump_dir else {
            return;
        };
        let path = dir.join(dump_file_name(url, category));
        match fs::write(&path, html) {
            Ok(()) => debug!(path = %path.display(), "saved debug HTML"),
            Err(e) => warn!(path = %path.display(), error = %e, "failed to save debug HTML"),
        }
    }
}

impl Fetcher for HttpFetcher {
    fn fetch(&self, url: &str, category: Category) -> Result<String, FetchError> {
        let response = self.client.get(url).send()?;
        let status = response.status();
        let body = response.text()?;
        // Dumped before the status check so error pages can be inspected too.
        self.dump(url, category, &body);

        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }
        Ok(body)
    }
}

fn dump_file_name(url: &str, category: Category) -> String {
    let stamp = Utc::now().format("%Y%m%d_%H%M%S");
    let safe_url: String = url
        .chars()
        .take(50)
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    format!("{stamp}_{category}_{safe_url}.html")
}
