//! Runtime settings and SMTP configuration.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;
use tracing::warn;

pub const DEFAULT_SMTP_PORT: u16 = 587;
pub const HTTP_TIMEOUT: Duration = Duration::from_secs(30);
pub const MAX_INTERVAL_HOURS: f64 = 168.0;

const CONFIG_KEYS: [&str; 6] = [
    "SMTP_HOST",
    "SMTP_PORT",
    "SMTP_USER",
    "SMTP_PASS",
    "EMAIL_FROM",
    "EMAIL_TO",
];

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid SMTP_PORT {0:?}")]
    InvalidPort(String),
    #[error("check interval must be within (0, 168] hours, got {0}")]
    InvalidInterval(f64),
}

/// Paths and flags for one process, passed to the components that need them.
#[derive(Debug, Clone)]
pub struct Settings {
    pub data_dir: PathBuf,
    pub debug: bool,
    pub http_timeout: Duration,
}

impl Settings {
    pub fn new(data_dir: impl Into<PathBuf>, debug: bool) -> Self {
        Self {
            data_dir: data_dir.into(),
            debug,
            http_timeout: HTTP_TIMEOUT,
        }
    }

    pub fn urls_file(&self) -> PathBuf {
        self.data_dir.join("urls.txt")
    }

    pub fn history_file(&self) -> PathBuf {
        self.data_dir.join("price_history.json")
    }

    pub fn dump_dir(&self) -> Option<PathBuf> {
        self.debug.then(|| self.data_dir.join("debug_dumps"))
    }

    /// `config.env` in the data directory, else next to the executable.
    pub fn config_file(&self) -> Option<PathBuf> {
        let local = self.data_dir.join("config.env");
        if local.exists() {
            return Some(local);
        }
        env::current_exe()
            .ok()
            .and_then(|exe| exe.parent().map(|dir| dir.join("config.env")))
            .filter(|path| path.exists())
    }
}

/// Validate the hours between cycles in loop mode.
pub fn check_interval(hours: f64) -> Result<Duration, ConfigError> {
    if !hours.is_finite() || hours <= 0.0 || hours > MAX_INTERVAL_HOURS {
        return Err(ConfigError::InvalidInterval(hours));
    }
    Ok(Duration::from_secs_f64(hours * 3600.0))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailConfig {
    pub smtp_host: Option<String>,
    pub smtp_port: u16,
    pub smtp_user: Option<String>,
    pub smtp_pass: Option<String>,
    pub email_from: Option<String>,
    pub email_to: Option<String>,
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            smtp_host: None,
            smtp_port: DEFAULT_SMTP_PORT,
            smtp_user: None,
            smtp_pass: None,
            email_from: None,
            email_to: None,
        }
    }
}

/// Fully populated SMTP settings; only obtainable from a valid [`MailConfig`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SmtpSettings {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub pass: String,
    pub from: String,
    pub to: String,
}

impl MailConfig {
    /// Read from the process environment, then `file` for keys the
    /// environment leaves unset or empty.
    pub fn load(file: Option<&Path>) -> Result<Self, ConfigError> {
        Self::from_sources(env::vars(), file)
    }

    pub fn from_sources(
        vars: impl IntoIterator<Item = (String, String)>,
        file: Option<&Path>,
    ) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let mut from_env = Vec::new();

        for (key, value) in vars {
            if value.is_empty() || !CONFIG_KEYS.contains(&key.as_str()) {
                continue;
            }
            config.set(&key, &value)?;
            from_env.push(key);
        }

        if let Some(path) = file {
            config.merge_file(path, &from_env);
        }
        Ok(config)
    }

    fn merge_file(&mut self, path: &Path, from_env: &[String]) {
        let text = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to read config file");
                return;
            }
        };

        for line in text.lines().map(str::trim) {
            if line.starts_with('#') {
                continue;
            }
            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            let key = key.trim();
            let value = value.trim().trim_matches(|c: char| c == '"' || c == '\'');
            if from_env.iter().any(|k| k == key) {
                continue;
            }
            if let Err(e) = self.set(key, value) {
                warn!(path = %path.display(), error = %e, "skipping config line");
            }
        }
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let value = value.to_string();
        match key {
            "SMTP_HOST" => self.smtp_host = Some(value),
            "SMTP_PORT" => {
                self.smtp_port = value
                    .trim()
                    .parse()
                    .map_err(|_| ConfigError::InvalidPort(value))?
            }
            "SMTP_USER" => self.smtp_user = Some(value),
            "SMTP_PASS" => self.smtp_pass = Some(value),
            "EMAIL_FROM" => self.email_from = Some(value),
            "EMAIL_TO" => self.email_to = Some(value),
            _ => {}
        }
        Ok(())
    }

    pub fn is_valid(&self) -> bool {
        self.smtp_settings().is_some()
    }

    pub fn smtp_settings(&self) -> Option<SmtpSettings> {
        fn present(field: &Option<String>) -> Option<String> {
            field.as_ref().filter(|v| !v.is_empty()).cloned()
        }
        Some(SmtpSettings {
            host: present(&self.smtp_host)?,
            port: self.smtp_port,
            user: present(&self.smtp_user)?,
            pass: present(&self.smtp_pass)?,
            from: present(&self.email_from)?,
            to: present(&self.email_to)?,
        })
    }
}
