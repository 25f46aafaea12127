//! Application configuration structures.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{AppError, Result};

/// Root application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Feed location and subject-matter filter
    #[serde(default)]
    pub feed: FeedConfig,

    /// HTTP client settings
    #[serde(default)]
    pub http: HttpConfig,

    /// Digest delivery
    #[serde(default)]
    pub notifier: NotifierConfig,

    /// Local record store
    #[serde(default)]
    pub storage: StorageConfig,

    /// Logging
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Load configuration or return default if loading fails.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        Self::load(&path).unwrap_or_else(|e| {
            log::warn!(
                "Config load failed from {:?}: {}. Using defaults.",
                path.as_ref(),
                e
            );
            Self::default()
        })
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        let feed_url = Url::parse(&self.feed.url)
            .map_err(|e| AppError::validation(format!("feed.url is invalid: {e}")))?;
        if !matches!(feed_url.scheme(), "http" | "https" | "file") {
            return Err(AppError::validation("feed.url must be http(s) or file"));
        }
        if self.feed.watched_prefixes().is_empty() {
            return Err(AppError::validation("feed.cpv_prefixes has no usable prefix"));
        }
        if self.http.user_agent.trim().is_empty() {
            return Err(AppError::validation("http.user_agent is empty"));
        }
        if self.http.timeout_secs == 0 {
            return Err(AppError::validation("http.timeout_secs must be > 0"));
        }
        if let Some(webhook) = &self.notifier.webhook_url {
            Url::parse(webhook).map_err(|e| {
                AppError::validation(format!("notifier.webhook_url is invalid: {e}"))
            })?;
            if self.notifier.api_key.as_deref().unwrap_or("").trim().is_empty() {
                return Err(AppError::validation(
                    "notifier.api_key is required when a webhook is configured",
                ));
            }
        }
        Ok(())
    }
}

/// Feed source settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedConfig {
    /// Seed URL of the newest feed page
    #[serde(default = "defaults::feed_url")]
    pub url: String,

    /// CPV code prefixes an entry must match to be kept
    #[serde(default)]
    pub cpv_prefixes: Vec<String>,
}

impl FeedConfig {
    /// Trimmed, non-empty CPV prefixes.
    pub fn watched_prefixes(&self) -> Vec<String> {
        split_prefixes(self.cpv_prefixes.iter().map(String::as_str))
    }
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            url: defaults::feed_url(),
            cpv_prefixes: Vec::new(),
        }
    }
}

/// Split comma separated CPV prefixes into a clean list.
pub fn split_prefixes<'a>(raw: impl IntoIterator<Item = &'a str>) -> Vec<String> {
    raw.into_iter()
        .flat_map(|item| item.split(','))
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// HTTP client settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    /// User-Agent header for HTTP requests
    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,

    /// Request timeout in seconds
    #[serde(default = "defaults::timeout")]
    pub timeout_secs: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            user_agent: defaults::user_agent(),
            timeout_secs: defaults::timeout(),
        }
    }
}

/// Digest delivery settings. Without a webhook the digest is only logged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NotifierConfig {
    #[serde(default)]
    pub webhook_url: Option<String>,

    #[serde(default)]
    pub api_key: Option<String>,
}

/// Local record store settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "defaults::storage_dir")]
    pub dir: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            dir: defaults::storage_dir(),
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "defaults::log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: defaults::log_level(),
        }
    }
}

mod defaults {
    pub fn feed_url() -> String {
        "https://contrataciondelestado.es/sindicacion/sindicacion_643/licitacionesPerfilesContratanteCompleto3.atom".into()
    }
    pub fn user_agent() -> String {
        "Mozilla/5.0 (compatible; licitation-sync/0.1)".into()
    }
    pub fn timeout() -> u64 {
        60
    }
    pub fn storage_dir() -> String {
        "storage".into()
    }
    pub fn log_level() -> String {
        "info".into()
    }
}
