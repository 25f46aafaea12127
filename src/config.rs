// src/config.rs

//! Configuration loading utilities.
//!
//! Settings come from a TOML file, then environment variables override
//! individual fields, then the result is validated.

use std::path::Path;

use crate::error::Result;
use crate::models::{Config, split_prefixes};

/// Seed feed URL.
pub const ENV_FEED_URL: &str = "BASE_FEED_URL";
/// Comma-separated watched CPV prefixes.
pub const ENV_CPVS: &str = "CPVS";
pub const ENV_WEBHOOK_URL: &str = "NOTIFIER_WEBHOOK_URL";
pub const ENV_API_KEY: &str = "NOTIFIER_API_KEY";
pub const ENV_STORAGE_DIR: &str = "STORAGE_DIR";
pub const ENV_LOG_LEVEL: &str = "LOG_LEVEL";

/// Load the file, falling back to defaults when it is absent, and apply
/// environment overrides. A file that exists but does not parse is an error.
pub fn load_settings(path: &Path) -> Result<Config> {
    let mut config = if path.exists() {
        Config::load(path)?
    } else {
        Config::default()
    };
    apply_overrides(&mut config, |key| std::env::var(key).ok());
    Ok(config)
}

/// [`load_settings`] followed by validation.
pub fn load_config(path: &Path) -> Result<Config> {
    let config = load_settings(path)?;
    config.validate()?;
    Ok(config)
}

/// Override fields from `lookup`. Blank values are ignored.
pub fn apply_overrides(config: &mut Config, lookup: impl Fn(&str) -> Option<String>) {
    let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

    if let Some(url) = var(ENV_FEED_URL) {
        config.feed.url = url.trim().to_string();
    }
    if let Some(cpvs) = var(ENV_CPVS) {
        config.feed.cpv_prefixes = split_prefixes([cpvs.as_str()]);
    }
    if let Some(url) = var(ENV_WEBHOOK_URL) {
        config.notifier.webhook_url = Some(url.trim().to_string());
    }
    if let Some(key) = var(ENV_API_KEY) {
        config.notifier.api_key = Some(key);
    }
    if let Some(dir) = var(ENV_STORAGE_DIR) {
        config.storage.dir = dir;
    }
    if let Some(level) = var(ENV_LOG_LEVEL) {
        config.logging.level = level;
    }
}
