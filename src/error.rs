// src/error.rs

//! Unified error handling for the synchronization engine.

use std::fmt;

use thiserror::Error;

/// Result type alias for sync operations.
pub type Result<T> = std::result::Result<T, AppError>;

/// Unified application error type.
#[derive(Error, Debug)]
pub enum AppError {
    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing failed
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// URL parsing failed
    #[error("URL parse error: {0}")]
    Url(#[from] url::ParseError),

    /// Markup could not be decoded into a tree
    #[error("XML decode error: {0}")]
    Xml(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Data validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// A feed page could not be fetched or decoded
    #[error("Feed error for {url}: {message}")]
    Feed { url: String, message: String },

    /// A single feed entry is missing a structurally required field
    #[error("Malformed entry {entry}: {message}")]
    MalformedEntry { entry: String, message: String },

    /// No previous cursor is stored, so there is no lower bound for the run
    #[error("No previous cursor stored")]
    MissingCursor,

    /// Record store failure
    #[error("Storage error: {0}")]
    Storage(String),

    /// Digest delivery failure
    #[error("Notifier error: {0}")]
    Notifier(String),
}

impl AppError {
    /// Create an XML decoding error.
    pub fn xml(message: impl fmt::Display) -> Self {
        Self::Xml(message.to_string())
    }

    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Create a feed page error with the page URL as context.
    pub fn feed(url: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Feed {
            url: url.into(),
            message: message.to_string(),
        }
    }

    /// Create a malformed entry error.
    pub fn malformed(entry: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::MalformedEntry {
            entry: entry.into(),
            message: message.to_string(),
        }
    }

    /// Create a storage error.
    pub fn storage(message: impl fmt::Display) -> Self {
        Self::Storage(message.to_string())
    }

    /// Create a notifier error.
    pub fn notifier(message: impl fmt::Display) -> Self {
        Self::Notifier(message.to_string())
    }
}
