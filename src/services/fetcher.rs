// src/services/fetcher.rs

//! Feed transport.

use std::time::Duration;

use async_trait::async_trait;
use url::Url;

use crate::error::{AppError, Result};
use crate::models::HttpConfig;

/// Fetches the raw text of one feed page.
#[async_trait]
pub trait AtomFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<String>;
}

/// Create a configured asynchronous HTTP client.
pub fn create_async_client(config: &HttpConfig) -> Result<reqwest::Client> {
    let client = reqwest::Client::builder()
        .user_agent(&config.user_agent)
        .timeout(Duration::from_secs(config.timeout_secs))
        .build()?;
    Ok(client)
}

/// Plain GET fetcher over reqwest. `file://` URLs are read from disk.
pub struct HttpAtomFetcher {
    client: reqwest::Client,
}

impl HttpAtomFetcher {
    pub fn new(config: &HttpConfig) -> Result<Self> {
        Ok(Self {
            client: create_async_client(config)?,
        })
    }

    async fn fetch_file(&self, url: &Url) -> Result<String> {
        let path = url
            .to_file_path()
            .map_err(|_| AppError::feed(url.as_str(), "not a local file path"))?;
        Ok(tokio::fs::read_to_string(path).await?)
    }
}

#[async_trait]
impl AtomFetcher for HttpAtomFetcher {
    async fn fetch(&self, url: &str) -> Result<String> {
        let parsed = Url::parse(url)?;
        if parsed.scheme() == "file" {
            return self.fetch_file(&parsed).await;
        }

        log::debug!("GET {}", url);
        let response = self.client.get(parsed).send().await?.error_for_status()?;
        Ok(response.text().await?)
    }
}
