//! Remote module fetching.

use async_trait::async_trait;
use reqwest::header::{CACHE_CONTROL, CONTENT_TYPE};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("failed to fetch {url}: {message}")]
    Transport { url: String, message: String },

    #[error("failed to fetch {url}: server responded with {status}")]
    Status { url: String, status: u16 },
}

/// Body and `Content-Type` of a fetched module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fetched {
    pub contents: String,
    pub content_type: Option<String>,
}

#[async_trait]
pub trait ModuleFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Fetched, FetchError>;
}

/// HTTP fetcher; every request revalidates with `Cache-Control: no-cache`.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new() -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("sandpit/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| FetchError::Transport {
                url: String::new(),
                message: e.to_string(),
            })?;
        Ok(Self { client })
    }
}

#[async_trait]
impl ModuleFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<Fetched, FetchError> {
        let transport = |e: reqwest::Error| FetchError::Transport {
            url: url.to_string(),
            message: e.to_string(),
        };

        let response = self
            .client
            .get(url)
            .header(CACHE_CONTROL, "no-cache")
            .send()
            .await
            .map_err(transport)?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let contents = response.text().await.map_err(transport)?;

        crate::debug!("fetch"; "{} ({} bytes)", url, contents.len());
        Ok(Fetched {
            contents,
            content_type,
        })
    }
}
