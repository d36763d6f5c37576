//! Byte sources for the media loader

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use thiserror::Error;

/// Failure to obtain media bytes
#[derive(Debug, Error)]
pub enum FetchError {
    /// Transport or body read failure
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Server answered with a non-success status
    #[error("unexpected status {status} for {url}")]
    Status {
        /// Requested URL
        url: String,
        /// HTTP status code
        status: u16,
    },

    /// Bundled asset could not be read
    #[error("asset read failed: {0}")]
    Io(#[from] std::io::Error),
}

/// Raw media bytes plus the declared content type, if any
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fetched {
    /// Body bytes
    pub bytes: Vec<u8>,
    /// `Content-Type` as reported by the source
    pub content_type: Option<String>,
}

/// Anything that can turn a source reference into bytes
#[async_trait]
pub trait Fetch: Send + Sync {
    /// Fetch the bytes behind `url`
    async fn fetch(&self, url: &str) -> Result<Fetched, FetchError>;
}

/// Fetches `http(s)://` sources over the network and everything else from
/// a bundled asset directory.
///
/// The HTTP client keeps no cookie store, so requests never carry
/// credentials.
#[derive(Debug, Clone)]
pub struct SourceFetcher {
    client: reqwest::Client,
    asset_root: PathBuf,
}

impl SourceFetcher {
    /// Fetcher with a default HTTP client
    pub fn new(asset_root: impl Into<PathBuf>) -> Self {
        Self::with_client(reqwest::Client::new(), asset_root)
    }

    /// Fetcher sharing an existing HTTP client
    pub fn with_client(client: reqwest::Client, asset_root: impl Into<PathBuf>) -> Self {
        Self {
            client,
            asset_root: asset_root.into(),
        }
    }

    /// Directory bundled assets are resolved against
    pub fn asset_root(&self) -> &Path {
        &self.asset_root
    }

    fn asset_path(&self, url: &str) -> PathBuf {
        match url.strip_prefix("file://") {
            Some(path) => PathBuf::from(path),
            None => self.asset_root.join(url.trim_start_matches('/')),
        }
    }

    async fn fetch_remote(&self, url: &str) -> Result<Fetched, FetchError> {
        let response = self.client.get(url).send().await?;

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
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        let bytes = response.bytes().await?.to_vec();

        Ok(Fetched {
            bytes,
            content_type,
        })
    }
}

fn is_remote(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}

#[async_trait]
impl Fetch for SourceFetcher {
    async fn fetch(&self, url: &str) -> Result<Fetched, FetchError> {
        if is_remote(url) {
            return self.fetch_remote(url).await;
        }

        let bytes = tokio::fs::read(self.asset_path(url)).await?;
        Ok(Fetched {
            bytes,
            content_type: None,
        })
    }
}
