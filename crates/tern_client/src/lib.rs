use bytes::Bytes;
use reqwest::{Client, StatusCode, Url};
use tern_core::manifest::Manifest;
use thiserror::Error;

mod resolve;
mod sync;

pub use resolve::resolve_server_url;
pub use sync::{LogNotifier, SyncClient, needs_download};

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Server returned error {0}: {1}")]
    Server(StatusCode, String),

    #[error("Invalid server address: {0}")]
    Address(String),
}

pub type Result<T> = std::result::Result<T, SyncError>;

/// Thin HTTP client for the transfer server's endpoints.
#[derive(Clone)]
pub struct TernClient {
    base_url: String,
    http: Client,
}

impl TernClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http: Client::new(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, segments: &[&str]) -> Result<Url> {
        let mut url =
            Url::parse(&self.base_url).map_err(|e| SyncError::Address(e.to_string()))?;
        url.path_segments_mut()
            .map_err(|_| SyncError::Address(self.base_url.clone()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    pub async fn fetch_manifest(&self) -> Result<Manifest> {
        let response = self.http.get(self.url(&["api", "sync"])?).send().await?;
        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(SyncError::Server(status, text));
        }
        Ok(response.json().await?)
    }

    /// Download one asset folder as an archive stream. Folder names are
    /// percent-encoded into the path.
    pub async fn download_folder(&self, zone: &str, folder: &str) -> Result<Bytes> {
        let url = self.url(&["download", zone, folder])?;
        let response = self.http.get(url).send().await?;
        if !response.status().is_success() {
            return Err(SyncError::Server(
                response.status(),
                "Download failed".to_string(),
            ));
        }
        Ok(response.bytes().await?)
    }

    /// Push one payload at the upload endpoint, the same way the browser
    /// upload page does.
    pub async fn upload(&self, zone: &str, name: &str, body: Vec<u8>) -> Result<String> {
        let mut url = self.url(&["upload"])?;
        url.query_pairs_mut()
            .append_pair("zone", zone)
            .append_pair("name", name);
        let response = self.http.post(url).body(body).send().await?;
        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(SyncError::Server(status, text));
        }
        Ok(response.text().await?)
    }
}
