//! HTTP document fetcher for posting URLs.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;

use roster_core::defaults::{FETCH_TIMEOUT_SECS, MAX_DOCUMENT_BYTES};
use roster_core::{DocumentFetcher, Error, FetchedDocument, Result};

/// Fetches posting documents over HTTP with a request timeout and a size
/// cap. Redirects are followed; the final URL is reported back when it
/// differs from the requested one.
pub struct HttpDocumentFetcher {
    client: Client,
    max_bytes: u64,
}

impl HttpDocumentFetcher {
    pub fn new(timeout_secs: u64, max_bytes: u64) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .expect("Failed to create HTTP client");

        Self { client, max_bytes }
    }

    /// Build a fetcher from `ROSTER_FETCH_TIMEOUT_SECS` and
    /// `ROSTER_MAX_DOCUMENT_BYTES`, with defaults when unset.
    pub fn from_env() -> Self {
        let timeout_secs = std::env::var("ROSTER_FETCH_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(FETCH_TIMEOUT_SECS);

        let max_bytes = std::env::var("ROSTER_MAX_DOCUMENT_BYTES")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(MAX_DOCUMENT_BYTES);

        Self::new(timeout_secs, max_bytes)
    }
}

impl Default for HttpDocumentFetcher {
    fn default() -> Self {
        Self::from_env()
    }
}

#[async_trait]
impl DocumentFetcher for HttpDocumentFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedDocument> {
        let response = self.client.get(url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Collaborator(format!(
                "Fetch of {} failed with status {}",
                url, status
            )));
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(String::from);

        let final_url = (response.url().as_str() != url).then(|| response.url().to_string());

        // Declared length first, so an oversized body is refused before it
        // is buffered.
        if let Some(len) = response.content_length() {
            if len > self.max_bytes {
                return Err(Error::Collaborator(format!(
                    "Document at {} exceeds maximum size ({} > {} bytes)",
                    url, len, self.max_bytes
                )));
            }
        }

        let bytes = response.bytes().await?;
        if bytes.len() as u64 > self.max_bytes {
            return Err(Error::Collaborator(format!(
                "Document at {} exceeds maximum size ({} > {} bytes)",
                url,
                bytes.len(),
                self.max_bytes
            )));
        }

        debug!(url, size = bytes.len(), content_type, "Fetched document");

        Ok(FetchedDocument {
            bytes: bytes.to_vec(),
            content_type,
            final_url,
        })
    }
}
