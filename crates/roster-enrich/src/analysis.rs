//! HTTP client for the skill/capability analysis service.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use tracing::{debug, warn};

use roster_core::defaults::{ANALYSIS_URL, ANALYZE_MAX_CHARS, ANALYZE_TIMEOUT_SECS};
use roster_core::{AnalysisOutcome, Error, Result, TextAnalyzer};

/// Analysis backend speaking JSON over HTTP: `POST /v1/analyze` with the
/// document text, skill and capability candidates back.
///
/// Input longer than the configured cap is truncated at a whitespace
/// boundary before sending; posting boilerplate past the cap adds noise,
/// not signal.
pub struct HttpAnalysisBackend {
    client: Client,
    base_url: String,
    max_chars: usize,
    timeout_secs: u64,
}

#[derive(Serialize)]
struct AnalyzeRequest<'a> {
    text: &'a str,
}

/// Truncate to at most `max_chars` bytes, cutting at the last whitespace
/// before the limit so no word is split. Falls back to the nearest char
/// boundary when the text has no whitespace at all.
fn truncate_at_whitespace(text: &str, max_chars: usize) -> &str {
    if text.len() <= max_chars {
        return text;
    }

    let mut boundary = max_chars;
    while boundary > 0 && !text.is_char_boundary(boundary) {
        boundary -= 1;
    }

    match text[..boundary].rfind(char::is_whitespace) {
        Some(idx) if idx > 0 => &text[..idx],
        _ => &text[..boundary],
    }
}

impl HttpAnalysisBackend {
    pub fn new(base_url: String) -> Self {
        let timeout_secs = std::env::var("ROSTER_ANALYZE_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(ANALYZE_TIMEOUT_SECS);

        let max_chars = std::env::var("ROSTER_ANALYZE_MAX_CHARS")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .unwrap_or(ANALYZE_MAX_CHARS);

        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            base_url,
            max_chars,
            timeout_secs,
        }
    }

    /// Create from `ROSTER_ANALYSIS_URL`, with the default endpoint when
    /// unset.
    pub fn from_env() -> Self {
        let base_url =
            std::env::var("ROSTER_ANALYSIS_URL").unwrap_or_else(|_| ANALYSIS_URL.to_string());
        Self::new(base_url)
    }
}

impl Default for HttpAnalysisBackend {
    fn default() -> Self {
        Self::from_env()
    }
}

#[async_trait]
impl TextAnalyzer for HttpAnalysisBackend {
    async fn analyze(&self, text: &str) -> Result<AnalysisOutcome> {
        if text.trim().is_empty() {
            return Ok(AnalysisOutcome::default());
        }

        let body = truncate_at_whitespace(text, self.max_chars);
        if body.len() < text.len() {
            debug!(
                original = text.len(),
                sent = body.len(),
                "Truncated analysis input"
            );
        }

        let response = self
            .client
            .post(format!("{}/v1/analyze", self.base_url))
            .timeout(Duration::from_secs(self.timeout_secs))
            .json(&AnalyzeRequest { text: body })
            .send()
            .await
            .map_err(|e| Error::Collaborator(format!("Analysis request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Collaborator(format!(
                "Analysis service returned {}: {}",
                status, body
            )));
        }

        let outcome: AnalysisOutcome = response.json().await.map_err(|e| {
            Error::Collaborator(format!("Failed to parse analysis response: {}", e))
        })?;

        debug!(
            skills = outcome.skills.len(),
            capabilities = outcome.capabilities.len(),
            "Analysis complete"
        );

        Ok(outcome)
    }

    async fn health_check(&self) -> Result<bool> {
        let response = self
            .client
            .get(format!("{}/health", self.base_url))
            .timeout(Duration::from_secs(5))
            .send()
            .await;

        match response {
            Ok(resp) => Ok(resp.status().is_success()),
            Err(e) => {
                warn!("Analysis service health check error: {}", e);
                Ok(false)
            }
        }
    }
}
