//! Mock collaborators for deterministic testing.
//!
//! Always compiled (not `#[cfg(test)]`) so integration tests in other
//! crates can drive the full pipeline without Ollama, an analysis service,
//! or a web server. Mirrors the builder style of the HTTP backends.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use roster_core::{
    AnalysisOutcome, DocumentFetcher, EmbeddingBackend, Error, FetchedDocument, Result,
    TextAnalyzer, Vector,
};

/// Deterministic embedding from text content.
///
/// Character-based hashing, normalized to a unit vector. The same text
/// always produces the same embedding, and similar texts do not cluster;
/// tests that need controlled similarity should write vectors directly.
pub fn deterministic_embedding(text: &str, dimension: usize) -> Vector {
    let mut components = vec![0.0f32; dimension];

    for (i, c) in text.chars().enumerate() {
        let idx = (c as usize + i) % dimension;
        components[idx] += 0.1;
    }

    let magnitude: f32 = components.iter().map(|x| x * x).sum::<f32>().sqrt();
    if magnitude > 0.0 {
        components.iter_mut().for_each(|x| *x /= magnitude);
    }

    Vector::from(components)
}

fn roll_failure(rate: f64) -> bool {
    use rand::Rng;
    rate > 0.0 && rand::thread_rng().gen::<f64>() < rate
}

// =============================================================================
// EMBEDDING
// =============================================================================

/// Mock [`EmbeddingBackend`] producing deterministic vectors.
#[derive(Clone)]
pub struct MockEmbeddingBackend {
    config: Arc<EmbeddingConfig>,
    call_log: Arc<Mutex<Vec<String>>>,
}

#[derive(Clone)]
struct EmbeddingConfig {
    dimension: usize,
    failure_rate: f64,
}

impl MockEmbeddingBackend {
    pub fn new(dimension: usize) -> Self {
        Self {
            config: Arc::new(EmbeddingConfig {
                dimension,
                failure_rate: 0.0,
            }),
            call_log: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Set failure rate (0.0 - 1.0) for testing error handling.
    pub fn with_failure_rate(mut self, rate: f64) -> Self {
        Arc::make_mut(&mut self.config).failure_rate = rate.clamp(0.0, 1.0);
        self
    }

    /// Number of `embed_texts` calls made so far.
    pub fn embed_call_count(&self) -> usize {
        self.call_log.lock().unwrap().len()
    }

    /// All texts passed to `embed_texts`, in call order.
    pub fn embedded_texts(&self) -> Vec<String> {
        self.call_log.lock().unwrap().clone()
    }
}

impl Default for MockEmbeddingBackend {
    fn default() -> Self {
        Self::new(roster_core::defaults::EMBED_DIMENSION)
    }
}

#[async_trait]
impl EmbeddingBackend for MockEmbeddingBackend {
    async fn embed_texts(&self, texts: &[String]) -> Result<Vec<Vector>> {
        self.call_log.lock().unwrap().extend(texts.iter().cloned());

        if roll_failure(self.config.failure_rate) {
            return Err(Error::Collaborator(
                "Simulated embedding failure".to_string(),
            ));
        }

        Ok(texts
            .iter()
            .map(|t| deterministic_embedding(t, self.config.dimension))
            .collect())
    }

    fn dimension(&self) -> usize {
        self.config.dimension
    }

    fn model_name(&self) -> &str {
        "mock-embed"
    }
}

// =============================================================================
// ANALYSIS
// =============================================================================

/// Mock [`TextAnalyzer`] returning canned candidates.
#[derive(Clone, Default)]
pub struct MockAnalysisBackend {
    config: Arc<AnalysisConfig>,
    call_log: Arc<Mutex<Vec<String>>>,
}

#[derive(Clone, Default)]
struct AnalysisConfig {
    default_outcome: AnalysisOutcome,
    /// Outcomes keyed by a substring of the analyzed text; first match wins.
    mapped_outcomes: Vec<(String, AnalysisOutcome)>,
    failure_rate: f64,
}

impl MockAnalysisBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the outcome returned for every text without a mapping.
    pub fn with_outcome(mut self, outcome: AnalysisOutcome) -> Self {
        Arc::make_mut(&mut self.config).default_outcome = outcome;
        self
    }

    /// Return `outcome` for texts containing `substring`.
    pub fn with_outcome_for(
        mut self,
        substring: impl Into<String>,
        outcome: AnalysisOutcome,
    ) -> Self {
        Arc::make_mut(&mut self.config)
            .mapped_outcomes
            .push((substring.into(), outcome));
        self
    }

    /// Set failure rate (0.0 - 1.0) for testing error handling.
    pub fn with_failure_rate(mut self, rate: f64) -> Self {
        Arc::make_mut(&mut self.config).failure_rate = rate.clamp(0.0, 1.0);
        self
    }

    /// Number of `analyze` calls made so far.
    pub fn analyze_call_count(&self) -> usize {
        self.call_log.lock().unwrap().len()
    }
}

#[async_trait]
impl TextAnalyzer for MockAnalysisBackend {
    async fn analyze(&self, text: &str) -> Result<AnalysisOutcome> {
        self.call_log.lock().unwrap().push(text.to_string());

        if roll_failure(self.config.failure_rate) {
            return Err(Error::Collaborator(
                "Simulated analysis failure".to_string(),
            ));
        }

        for (substring, outcome) in &self.config.mapped_outcomes {
            if text.contains(substring.as_str()) {
                return Ok(outcome.clone());
            }
        }

        Ok(self.config.default_outcome.clone())
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }
}

// =============================================================================
// DOCUMENT FETCH
// =============================================================================

/// Mock [`DocumentFetcher`] serving canned documents by URL.
#[derive(Clone, Default)]
pub struct MockDocumentFetcher {
    config: Arc<FetcherConfig>,
    call_log: Arc<Mutex<Vec<String>>>,
}

#[derive(Clone, Default)]
struct FetcherConfig {
    documents: HashMap<String, FetchedDocument>,
    failing_urls: Vec<String>,
}

impl MockDocumentFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `bytes` with the given content type for `url`.
    pub fn with_document(
        mut self,
        url: impl Into<String>,
        bytes: impl Into<Vec<u8>>,
        content_type: Option<&str>,
    ) -> Self {
        Arc::make_mut(&mut self.config).documents.insert(
            url.into(),
            FetchedDocument {
                bytes: bytes.into(),
                content_type: content_type.map(String::from),
                final_url: None,
            },
        );
        self
    }

    /// Make every fetch of `url` fail.
    pub fn with_failing_url(mut self, url: impl Into<String>) -> Self {
        Arc::make_mut(&mut self.config).failing_urls.push(url.into());
        self
    }

    /// Number of `fetch` calls made so far.
    pub fn fetch_call_count(&self) -> usize {
        self.call_log.lock().unwrap().len()
    }

    /// All URLs fetched, in call order.
    pub fn fetched_urls(&self) -> Vec<String> {
        self.call_log.lock().unwrap().clone()
    }
}

#[async_trait]
impl DocumentFetcher for MockDocumentFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedDocument> {
        self.call_log.lock().unwrap().push(url.to_string());

        if self.config.failing_urls.iter().any(|u| u == url) {
            return Err(Error::Collaborator(format!(
                "Simulated fetch failure for {}",
                url
            )));
        }

        self.config
            .documents
            .get(url)
            .cloned()
            .ok_or_else(|| Error::Collaborator(format!("No canned document for {}", url)))
    }
}
