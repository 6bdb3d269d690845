//! Collaborator traits at the pipeline's seams.
//!
//! The ingestion core depends on four external collaborators: a document
//! fetcher, format-specific text extractors, a text-analysis service, and
//! an embedding generator. Each is a trait here; HTTP implementations live
//! in `roster-extract`/`roster-enrich`, mocks ship alongside for tests.

use async_trait::async_trait;
use serde_json::Value as JsonValue;

use crate::models::AnalysisOutcome;
use crate::Result;

// =============================================================================
// DOCUMENT FETCH
// =============================================================================

/// A document pulled from the network, before classification.
#[derive(Debug, Clone)]
pub struct FetchedDocument {
    pub bytes: Vec<u8>,
    /// Content type claimed by the server, verified against magic bytes
    /// before an extractor is chosen.
    pub content_type: Option<String>,
    /// URL after redirects, when it differs from the requested one.
    pub final_url: Option<String>,
}

/// Fetches raw document bytes for a URL.
///
/// A fetch failure means "document unavailable"; the ingestor logs it and
/// moves on to the job's remaining documents.
#[async_trait]
pub trait DocumentFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<FetchedDocument>;
}

// =============================================================================
// TEXT EXTRACTION
// =============================================================================

/// Extraction format a [`TextExtractor`] handles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DocumentFormat {
    Pdf,
    Office,
    PlainText,
}

impl DocumentFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentFormat::Pdf => "pdf",
            DocumentFormat::Office => "office",
            DocumentFormat::PlainText => "plain_text",
        }
    }
}

/// Plain text pulled out of one document.
#[derive(Debug, Clone, Default)]
pub struct ExtractedText {
    pub text: String,
    /// Extractor-specific detail (page counts, converter, fallback flags).
    pub metadata: JsonValue,
}

/// Format-specific plain-text extractor.
///
/// Extractors own their temporary files; nothing they create on disk
/// survives a call, successful or not.
#[async_trait]
pub trait TextExtractor: Send + Sync {
    /// The format this extractor handles.
    fn format(&self) -> DocumentFormat;

    /// Extract plain text from raw document bytes.
    async fn extract(&self, data: &[u8], filename: &str, mime_type: &str)
        -> Result<ExtractedText>;

    /// Check whether the extractor's external tooling is available.
    async fn health_check(&self) -> Result<bool>;

    /// Human-readable name of this extractor.
    fn name(&self) -> &str;
}

// =============================================================================
// ENRICHMENT COLLABORATORS
// =============================================================================

/// External text-analysis service turning document text into skill and
/// capability candidates. Failures are non-fatal to the pipeline.
#[async_trait]
pub trait TextAnalyzer: Send + Sync {
    async fn analyze(&self, text: &str) -> Result<AnalysisOutcome>;

    /// Check if the service is reachable.
    async fn health_check(&self) -> Result<bool>;
}

/// Backend for generating text embeddings.
#[async_trait]
pub trait EmbeddingBackend: Send + Sync {
    /// Generate embeddings for the given texts.
    ///
    /// Returns a vector of embedding vectors, one per input text.
    async fn embed_texts(&self, texts: &[String]) -> Result<Vec<crate::Vector>>;

    /// Get the expected dimension of embedding vectors.
    fn dimension(&self) -> usize;

    /// Get the model name being used.
    fn model_name(&self) -> &str;
}
