//! Extractor registry for dispatching documents by detected format.

use std::collections::HashMap;
use std::sync::Arc;

use roster_core::{DocumentFormat, Error, ExtractedText, Result, TextExtractor};

use crate::office::OfficeTextExtractor;
use crate::pdf::PdfTextExtractor;
use crate::text::PlainTextExtractor;

/// Registry mapping document formats to their extractor implementations.
pub struct ExtractorRegistry {
    extractors: HashMap<DocumentFormat, Arc<dyn TextExtractor>>,
}

impl ExtractorRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            extractors: HashMap::new(),
        }
    }

    /// Create a registry with the stock extractors for every format the
    /// classifier can produce.
    pub fn with_default_extractors() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(PdfTextExtractor));
        registry.register(Arc::new(OfficeTextExtractor));
        registry.register(Arc::new(PlainTextExtractor));
        registry
    }

    /// Register an extractor. Replaces any existing extractor for the same
    /// format.
    pub fn register(&mut self, extractor: Arc<dyn TextExtractor>) {
        self.extractors.insert(extractor.format(), extractor);
    }

    /// Extract text using the extractor registered for the given format.
    pub async fn extract(
        &self,
        format: DocumentFormat,
        data: &[u8],
        filename: &str,
        mime_type: &str,
    ) -> Result<ExtractedText> {
        let extractor = self.extractors.get(&format).ok_or_else(|| {
            Error::Extraction(format!(
                "No extractor registered for format: {}",
                format.as_str()
            ))
        })?;
        extractor.extract(data, filename, mime_type).await
    }

    /// List all formats that have registered extractors.
    pub fn available_formats(&self) -> Vec<DocumentFormat> {
        self.extractors.keys().copied().collect()
    }

    /// Check if an extractor is registered for the given format.
    pub fn has_extractor(&self, format: DocumentFormat) -> bool {
        self.extractors.contains_key(&format)
    }

    /// Run health checks on all registered extractors, keyed by format.
    pub async fn health_check_all(&self) -> HashMap<DocumentFormat, bool> {
        let mut results = HashMap::new();
        for (format, extractor) in &self.extractors {
            let healthy = extractor.health_check().await.unwrap_or(false);
            results.insert(*format, healthy);
        }
        results
    }
}

impl Default for ExtractorRegistry {
    fn default() -> Self {
        Self::new()
    }
}
