//! Document ingestion: fetch, screen, extract, analyze, persist.
//!
//! Split into two phases so network work never holds a transaction open.
//! `prepare` does all fetching and extraction up front and swallows
//! per-document failures; `persist_tx` writes the survivors inside the
//! caller's transaction. Every failure path logs the document URL.

use std::sync::Arc;

use serde_json::Value as JsonValue;
use sqlx::{PgPool, Postgres, Transaction};
use tracing::{debug, warn};
use uuid::Uuid;

use roster_core::content::{
    classify_format, detect_content_type, filename_from_url, screen_document,
};
use roster_core::{
    AnalysisOutcome, DocumentFetcher, DocumentRef, NewJobDocument, Result, TextAnalyzer,
};
use roster_db::{PgDocumentRepository, Store};
use roster_extract::ExtractorRegistry;

/// Documents that survived the network phase, plus what analysis found in
/// them.
#[derive(Debug, Default)]
pub struct PreparedDocuments {
    pub documents: Vec<NewJobDocument>,
    pub analysis: AnalysisOutcome,
    /// Documents skipped during fetch or screening.
    pub failed: usize,
}

/// Result of a standalone `process` call.
#[derive(Debug, Default)]
pub struct DocumentOutcome {
    pub stored: usize,
    pub analysis: AnalysisOutcome,
    pub failed: usize,
}

/// Fetches, screens, and extracts posting documents, then persists them
/// against their job row.
pub struct DocumentIngestor {
    documents: PgDocumentRepository,
    pool: PgPool,
    fetcher: Arc<dyn DocumentFetcher>,
    registry: ExtractorRegistry,
    analyzer: Arc<dyn TextAnalyzer>,
    max_document_bytes: u64,
}

impl DocumentIngestor {
    pub fn new(
        store: &Store,
        fetcher: Arc<dyn DocumentFetcher>,
        analyzer: Arc<dyn TextAnalyzer>,
        max_document_bytes: u64,
    ) -> Self {
        Self {
            documents: store.documents.clone(),
            pool: store.pool().clone(),
            fetcher,
            registry: ExtractorRegistry::with_default_extractors(),
            analyzer,
            max_document_bytes,
        }
    }

    /// Network phase: fetch and extract every referenced document.
    ///
    /// Never fails; a document that cannot be fetched or is refused by
    /// screening is counted in `failed` and its siblings continue. A
    /// document whose extraction fails is kept with no parsed text.
    pub async fn prepare(&self, documents: &[DocumentRef]) -> PreparedDocuments {
        let mut prepared = PreparedDocuments::default();

        for doc in documents {
            let fetched = match self.fetcher.fetch(&doc.url).await {
                Ok(fetched) => fetched,
                Err(e) => {
                    warn!(url = %doc.url, error = %e, "Document fetch failed");
                    prepared.failed += 1;
                    continue;
                }
            };

            // Redirects may land on a URL with a more useful filename.
            let filename =
                filename_from_url(fetched.final_url.as_deref().unwrap_or(&doc.url));

            let screen = screen_document(&filename, &fetched.bytes, self.max_document_bytes);
            if !screen.allowed {
                warn!(
                    url = %doc.url,
                    reason = screen.block_reason.as_deref().unwrap_or("unknown"),
                    "Document refused by safety screen"
                );
                prepared.failed += 1;
                continue;
            }

            let claimed = fetched
                .content_type
                .as_deref()
                .or(doc.doc_type.as_deref())
                .unwrap_or("application/octet-stream");
            let content_type = detect_content_type(&filename, &fetched.bytes, claimed);

            let (parsed_text, extraction_meta) = match classify_format(&content_type) {
                Some(format) => {
                    match self
                        .registry
                        .extract(format, &fetched.bytes, &filename, &content_type)
                        .await
                    {
                        Ok(extracted) => (Some(extracted.text), extracted.metadata),
                        Err(e) => {
                            warn!(
                                url = %doc.url,
                                content_type = %content_type,
                                error = %e,
                                "Text extraction failed, storing document without parsed text"
                            );
                            (
                                None,
                                serde_json::json!({ "extraction_error": e.to_string() }),
                            )
                        }
                    }
                }
                // No extractor applies; keep the raw bytes unparsed.
                None => (None, JsonValue::Null),
            };

            if let Some(text) = parsed_text.as_deref() {
                if !text.trim().is_empty() {
                    match self.analyzer.analyze(text).await {
                        Ok(outcome) => prepared.analysis.merge(outcome),
                        Err(e) => {
                            warn!(
                                url = %doc.url,
                                error = %e,
                                "Text analysis failed, no candidates from this document"
                            );
                        }
                    }
                }
            }

            debug!(
                url = %doc.url,
                content_type = %content_type,
                parsed = parsed_text.is_some(),
                bytes = fetched.bytes.len(),
                "Document prepared"
            );

            prepared.documents.push(NewJobDocument {
                url: doc.url.clone(),
                title: doc.title.clone(),
                content_type: Some(content_type),
                raw_content: Some(fetched.bytes),
                parsed_text,
                extraction_meta,
            });
        }

        prepared
    }

    /// Persist prepared documents inside the caller's transaction. One row
    /// per (job, url); re-ingesting replaces the stored content.
    pub async fn persist_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        job_id: Uuid,
        documents: &[NewJobDocument],
    ) -> Result<usize> {
        for doc in documents {
            self.documents.upsert_tx(tx, job_id, doc).await?;
        }
        Ok(documents.len())
    }

    /// Standalone form: prepare, then persist in a transaction of its own.
    pub async fn process(
        &self,
        job_id: Uuid,
        documents: &[DocumentRef],
    ) -> Result<DocumentOutcome> {
        let prepared = self.prepare(documents).await;

        let mut tx = self.pool.begin().await.map_err(roster_core::Error::Database)?;
        let stored = self.persist_tx(&mut tx, job_id, &prepared.documents).await?;
        tx.commit().await.map_err(roster_core::Error::Database)?;

        Ok(DocumentOutcome {
            stored,
            analysis: prepared.analysis,
            failed: prepared.failed,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use roster_core::SkillCandidate;
    use roster_enrich::mock::{MockAnalysisBackend, MockDocumentFetcher};

    // connect_lazy never dials; prepare() does no database work.
    fn ingestor(
        fetcher: MockDocumentFetcher,
        analyzer: MockAnalysisBackend,
        max_bytes: u64,
    ) -> DocumentIngestor {
        let pool = sqlx::postgres::PgPoolOptions::new()
            .connect_lazy("postgres://127.0.0.1:1/roster_unreachable")
            .unwrap();
        let store = Store::new(pool);
        DocumentIngestor::new(&store, Arc::new(fetcher), Arc::new(analyzer), max_bytes)
    }

    fn doc_ref(url: &str) -> DocumentRef {
        DocumentRef {
            url: url.to_string(),
            title: Some("Position description".to_string()),
            doc_type: None,
        }
    }

    #[tokio::test]
    async fn failed_fetch_is_counted_and_siblings_continue() {
        let fetcher = MockDocumentFetcher::new()
            .with_failing_url("https://jobs.example.com/broken.txt")
            .with_document(
                "https://jobs.example.com/desc.txt",
                b"Leads the data engineering practice.".to_vec(),
                Some("text/plain"),
            );
        let ingestor = ingestor(fetcher, MockAnalysisBackend::new(), 1024 * 1024);

        let prepared = ingestor
            .prepare(&[
                doc_ref("https://jobs.example.com/broken.txt"),
                doc_ref("https://jobs.example.com/desc.txt"),
            ])
            .await;

        assert_eq!(prepared.failed, 1);
        assert_eq!(prepared.documents.len(), 1);
        assert_eq!(prepared.documents[0].url, "https://jobs.example.com/desc.txt");
        assert_eq!(
            prepared.documents[0].parsed_text.as_deref(),
            Some("Leads the data engineering practice.")
        );
    }

    #[tokio::test]
    async fn executable_bytes_are_refused() {
        let fetcher = MockDocumentFetcher::new().with_document(
            "https://jobs.example.com/payload",
            b"MZ\x90\x00\x03".to_vec(),
            Some("application/octet-stream"),
        );
        let ingestor = ingestor(fetcher, MockAnalysisBackend::new(), 1024 * 1024);

        let prepared = ingestor
            .prepare(&[doc_ref("https://jobs.example.com/payload")])
            .await;

        assert_eq!(prepared.failed, 1);
        assert!(prepared.documents.is_empty());
    }

    #[tokio::test]
    async fn oversized_document_is_refused() {
        let fetcher = MockDocumentFetcher::new().with_document(
            "https://jobs.example.com/huge.txt",
            vec![b'a'; 200],
            Some("text/plain"),
        );
        let ingestor = ingestor(fetcher, MockAnalysisBackend::new(), 100);

        let prepared = ingestor
            .prepare(&[doc_ref("https://jobs.example.com/huge.txt")])
            .await;

        assert_eq!(prepared.failed, 1);
        assert!(prepared.documents.is_empty());
    }

    #[tokio::test]
    async fn unclassifiable_bytes_are_kept_without_parsed_text() {
        let fetcher = MockDocumentFetcher::new().with_document(
            "https://jobs.example.com/blob",
            vec![0x01, 0x02, 0x03, 0x04],
            Some("application/octet-stream"),
        );
        let ingestor = ingestor(fetcher, MockAnalysisBackend::new(), 1024);

        let prepared = ingestor
            .prepare(&[doc_ref("https://jobs.example.com/blob")])
            .await;

        assert_eq!(prepared.failed, 0);
        assert_eq!(prepared.documents.len(), 1);
        assert!(prepared.documents[0].parsed_text.is_none());
        assert!(prepared.documents[0].raw_content.is_some());
    }

    #[tokio::test]
    async fn analysis_candidates_are_merged() {
        let outcome = AnalysisOutcome {
            skills: vec![SkillCandidate {
                name: "Stakeholder Management".to_string(),
                description: None,
                category: None,
            }],
            capabilities: vec![],
        };
        let fetcher = MockDocumentFetcher::new().with_document(
            "https://jobs.example.com/desc.txt",
            b"Manages stakeholders across the branch.".to_vec(),
            Some("text/plain"),
        );
        let analyzer = MockAnalysisBackend::new().with_outcome(outcome);
        let ingestor = ingestor(fetcher, analyzer, 1024);

        let prepared = ingestor
            .prepare(&[doc_ref("https://jobs.example.com/desc.txt")])
            .await;

        assert_eq!(prepared.analysis.skills.len(), 1);
        assert_eq!(prepared.documents.len(), 1);
    }

    #[tokio::test]
    async fn analyzer_failure_keeps_document_without_candidates() {
        let fetcher = MockDocumentFetcher::new().with_document(
            "https://jobs.example.com/desc.txt",
            b"Coordinates procurement activities.".to_vec(),
            Some("text/plain"),
        );
        let analyzer = MockAnalysisBackend::new().with_failure_rate(1.0);
        let ingestor = ingestor(fetcher, analyzer, 1024);

        let prepared = ingestor
            .prepare(&[doc_ref("https://jobs.example.com/desc.txt")])
            .await;

        assert_eq!(prepared.failed, 0);
        assert_eq!(prepared.documents.len(), 1);
        assert!(prepared.analysis.is_empty());
    }

    #[tokio::test]
    async fn declared_type_is_used_when_bytes_have_no_magic() {
        let fetcher = MockDocumentFetcher::new().with_document(
            "https://jobs.example.com/listing",
            b"Plain description with no file extension.".to_vec(),
            Some("text/plain; charset=utf-8"),
        );
        let ingestor = ingestor(fetcher, MockAnalysisBackend::new(), 1024);

        let prepared = ingestor
            .prepare(&[doc_ref("https://jobs.example.com/listing")])
            .await;

        assert_eq!(
            prepared.documents[0].content_type.as_deref(),
            Some("text/plain")
        );
        assert!(prepared.documents[0].parsed_text.is_some());
    }
}
