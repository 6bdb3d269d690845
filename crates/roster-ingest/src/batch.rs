//! Batch orchestration over the per-record pipeline.
//!
//! A batch is partitioned into chunks; records within a chunk run
//! concurrently on a bounded `JoinSet`. Record failures are collected,
//! never thrown: `store_batch` only fails when the batch itself cannot
//! start, such as the institution being unresolvable. Cancellation is
//! checked between chunks; a dispatched chunk always runs to completion.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::task::JoinSet;
use tracing::{debug, error, info, instrument, warn};

use roster_core::{
    BatchMetrics, BatchReport, DocumentFetcher, EmbeddingBackend, PipelineStage, ProcessedRecord,
    RecordFailure, Result, SyncDrift, TextAnalyzer,
};
use roster_db::pool::log_pool_metrics;
use roster_db::{LiveStore, StagingStore};
use roster_enrich::{HttpAnalysisBackend, HttpEmbeddingBackend};
use roster_extract::HttpDocumentFetcher;

use crate::canonical::RoleCanonicalizer;
use crate::config::IngestConfig;
use crate::documents::DocumentIngestor;
use crate::pipeline::RecordPipeline;

/// Cooperative cancellation flag shared between the caller and a running
/// batch. Cancelling stops new chunks from being dispatched.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Drives batches of processed records into the staging store.
pub struct BatchOrchestrator {
    staging: StagingStore,
    live: Option<LiveStore>,
    ingestor: Arc<DocumentIngestor>,
    canonicalizer: Arc<RoleCanonicalizer>,
    config: IngestConfig,
}

impl BatchOrchestrator {
    pub fn new(
        staging: StagingStore,
        live: Option<LiveStore>,
        fetcher: Arc<dyn DocumentFetcher>,
        analyzer: Arc<dyn TextAnalyzer>,
        embedder: Arc<dyn EmbeddingBackend>,
        config: IngestConfig,
    ) -> Self {
        let ingestor = Arc::new(DocumentIngestor::new(
            &staging,
            fetcher,
            analyzer,
            config.max_document_bytes,
        ));
        let canonicalizer = Arc::new(RoleCanonicalizer::new(
            &staging,
            embedder,
            config.similarity_threshold,
        ));
        Self {
            staging,
            live,
            ingestor,
            canonicalizer,
            config,
        }
    }

    /// Validate the configuration and connect the stores it names.
    pub async fn connect(
        config: IngestConfig,
        fetcher: Arc<dyn DocumentFetcher>,
        analyzer: Arc<dyn TextAnalyzer>,
        embedder: Arc<dyn EmbeddingBackend>,
    ) -> Result<Self> {
        config.validate()?;

        let staging = StagingStore::connect(&config.database_url).await?;
        let live = match config.live_database_url.as_deref() {
            Some(url) => Some(LiveStore::connect(url).await?),
            None => None,
        };

        Ok(Self::new(staging, live, fetcher, analyzer, embedder, config))
    }

    /// Full assembly from environment variables, with the stock HTTP
    /// collaborators.
    pub async fn from_env() -> Result<Self> {
        Self::connect(
            IngestConfig::from_env(),
            Arc::new(HttpDocumentFetcher::from_env()),
            Arc::new(HttpAnalysisBackend::from_env()),
            Arc::new(HttpEmbeddingBackend::from_env()),
        )
        .await
    }

    /// Store a batch of records. Partial failures land in the report's
    /// error list; the call itself only fails when the batch cannot start.
    pub async fn store_batch(&self, records: Vec<ProcessedRecord>) -> Result<BatchReport> {
        self.store_batch_with_cancel(records, &CancelToken::new())
            .await
    }

    /// Like [`store_batch`](Self::store_batch), but stops dispatching new
    /// chunks once `cancel` fires.
    #[instrument(skip(self, records, cancel), fields(records = records.len()))]
    pub async fn store_batch_with_cancel(
        &self,
        records: Vec<ProcessedRecord>,
        cancel: &CancelToken,
    ) -> Result<BatchReport> {
        let start = Instant::now();
        let total = records.len();

        // One institution per configured pipeline; resolved once per batch.
        let institution = self
            .staging
            .orgs
            .get_or_create_institution(&self.config.institution)
            .await?;

        let pipeline = RecordPipeline {
            store: (*self.staging).clone(),
            ingestor: self.ingestor.clone(),
            canonicalizer: self.canonicalizer.clone(),
            institution_id: institution.id,
        };

        let mut report = BatchReport {
            succeeded: 0,
            failed: 0,
            errors: Vec::new(),
            metrics: BatchMetrics::default(),
            drift: None,
            duration_ms: 0,
        };

        for (chunk_index, chunk) in records.chunks(self.config.chunk_size).enumerate() {
            if cancel.is_cancelled() {
                warn!(
                    chunk_index,
                    processed = report.succeeded + report.failed,
                    total,
                    "Batch cancelled between chunks"
                );
                break;
            }

            debug!(chunk_index, size = chunk.len(), "Dispatching chunk");
            self.run_chunk(chunk, &pipeline, &mut report).await;
            log_pool_metrics(self.staging.pool());
        }

        report.drift = self.drift().await;
        report.duration_ms = start.elapsed().as_millis() as u64;

        info!(
            succeeded = report.succeeded,
            failed = report.failed,
            total,
            duration_ms = report.duration_ms,
            "Batch complete"
        );

        Ok(report)
    }

    /// Run one chunk's records with at most `max_concurrent_records` in
    /// flight at a time, draining every task before returning.
    async fn run_chunk(
        &self,
        chunk: &[ProcessedRecord],
        pipeline: &RecordPipeline,
        report: &mut BatchReport,
    ) {
        let timeout = Duration::from_secs(self.config.record_timeout_secs);
        let mut tasks = JoinSet::new();

        for record in chunk {
            if tasks.len() >= self.config.max_concurrent_records {
                if let Some(result) = tasks.join_next().await {
                    absorb_result(report, result);
                }
            }

            let pipeline = pipeline.clone();
            let record = record.clone();
            tasks.spawn(async move { run_record(pipeline, record, timeout).await });
        }

        while let Some(result) = tasks.join_next().await {
            absorb_result(report, result);
        }
    }

    /// Staging vs live row counts. Either side being unreadable omits
    /// drift from the report without failing the batch.
    async fn drift(&self) -> Option<SyncDrift> {
        let live = self.live.as_ref()?;

        let live_counts = match live.counts().await {
            Ok(counts) => counts,
            Err(e) => {
                warn!(error = %e, "Live store unreadable, drift omitted");
                return None;
            }
        };
        let staging_counts = match self.staging.counts().await {
            Ok(counts) => counts,
            Err(e) => {
                warn!(error = %e, "Staging counts unreadable, drift omitted");
                return None;
            }
        };

        Some(SyncDrift {
            staging: staging_counts,
            live: live_counts,
            lag: staging_counts.diff(&live_counts),
        })
    }
}

/// Process one record under the per-record timeout.
async fn run_record(
    pipeline: RecordPipeline,
    record: ProcessedRecord,
    timeout: Duration,
) -> std::result::Result<BatchMetrics, RecordFailure> {
    let record_key = record.record_key();
    match tokio::time::timeout(timeout, pipeline.process_record(&record)).await {
        Ok(result) => result,
        Err(_) => {
            warn!(
                record_key = %record_key,
                "Record exceeded timeout of {}s",
                timeout.as_secs()
            );
            Err(RecordFailure {
                record_key,
                stage: PipelineStage::Documents,
                error: format!("record exceeded timeout of {}s", timeout.as_secs()),
            })
        }
    }
}

/// Fold one joined task into the report. Join errors are task panics;
/// they count as failures without a record key to pin them on.
fn absorb_result(
    report: &mut BatchReport,
    result: std::result::Result<
        std::result::Result<BatchMetrics, RecordFailure>,
        tokio::task::JoinError,
    >,
) {
    match result {
        Ok(Ok(metrics)) => {
            report.succeeded += 1;
            report.metrics.absorb(&metrics);
        }
        Ok(Err(failure)) => {
            warn!(
                record_key = %failure.record_key,
                stage = %failure.stage,
                error = %failure.error,
                "Record failed"
            );
            report.failed += 1;
            report.errors.push(failure);
        }
        Err(e) => {
            error!(error = ?e, "Record task panicked");
            report.failed += 1;
            report.errors.push(RecordFailure {
                record_key: "unknown".to_string(),
                stage: PipelineStage::Documents,
                error: format!("record task panicked: {}", e),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancel_token_starts_clear_and_latches() {
        let token = CancelToken::new();
        assert!(!token.is_cancelled());
        token.cancel();
        assert!(token.is_cancelled());
        token.cancel();
        assert!(token.is_cancelled());
    }

    #[test]
    fn cancel_token_clones_share_state() {
        let token = CancelToken::new();
        let observer = token.clone();
        token.cancel();
        assert!(observer.is_cancelled());
    }

    #[test]
    fn report_absorbs_success_and_failure() {
        let mut report = BatchReport {
            succeeded: 0,
            failed: 0,
            errors: Vec::new(),
            metrics: BatchMetrics::default(),
            drift: None,
            duration_ms: 0,
        };

        absorb_result(
            &mut report,
            Ok(Ok(BatchMetrics {
                jobs_created: 1,
                ..Default::default()
            })),
        );
        absorb_result(
            &mut report,
            Ok(Err(RecordFailure {
                record_key: "apsjobs/9".to_string(),
                stage: PipelineStage::Validation,
                error: "record title is empty".to_string(),
            })),
        );

        assert_eq!(report.succeeded, 1);
        assert_eq!(report.failed, 1);
        assert_eq!(report.metrics.jobs_created, 1);
        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.errors[0].record_key, "apsjobs/9");
    }
}
