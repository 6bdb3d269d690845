//! Structured logging schema and field name constants for roster.
//!
//! All crates use these constants for consistent structured logging fields.
//! This ensures log aggregation tools (Loki, Elasticsearch) can query by
//! standardized field names across every subsystem.
//!
//! ## Log Level Contract
//!
//! | Level | Usage |
//! |-------|-------|
//! | ERROR | Degraded service, requires operator attention |
//! | WARN  | Recoverable issue, record skipped or fallback applied |
//! | INFO  | Lifecycle events (batch start/finish), operation completions |
//! | DEBUG | Decision points, intermediate values, config choices |
//! | TRACE | Per-item iteration, high-volume data (documents, candidates) |

// ─── Identity fields ───────────────────────────────────────────────────────

/// Batch UUID propagated across chunk → record → sub-calls.
/// Format: UUIDv7 (time-ordered).
pub const BATCH_ID: &str = "batch_id";

/// Subsystem originating the log event.
/// Values: "db", "extract", "enrich", "ingest"
pub const SUBSYSTEM: &str = "subsystem";

/// Component within a subsystem.
/// Examples: "job_store", "pdf", "pandoc", "ollama", "orchestrator"
pub const COMPONENT: &str = "component";

/// Logical operation name.
/// Examples: "upsert", "archive", "extract", "embed_texts", "store_batch"
pub const OPERATION: &str = "op";

// ─── Entity fields ─────────────────────────────────────────────────────────

/// Company UUID being operated on.
pub const COMPANY_ID: &str = "company_id";

/// Role UUID being operated on.
pub const ROLE_ID: &str = "role_id";

/// Job UUID being processed.
pub const JOB_ID: &str = "job_id";

/// Source-scoped record key ("source_id/original_id").
pub const RECORD_KEY: &str = "record_key";

/// Document URL being fetched or persisted.
pub const URL: &str = "url";

/// Pipeline stage a record was in when an event fired.
pub const STAGE: &str = "stage";

// ─── Measurement fields ────────────────────────────────────────────────────

/// Wall-clock duration in milliseconds.
pub const DURATION_MS: &str = "duration_ms";

/// Number of records in a batch or chunk.
pub const RECORD_COUNT: &str = "record_count";

/// Number of documents attached to a record.
pub const DOCUMENT_COUNT: &str = "document_count";

/// Number of input texts sent to an embedding model.
pub const INPUT_COUNT: &str = "input_count";

/// Character length of extracted or analyzed text.
pub const TEXT_LEN: &str = "text_len";

/// Page count reported for a PDF document.
pub const PAGE_COUNT: &str = "page_count";

// ─── Versioning fields ─────────────────────────────────────────────────────

/// Live version a job landed on after an upsert.
pub const VERSION: &str = "version";

/// History transition kind ("create", "update", "archive").
pub const CHANGE_TYPE: &str = "change_type";

// ─── Similarity fields ─────────────────────────────────────────────────────

/// Similarity threshold applied to a match query.
pub const THRESHOLD: &str = "threshold";

/// Number of matches above threshold.
pub const MATCH_COUNT: &str = "match_count";

/// Best similarity score in a result set.
pub const TOP_SIMILARITY: &str = "top_similarity";

// ─── Database fields ───────────────────────────────────────────────────────

/// Number of active connections in the pool.
pub const POOL_SIZE: &str = "pool_size";

/// Number of idle connections in the pool.
pub const POOL_IDLE: &str = "pool_idle";

/// Database table or entity affected.
pub const DB_TABLE: &str = "db_table";

// ─── Inference fields ──────────────────────────────────────────────────────

/// Model name used for embedding.
pub const MODEL: &str = "model";

// ─── Outcome fields ────────────────────────────────────────────────────────

/// Boolean success/failure indicator.
pub const SUCCESS: &str = "success";

/// Error message when an operation fails.
pub const ERROR_MSG: &str = "error";

/// Records that completed in a batch.
pub const SUCCEEDED: &str = "succeeded";

/// Records that failed in a batch.
pub const FAILED: &str = "failed";
