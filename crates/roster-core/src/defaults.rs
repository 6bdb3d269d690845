//! Centralized default constants for the roster ingestion system.
//!
//! **This module is the single source of truth** for shared default values.
//! All crates should reference these constants instead of defining their own
//! magic numbers.
//!
//! Organized by domain area. When adding new constants, place them in the
//! appropriate section and document the rationale for the chosen value.

// =============================================================================
// EMBEDDING
// =============================================================================

/// Default embedding model name (Ollama).
pub const EMBED_MODEL: &str = "nomic-embed-text";

/// Default embedding vector dimension for nomic-embed-text.
pub const EMBED_DIMENSION: usize = 768;

/// Default Ollama base URL.
pub const OLLAMA_URL: &str = "http://127.0.0.1:11434";

/// Timeout for embedding requests in seconds.
pub const EMBED_TIMEOUT_SECS: u64 = 30;

// =============================================================================
// SIMILARITY
// =============================================================================

/// Minimum cosine similarity for folding a role title into an existing
/// general role. Matches at or below this score create a new general role
/// instead.
pub const GENERAL_ROLE_MATCH_THRESHOLD: f64 = 0.75;

/// Default result limit for similarity queries.
pub const SIMILAR_LIMIT: i64 = 10;

// =============================================================================
// BATCH PROCESSING
// =============================================================================

/// Records per chunk when walking a batch.
pub const BATCH_CHUNK_SIZE: usize = 100;

/// Maximum records processed concurrently within a chunk.
pub const MAX_CONCURRENT_RECORDS: usize = 4;

/// Per-record timeout in seconds. A record that exceeds this counts as
/// failed without taking the batch down.
pub const RECORD_TIMEOUT_SECS: u64 = 120;

// =============================================================================
// DOCUMENT HANDLING
// =============================================================================

/// Timeout for fetching a single posting document in seconds.
pub const FETCH_TIMEOUT_SECS: u64 = 30;

/// Maximum fetched document size in bytes (25 MB).
/// Configurable via `ROSTER_MAX_DOCUMENT_BYTES`.
pub const MAX_DOCUMENT_BYTES: u64 = 25 * 1024 * 1024;

/// Per-command timeout for external extraction tools (seconds).
pub const EXTRACTION_CMD_TIMEOUT_SECS: u64 = 60;

/// Page threshold for batch PDF extraction.
pub const LARGE_PDF_PAGE_THRESHOLD: usize = 100;

/// Pages per batch for large PDF extraction.
pub const PDF_BATCH_PAGES: usize = 50;

/// Average extracted characters per page below which a PDF is flagged as
/// needing OCR. Scanned postings yield almost no text layer.
pub const PDF_OCR_CHARS_PER_PAGE: usize = 16;

// =============================================================================
// ANALYSIS SERVICE
// =============================================================================

/// Default analysis service base URL.
pub const ANALYSIS_URL: &str = "http://127.0.0.1:8088";

/// Timeout for analysis requests in seconds.
pub const ANALYZE_TIMEOUT_SECS: u64 = 60;

/// Maximum characters of parsed text sent to the analysis service per
/// document. Longer texts are truncated at a whitespace boundary.
pub const ANALYZE_MAX_CHARS: usize = 100_000;

// =============================================================================
// DATABASE
// =============================================================================

/// Default maximum connections per pool.
pub const PG_MAX_CONNECTIONS: u32 = 10;

/// Default minimum idle connections per pool.
pub const PG_MIN_CONNECTIONS: u32 = 1;

/// Default connection acquire timeout in seconds.
pub const PG_ACQUIRE_TIMEOUT_SECS: u64 = 30;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn match_threshold_is_a_proportion() {
        // Runtime check needed for floating point comparison
        assert!(GENERAL_ROLE_MATCH_THRESHOLD > 0.0);
        assert!(GENERAL_ROLE_MATCH_THRESHOLD < 1.0);
    }

    #[test]
    fn pdf_batching_consistent() {
        const {
            assert!(PDF_BATCH_PAGES <= LARGE_PDF_PAGE_THRESHOLD);
            assert!(PDF_BATCH_PAGES > 0);
        }
    }

    #[test]
    fn batch_limits_consistent() {
        const {
            assert!(MAX_CONCURRENT_RECORDS >= 1);
            assert!(MAX_CONCURRENT_RECORDS <= BATCH_CHUNK_SIZE);
        }
    }

    #[test]
    fn pool_limits_consistent() {
        const {
            assert!(PG_MIN_CONNECTIONS <= PG_MAX_CONNECTIONS);
        }
    }
}
