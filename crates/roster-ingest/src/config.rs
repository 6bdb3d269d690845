//! Runtime configuration for the batch ingestion pipeline.

use roster_core::{defaults, Error, Result};

/// Configuration for a batch ingestion run.
#[derive(Debug, Clone)]
pub struct IngestConfig {
    /// Institution every batch in this process is ingested under.
    pub institution: String,
    /// Staging database connection string.
    pub database_url: String,
    /// Live database connection string; drift reporting is skipped when
    /// absent.
    pub live_database_url: Option<String>,
    /// Records per chunk when walking a batch.
    pub chunk_size: usize,
    /// Maximum records processed concurrently within a chunk.
    pub max_concurrent_records: usize,
    /// Minimum cosine similarity for folding a role into an existing
    /// general role. Must sit strictly between 0 and 1.
    pub similarity_threshold: f64,
    /// Per-record timeout in seconds.
    pub record_timeout_secs: u64,
    /// Maximum fetched document size in bytes.
    pub max_document_bytes: u64,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            institution: String::new(),
            database_url: String::new(),
            live_database_url: None,
            chunk_size: defaults::BATCH_CHUNK_SIZE,
            max_concurrent_records: defaults::MAX_CONCURRENT_RECORDS,
            similarity_threshold: defaults::GENERAL_ROLE_MATCH_THRESHOLD,
            record_timeout_secs: defaults::RECORD_TIMEOUT_SECS,
            max_document_bytes: defaults::MAX_DOCUMENT_BYTES,
        }
    }
}

impl IngestConfig {
    /// Create config from environment variables (with defaults).
    ///
    /// | Variable | Default | Description |
    /// |----------|---------|-------------|
    /// | `ROSTER_INSTITUTION` | (empty) | Institution name; required, see [`validate`](Self::validate) |
    /// | `ROSTER_DATABASE_URL` | (empty) | Staging database; falls back to `DATABASE_URL` |
    /// | `ROSTER_LIVE_DATABASE_URL` | (unset) | Live database for drift reporting |
    /// | `ROSTER_CHUNK_SIZE` | `100` | Records per batch chunk |
    /// | `ROSTER_MAX_CONCURRENT_RECORDS` | `4` | Concurrent records within a chunk |
    /// | `ROSTER_SIMILARITY_THRESHOLD` | `0.75` | General-role match threshold |
    /// | `ROSTER_RECORD_TIMEOUT_SECS` | `120` | Per-record timeout |
    /// | `ROSTER_MAX_DOCUMENT_BYTES` | `26214400` | Fetched document size cap |
    pub fn from_env() -> Self {
        let institution = std::env::var("ROSTER_INSTITUTION").unwrap_or_default();

        let database_url = std::env::var("ROSTER_DATABASE_URL")
            .or_else(|_| std::env::var("DATABASE_URL"))
            .unwrap_or_default();

        let live_database_url = std::env::var("ROSTER_LIVE_DATABASE_URL").ok();

        let chunk_size = std::env::var("ROSTER_CHUNK_SIZE")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .unwrap_or(defaults::BATCH_CHUNK_SIZE)
            .max(1);

        let max_concurrent_records = std::env::var("ROSTER_MAX_CONCURRENT_RECORDS")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .unwrap_or(defaults::MAX_CONCURRENT_RECORDS)
            .max(1);

        let similarity_threshold = std::env::var("ROSTER_SIMILARITY_THRESHOLD")
            .ok()
            .and_then(|v| v.parse::<f64>().ok())
            .unwrap_or(defaults::GENERAL_ROLE_MATCH_THRESHOLD);

        let record_timeout_secs = std::env::var("ROSTER_RECORD_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(defaults::RECORD_TIMEOUT_SECS);

        let max_document_bytes = std::env::var("ROSTER_MAX_DOCUMENT_BYTES")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(defaults::MAX_DOCUMENT_BYTES);

        Self {
            institution,
            database_url,
            live_database_url,
            chunk_size,
            max_concurrent_records,
            similarity_threshold,
            record_timeout_secs,
            max_document_bytes,
        }
    }

    /// Set the institution batches are ingested under.
    pub fn with_institution(mut self, institution: impl Into<String>) -> Self {
        self.institution = institution.into();
        self
    }

    /// Set the staging database URL.
    pub fn with_database_url(mut self, url: impl Into<String>) -> Self {
        self.database_url = url.into();
        self
    }

    /// Set the live database URL used for drift reporting.
    pub fn with_live_database_url(mut self, url: impl Into<String>) -> Self {
        self.live_database_url = Some(url.into());
        self
    }

    /// Set records per batch chunk.
    pub fn with_chunk_size(mut self, size: usize) -> Self {
        self.chunk_size = size;
        self
    }

    /// Set maximum concurrent records within a chunk.
    pub fn with_max_concurrent(mut self, max: usize) -> Self {
        self.max_concurrent_records = max;
        self
    }

    /// Set the general-role similarity threshold.
    pub fn with_similarity_threshold(mut self, threshold: f64) -> Self {
        self.similarity_threshold = threshold;
        self
    }

    /// Check the configuration is usable before connecting anything.
    pub fn validate(&self) -> Result<()> {
        if self.institution.trim().is_empty() {
            return Err(Error::Config("institution is not set".to_string()));
        }
        if self.database_url.trim().is_empty() {
            return Err(Error::Config("database URL is not set".to_string()));
        }
        if self.chunk_size == 0 {
            return Err(Error::Config("chunk size must be at least 1".to_string()));
        }
        if self.max_concurrent_records == 0 {
            return Err(Error::Config(
                "max concurrent records must be at least 1".to_string(),
            ));
        }
        if !(self.similarity_threshold > 0.0 && self.similarity_threshold < 1.0) {
            return Err(Error::Config(format!(
                "similarity threshold {} must be strictly between 0 and 1",
                self.similarity_threshold
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default_values() {
        let config = IngestConfig::default();
        assert_eq!(config.chunk_size, 100);
        assert_eq!(config.max_concurrent_records, 4);
        assert_eq!(config.similarity_threshold, 0.75);
        assert_eq!(config.record_timeout_secs, 120);
        assert!(config.live_database_url.is_none());
    }

    #[test]
    fn test_config_builder() {
        let config = IngestConfig::default()
            .with_institution("aps")
            .with_database_url("postgres://localhost/roster_staging")
            .with_live_database_url("postgres://localhost/roster_live")
            .with_chunk_size(25)
            .with_max_concurrent(8)
            .with_similarity_threshold(0.9);

        assert_eq!(config.institution, "aps");
        assert_eq!(config.chunk_size, 25);
        assert_eq!(config.max_concurrent_records, 8);
        assert_eq!(config.similarity_threshold, 0.9);
        assert!(config.live_database_url.is_some());
    }

    #[test]
    fn test_validate_requires_institution() {
        let config = IngestConfig::default().with_database_url("postgres://localhost/roster");
        let err = config.validate().unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_validate_requires_database_url() {
        let config = IngestConfig::default().with_institution("aps");
        let err = config.validate().unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_validate_rejects_zero_chunk_size() {
        let config = IngestConfig::default()
            .with_institution("aps")
            .with_database_url("postgres://localhost/roster")
            .with_chunk_size(0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_threshold_outside_unit_interval() {
        for threshold in [0.0, 1.0, 1.5, -0.2] {
            let config = IngestConfig::default()
                .with_institution("aps")
                .with_database_url("postgres://localhost/roster")
                .with_similarity_threshold(threshold);
            assert!(config.validate().is_err(), "threshold {}", threshold);
        }
    }

    #[test]
    fn test_validate_accepts_complete_config() {
        let config = IngestConfig::default()
            .with_institution("aps")
            .with_database_url("postgres://localhost/roster");
        assert!(config.validate().is_ok());
    }
}
