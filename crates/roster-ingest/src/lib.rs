//! Batch ingestion pipeline for processed job records.
//!
//! Entry point is the [`BatchOrchestrator`]: it takes batches of
//! [`roster_core::ProcessedRecord`]s and drives each one through
//! validation, document ingestion, relational writes, and general-role
//! canonicalization against the staging store. Collaborators (document
//! fetching, text analysis, embeddings) are trait objects so tests can
//! swap in the mocks from `roster-enrich`.

pub mod batch;
pub mod canonical;
pub mod config;
pub mod documents;
mod pipeline;

pub use batch::{BatchOrchestrator, CancelToken};
pub use canonical::{CanonicalOutcome, RoleCanonicalizer};
pub use config::IngestConfig;
pub use documents::{DocumentIngestor, DocumentOutcome, PreparedDocuments};
