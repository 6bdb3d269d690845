//! # roster-enrich
//!
//! Enrichment collaborators for the roster pipeline: the text-analysis
//! client that turns posting text into skill/capability candidates, and
//! the embedding backend behind general-role canonicalization.
//!
//! Both are HTTP implementations of the `roster-core` traits. The [`mock`]
//! module ships deterministic stand-ins for tests.

pub mod analysis;
pub mod embedding;
pub mod mock;

pub use analysis::HttpAnalysisBackend;
pub use embedding::HttpEmbeddingBackend;
