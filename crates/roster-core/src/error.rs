//! Error types for roster.

use thiserror::Error;

/// Result type alias using roster's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for roster operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation failed (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Job not found
    #[error("Job not found: {0}")]
    JobNotFound(uuid::Uuid),

    /// Natural-key or input validation failed; never retried
    #[error("Validation error: {0}")]
    Validation(String),

    /// Concurrent duplicate-create lost even after the re-read retry
    #[error("Conflict: {0}")]
    Conflict(String),

    /// External collaborator failed (document fetch, analysis, embedding)
    #[error("Collaborator error: {0}")]
    Collaborator(String),

    /// A record's relational writes failed and rolled back
    #[error("Transaction error: {0}")]
    Transaction(String),

    /// Link target does not exist
    #[error("Dangling reference: {0}")]
    DanglingReference(String),

    /// Text extraction failed
    #[error("Extraction error: {0}")]
    Extraction(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),

    /// File I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::Collaborator(e.to_string())
    }
}

/// SQLSTATE for a unique-constraint violation.
const UNIQUE_VIOLATION: &str = "23505";

/// SQLSTATE for a foreign-key violation.
const FOREIGN_KEY_VIOLATION: &str = "23503";

/// True when the error is a Postgres unique-constraint violation.
///
/// Get-or-create paths treat this as "a concurrent writer won" and re-read
/// instead of propagating.
pub fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.code().as_deref() == Some(UNIQUE_VIOLATION))
}

/// True when the error is a Postgres foreign-key violation.
///
/// Link writes map this to [`Error::DanglingReference`] so a missing target
/// is reported as such rather than as a generic database failure.
pub fn is_foreign_key_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.code().as_deref() == Some(FOREIGN_KEY_VIOLATION))
}
