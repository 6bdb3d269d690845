//! Job document persistence.
//!
//! One row per (job_id, url). Re-ingesting a document replaces the stored
//! content in place and resets the sync lifecycle; the raw bytes are
//! hashed on every write so consumers can detect content drift without
//! pulling the blob.

use sha2::{Digest, Sha256};
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use roster_core::error::is_foreign_key_violation;
use roster_core::{new_v7, Error, JobDocument, NewJobDocument, Result};

#[derive(Clone)]
pub struct PgDocumentRepository {
    pool: PgPool,
}

impl PgDocumentRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert or replace the document stored for (job_id, url).
    pub async fn upsert(&self, job_id: Uuid, doc: &NewJobDocument) -> Result<Uuid> {
        if doc.url.trim().is_empty() {
            return Err(Error::Validation("document url is empty".to_string()));
        }

        let (id,): (Uuid,) = sqlx::query_as(UPSERT_SQL)
            .bind(new_v7())
            .bind(job_id)
            .bind(doc.url.trim())
            .bind(&doc.title)
            .bind(&doc.content_type)
            .bind(&doc.raw_content)
            .bind(content_hash(doc.raw_content.as_deref()))
            .bind(&doc.parsed_text)
            .bind(&doc.extraction_meta)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                if is_foreign_key_violation(&e) {
                    Error::DanglingReference(format!("job {} does not exist", job_id))
                } else {
                    Error::Database(e)
                }
            })?;

        Ok(id)
    }

    /// Documents stored for a job, oldest first, without the raw bytes.
    pub async fn get_by_job(&self, job_id: Uuid) -> Result<Vec<JobDocument>> {
        sqlx::query_as::<_, JobDocument>(
            r#"
            SELECT id, job_id, url, title, content_type, content_hash, parsed_text,
                   extraction_meta, created_at, updated_at, sync_status, last_synced_at
            FROM job_document
            WHERE job_id = $1
            ORDER BY created_at ASC, id ASC
            "#,
        )
        .bind(job_id)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)
    }

    /// Raw bytes for one stored document, if any were kept.
    pub async fn raw_content(&self, document_id: Uuid) -> Result<Option<Vec<u8>>> {
        let row: Option<(Option<Vec<u8>>,)> =
            sqlx::query_as("SELECT raw_content FROM job_document WHERE id = $1")
                .bind(document_id)
                .fetch_optional(&self.pool)
                .await
                .map_err(Error::Database)?;

        match row {
            Some((bytes,)) => Ok(bytes),
            None => Err(Error::NotFound(format!(
                "document {} not found",
                document_id
            ))),
        }
    }
}

/// Transaction-aware variants for record-scoped ingestion.
impl PgDocumentRepository {
    pub async fn upsert_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        job_id: Uuid,
        doc: &NewJobDocument,
    ) -> Result<Uuid> {
        if doc.url.trim().is_empty() {
            return Err(Error::Validation("document url is empty".to_string()));
        }

        let (id,): (Uuid,) = sqlx::query_as(UPSERT_SQL)
            .bind(new_v7())
            .bind(job_id)
            .bind(doc.url.trim())
            .bind(&doc.title)
            .bind(&doc.content_type)
            .bind(&doc.raw_content)
            .bind(content_hash(doc.raw_content.as_deref()))
            .bind(&doc.parsed_text)
            .bind(&doc.extraction_meta)
            .fetch_one(&mut **tx)
            .await
            .map_err(|e| {
                if is_foreign_key_violation(&e) {
                    Error::DanglingReference(format!("job {} does not exist", job_id))
                } else {
                    Error::Database(e)
                }
            })?;

        Ok(id)
    }
}

const UPSERT_SQL: &str = r#"
    INSERT INTO job_document (id, job_id, url, title, content_type, raw_content,
                              content_hash, parsed_text, extraction_meta)
    VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
    ON CONFLICT (job_id, url)
    DO UPDATE SET title = EXCLUDED.title,
                  content_type = EXCLUDED.content_type,
                  raw_content = EXCLUDED.raw_content,
                  content_hash = EXCLUDED.content_hash,
                  parsed_text = EXCLUDED.parsed_text,
                  extraction_meta = EXCLUDED.extraction_meta,
                  updated_at = now(),
                  sync_status = 'pending'
    RETURNING id
"#;

fn content_hash(raw: Option<&[u8]>) -> Option<String> {
    raw.map(|bytes| hex::encode(Sha256::digest(bytes)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_is_stable_hex_sha256() {
        let hash = content_hash(Some(b"hello")).unwrap();
        assert_eq!(
            hash,
            "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
        );
        assert_eq!(hash.len(), 64);
    }

    #[test]
    fn absent_content_has_no_hash() {
        assert!(content_hash(None).is_none());
    }

    #[test]
    fn empty_content_still_hashes() {
        let hash = content_hash(Some(b"")).unwrap();
        assert_eq!(
            hash,
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }
}
