//! Nearest-neighbor queries over stored embeddings.
//!
//! Similarity is cosine, computed as `1 - (embedding <=> query)` and
//! compared strictly against the caller's threshold: a candidate sitting
//! exactly on the threshold is excluded. Results come back most similar
//! first, capped at `limit`. Rows without an embedding never match.

use pgvector::Vector;
use sqlx::PgPool;
use uuid::Uuid;

use roster_core::{Error, Result, SimilarMatch};

/// Which embedded table a similarity query runs against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimilarityTarget {
    GeneralRole,
    Role,
}

impl SimilarityTarget {
    fn table(&self) -> &'static str {
        match self {
            SimilarityTarget::GeneralRole => "general_role",
            SimilarityTarget::Role => "role",
        }
    }
}

#[derive(Clone)]
pub struct PgSimilarityRepository {
    pool: PgPool,
}

impl PgSimilarityRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Rows whose stored embedding is strictly more similar to `vector`
    /// than `threshold`, most similar first.
    pub async fn find_similar(
        &self,
        target: SimilarityTarget,
        vector: &Vector,
        threshold: f64,
        limit: i64,
    ) -> Result<Vec<SimilarMatch>> {
        sqlx::query_as::<_, SimilarMatch>(&format!(
            r#"
            SELECT id, 1 - (embedding <=> $1) AS similarity
            FROM {}
            WHERE embedding IS NOT NULL
              AND 1 - (embedding <=> $1) > $2
            ORDER BY embedding <=> $1
            LIMIT $3
            "#,
            target.table()
        ))
        .bind(vector)
        .bind(threshold)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)
    }

    /// Like [`find_similar`](Self::find_similar), but seeded from the
    /// embedding already stored on `row_id`, which is excluded from the
    /// results. Fails with `NotFound` when the row is absent or was never
    /// embedded.
    pub async fn find_similar_to(
        &self,
        target: SimilarityTarget,
        row_id: Uuid,
        threshold: f64,
        limit: i64,
    ) -> Result<Vec<SimilarMatch>> {
        let row: Option<(Option<Vector>,)> = sqlx::query_as(&format!(
            "SELECT embedding FROM {} WHERE id = $1",
            target.table()
        ))
        .bind(row_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        let vector = match row {
            Some((Some(vector),)) => vector,
            Some((None,)) => {
                return Err(Error::NotFound(format!(
                    "{} {} has no embedding",
                    target.table(),
                    row_id
                )))
            }
            None => {
                return Err(Error::NotFound(format!(
                    "{} {} not found",
                    target.table(),
                    row_id
                )))
            }
        };

        sqlx::query_as::<_, SimilarMatch>(&format!(
            r#"
            SELECT id, 1 - (embedding <=> $1) AS similarity
            FROM {}
            WHERE id <> $2
              AND embedding IS NOT NULL
              AND 1 - (embedding <=> $1) > $3
            ORDER BY embedding <=> $1
            LIMIT $4
            "#,
            target.table()
        ))
        .bind(&vector)
        .bind(row_id)
        .bind(threshold)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)
    }
}
