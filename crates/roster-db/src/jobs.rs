//! Versioned job persistence.
//!
//! A job row is keyed by (company_id, source_id, original_id) and carries a
//! monotonically increasing version. Every write after the first creation
//! appends one job_history row holding the full pre-transition snapshot,
//! the names of the fields that changed, and the transition type. The live
//! row and its history row move in the same transaction; a job at version
//! N+1 always has a history row for version N.
//!
//! The version increments on every upsert, including writes where no
//! attribute actually differs. Downstream consumers key off the version to
//! detect that a record was seen again, so the bump is load-bearing even
//! when changed_fields is empty.

use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use roster_core::{
    new_v7, ChangeType, Error, Job, JobAttributes, JobHistoryEntry, JobKey, JobUpserted, Result,
};

const JOB_COLUMNS: &str = "id, company_id, role_id, source_id, original_id, title, \
     opens_at, closes_at, locations, job_type, remuneration, raw, version, is_archived, \
     created_at, updated_at, sync_status, last_synced_at";

#[derive(Clone)]
pub struct PgJobRepository {
    pool: PgPool,
}

impl PgJobRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create or update the job identified by `key`.
    ///
    /// First write creates the row at version 1 with no history. Every
    /// later write snapshots the current row into job_history and bumps
    /// the version, whether or not `attrs` differs from what is stored.
    pub async fn upsert(&self, key: &JobKey, attrs: &JobAttributes) -> Result<JobUpserted> {
        let mut tx = self.pool.begin().await.map_err(Error::Database)?;
        let outcome = self.upsert_tx(&mut tx, key, attrs).await?;
        tx.commit().await.map_err(Error::Database)?;
        Ok(outcome)
    }

    /// Archive the job, stamping `is_archived` and recording one final
    /// history row with change type `archive`. Archiving an already
    /// archived job is a no-op that leaves version and history untouched.
    pub async fn archive(&self, job_id: Uuid, reason: Option<&str>) -> Result<i32> {
        let mut tx = self.pool.begin().await.map_err(Error::Database)?;
        let version = self.archive_tx(&mut tx, job_id, reason).await?;
        tx.commit().await.map_err(Error::Database)?;
        Ok(version)
    }

    pub async fn get(&self, id: Uuid) -> Result<Option<Job>> {
        sqlx::query_as::<_, Job>(&format!("SELECT {} FROM job WHERE id = $1", JOB_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(Error::Database)
    }

    pub async fn find_by_key(&self, key: &JobKey) -> Result<Option<Job>> {
        sqlx::query_as::<_, Job>(&format!(
            "SELECT {} FROM job \
             WHERE company_id = $1 AND source_id = $2 AND original_id = $3",
            JOB_COLUMNS
        ))
        .bind(key.company_id)
        .bind(&key.source_id)
        .bind(&key.original_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)
    }

    /// All recorded pre-transition snapshots for a job, oldest first.
    pub async fn history(&self, job_id: Uuid) -> Result<Vec<JobHistoryEntry>> {
        sqlx::query_as::<_, JobHistoryEntry>(
            r#"
            SELECT job_id, version, snapshot, changed_fields, change_type, reason, created_at
            FROM job_history
            WHERE job_id = $1
            ORDER BY version ASC
            "#,
        )
        .bind(job_id)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)
    }

}

/// Transaction-aware variants for record-scoped ingestion.
impl PgJobRepository {
    pub async fn upsert_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        key: &JobKey,
        attrs: &JobAttributes,
    ) -> Result<JobUpserted> {
        if let Some(old) = lock_by_key(tx, key).await? {
            return apply_update(tx, &old, attrs).await;
        }

        let inserted: Option<(Uuid,)> = sqlx::query_as(
            r#"
            INSERT INTO job (id, company_id, role_id, source_id, original_id, title,
                             opens_at, closes_at, locations, job_type, remuneration, raw)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            ON CONFLICT (company_id, source_id, original_id) DO NOTHING
            RETURNING id
            "#,
        )
        .bind(new_v7())
        .bind(key.company_id)
        .bind(attrs.role_id)
        .bind(&key.source_id)
        .bind(&key.original_id)
        .bind(attrs.title.trim())
        .bind(attrs.opens_at)
        .bind(attrs.closes_at)
        .bind(&attrs.locations)
        .bind(&attrs.job_type)
        .bind(&attrs.remuneration)
        .bind(&attrs.raw)
        .fetch_optional(&mut **tx)
        .await
        .map_err(Error::Database)?;

        if let Some((id,)) = inserted {
            return Ok(JobUpserted {
                id,
                version: 1,
                created: true,
            });
        }

        // Lost the creation race. The winner's row is committed by now;
        // lock it and fall through to the update path.
        match lock_by_key(tx, key).await? {
            Some(old) => apply_update(tx, &old, attrs).await,
            None => Err(Error::Conflict(format!(
                "job {}/{} lost creation race and re-read found no row",
                key.source_id, key.original_id
            ))),
        }
    }

    pub async fn archive_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        job_id: Uuid,
        reason: Option<&str>,
    ) -> Result<i32> {
        let old = lock_by_id(tx, job_id)
            .await?
            .ok_or(Error::JobNotFound(job_id))?;

        if old.is_archived {
            return Ok(old.version);
        }

        write_history(
            tx,
            &old,
            vec!["is_archived".to_string()],
            ChangeType::Archive,
            reason,
        )
        .await?;

        let (version,): (i32,) = sqlx::query_as(
            "UPDATE job SET is_archived = TRUE, version = version + 1, \
             sync_status = 'pending', updated_at = now() \
             WHERE id = $1 RETURNING version",
        )
        .bind(job_id)
        .fetch_one(&mut **tx)
        .await
        .map_err(Error::Database)?;

        Ok(version)
    }
}

async fn lock_by_key(tx: &mut Transaction<'_, Postgres>, key: &JobKey) -> Result<Option<Job>> {
    sqlx::query_as::<_, Job>(&format!(
        "SELECT {} FROM job \
         WHERE company_id = $1 AND source_id = $2 AND original_id = $3 \
         FOR UPDATE",
        JOB_COLUMNS
    ))
    .bind(key.company_id)
    .bind(&key.source_id)
    .bind(&key.original_id)
    .fetch_optional(&mut **tx)
    .await
    .map_err(Error::Database)
}

async fn lock_by_id(tx: &mut Transaction<'_, Postgres>, id: Uuid) -> Result<Option<Job>> {
    sqlx::query_as::<_, Job>(&format!(
        "SELECT {} FROM job WHERE id = $1 FOR UPDATE",
        JOB_COLUMNS
    ))
    .bind(id)
    .fetch_optional(&mut **tx)
    .await
    .map_err(Error::Database)
}

/// Snapshot `old` into job_history as the pre-state of the transition
/// happening in this transaction.
async fn write_history(
    tx: &mut Transaction<'_, Postgres>,
    old: &Job,
    changed_fields: Vec<String>,
    change_type: ChangeType,
    reason: Option<&str>,
) -> Result<()> {
    let snapshot = serde_json::to_value(old)?;

    sqlx::query(
        r#"
        INSERT INTO job_history (job_id, version, snapshot, changed_fields, change_type, reason)
        VALUES ($1, $2, $3, $4, $5, $6)
        "#,
    )
    .bind(old.id)
    .bind(old.version)
    .bind(snapshot)
    .bind(changed_fields)
    .bind(change_type.as_str())
    .bind(reason)
    .execute(&mut **tx)
    .await
    .map_err(Error::Database)?;

    Ok(())
}

async fn apply_update(
    tx: &mut Transaction<'_, Postgres>,
    old: &Job,
    attrs: &JobAttributes,
) -> Result<JobUpserted> {
    let changed = diff_changed_fields(old, attrs);
    write_history(tx, old, changed, ChangeType::Update, None).await?;

    let (version,): (i32,) = sqlx::query_as(
        r#"
        UPDATE job
        SET role_id = $2, title = $3, opens_at = $4, closes_at = $5, locations = $6,
            job_type = $7, remuneration = $8, raw = $9,
            version = version + 1, sync_status = 'pending', updated_at = now()
        WHERE id = $1
        RETURNING version
        "#,
    )
    .bind(old.id)
    .bind(attrs.role_id)
    .bind(attrs.title.trim())
    .bind(attrs.opens_at)
    .bind(attrs.closes_at)
    .bind(&attrs.locations)
    .bind(&attrs.job_type)
    .bind(&attrs.remuneration)
    .bind(&attrs.raw)
    .fetch_one(&mut **tx)
    .await
    .map_err(Error::Database)?;

    Ok(JobUpserted {
        id: old.id,
        version,
        created: false,
    })
}

/// Names of the attribute fields where `new` differs from the stored row,
/// in declaration order. An empty result still bumps the version upstream.
pub fn diff_changed_fields(old: &Job, new: &JobAttributes) -> Vec<String> {
    let mut changed = Vec::new();
    if old.role_id != new.role_id {
        changed.push("role_id".to_string());
    }
    if old.title != new.title.trim() {
        changed.push("title".to_string());
    }
    if old.opens_at != new.opens_at {
        changed.push("opens_at".to_string());
    }
    if old.closes_at != new.closes_at {
        changed.push("closes_at".to_string());
    }
    if old.locations != new.locations {
        changed.push("locations".to_string());
    }
    if old.job_type != new.job_type {
        changed.push("job_type".to_string());
    }
    if old.remuneration != new.remuneration {
        changed.push("remuneration".to_string());
    }
    if old.raw != new.raw {
        changed.push("raw".to_string());
    }
    changed
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;

    fn stored_job() -> Job {
        Job {
            id: new_v7(),
            company_id: new_v7(),
            role_id: Some(new_v7()),
            source_id: "seek".to_string(),
            original_id: "J-100".to_string(),
            title: "Park Ranger".to_string(),
            opens_at: None,
            closes_at: None,
            locations: vec!["Hobart".to_string(), "Launceston".to_string()],
            job_type: Some("full-time".to_string()),
            remuneration: None,
            raw: json!({"ref": "J-100"}),
            version: 3,
            is_archived: false,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            sync_status: "pending".to_string(),
            last_synced_at: None,
        }
    }

    fn matching_attrs(job: &Job) -> JobAttributes {
        JobAttributes {
            role_id: job.role_id,
            title: job.title.clone(),
            opens_at: job.opens_at,
            closes_at: job.closes_at,
            locations: job.locations.clone(),
            job_type: job.job_type.clone(),
            remuneration: job.remuneration.clone(),
            raw: job.raw.clone(),
        }
    }

    #[test]
    fn identical_attributes_diff_to_nothing() {
        let job = stored_job();
        let attrs = matching_attrs(&job);
        assert!(diff_changed_fields(&job, &attrs).is_empty());
    }

    #[test]
    fn single_field_change_is_named() {
        let job = stored_job();
        let mut attrs = matching_attrs(&job);
        attrs.title = "Senior Park Ranger".to_string();
        assert_eq!(diff_changed_fields(&job, &attrs), vec!["title"]);
    }

    #[test]
    fn multiple_changes_come_in_declaration_order() {
        let job = stored_job();
        let mut attrs = matching_attrs(&job);
        attrs.remuneration = Some("$85k".to_string());
        attrs.role_id = None;
        attrs.raw = json!({"ref": "J-100", "seen": 2});
        assert_eq!(
            diff_changed_fields(&job, &attrs),
            vec!["role_id", "remuneration", "raw"]
        );
    }

    #[test]
    fn location_order_is_significant() {
        let job = stored_job();
        let mut attrs = matching_attrs(&job);
        attrs.locations = vec!["Launceston".to_string(), "Hobart".to_string()];
        assert_eq!(diff_changed_fields(&job, &attrs), vec!["locations"]);
    }

    #[test]
    fn title_comparison_ignores_surrounding_whitespace() {
        let job = stored_job();
        let mut attrs = matching_attrs(&job);
        attrs.title = "  Park Ranger  ".to_string();
        assert!(diff_changed_fields(&job, &attrs).is_empty());
    }

    #[test]
    fn date_appearing_is_a_change() {
        let job = stored_job();
        let mut attrs = matching_attrs(&job);
        attrs.opens_at = Some(Utc::now());
        assert_eq!(diff_changed_fields(&job, &attrs), vec!["opens_at"]);
    }
}
