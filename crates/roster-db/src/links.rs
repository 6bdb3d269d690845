//! Association rows between roles, jobs, and reference data.
//!
//! Every link is idempotent on its composite primary key. Re-linking an
//! existing pair refreshes `updated_at` and resets `sync_status` to
//! `pending` so downstream sync picks the row up again; the capability
//! link additionally replaces level and capability_type in place. Links
//! never create their endpoints: a missing target surfaces as
//! [`Error::DanglingReference`].

use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use roster_core::error::is_foreign_key_violation;
use roster_core::{Error, Result};

#[derive(Clone)]
pub struct PgLinkRepository {
    pool: PgPool,
}

impl PgLinkRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn link_role_skill(&self, role_id: Uuid, skill_id: Uuid) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO role_skill (role_id, skill_id)
            VALUES ($1, $2)
            ON CONFLICT (role_id, skill_id)
            DO UPDATE SET updated_at = now(), sync_status = 'pending'
            "#,
        )
        .bind(role_id)
        .bind(skill_id)
        .execute(&self.pool)
        .await
        .map_err(|e| dangling(e, "role", role_id, "skill", skill_id))?;
        Ok(())
    }

    pub async fn link_role_capability(
        &self,
        role_id: Uuid,
        capability_id: Uuid,
        level: Option<&str>,
        capability_type: Option<&str>,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO role_capability (role_id, capability_id, level, capability_type)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (role_id, capability_id)
            DO UPDATE SET level = EXCLUDED.level,
                          capability_type = EXCLUDED.capability_type,
                          updated_at = now(),
                          sync_status = 'pending'
            "#,
        )
        .bind(role_id)
        .bind(capability_id)
        .bind(level)
        .bind(capability_type.unwrap_or("core"))
        .execute(&self.pool)
        .await
        .map_err(|e| dangling(e, "role", role_id, "capability", capability_id))?;
        Ok(())
    }

    pub async fn link_role_taxonomy(&self, role_id: Uuid, taxonomy_id: Uuid) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO role_taxonomy (role_id, taxonomy_id)
            VALUES ($1, $2)
            ON CONFLICT (role_id, taxonomy_id)
            DO UPDATE SET updated_at = now(), sync_status = 'pending'
            "#,
        )
        .bind(role_id)
        .bind(taxonomy_id)
        .execute(&self.pool)
        .await
        .map_err(|e| dangling(e, "role", role_id, "taxonomy", taxonomy_id))?;
        Ok(())
    }

    pub async fn link_job_skill(&self, job_id: Uuid, skill_id: Uuid) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO job_skill (job_id, skill_id)
            VALUES ($1, $2)
            ON CONFLICT (job_id, skill_id)
            DO UPDATE SET updated_at = now(), sync_status = 'pending'
            "#,
        )
        .bind(job_id)
        .bind(skill_id)
        .execute(&self.pool)
        .await
        .map_err(|e| dangling(e, "job", job_id, "skill", skill_id))?;
        Ok(())
    }
}

/// Transaction-aware variants for record-scoped ingestion.
impl PgLinkRepository {
    pub async fn link_role_skill_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        role_id: Uuid,
        skill_id: Uuid,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO role_skill (role_id, skill_id)
            VALUES ($1, $2)
            ON CONFLICT (role_id, skill_id)
            DO UPDATE SET updated_at = now(), sync_status = 'pending'
            "#,
        )
        .bind(role_id)
        .bind(skill_id)
        .execute(&mut **tx)
        .await
        .map_err(|e| dangling(e, "role", role_id, "skill", skill_id))?;
        Ok(())
    }

    pub async fn link_role_capability_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        role_id: Uuid,
        capability_id: Uuid,
        level: Option<&str>,
        capability_type: Option<&str>,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO role_capability (role_id, capability_id, level, capability_type)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (role_id, capability_id)
            DO UPDATE SET level = EXCLUDED.level,
                          capability_type = EXCLUDED.capability_type,
                          updated_at = now(),
                          sync_status = 'pending'
            "#,
        )
        .bind(role_id)
        .bind(capability_id)
        .bind(level)
        .bind(capability_type.unwrap_or("core"))
        .execute(&mut **tx)
        .await
        .map_err(|e| dangling(e, "role", role_id, "capability", capability_id))?;
        Ok(())
    }

    pub async fn link_role_taxonomy_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        role_id: Uuid,
        taxonomy_id: Uuid,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO role_taxonomy (role_id, taxonomy_id)
            VALUES ($1, $2)
            ON CONFLICT (role_id, taxonomy_id)
            DO UPDATE SET updated_at = now(), sync_status = 'pending'
            "#,
        )
        .bind(role_id)
        .bind(taxonomy_id)
        .execute(&mut **tx)
        .await
        .map_err(|e| dangling(e, "role", role_id, "taxonomy", taxonomy_id))?;
        Ok(())
    }

    pub async fn link_job_skill_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        job_id: Uuid,
        skill_id: Uuid,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO job_skill (job_id, skill_id)
            VALUES ($1, $2)
            ON CONFLICT (job_id, skill_id)
            DO UPDATE SET updated_at = now(), sync_status = 'pending'
            "#,
        )
        .bind(job_id)
        .bind(skill_id)
        .execute(&mut **tx)
        .await
        .map_err(|e| dangling(e, "job", job_id, "skill", skill_id))?;
        Ok(())
    }
}

fn dangling(err: sqlx::Error, left: &str, left_id: Uuid, right: &str, right_id: Uuid) -> Error {
    if is_foreign_key_violation(&err) {
        Error::DanglingReference(format!(
            "{} {} or {} {} does not exist",
            left, left_id, right, right_id
        ))
    } else {
        Error::Database(err)
    }
}
