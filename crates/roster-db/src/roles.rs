//! Company role resolution and canonicalization writes.

use pgvector::Vector;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use roster_core::{new_v7, normalize_key, require_key, Error, Resolved, Result, Role};

#[derive(Clone)]
pub struct PgRoleRepository {
    pool: PgPool,
}

impl PgRoleRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Resolve a role by title within a company, creating it if absent.
    ///
    /// Dedup key is the whitespace-collapsed lower-cased title. An existing
    /// role keeps its stored attributes; `division_id` and `description`
    /// only apply on creation.
    pub async fn get_or_create_role(
        &self,
        company_id: Uuid,
        division_id: Option<Uuid>,
        title: &str,
        description: Option<&str>,
    ) -> Result<Resolved> {
        let key = require_key(title, "role title")?;

        if let Some((id,)) = sqlx::query_as::<_, (Uuid,)>(
            "SELECT id FROM role WHERE company_id = $1 AND normalized_key = $2",
        )
        .bind(company_id)
        .bind(&key)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?
        {
            return Ok(Resolved { id, existing: true });
        }

        let inserted: Option<(Uuid,)> = sqlx::query_as(
            r#"
            INSERT INTO role (id, company_id, division_id, title, normalized_key, description)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (company_id, normalized_key) DO NOTHING
            RETURNING id
            "#,
        )
        .bind(new_v7())
        .bind(company_id)
        .bind(division_id)
        .bind(title.trim())
        .bind(&key)
        .bind(description)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        if let Some((id,)) = inserted {
            return Ok(Resolved {
                id,
                existing: false,
            });
        }

        let row: Option<(Uuid,)> = sqlx::query_as(
            "SELECT id FROM role WHERE company_id = $1 AND normalized_key = $2",
        )
        .bind(company_id)
        .bind(&key)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        match row {
            Some((id,)) => Ok(Resolved { id, existing: true }),
            None => Err(Error::Conflict(format!(
                "role '{}' lost creation race and re-read found no row",
                key
            ))),
        }
    }

    /// Transaction-aware variant of get_or_create_role.
    pub async fn get_or_create_role_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        company_id: Uuid,
        division_id: Option<Uuid>,
        title: &str,
        description: Option<&str>,
    ) -> Result<Resolved> {
        let key = require_key(title, "role title")?;

        if let Some((id,)) = sqlx::query_as::<_, (Uuid,)>(
            "SELECT id FROM role WHERE company_id = $1 AND normalized_key = $2",
        )
        .bind(company_id)
        .bind(&key)
        .fetch_optional(&mut **tx)
        .await
        .map_err(Error::Database)?
        {
            return Ok(Resolved { id, existing: true });
        }

        let inserted: Option<(Uuid,)> = sqlx::query_as(
            r#"
            INSERT INTO role (id, company_id, division_id, title, normalized_key, description)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (company_id, normalized_key) DO NOTHING
            RETURNING id
            "#,
        )
        .bind(new_v7())
        .bind(company_id)
        .bind(division_id)
        .bind(title.trim())
        .bind(&key)
        .bind(description)
        .fetch_optional(&mut **tx)
        .await
        .map_err(Error::Database)?;

        if let Some((id,)) = inserted {
            return Ok(Resolved {
                id,
                existing: false,
            });
        }

        let row: Option<(Uuid,)> = sqlx::query_as(
            "SELECT id FROM role WHERE company_id = $1 AND normalized_key = $2",
        )
        .bind(company_id)
        .bind(&key)
        .fetch_optional(&mut **tx)
        .await
        .map_err(Error::Database)?;

        match row {
            Some((id,)) => Ok(Resolved { id, existing: true }),
            None => Err(Error::Conflict(format!(
                "role '{}' lost creation race and re-read found no row",
                key
            ))),
        }
    }

    /// Fetch a role by id.
    pub async fn get_role(&self, id: Uuid) -> Result<Option<Role>> {
        sqlx::query_as::<_, Role>(
            r#"
            SELECT id, company_id, division_id, general_role_id, title, normalized_key,
                   description, created_at, updated_at, sync_status, last_synced_at
            FROM role
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)
    }

    /// Find a role by normalized title within a company.
    pub async fn find_role(&self, company_id: Uuid, title: &str) -> Result<Option<Role>> {
        let key = normalize_key(title);
        sqlx::query_as::<_, Role>(
            r#"
            SELECT id, company_id, division_id, general_role_id, title, normalized_key,
                   description, created_at, updated_at, sync_status, last_synced_at
            FROM role
            WHERE company_id = $1 AND normalized_key = $2
            "#,
        )
        .bind(company_id)
        .bind(&key)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)
    }

    /// Point a role at its canonical general role. Idempotent; re-pointing
    /// overwrites in place.
    pub async fn set_general_role(&self, role_id: Uuid, general_role_id: Uuid) -> Result<()> {
        let result = sqlx::query(
            "UPDATE role SET general_role_id = $2, sync_status = 'pending', updated_at = now() \
             WHERE id = $1",
        )
        .bind(role_id)
        .bind(general_role_id)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if roster_core::error::is_foreign_key_violation(&e) {
                Error::DanglingReference(format!("general role {} does not exist", general_role_id))
            } else {
                Error::Database(e)
            }
        })?;

        if result.rows_affected() == 0 {
            return Err(Error::NotFound(format!("role {} not found", role_id)));
        }
        Ok(())
    }

    /// Store the title embedding used when this role was canonicalized.
    pub async fn set_embedding(&self, role_id: Uuid, embedding: &Vector) -> Result<()> {
        let result = sqlx::query(
            "UPDATE role SET embedding = $2, sync_status = 'pending', updated_at = now() \
             WHERE id = $1",
        )
        .bind(role_id)
        .bind(embedding)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;

        if result.rows_affected() == 0 {
            return Err(Error::NotFound(format!("role {} not found", role_id)));
        }
        Ok(())
    }
}
