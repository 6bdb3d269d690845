//! Reference-data resolution: skills, capabilities, taxonomies, general roles.
//!
//! All entities here dedup on a normalized key, scoped to the owning
//! company except for general roles which are global. Get-or-create never
//! rewrites an existing row's attributes; the first writer's values stand.

use pgvector::Vector;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use roster_core::{new_v7, require_key, Error, GeneralRole, Resolved, Result};

#[derive(Clone)]
pub struct PgReferenceRepository {
    pool: PgPool,
}

impl PgReferenceRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn get_or_create_skill(
        &self,
        company_id: Uuid,
        name: &str,
        description: Option<&str>,
        category: Option<&str>,
    ) -> Result<Resolved> {
        let key = require_key(name, "skill name")?;

        if let Some((id,)) = sqlx::query_as::<_, (Uuid,)>(
            "SELECT id FROM skill WHERE company_id = $1 AND normalized_key = $2",
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
            INSERT INTO skill (id, company_id, name, normalized_key, description, category)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (company_id, normalized_key) DO NOTHING
            RETURNING id
            "#,
        )
        .bind(new_v7())
        .bind(company_id)
        .bind(name.trim())
        .bind(&key)
        .bind(description)
        .bind(category)
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
            "SELECT id FROM skill WHERE company_id = $1 AND normalized_key = $2",
        )
        .bind(company_id)
        .bind(&key)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        match row {
            Some((id,)) => Ok(Resolved { id, existing: true }),
            None => Err(Error::Conflict(format!(
                "skill '{}' lost creation race and re-read found no row",
                key
            ))),
        }
    }

    pub async fn get_or_create_capability(
        &self,
        company_id: Uuid,
        name: &str,
        description: Option<&str>,
    ) -> Result<Resolved> {
        let key = require_key(name, "capability name")?;

        if let Some((id,)) = sqlx::query_as::<_, (Uuid,)>(
            "SELECT id FROM capability WHERE company_id = $1 AND normalized_key = $2",
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
            INSERT INTO capability (id, company_id, name, normalized_key, description)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (company_id, normalized_key) DO NOTHING
            RETURNING id
            "#,
        )
        .bind(new_v7())
        .bind(company_id)
        .bind(name.trim())
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
            "SELECT id FROM capability WHERE company_id = $1 AND normalized_key = $2",
        )
        .bind(company_id)
        .bind(&key)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        match row {
            Some((id,)) => Ok(Resolved { id, existing: true }),
            None => Err(Error::Conflict(format!(
                "capability '{}' lost creation race and re-read found no row",
                key
            ))),
        }
    }

    /// Store the behavioral description for one capability level. A second
    /// write to the same (capability, level) pair replaces the description.
    pub async fn upsert_capability_level(
        &self,
        capability_id: Uuid,
        level: &str,
        description: Option<&str>,
    ) -> Result<Uuid> {
        let level = level.trim();
        if level.is_empty() {
            return Err(Error::Validation("capability level is empty".to_string()));
        }

        let (id,): (Uuid,) = sqlx::query_as(
            r#"
            INSERT INTO capability_level (id, capability_id, level, description)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (capability_id, level)
            DO UPDATE SET description = EXCLUDED.description, updated_at = now()
            RETURNING id
            "#,
        )
        .bind(new_v7())
        .bind(capability_id)
        .bind(level)
        .bind(description)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if roster_core::error::is_foreign_key_violation(&e) {
                Error::DanglingReference(format!("capability {} does not exist", capability_id))
            } else {
                Error::Database(e)
            }
        })?;

        Ok(id)
    }

    pub async fn get_or_create_taxonomy(&self, company_id: Uuid, name: &str) -> Result<Resolved> {
        let key = require_key(name, "taxonomy name")?;

        if let Some((id,)) = sqlx::query_as::<_, (Uuid,)>(
            "SELECT id FROM taxonomy WHERE company_id = $1 AND normalized_key = $2",
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
            INSERT INTO taxonomy (id, company_id, name, normalized_key)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (company_id, normalized_key) DO NOTHING
            RETURNING id
            "#,
        )
        .bind(new_v7())
        .bind(company_id)
        .bind(name.trim())
        .bind(&key)
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
            "SELECT id FROM taxonomy WHERE company_id = $1 AND normalized_key = $2",
        )
        .bind(company_id)
        .bind(&key)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        match row {
            Some((id,)) => Ok(Resolved { id, existing: true }),
            None => Err(Error::Conflict(format!(
                "taxonomy '{}' lost creation race and re-read found no row",
                key
            ))),
        }
    }

    /// Resolve a canonical general role by normalized title, creating it
    /// with the supplied embedding when absent. An existing row keeps its
    /// stored embedding.
    pub async fn get_or_create_general_role(
        &self,
        title: &str,
        description: Option<&str>,
        embedding: Option<&Vector>,
    ) -> Result<Resolved> {
        let key = require_key(title, "general role title")?;

        if let Some((id,)) = sqlx::query_as::<_, (Uuid,)>(
            "SELECT id FROM general_role WHERE normalized_key = $1",
        )
        .bind(&key)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?
        {
            return Ok(Resolved { id, existing: true });
        }

        let inserted: Option<(Uuid,)> = sqlx::query_as(
            r#"
            INSERT INTO general_role (id, title, description, normalized_key, embedding)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (normalized_key) DO NOTHING
            RETURNING id
            "#,
        )
        .bind(new_v7())
        .bind(title.trim())
        .bind(description)
        .bind(&key)
        .bind(embedding)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        if let Some((id,)) = inserted {
            return Ok(Resolved {
                id,
                existing: false,
            });
        }

        let row: Option<(Uuid,)> =
            sqlx::query_as("SELECT id FROM general_role WHERE normalized_key = $1")
                .bind(&key)
                .fetch_optional(&self.pool)
                .await
                .map_err(Error::Database)?;

        match row {
            Some((id,)) => Ok(Resolved { id, existing: true }),
            None => Err(Error::Conflict(format!(
                "general role '{}' lost creation race and re-read found no row",
                key
            ))),
        }
    }

    pub async fn get_general_role(&self, id: Uuid) -> Result<Option<GeneralRole>> {
        sqlx::query_as::<_, GeneralRole>(
            r#"
            SELECT id, title, description, normalized_key,
                   created_at, updated_at, sync_status, last_synced_at
            FROM general_role
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)
    }
}

/// Transaction-aware variants for record-scoped ingestion.
impl PgReferenceRepository {
    pub async fn get_or_create_skill_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        company_id: Uuid,
        name: &str,
        description: Option<&str>,
        category: Option<&str>,
    ) -> Result<Resolved> {
        let key = require_key(name, "skill name")?;

        if let Some((id,)) = sqlx::query_as::<_, (Uuid,)>(
            "SELECT id FROM skill WHERE company_id = $1 AND normalized_key = $2",
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
            INSERT INTO skill (id, company_id, name, normalized_key, description, category)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (company_id, normalized_key) DO NOTHING
            RETURNING id
            "#,
        )
        .bind(new_v7())
        .bind(company_id)
        .bind(name.trim())
        .bind(&key)
        .bind(description)
        .bind(category)
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
            "SELECT id FROM skill WHERE company_id = $1 AND normalized_key = $2",
        )
        .bind(company_id)
        .bind(&key)
        .fetch_optional(&mut **tx)
        .await
        .map_err(Error::Database)?;

        match row {
            Some((id,)) => Ok(Resolved { id, existing: true }),
            None => Err(Error::Conflict(format!(
                "skill '{}' lost creation race and re-read found no row",
                key
            ))),
        }
    }

    pub async fn get_or_create_capability_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        company_id: Uuid,
        name: &str,
        description: Option<&str>,
    ) -> Result<Resolved> {
        let key = require_key(name, "capability name")?;

        if let Some((id,)) = sqlx::query_as::<_, (Uuid,)>(
            "SELECT id FROM capability WHERE company_id = $1 AND normalized_key = $2",
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
            INSERT INTO capability (id, company_id, name, normalized_key, description)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (company_id, normalized_key) DO NOTHING
            RETURNING id
            "#,
        )
        .bind(new_v7())
        .bind(company_id)
        .bind(name.trim())
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
            "SELECT id FROM capability WHERE company_id = $1 AND normalized_key = $2",
        )
        .bind(company_id)
        .bind(&key)
        .fetch_optional(&mut **tx)
        .await
        .map_err(Error::Database)?;

        match row {
            Some((id,)) => Ok(Resolved { id, existing: true }),
            None => Err(Error::Conflict(format!(
                "capability '{}' lost creation race and re-read found no row",
                key
            ))),
        }
    }

    pub async fn upsert_capability_level_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        capability_id: Uuid,
        level: &str,
        description: Option<&str>,
    ) -> Result<Uuid> {
        let level = level.trim();
        if level.is_empty() {
            return Err(Error::Validation("capability level is empty".to_string()));
        }

        let (id,): (Uuid,) = sqlx::query_as(
            r#"
            INSERT INTO capability_level (id, capability_id, level, description)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (capability_id, level)
            DO UPDATE SET description = EXCLUDED.description, updated_at = now()
            RETURNING id
            "#,
        )
        .bind(new_v7())
        .bind(capability_id)
        .bind(level)
        .bind(description)
        .fetch_one(&mut **tx)
        .await
        .map_err(|e| {
            if roster_core::error::is_foreign_key_violation(&e) {
                Error::DanglingReference(format!("capability {} does not exist", capability_id))
            } else {
                Error::Database(e)
            }
        })?;

        Ok(id)
    }

    pub async fn get_or_create_taxonomy_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        company_id: Uuid,
        name: &str,
    ) -> Result<Resolved> {
        let key = require_key(name, "taxonomy name")?;

        if let Some((id,)) = sqlx::query_as::<_, (Uuid,)>(
            "SELECT id FROM taxonomy WHERE company_id = $1 AND normalized_key = $2",
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
            INSERT INTO taxonomy (id, company_id, name, normalized_key)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (company_id, normalized_key) DO NOTHING
            RETURNING id
            "#,
        )
        .bind(new_v7())
        .bind(company_id)
        .bind(name.trim())
        .bind(&key)
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
            "SELECT id FROM taxonomy WHERE company_id = $1 AND normalized_key = $2",
        )
        .bind(company_id)
        .bind(&key)
        .fetch_optional(&mut **tx)
        .await
        .map_err(Error::Database)?;

        match row {
            Some((id,)) => Ok(Resolved { id, existing: true }),
            None => Err(Error::Conflict(format!(
                "taxonomy '{}' lost creation race and re-read found no row",
                key
            ))),
        }
    }
}
