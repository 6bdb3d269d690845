//! Organization resolution: institutions, companies, divisions.
//!
//! All lookups are slug-keyed get-or-create. Concurrent creation of the
//! same entity is settled by the unique index: the losing insert conflicts,
//! does nothing, and re-reads the winner's row. Attributes passed by the
//! loser are dropped; first writer wins.

use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use roster_core::{new_v7, require_slug, Company, Division, Error, Institution, Resolved, Result};

#[derive(Clone)]
pub struct PgOrganizationRepository {
    pool: PgPool,
}

impl PgOrganizationRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Resolve an institution by display name, creating it if absent.
    pub async fn get_or_create_institution(&self, name: &str) -> Result<Resolved> {
        let slug = require_slug(name, "institution name")?;

        if let Some((id,)) =
            sqlx::query_as::<_, (Uuid,)>("SELECT id FROM institution WHERE slug = $1")
                .bind(&slug)
                .fetch_optional(&self.pool)
                .await
                .map_err(Error::Database)?
        {
            return Ok(Resolved { id, existing: true });
        }

        let inserted: Option<(Uuid,)> = sqlx::query_as(
            r#"
            INSERT INTO institution (id, name, slug)
            VALUES ($1, $2, $3)
            ON CONFLICT (slug) DO NOTHING
            RETURNING id
            "#,
        )
        .bind(new_v7())
        .bind(name.trim())
        .bind(&slug)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        if let Some((id,)) = inserted {
            return Ok(Resolved {
                id,
                existing: false,
            });
        }

        // Lost the race; the winner's row is committed by now.
        let row: Option<(Uuid,)> =
            sqlx::query_as("SELECT id FROM institution WHERE slug = $1")
                .bind(&slug)
                .fetch_optional(&self.pool)
                .await
                .map_err(Error::Database)?;

        match row {
            Some((id,)) => Ok(Resolved { id, existing: true }),
            None => Err(Error::Conflict(format!(
                "institution '{}' lost creation race and re-read found no row",
                slug
            ))),
        }
    }

    /// Resolve a company within an institution, creating it if absent.
    pub async fn get_or_create_company(
        &self,
        institution_id: Uuid,
        name: &str,
    ) -> Result<Resolved> {
        let slug = require_slug(name, "company name")?;

        if let Some((id,)) = sqlx::query_as::<_, (Uuid,)>(
            "SELECT id FROM company WHERE institution_id = $1 AND slug = $2",
        )
        .bind(institution_id)
        .bind(&slug)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?
        {
            return Ok(Resolved { id, existing: true });
        }

        let inserted: Option<(Uuid,)> = sqlx::query_as(
            r#"
            INSERT INTO company (id, institution_id, name, slug)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (institution_id, slug) DO NOTHING
            RETURNING id
            "#,
        )
        .bind(new_v7())
        .bind(institution_id)
        .bind(name.trim())
        .bind(&slug)
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
            "SELECT id FROM company WHERE institution_id = $1 AND slug = $2",
        )
        .bind(institution_id)
        .bind(&slug)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        match row {
            Some((id,)) => Ok(Resolved { id, existing: true }),
            None => Err(Error::Conflict(format!(
                "company '{}' lost creation race and re-read found no row",
                slug
            ))),
        }
    }

    /// Resolve a division within a company, creating it if absent.
    pub async fn get_or_create_division(&self, company_id: Uuid, name: &str) -> Result<Resolved> {
        let slug = require_slug(name, "division name")?;

        if let Some((id,)) = sqlx::query_as::<_, (Uuid,)>(
            "SELECT id FROM division WHERE company_id = $1 AND slug = $2",
        )
        .bind(company_id)
        .bind(&slug)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?
        {
            return Ok(Resolved { id, existing: true });
        }

        let inserted: Option<(Uuid,)> = sqlx::query_as(
            r#"
            INSERT INTO division (id, company_id, name, slug)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (company_id, slug) DO NOTHING
            RETURNING id
            "#,
        )
        .bind(new_v7())
        .bind(company_id)
        .bind(name.trim())
        .bind(&slug)
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
            "SELECT id FROM division WHERE company_id = $1 AND slug = $2",
        )
        .bind(company_id)
        .bind(&slug)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        match row {
            Some((id,)) => Ok(Resolved { id, existing: true }),
            None => Err(Error::Conflict(format!(
                "division '{}' lost creation race and re-read found no row",
                slug
            ))),
        }
    }

    /// Fetch an institution by id.
    pub async fn get_institution(&self, id: Uuid) -> Result<Option<Institution>> {
        sqlx::query_as::<_, Institution>(
            r#"
            SELECT id, name, slug, created_at, updated_at, sync_status, last_synced_at
            FROM institution
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)
    }

    /// Fetch a company by id.
    pub async fn get_company(&self, id: Uuid) -> Result<Option<Company>> {
        sqlx::query_as::<_, Company>(
            r#"
            SELECT id, institution_id, parent_company_id, name, slug,
                   created_at, updated_at, sync_status, last_synced_at
            FROM company
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)
    }

    /// Find a company by its slug within an institution.
    pub async fn find_company(
        &self,
        institution_id: Uuid,
        slug: &str,
    ) -> Result<Option<Company>> {
        sqlx::query_as::<_, Company>(
            r#"
            SELECT id, institution_id, parent_company_id, name, slug,
                   created_at, updated_at, sync_status, last_synced_at
            FROM company
            WHERE institution_id = $1 AND slug = $2
            "#,
        )
        .bind(institution_id)
        .bind(slug)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)
    }

    /// Fetch a division by id.
    pub async fn get_division(&self, id: Uuid) -> Result<Option<Division>> {
        sqlx::query_as::<_, Division>(
            r#"
            SELECT id, company_id, name, slug, created_at, updated_at,
                   sync_status, last_synced_at
            FROM division
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
impl PgOrganizationRepository {
    /// Transaction-aware variant of get_or_create_institution.
    pub async fn get_or_create_institution_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        name: &str,
    ) -> Result<Resolved> {
        let slug = require_slug(name, "institution name")?;

        if let Some((id,)) =
            sqlx::query_as::<_, (Uuid,)>("SELECT id FROM institution WHERE slug = $1")
                .bind(&slug)
                .fetch_optional(&mut **tx)
                .await
                .map_err(Error::Database)?
        {
            return Ok(Resolved { id, existing: true });
        }

        let inserted: Option<(Uuid,)> = sqlx::query_as(
            r#"
            INSERT INTO institution (id, name, slug)
            VALUES ($1, $2, $3)
            ON CONFLICT (slug) DO NOTHING
            RETURNING id
            "#,
        )
        .bind(new_v7())
        .bind(name.trim())
        .bind(&slug)
        .fetch_optional(&mut **tx)
        .await
        .map_err(Error::Database)?;

        if let Some((id,)) = inserted {
            return Ok(Resolved {
                id,
                existing: false,
            });
        }

        let row: Option<(Uuid,)> =
            sqlx::query_as("SELECT id FROM institution WHERE slug = $1")
                .bind(&slug)
                .fetch_optional(&mut **tx)
                .await
                .map_err(Error::Database)?;

        match row {
            Some((id,)) => Ok(Resolved { id, existing: true }),
            None => Err(Error::Conflict(format!(
                "institution '{}' lost creation race and re-read found no row",
                slug
            ))),
        }
    }

    /// Transaction-aware variant of get_or_create_company.
    pub async fn get_or_create_company_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        institution_id: Uuid,
        name: &str,
    ) -> Result<Resolved> {
        let slug = require_slug(name, "company name")?;

        if let Some((id,)) = sqlx::query_as::<_, (Uuid,)>(
            "SELECT id FROM company WHERE institution_id = $1 AND slug = $2",
        )
        .bind(institution_id)
        .bind(&slug)
        .fetch_optional(&mut **tx)
        .await
        .map_err(Error::Database)?
        {
            return Ok(Resolved { id, existing: true });
        }

        let inserted: Option<(Uuid,)> = sqlx::query_as(
            r#"
            INSERT INTO company (id, institution_id, name, slug)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (institution_id, slug) DO NOTHING
            RETURNING id
            "#,
        )
        .bind(new_v7())
        .bind(institution_id)
        .bind(name.trim())
        .bind(&slug)
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
            "SELECT id FROM company WHERE institution_id = $1 AND slug = $2",
        )
        .bind(institution_id)
        .bind(&slug)
        .fetch_optional(&mut **tx)
        .await
        .map_err(Error::Database)?;

        match row {
            Some((id,)) => Ok(Resolved { id, existing: true }),
            None => Err(Error::Conflict(format!(
                "company '{}' lost creation race and re-read found no row",
                slug
            ))),
        }
    }

    /// Transaction-aware variant of get_or_create_division.
    pub async fn get_or_create_division_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        company_id: Uuid,
        name: &str,
    ) -> Result<Resolved> {
        let slug = require_slug(name, "division name")?;

        if let Some((id,)) = sqlx::query_as::<_, (Uuid,)>(
            "SELECT id FROM division WHERE company_id = $1 AND slug = $2",
        )
        .bind(company_id)
        .bind(&slug)
        .fetch_optional(&mut **tx)
        .await
        .map_err(Error::Database)?
        {
            return Ok(Resolved { id, existing: true });
        }

        let inserted: Option<(Uuid,)> = sqlx::query_as(
            r#"
            INSERT INTO division (id, company_id, name, slug)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (company_id, slug) DO NOTHING
            RETURNING id
            "#,
        )
        .bind(new_v7())
        .bind(company_id)
        .bind(name.trim())
        .bind(&slug)
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
            "SELECT id FROM division WHERE company_id = $1 AND slug = $2",
        )
        .bind(company_id)
        .bind(&slug)
        .fetch_optional(&mut **tx)
        .await
        .map_err(Error::Database)?;

        match row {
            Some((id,)) => Ok(Resolved { id, existing: true }),
            None => Err(Error::Conflict(format!(
                "division '{}' lost creation race and re-read found no row",
                slug
            ))),
        }
    }
}
