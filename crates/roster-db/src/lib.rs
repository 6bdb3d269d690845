//! Postgres persistence for the roster ingestion pipeline.
//!
//! Everything here writes to the *staging* database; a downstream promoter
//! moves rows to the live database out of band, tracked per row through
//! `sync_status`/`last_synced_at`. The [`Store`] aggregate bundles one
//! repository per entity family over a shared connection pool. Two ports
//! wrap it for the pipeline:
//!
//! - [`StagingStore`] — the full read/write surface.
//! - [`LiveStore`] — a sealed handle on the live database that can only
//!   report row counts and liveness, never write.

pub mod documents;
pub mod jobs;
pub mod links;
pub mod organizations;
pub mod pool;
pub mod reference;
pub mod roles;
pub mod similarity;
pub mod test_fixtures;

pub use documents::PgDocumentRepository;
pub use jobs::{diff_changed_fields, PgJobRepository};
pub use links::PgLinkRepository;
pub use organizations::PgOrganizationRepository;
pub use pool::{create_pool, create_pool_with_config, PoolConfig};
pub use reference::PgReferenceRepository;
pub use roles::PgRoleRepository;
pub use similarity::{PgSimilarityRepository, SimilarityTarget};

// Re-export core types so consumers only need one import path.
pub use roster_core::*;

use sqlx::{PgPool, Postgres, Transaction};

/// All repositories over one staging pool.
#[derive(Clone)]
pub struct Store {
    pool: PgPool,
    pub orgs: PgOrganizationRepository,
    pub roles: PgRoleRepository,
    pub jobs: PgJobRepository,
    pub reference: PgReferenceRepository,
    pub links: PgLinkRepository,
    pub documents: PgDocumentRepository,
    pub similarity: PgSimilarityRepository,
}

impl Store {
    pub fn new(pool: PgPool) -> Self {
        Self {
            orgs: PgOrganizationRepository::new(pool.clone()),
            roles: PgRoleRepository::new(pool.clone()),
            jobs: PgJobRepository::new(pool.clone()),
            reference: PgReferenceRepository::new(pool.clone()),
            links: PgLinkRepository::new(pool.clone()),
            documents: PgDocumentRepository::new(pool.clone()),
            similarity: PgSimilarityRepository::new(pool.clone()),
            pool,
        }
    }

    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = create_pool(database_url).await?;
        Ok(Self::new(pool))
    }

    pub async fn connect_with_config(database_url: &str, config: PoolConfig) -> Result<Self> {
        let pool = create_pool_with_config(database_url, config).await?;
        Ok(Self::new(pool))
    }

    /// Run pending migrations against the staging database.
    #[cfg(feature = "migrations")]
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("../../migrations")
            .run(&self.pool)
            .await
            .map_err(|e| Error::Database(sqlx::Error::Migrate(Box::new(e))))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Open a transaction for one record's relational writes.
    pub async fn begin(&self) -> Result<Transaction<'static, Postgres>> {
        self.pool.begin().await.map_err(Error::Database)
    }

    /// Row counts per entity kind.
    pub async fn counts(&self) -> Result<EntityCounts> {
        counts_on(&self.pool).await
    }

    /// Row counts per entity kind, restricted to rows still awaiting
    /// promotion.
    pub async fn pending_counts(&self) -> Result<EntityCounts> {
        sqlx::query_as::<_, EntityCounts>(PENDING_COUNTS_SQL)
            .fetch_one(&self.pool)
            .await
            .map_err(Error::Database)
    }
}

/// Full read/write port over the staging database.
///
/// Derefs to [`Store`]; exists so function signatures can say which side
/// of the staging/live split they write to.
#[derive(Clone)]
pub struct StagingStore {
    store: Store,
}

impl StagingStore {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    pub async fn connect(database_url: &str) -> Result<Self> {
        Ok(Self::new(Store::connect(database_url).await?))
    }
}

impl std::ops::Deref for StagingStore {
    type Target = Store;

    fn deref(&self) -> &Store {
        &self.store
    }
}

/// Sealed read-only port on the live database.
///
/// Holds its own pool and exposes only counts and a liveness check, so
/// the ingestion pipeline cannot write to the live side by construction.
#[derive(Clone)]
pub struct LiveStore {
    pool: PgPool,
}

impl LiveStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = create_pool(database_url).await?;
        Ok(Self::new(pool))
    }

    pub async fn counts(&self) -> Result<EntityCounts> {
        counts_on(&self.pool).await
    }

    pub async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(())
    }
}

async fn counts_on(pool: &PgPool) -> Result<EntityCounts> {
    sqlx::query_as::<_, EntityCounts>(COUNTS_SQL)
        .fetch_one(pool)
        .await
        .map_err(Error::Database)
}

const COUNTS_SQL: &str = r#"
    SELECT
        (SELECT COUNT(*) FROM institution)  AS institutions,
        (SELECT COUNT(*) FROM company)      AS companies,
        (SELECT COUNT(*) FROM division)     AS divisions,
        (SELECT COUNT(*) FROM role)         AS roles,
        (SELECT COUNT(*) FROM job)          AS jobs,
        (SELECT COUNT(*) FROM skill)        AS skills,
        (SELECT COUNT(*) FROM capability)   AS capabilities,
        (SELECT COUNT(*) FROM taxonomy)     AS taxonomies,
        (SELECT COUNT(*) FROM job_document) AS documents,
        (SELECT COUNT(*) FROM role_skill)
            + (SELECT COUNT(*) FROM role_capability)
            + (SELECT COUNT(*) FROM role_taxonomy)
            + (SELECT COUNT(*) FROM job_skill) AS links
"#;

const PENDING_COUNTS_SQL: &str = r#"
    SELECT
        (SELECT COUNT(*) FROM institution WHERE sync_status = 'pending')  AS institutions,
        (SELECT COUNT(*) FROM company WHERE sync_status = 'pending')      AS companies,
        (SELECT COUNT(*) FROM division WHERE sync_status = 'pending')     AS divisions,
        (SELECT COUNT(*) FROM role WHERE sync_status = 'pending')         AS roles,
        (SELECT COUNT(*) FROM job WHERE sync_status = 'pending')          AS jobs,
        (SELECT COUNT(*) FROM skill WHERE sync_status = 'pending')        AS skills,
        (SELECT COUNT(*) FROM capability WHERE sync_status = 'pending')   AS capabilities,
        (SELECT COUNT(*) FROM taxonomy WHERE sync_status = 'pending')     AS taxonomies,
        (SELECT COUNT(*) FROM job_document WHERE sync_status = 'pending') AS documents,
        (SELECT COUNT(*) FROM role_skill WHERE sync_status = 'pending')
            + (SELECT COUNT(*) FROM role_capability WHERE sync_status = 'pending')
            + (SELECT COUNT(*) FROM role_taxonomy WHERE sync_status = 'pending')
            + (SELECT COUNT(*) FROM job_skill WHERE sync_status = 'pending') AS links
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_fixtures::TestDatabase;

    #[tokio::test]
    #[ignore] // Requires DATABASE_URL with migrated database
    async fn counts_start_at_zero_in_fresh_schema() {
        let test_db = TestDatabase::new().await;

        let counts = test_db.store.counts().await.unwrap();
        assert_eq!(counts, EntityCounts::default());

        let pending = test_db.store.pending_counts().await.unwrap();
        assert_eq!(pending, EntityCounts::default());

        test_db.cleanup().await;
    }

    #[tokio::test]
    #[ignore] // Requires DATABASE_URL with migrated database
    async fn staging_store_derefs_to_full_surface() {
        let test_db = TestDatabase::new().await;
        let staging = StagingStore::new(Store::new(test_db.pool.clone()));

        let resolved = staging
            .orgs
            .get_or_create_institution("Deref Institution")
            .await
            .unwrap();
        assert!(!resolved.existing);

        test_db.cleanup().await;
    }
}
