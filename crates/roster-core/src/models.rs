//! Core data model for the roster ingestion pipeline.
//!
//! Entity structs mirror the staging-store tables one to one. Lifecycle
//! columns (`sync_status`, `change_type`) are TEXT in Postgres and `String`
//! in row structs; the typed enums here own the legal values and the
//! conversions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;

use crate::keys::normalize_key;
use crate::{Error, Result};

pub use pgvector::Vector;

// =============================================================================
// LIFECYCLE ENUMS
// =============================================================================

/// Promotion state of a staged row.
///
/// The ingestion pipeline only ever writes `pending`; `synced`/`failed` are
/// owned by the downstream promoter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncStatus {
    Pending,
    Synced,
    Failed,
}

impl SyncStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncStatus::Pending => "pending",
            SyncStatus::Synced => "synced",
            SyncStatus::Failed => "failed",
        }
    }
}

impl std::str::FromStr for SyncStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "pending" => Ok(SyncStatus::Pending),
            "synced" => Ok(SyncStatus::Synced),
            "failed" => Ok(SyncStatus::Failed),
            other => Err(Error::Validation(format!("unknown sync status: {}", other))),
        }
    }
}

impl std::fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind of job version transition recorded in history.
///
/// History rows hold pre-transition snapshots, so the first creation writes
/// no row and runtime rows are tagged `update` or `archive`; `create` is
/// part of the on-disk domain for promoter-side backfills.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeType {
    Create,
    Update,
    Archive,
}

impl ChangeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeType::Create => "create",
            ChangeType::Update => "update",
            ChangeType::Archive => "archive",
        }
    }
}

impl std::str::FromStr for ChangeType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "create" => Ok(ChangeType::Create),
            "update" => Ok(ChangeType::Update),
            "archive" => Ok(ChangeType::Archive),
            other => Err(Error::Validation(format!("unknown change type: {}", other))),
        }
    }
}

impl std::fmt::Display for ChangeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// ORGANIZATIONAL ENTITIES
// =============================================================================

/// Top-level tenant grouping. Created once, rarely mutated.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Institution {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub sync_status: String,
    pub last_synced_at: Option<DateTime<Utc>>,
}

/// An employer. Deduplicated on (institution_id, slug). The parent pointer
/// supports employer hierarchies; ingestion never sets it.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Company {
    pub id: Uuid,
    pub institution_id: Uuid,
    pub parent_company_id: Option<Uuid>,
    pub name: String,
    pub slug: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub sync_status: String,
    pub last_synced_at: Option<DateTime<Utc>>,
}

/// Organizational unit within a company. Deduplicated on (company_id, slug).
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Division {
    pub id: Uuid,
    pub company_id: Uuid,
    pub name: String,
    pub slug: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub sync_status: String,
    pub last_synced_at: Option<DateTime<Utc>>,
}

// =============================================================================
// ROLE ENTITIES
// =============================================================================

/// Cross-company canonical role. Global dedup on normalized_key; resolved
/// for company roles via embedding similarity, not exact match.
///
/// The pgvector `embedding` column stays out of this struct; similarity
/// queries read it in SQL and return scores only.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct GeneralRole {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub normalized_key: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub sync_status: String,
    pub last_synced_at: Option<DateTime<Utc>>,
}

/// A company-specific role. Deduplicated on (company_id, normalized_key)
/// where normalized_key is the lower-cased, whitespace-collapsed title.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Role {
    pub id: Uuid,
    pub company_id: Uuid,
    pub division_id: Option<Uuid>,
    pub general_role_id: Option<Uuid>,
    pub title: String,
    pub normalized_key: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub sync_status: String,
    pub last_synced_at: Option<DateTime<Utc>>,
}

// =============================================================================
// JOB ENTITIES
// =============================================================================

/// The versioned entity. At most one row per natural key
/// (company_id, source_id, original_id); prior states live in history.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Job {
    pub id: Uuid,
    pub company_id: Uuid,
    pub role_id: Option<Uuid>,
    pub source_id: String,
    pub original_id: String,
    pub title: String,
    pub opens_at: Option<DateTime<Utc>>,
    pub closes_at: Option<DateTime<Utc>>,
    pub locations: Vec<String>,
    pub job_type: Option<String>,
    pub remuneration: Option<String>,
    pub raw: JsonValue,
    pub version: i32,
    pub is_archived: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub sync_status: String,
    pub last_synced_at: Option<DateTime<Utc>>,
}

/// Natural key identifying one job across repeated ingestions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobKey {
    pub company_id: Uuid,
    pub source_id: String,
    pub original_id: String,
}

impl JobKey {
    pub fn new(company_id: Uuid, source_id: impl Into<String>, original_id: impl Into<String>) -> Self {
        Self {
            company_id,
            source_id: source_id.into(),
            original_id: original_id.into(),
        }
    }
}

/// Mutable job attributes carried by an upsert. Everything not in here
/// (id, natural key, version, archive flag) is managed by the store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobAttributes {
    pub role_id: Option<Uuid>,
    pub title: String,
    pub opens_at: Option<DateTime<Utc>>,
    pub closes_at: Option<DateTime<Utc>>,
    pub locations: Vec<String>,
    pub job_type: Option<String>,
    pub remuneration: Option<String>,
    pub raw: JsonValue,
}

/// Outcome of a job upsert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JobUpserted {
    pub id: Uuid,
    /// Version of the live row after this write.
    pub version: i32,
    /// True when this upsert created the row (version 1).
    pub created: bool,
}

/// One pre-transition snapshot from job_history.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct JobHistoryEntry {
    pub job_id: Uuid,
    /// Version the job was at *before* the transition this row records.
    pub version: i32,
    pub snapshot: JsonValue,
    pub changed_fields: Vec<String>,
    pub change_type: String,
    pub reason: Option<String>,
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// REFERENCE DATA
// =============================================================================

/// Company-scoped skill. Deduplicated on (company_id, normalized_key).
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Skill {
    pub id: Uuid,
    pub company_id: Uuid,
    pub name: String,
    pub normalized_key: String,
    pub description: Option<String>,
    pub category: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub sync_status: String,
    pub last_synced_at: Option<DateTime<Utc>>,
}

/// Company-scoped capability. Per-level behavioral descriptions live in
/// [`CapabilityLevel`], one row per capability x level.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Capability {
    pub id: Uuid,
    pub company_id: Uuid,
    pub name: String,
    pub normalized_key: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub sync_status: String,
    pub last_synced_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct CapabilityLevel {
    pub id: Uuid,
    pub capability_id: Uuid,
    pub level: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub sync_status: String,
    pub last_synced_at: Option<DateTime<Utc>>,
}

/// Company-scoped classification term (job family, stream, framework tag).
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Taxonomy {
    pub id: Uuid,
    pub company_id: Uuid,
    pub name: String,
    pub normalized_key: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub sync_status: String,
    pub last_synced_at: Option<DateTime<Utc>>,
}

// =============================================================================
// DOCUMENTS
// =============================================================================

/// A stored job document. One row per (job_id, url); repeated ingestion
/// upserts in place. The raw byte blob stays in the database and out of
/// this struct.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct JobDocument {
    pub id: Uuid,
    pub job_id: Uuid,
    pub url: String,
    pub title: Option<String>,
    pub content_type: Option<String>,
    pub content_hash: Option<String>,
    pub parsed_text: Option<String>,
    pub extraction_meta: JsonValue,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub sync_status: String,
    pub last_synced_at: Option<DateTime<Utc>>,
}

/// Payload for a document upsert.
#[derive(Debug, Clone, Default)]
pub struct NewJobDocument {
    pub url: String,
    pub title: Option<String>,
    pub content_type: Option<String>,
    pub raw_content: Option<Vec<u8>>,
    pub parsed_text: Option<String>,
    pub extraction_meta: JsonValue,
}

// =============================================================================
// RESOLUTION
// =============================================================================

/// Outcome of a get-or-create lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolved {
    pub id: Uuid,
    /// True when the row already existed; candidate attributes from this
    /// call were ignored in that case.
    pub existing: bool,
}

// =============================================================================
// INBOUND RECORDS
// =============================================================================

/// One normalized incoming job posting, as handed over by the upstream
/// scraper/normalizer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessedRecord {
    /// Which source system produced this record (e.g. a board slug).
    pub source_id: String,
    /// The posting's identifier within that source.
    pub original_id: String,
    pub title: String,
    /// Agency/company display name; resolved into a Company row.
    pub agency: String,
    #[serde(default)]
    pub division: Option<String>,
    #[serde(default)]
    pub opens_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub closes_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub locations: Vec<String>,
    #[serde(default)]
    pub job_type: Option<String>,
    #[serde(default)]
    pub remuneration: Option<String>,
    #[serde(default)]
    pub raw: JsonValue,
    #[serde(default)]
    pub documents: Vec<DocumentRef>,
    /// Pre-computed suggestions from an upstream classifier, if any.
    #[serde(default)]
    pub skills: Vec<SkillCandidate>,
    #[serde(default)]
    pub capabilities: Vec<CapabilityCandidate>,
    /// Classification scheme terms the role should be filed under.
    #[serde(default)]
    pub taxonomies: Vec<String>,
}

impl ProcessedRecord {
    /// Stable identifier used in logs and batch reports.
    pub fn record_key(&self) -> String {
        format!("{}/{}", self.source_id, self.original_id)
    }
}

/// Reference to a document attached to an incoming record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentRef {
    pub url: String,
    #[serde(default)]
    pub title: Option<String>,
    /// Declared content type, verified against magic bytes at ingest.
    #[serde(default)]
    pub doc_type: Option<String>,
}

// =============================================================================
// ANALYSIS CANDIDATES
// =============================================================================

/// A skill proposed by the upstream classifier or the text analyzer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkillCandidate {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
}

/// A capability proposed by the upstream classifier or the text analyzer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilityCandidate {
    pub name: String,
    #[serde(default)]
    pub level: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub capability_type: Option<String>,
}

/// Skill/capability candidates extracted from document text.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnalysisOutcome {
    #[serde(default)]
    pub skills: Vec<SkillCandidate>,
    #[serde(default)]
    pub capabilities: Vec<CapabilityCandidate>,
}

impl AnalysisOutcome {
    pub fn is_empty(&self) -> bool {
        self.skills.is_empty() && self.capabilities.is_empty()
    }

    /// Merge candidates from another source, deduplicating by normalized
    /// name. The first occurrence wins; later duplicates are dropped, which
    /// keeps upstream-classifier suggestions ahead of per-document analysis.
    pub fn merge(&mut self, other: AnalysisOutcome) {
        let mut seen: Vec<String> = self
            .skills
            .iter()
            .map(|s| normalize_key(&s.name))
            .collect();
        for skill in other.skills {
            let key = normalize_key(&skill.name);
            if key.is_empty() || seen.contains(&key) {
                continue;
            }
            seen.push(key);
            self.skills.push(skill);
        }

        let mut seen: Vec<String> = self
            .capabilities
            .iter()
            .map(|c| normalize_key(&c.name))
            .collect();
        for capability in other.capabilities {
            let key = normalize_key(&capability.name);
            if key.is_empty() || seen.contains(&key) {
                continue;
            }
            seen.push(key);
            self.capabilities.push(capability);
        }
    }
}

// =============================================================================
// SIMILARITY
// =============================================================================

/// One nearest-neighbor hit from a similarity query.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct SimilarMatch {
    pub id: Uuid,
    /// Cosine similarity in [-1, 1]; always strictly above the query
    /// threshold.
    pub similarity: f64,
}

// =============================================================================
// BATCH REPORTING
// =============================================================================

/// Pipeline stage a record failure originated from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    Validation,
    Resolution,
    Documents,
    JobStore,
    Linking,
    Canonicalization,
}

impl PipelineStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineStage::Validation => "validation",
            PipelineStage::Resolution => "resolution",
            PipelineStage::Documents => "documents",
            PipelineStage::JobStore => "job_store",
            PipelineStage::Linking => "linking",
            PipelineStage::Canonicalization => "canonicalization",
        }
    }
}

impl std::fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One failed record, with enough context to replay or triage it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordFailure {
    pub record_key: String,
    pub stage: PipelineStage,
    pub error: String,
}

/// Row counts per entity kind, comparable across the staging and live
/// stores.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct EntityCounts {
    pub institutions: i64,
    pub companies: i64,
    pub divisions: i64,
    pub roles: i64,
    pub jobs: i64,
    pub skills: i64,
    pub capabilities: i64,
    pub taxonomies: i64,
    pub documents: i64,
    pub links: i64,
}

impl EntityCounts {
    /// Per-kind difference (`self - other`); staging minus live yields the
    /// promotion backlog.
    pub fn diff(&self, other: &EntityCounts) -> EntityCounts {
        EntityCounts {
            institutions: self.institutions - other.institutions,
            companies: self.companies - other.companies,
            divisions: self.divisions - other.divisions,
            roles: self.roles - other.roles,
            jobs: self.jobs - other.jobs,
            skills: self.skills - other.skills,
            capabilities: self.capabilities - other.capabilities,
            taxonomies: self.taxonomies - other.taxonomies,
            documents: self.documents - other.documents,
            links: self.links - other.links,
        }
    }
}

/// Staging vs live row counts at the end of a batch run.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SyncDrift {
    pub staging: EntityCounts,
    pub live: EntityCounts,
    /// staging - live per entity kind.
    pub lag: EntityCounts,
}

/// What a batch (or one record) created or touched, per entity kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchMetrics {
    pub companies_created: u64,
    pub divisions_created: u64,
    pub roles_created: u64,
    pub jobs_created: u64,
    pub jobs_updated: u64,
    pub documents_stored: u64,
    pub documents_failed: u64,
    pub skills_created: u64,
    pub capabilities_created: u64,
    pub taxonomies_created: u64,
    pub links_written: u64,
    pub roles_canonicalized: u64,
    pub general_roles_created: u64,
}

impl BatchMetrics {
    /// Fold another metrics block into this one.
    pub fn absorb(&mut self, other: &BatchMetrics) {
        self.companies_created += other.companies_created;
        self.divisions_created += other.divisions_created;
        self.roles_created += other.roles_created;
        self.jobs_created += other.jobs_created;
        self.jobs_updated += other.jobs_updated;
        self.documents_stored += other.documents_stored;
        self.documents_failed += other.documents_failed;
        self.skills_created += other.skills_created;
        self.capabilities_created += other.capabilities_created;
        self.taxonomies_created += other.taxonomies_created;
        self.links_written += other.links_written;
        self.roles_canonicalized += other.roles_canonicalized;
        self.general_roles_created += other.general_roles_created;
    }
}

/// Result of one `store_batch` run. Always returned; partial failures are
/// counted here, never thrown.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchReport {
    pub succeeded: usize,
    pub failed: usize,
    pub errors: Vec<RecordFailure>,
    pub metrics: BatchMetrics,
    /// Present when a live store is configured and reachable.
    pub drift: Option<SyncDrift>,
    pub duration_ms: u64,
}

impl BatchReport {
    pub fn total(&self) -> usize {
        self.succeeded + self.failed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sync_status_round_trip() {
        for status in [SyncStatus::Pending, SyncStatus::Synced, SyncStatus::Failed] {
            let parsed: SyncStatus = status.as_str().parse().unwrap();
            assert_eq!(parsed, status);
        }
    }

    #[test]
    fn test_sync_status_unknown_rejected() {
        let err = "promoted".parse::<SyncStatus>().unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn test_change_type_round_trip() {
        for ct in [ChangeType::Create, ChangeType::Update, ChangeType::Archive] {
            let parsed: ChangeType = ct.as_str().parse().unwrap();
            assert_eq!(parsed, ct);
        }
    }

    #[test]
    fn test_change_type_display() {
        assert_eq!(ChangeType::Archive.to_string(), "archive");
    }

    #[test]
    fn test_record_key_format() {
        let record = ProcessedRecord {
            source_id: "apsjobs".to_string(),
            original_id: "10/4321".to_string(),
            title: "Policy Officer".to_string(),
            agency: "Department of Finance".to_string(),
            division: None,
            opens_at: None,
            closes_at: None,
            locations: vec![],
            job_type: None,
            remuneration: None,
            raw: JsonValue::Null,
            documents: vec![],
            skills: vec![],
            capabilities: vec![],
            taxonomies: vec![],
        };
        assert_eq!(record.record_key(), "apsjobs/10/4321");
    }

    #[test]
    fn test_processed_record_deserializes_with_defaults() {
        let json = r#"{
            "source_id": "apsjobs",
            "original_id": "7",
            "title": "Engineer",
            "agency": "Acme"
        }"#;
        let record: ProcessedRecord = serde_json::from_str(json).unwrap();
        assert!(record.documents.is_empty());
        assert!(record.skills.is_empty());
        assert!(record.division.is_none());
        assert_eq!(record.raw, JsonValue::Null);
    }

    #[test]
    fn test_analysis_outcome_merge_dedups_by_normalized_name() {
        let mut base = AnalysisOutcome {
            skills: vec![SkillCandidate {
                name: "Stakeholder Management".to_string(),
                description: Some("from classifier".to_string()),
                category: None,
            }],
            capabilities: vec![],
        };
        base.merge(AnalysisOutcome {
            skills: vec![
                SkillCandidate {
                    name: "stakeholder   management".to_string(),
                    description: Some("from document".to_string()),
                    category: None,
                },
                SkillCandidate {
                    name: "Data Analysis".to_string(),
                    description: None,
                    category: None,
                },
            ],
            capabilities: vec![CapabilityCandidate {
                name: "Communicates with Influence".to_string(),
                level: Some("Adept".to_string()),
                description: None,
                capability_type: None,
            }],
        });

        assert_eq!(base.skills.len(), 2);
        // First occurrence wins: classifier description kept.
        assert_eq!(base.skills[0].description.as_deref(), Some("from classifier"));
        assert_eq!(base.capabilities.len(), 1);
    }

    #[test]
    fn test_analysis_outcome_merge_skips_blank_names() {
        let mut base = AnalysisOutcome::default();
        base.merge(AnalysisOutcome {
            skills: vec![SkillCandidate {
                name: "   ".to_string(),
                description: None,
                category: None,
            }],
            capabilities: vec![],
        });
        assert!(base.is_empty());
    }

    #[test]
    fn test_entity_counts_diff() {
        let staging = EntityCounts {
            jobs: 10,
            companies: 4,
            ..Default::default()
        };
        let live = EntityCounts {
            jobs: 7,
            companies: 4,
            ..Default::default()
        };
        let lag = staging.diff(&live);
        assert_eq!(lag.jobs, 3);
        assert_eq!(lag.companies, 0);
    }

    #[test]
    fn test_batch_metrics_absorb() {
        let mut total = BatchMetrics::default();
        total.absorb(&BatchMetrics {
            jobs_created: 2,
            links_written: 5,
            ..Default::default()
        });
        total.absorb(&BatchMetrics {
            jobs_created: 1,
            jobs_updated: 3,
            ..Default::default()
        });
        assert_eq!(total.jobs_created, 3);
        assert_eq!(total.jobs_updated, 3);
        assert_eq!(total.links_written, 5);
    }

    #[test]
    fn test_batch_report_total() {
        let report = BatchReport {
            succeeded: 8,
            failed: 2,
            errors: vec![],
            metrics: BatchMetrics::default(),
            drift: None,
            duration_ms: 12,
        };
        assert_eq!(report.total(), 10);
    }

    #[test]
    fn test_pipeline_stage_as_str() {
        assert_eq!(PipelineStage::JobStore.as_str(), "job_store");
        assert_eq!(PipelineStage::Canonicalization.to_string(), "canonicalization");
    }

    #[test]
    fn test_record_failure_serializes_stage_snake_case() {
        let failure = RecordFailure {
            record_key: "apsjobs/1".to_string(),
            stage: PipelineStage::JobStore,
            error: "boom".to_string(),
        };
        let json = serde_json::to_string(&failure).unwrap();
        assert!(json.contains("\"job_store\""));
    }
}
