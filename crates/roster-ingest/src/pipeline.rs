//! Per-record processing: validate, prepare documents, write relational
//! rows in one transaction, then canonicalize.
//!
//! Every failure is tagged with the stage it came from so batch reports
//! can say where a record died. All relational writes for one record
//! commit or roll back together; canonicalization runs after commit and
//! never fails the record.

use std::sync::Arc;

use tracing::{debug, instrument, warn};
use uuid::Uuid;

use roster_core::{
    normalize_key, AnalysisOutcome, BatchMetrics, Error, JobAttributes, JobKey, PipelineStage,
    ProcessedRecord, RecordFailure, Result,
};
use roster_db::Store;

use crate::canonical::{CanonicalOutcome, RoleCanonicalizer};
use crate::documents::DocumentIngestor;

/// Everything one spawned record task needs. Cheap to clone; repositories
/// share the underlying pool.
#[derive(Clone)]
pub(crate) struct RecordPipeline {
    pub store: Store,
    pub ingestor: Arc<DocumentIngestor>,
    pub canonicalizer: Arc<RoleCanonicalizer>,
    pub institution_id: Uuid,
}

impl RecordPipeline {
    /// Run one record through the full pipeline. Returns what the record
    /// created; errors carry the failing stage.
    #[instrument(skip(self, record), fields(record_key = %record.record_key()))]
    pub(crate) async fn process_record(
        &self,
        record: &ProcessedRecord,
    ) -> std::result::Result<BatchMetrics, RecordFailure> {
        let record_key = record.record_key();
        let mut metrics = BatchMetrics::default();

        validate(record).map_err(|e| fail(&record_key, PipelineStage::Validation, &e))?;

        // Network phase, outside any transaction.
        let prepared = self.ingestor.prepare(&record.documents).await;
        metrics.documents_failed += prepared.failed as u64;

        // Relational phase: one transaction for the whole record.
        let mut tx = self
            .store
            .begin()
            .await
            .map_err(|e| fail(&record_key, PipelineStage::Resolution, &e))?;

        let company = self
            .store
            .orgs
            .get_or_create_company_tx(&mut tx, self.institution_id, &record.agency)
            .await
            .map_err(|e| fail(&record_key, PipelineStage::Resolution, &e))?;
        if !company.existing {
            metrics.companies_created += 1;
        }

        let division_id = match record.division.as_deref() {
            Some(name) if !name.trim().is_empty() => {
                let division = self
                    .store
                    .orgs
                    .get_or_create_division_tx(&mut tx, company.id, name)
                    .await
                    .map_err(|e| fail(&record_key, PipelineStage::Resolution, &e))?;
                if !division.existing {
                    metrics.divisions_created += 1;
                }
                Some(division.id)
            }
            _ => None,
        };

        let role = self
            .store
            .roles
            .get_or_create_role_tx(&mut tx, company.id, division_id, &record.title, None)
            .await
            .map_err(|e| fail(&record_key, PipelineStage::Resolution, &e))?;
        if !role.existing {
            metrics.roles_created += 1;
        }

        let key = JobKey::new(company.id, record.source_id.clone(), record.original_id.clone());
        let attrs = JobAttributes {
            role_id: Some(role.id),
            title: record.title.clone(),
            opens_at: record.opens_at,
            closes_at: record.closes_at,
            locations: record.locations.clone(),
            job_type: record.job_type.clone(),
            remuneration: record.remuneration.clone(),
            raw: record.raw.clone(),
        };
        let job = self
            .store
            .jobs
            .upsert_tx(&mut tx, &key, &attrs)
            .await
            .map_err(|e| fail(&record_key, PipelineStage::JobStore, &e))?;
        if job.created {
            metrics.jobs_created += 1;
        } else {
            metrics.jobs_updated += 1;
        }

        let stored = self
            .ingestor
            .persist_tx(&mut tx, job.id, &prepared.documents)
            .await
            .map_err(|e| fail(&record_key, PipelineStage::Documents, &e))?;
        metrics.documents_stored += stored as u64;

        let candidates = merged_candidates(record, prepared.analysis);

        for skill in &candidates.skills {
            let resolved = self
                .store
                .reference
                .get_or_create_skill_tx(
                    &mut tx,
                    company.id,
                    &skill.name,
                    skill.description.as_deref(),
                    skill.category.as_deref(),
                )
                .await
                .map_err(|e| fail(&record_key, PipelineStage::Linking, &e))?;
            if !resolved.existing {
                metrics.skills_created += 1;
            }

            self.store
                .links
                .link_role_skill_tx(&mut tx, role.id, resolved.id)
                .await
                .map_err(|e| fail(&record_key, PipelineStage::Linking, &e))?;
            metrics.links_written += 1;

            self.store
                .links
                .link_job_skill_tx(&mut tx, job.id, resolved.id)
                .await
                .map_err(|e| fail(&record_key, PipelineStage::Linking, &e))?;
            metrics.links_written += 1;
        }

        for capability in &candidates.capabilities {
            let resolved = self
                .store
                .reference
                .get_or_create_capability_tx(
                    &mut tx,
                    company.id,
                    &capability.name,
                    capability.description.as_deref(),
                )
                .await
                .map_err(|e| fail(&record_key, PipelineStage::Linking, &e))?;
            if !resolved.existing {
                metrics.capabilities_created += 1;
            }

            if let Some(level) = capability.level.as_deref() {
                self.store
                    .reference
                    .upsert_capability_level_tx(
                        &mut tx,
                        resolved.id,
                        level,
                        capability.description.as_deref(),
                    )
                    .await
                    .map_err(|e| fail(&record_key, PipelineStage::Linking, &e))?;
            }

            self.store
                .links
                .link_role_capability_tx(
                    &mut tx,
                    role.id,
                    resolved.id,
                    capability.level.as_deref(),
                    capability.capability_type.as_deref(),
                )
                .await
                .map_err(|e| fail(&record_key, PipelineStage::Linking, &e))?;
            metrics.links_written += 1;
        }

        for name in taxonomy_terms(&record.taxonomies) {
            let resolved = self
                .store
                .reference
                .get_or_create_taxonomy_tx(&mut tx, company.id, name)
                .await
                .map_err(|e| fail(&record_key, PipelineStage::Linking, &e))?;
            if !resolved.existing {
                metrics.taxonomies_created += 1;
            }

            self.store
                .links
                .link_role_taxonomy_tx(&mut tx, role.id, resolved.id)
                .await
                .map_err(|e| fail(&record_key, PipelineStage::Linking, &e))?;
            metrics.links_written += 1;
        }

        tx.commit()
            .await
            .map_err(|e| fail(&record_key, PipelineStage::Linking, &Error::Database(e)))?;

        // Post-commit; a failure here leaves the role uncanonicalized and
        // the record still counts as succeeded.
        match self.canonicalizer.canonicalize(role.id).await {
            Ok(CanonicalOutcome::Linked { created, .. }) => {
                metrics.roles_canonicalized += 1;
                if created {
                    metrics.general_roles_created += 1;
                }
            }
            Ok(CanonicalOutcome::AlreadyCanonical) => {}
            Err(e) => {
                warn!(
                    record_key = %record_key,
                    role_id = %role.id,
                    error = %e,
                    "Role canonicalization failed, role left uncanonicalized"
                );
            }
        }

        debug!(
            job_id = %job.id,
            created = job.created,
            documents = stored,
            "Record processed"
        );

        Ok(metrics)
    }
}

/// Reject records whose identity or required display fields are missing.
fn validate(record: &ProcessedRecord) -> Result<()> {
    for (field, value) in [
        ("source_id", &record.source_id),
        ("original_id", &record.original_id),
        ("title", &record.title),
        ("agency", &record.agency),
    ] {
        if value.trim().is_empty() {
            return Err(Error::Validation(format!("record {} is empty", field)));
        }
    }
    Ok(())
}

/// Combine record-level suggestions with document-analysis candidates.
/// Record suggestions come first so they win the dedup; blank names from
/// either source are dropped.
fn merged_candidates(record: &ProcessedRecord, analysis: AnalysisOutcome) -> AnalysisOutcome {
    let mut candidates = AnalysisOutcome::default();
    candidates.merge(AnalysisOutcome {
        skills: record.skills.clone(),
        capabilities: record.capabilities.clone(),
    });
    candidates.merge(analysis);
    candidates
}

/// Taxonomy terms worth resolving: blanks and duplicates dropped, first
/// spelling kept.
fn taxonomy_terms(names: &[String]) -> Vec<&str> {
    let mut seen: Vec<String> = Vec::new();
    let mut terms = Vec::new();
    for name in names {
        let key = normalize_key(name);
        if key.is_empty() || seen.contains(&key) {
            continue;
        }
        seen.push(key);
        terms.push(name.as_str());
    }
    terms
}

fn fail(record_key: &str, stage: PipelineStage, error: &Error) -> RecordFailure {
    RecordFailure {
        record_key: record_key.to_string(),
        stage,
        error: error.to_string(),
    }
}
