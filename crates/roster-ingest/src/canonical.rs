//! General-role canonicalization.
//!
//! Institution-specific role titles fold into a global `general_role`
//! vocabulary by embedding similarity. Runs after a record's transaction
//! commits; failure here leaves the role uncanonicalized and a later batch
//! picks it up again.

use std::sync::Arc;

use tracing::debug;
use uuid::Uuid;

use roster_core::{EmbeddingBackend, Error, Result};
use roster_db::{
    PgReferenceRepository, PgRoleRepository, PgSimilarityRepository, SimilarityTarget, Store,
};

/// What canonicalization did to one role.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CanonicalOutcome {
    /// The role already carried a general-role link.
    AlreadyCanonical,
    /// The role was linked, to a freshly created general role when
    /// `created` is set.
    Linked { general_role_id: Uuid, created: bool },
}

/// Links roles to general roles via embedding similarity.
pub struct RoleCanonicalizer {
    roles: PgRoleRepository,
    reference: PgReferenceRepository,
    similarity: PgSimilarityRepository,
    embedder: Arc<dyn EmbeddingBackend>,
    threshold: f64,
}

impl RoleCanonicalizer {
    pub fn new(store: &Store, embedder: Arc<dyn EmbeddingBackend>, threshold: f64) -> Self {
        Self {
            roles: store.roles.clone(),
            reference: store.reference.clone(),
            similarity: store.similarity.clone(),
            embedder,
            threshold,
        }
    }

    /// Canonicalize one role: embed its title and description, store the
    /// embedding on the role, then link the nearest general role strictly
    /// above the threshold, creating one when nothing is close enough.
    ///
    /// A role that is already canonicalized is left untouched.
    pub async fn canonicalize(&self, role_id: Uuid) -> Result<CanonicalOutcome> {
        let role = self
            .roles
            .get_role(role_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("role {} not found", role_id)))?;

        if role.general_role_id.is_some() {
            return Ok(CanonicalOutcome::AlreadyCanonical);
        }

        let text = embedding_input(&role.title, role.description.as_deref());
        let vectors = self.embedder.embed_texts(&[text]).await?;
        let embedding = vectors.into_iter().next().ok_or_else(|| {
            Error::Collaborator("embedding backend returned no vector".to_string())
        })?;

        // Stored so later batches and near-duplicate queries reuse it.
        self.roles.set_embedding(role_id, &embedding).await?;

        let matches = self
            .similarity
            .find_similar(SimilarityTarget::GeneralRole, &embedding, self.threshold, 1)
            .await?;

        if let Some(best) = matches.first() {
            self.roles.set_general_role(role_id, best.id).await?;
            debug!(
                %role_id,
                general_role_id = %best.id,
                similarity = best.similarity,
                "Role folded into existing general role"
            );
            return Ok(CanonicalOutcome::Linked {
                general_role_id: best.id,
                created: false,
            });
        }

        // Nothing close enough; seed a new general role from this role.
        // Concurrent creators converge on one row get-or-create style.
        let resolved = self
            .reference
            .get_or_create_general_role(&role.title, role.description.as_deref(), Some(&embedding))
            .await?;
        self.roles.set_general_role(role_id, resolved.id).await?;
        debug!(
            %role_id,
            general_role_id = %resolved.id,
            created = !resolved.existing,
            "Role linked to general role"
        );

        Ok(CanonicalOutcome::Linked {
            general_role_id: resolved.id,
            created: !resolved.existing,
        })
    }
}

/// Text handed to the embedding backend for a role.
fn embedding_input(title: &str, description: Option<&str>) -> String {
    match description {
        Some(d) if !d.trim().is_empty() => format!("{}\n\n{}", title, d.trim()),
        _ => title.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embedding_input_joins_title_and_description() {
        let text = embedding_input("Data Engineer", Some("Builds pipelines."));
        assert_eq!(text, "Data Engineer\n\nBuilds pipelines.");
    }

    #[test]
    fn embedding_input_falls_back_to_title() {
        assert_eq!(embedding_input("Data Engineer", None), "Data Engineer");
        assert_eq!(embedding_input("Data Engineer", Some("   ")), "Data Engineer");
    }
}
