//! Similarity query behavior: strict threshold, ordering, limit, and the
//! by-row variant.
//!
//! Embeddings here use small integer components padded with zeros so the
//! cosine similarities are exact: against the query axis [1, 0, ...],
//! [1,1,1,1] scores exactly 0.5 and [1,1,1] scores 1/sqrt(3) ~ 0.577.

use roster_db::test_fixtures::{test_vector, TestDataBuilder, TestDatabase};
use roster_db::{Error, SimilarityTarget};

/// A candidate sitting exactly on the threshold is excluded; anything
/// strictly above comes back, most similar first.
#[tokio::test]
#[ignore] // Requires DATABASE_URL with migrated database
async fn threshold_is_strictly_exclusive() {
    let test_db = TestDatabase::new().await;
    let store = &test_db.store;

    let data = TestDataBuilder::new(store)
        .with_general_role("Exact Match", &[1.0])
        .await
        .with_general_role("Near Match", &[1.0, 1.0, 1.0])
        .await
        .with_general_role("Boundary Match", &[1.0, 1.0, 1.0, 1.0])
        .await
        .build();
    let exact_id = data.general_roles[0];
    let near_id = data.general_roles[1];
    let boundary_id = data.general_roles[2];

    let query = test_vector(&[1.0]);
    let matches = store
        .similarity
        .find_similar(SimilarityTarget::GeneralRole, &query, 0.5, 10)
        .await
        .expect("similarity query failed");

    let ids: Vec<_> = matches.iter().map(|m| m.id).collect();
    assert!(
        !ids.contains(&boundary_id),
        "similarity exactly at the threshold must be excluded"
    );
    assert_eq!(
        ids,
        vec![exact_id, near_id],
        "results must come back in descending similarity"
    );
    assert!((matches[0].similarity - 1.0).abs() < 1e-6);
    assert!(matches[1].similarity > 0.5 && matches[1].similarity < 0.6);

    // A slightly higher threshold still admits the 0.577 candidate.
    let matches = store
        .similarity
        .find_similar(SimilarityTarget::GeneralRole, &query, 0.51, 10)
        .await
        .expect("similarity query failed");
    assert!(matches.iter().any(|m| m.id == near_id));
    assert!(!matches.iter().any(|m| m.id == boundary_id));

    test_db.cleanup().await;
}

/// The limit caps the result set after ordering.
#[tokio::test]
#[ignore] // Requires DATABASE_URL with migrated database
async fn limit_caps_ordered_results() {
    let test_db = TestDatabase::new().await;
    let store = &test_db.store;

    let data = TestDataBuilder::new(store)
        .with_general_role("First", &[1.0])
        .await
        .with_general_role("Second", &[1.0, 1.0])
        .await
        .with_general_role("Third", &[1.0, 1.0, 1.0])
        .await
        .build();

    let query = test_vector(&[1.0]);
    let matches = store
        .similarity
        .find_similar(SimilarityTarget::GeneralRole, &query, 0.1, 1)
        .await
        .expect("similarity query failed");

    assert_eq!(matches.len(), 1);
    assert_eq!(matches[0].id, data.general_roles[0]);

    test_db.cleanup().await;
}

/// Rows that were never embedded can never be matched.
#[tokio::test]
#[ignore] // Requires DATABASE_URL with migrated database
async fn unembedded_rows_never_match() {
    let test_db = TestDatabase::new().await;
    let store = &test_db.store;

    let unembedded = store
        .reference
        .get_or_create_general_role("No Embedding", None, None)
        .await
        .expect("Failed to create general role");

    let query = test_vector(&[1.0]);
    let matches = store
        .similarity
        .find_similar(SimilarityTarget::GeneralRole, &query, 0.0, 10)
        .await
        .expect("similarity query failed");
    assert!(
        !matches.iter().any(|m| m.id == unembedded.id),
        "a row with NULL embedding must never appear"
    );

    test_db.cleanup().await;
}

/// The by-row variant reads the stored embedding and never returns the
/// seed row itself.
#[tokio::test]
#[ignore] // Requires DATABASE_URL with migrated database
async fn by_row_variant_excludes_the_seed_row() {
    let test_db = TestDatabase::new().await;
    let store = &test_db.store;

    let data = TestDataBuilder::new(store)
        .with_general_role("Seed", &[1.0])
        .await
        .with_general_role("Close", &[1.0, 1.0, 1.0])
        .await
        .with_general_role("Farther", &[1.0, 1.0, 1.0, 1.0])
        .await
        .build();
    let seed_id = data.general_roles[0];

    let matches = store
        .similarity
        .find_similar_to(SimilarityTarget::GeneralRole, seed_id, 0.1, 10)
        .await
        .expect("similarity query failed");

    assert!(
        !matches.iter().any(|m| m.id == seed_id),
        "the seed row must be excluded from its own neighbors"
    );
    assert_eq!(
        matches.iter().map(|m| m.id).collect::<Vec<_>>(),
        vec![data.general_roles[1], data.general_roles[2]],
    );

    test_db.cleanup().await;
}

/// Seeding from a missing row or an unembedded row is an error, not an
/// empty result.
#[tokio::test]
#[ignore] // Requires DATABASE_URL with migrated database
async fn by_row_variant_requires_an_embedding() {
    let test_db = TestDatabase::new().await;
    let store = &test_db.store;

    let unembedded = store
        .reference
        .get_or_create_general_role("No Embedding", None, None)
        .await
        .expect("Failed to create general role");

    let err = store
        .similarity
        .find_similar_to(SimilarityTarget::GeneralRole, unembedded.id, 0.5, 10)
        .await
        .expect_err("unembedded seed should fail");
    assert!(matches!(err, Error::NotFound(_)), "got {:?}", err);

    let err = store
        .similarity
        .find_similar_to(SimilarityTarget::GeneralRole, uuid::Uuid::new_v4(), 0.5, 10)
        .await
        .expect_err("missing seed should fail");
    assert!(matches!(err, Error::NotFound(_)), "got {:?}", err);

    test_db.cleanup().await;
}

/// The role table is queryable through the same interface, for
/// near-duplicate detection between company roles.
#[tokio::test]
#[ignore] // Requires DATABASE_URL with migrated database
async fn role_embeddings_are_searchable() {
    let test_db = TestDatabase::new().await;
    let store = &test_db.store;

    let data = TestDataBuilder::new(store)
        .with_company("Parks")
        .await
        .with_role("Park Ranger")
        .await
        .with_role("Senior Park Ranger")
        .await
        .build();

    store
        .roles
        .set_embedding(data.roles[0], &test_vector(&[1.0]))
        .await
        .expect("Failed to set embedding");
    store
        .roles
        .set_embedding(data.roles[1], &test_vector(&[1.0, 1.0, 1.0]))
        .await
        .expect("Failed to set embedding");

    let matches = store
        .similarity
        .find_similar_to(SimilarityTarget::Role, data.roles[0], 0.5, 10)
        .await
        .expect("similarity query failed");

    assert_eq!(matches.len(), 1);
    assert_eq!(matches[0].id, data.roles[1]);
    assert!(matches[0].similarity > 0.5);

    test_db.cleanup().await;
}
