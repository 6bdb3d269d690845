//! Get-or-create resolution behavior: normalized dedup keys, attribute
//! immutability on conflict, and race settlement.

use roster_db::test_fixtures::TestDatabase;
use roster_db::Error;

/// Resolving the same company name twice returns the same id and leaves
/// exactly one row behind.
#[tokio::test]
#[ignore] // Requires DATABASE_URL with migrated database
async fn get_or_create_is_idempotent() {
    dotenvy::dotenv().ok();
    let test_db = TestDatabase::new().await;
    let store = &test_db.store;

    let institution = store
        .orgs
        .get_or_create_institution("Department of State Growth")
        .await
        .expect("Failed to create institution");
    assert!(!institution.existing);

    let first = store
        .orgs
        .get_or_create_company(institution.id, "Parks and Wildlife")
        .await
        .expect("Failed to create company");
    let second = store
        .orgs
        .get_or_create_company(institution.id, "Parks and Wildlife")
        .await
        .expect("Failed to resolve company again");

    assert!(!first.existing, "first call should have created the row");
    assert!(second.existing, "second call should have found the row");
    assert_eq!(first.id, second.id);

    let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM company")
        .fetch_one(&test_db.pool)
        .await
        .expect("Failed to count companies");
    assert_eq!(count, 1, "expected exactly one company row");

    test_db.cleanup().await;
}

/// Dedup keys are case-folded and whitespace-collapsed, so cosmetic
/// variants of a name resolve to the same row.
#[tokio::test]
#[ignore] // Requires DATABASE_URL with migrated database
async fn normalization_collapses_case_and_whitespace() {
    let test_db = TestDatabase::new().await;
    let store = &test_db.store;

    let institution = store
        .orgs
        .get_or_create_institution("Test Institution")
        .await
        .expect("Failed to create institution");

    let canonical = store
        .orgs
        .get_or_create_company(institution.id, "Parks and Wildlife")
        .await
        .expect("Failed to create company");
    let shouty = store
        .orgs
        .get_or_create_company(institution.id, "  PARKS   AND  WILDLIFE ")
        .await
        .expect("Failed to resolve shouty variant");

    assert_eq!(canonical.id, shouty.id);
    assert!(shouty.existing);

    // Stored display name keeps the first writer's casing.
    let company = store
        .orgs
        .get_company(canonical.id)
        .await
        .expect("Failed to fetch company")
        .expect("Company should exist");
    assert_eq!(company.name, "Parks and Wildlife");

    test_db.cleanup().await;
}

/// Names that normalize to nothing are rejected before any SQL runs.
#[tokio::test]
#[ignore] // Requires DATABASE_URL with migrated database
async fn blank_names_are_rejected() {
    let test_db = TestDatabase::new().await;
    let store = &test_db.store;

    let err = store
        .orgs
        .get_or_create_institution("   ")
        .await
        .expect_err("blank institution name should fail");
    assert!(matches!(err, Error::Validation(_)), "got {:?}", err);

    let institution = store
        .orgs
        .get_or_create_institution("Test Institution")
        .await
        .expect("Failed to create institution");
    let err = store
        .orgs
        .get_or_create_company(institution.id, "\t\n")
        .await
        .expect_err("blank company name should fail");
    assert!(matches!(err, Error::Validation(_)), "got {:?}", err);

    test_db.cleanup().await;
}

/// Two concurrent creations of the same company settle on a single row,
/// whichever caller wins the insert.
#[tokio::test]
#[ignore] // Requires DATABASE_URL with migrated database
async fn concurrent_creation_settles_on_one_row() {
    let test_db = TestDatabase::new().await;
    let store = &test_db.store;

    let institution = store
        .orgs
        .get_or_create_institution("Test Institution")
        .await
        .expect("Failed to create institution");

    let (left, right) = tokio::join!(
        store.orgs.get_or_create_company(institution.id, "Fire Service"),
        store.orgs.get_or_create_company(institution.id, "Fire Service"),
    );
    let left = left.expect("left resolution failed");
    let right = right.expect("right resolution failed");

    assert_eq!(
        left.id, right.id,
        "both callers should settle on the same row"
    );

    let (count,): (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM company WHERE slug = 'fire-service'")
            .fetch_one(&test_db.pool)
            .await
            .expect("Failed to count companies");
    assert_eq!(count, 1);

    test_db.cleanup().await;
}

/// Division names dedup within their company, not globally.
#[tokio::test]
#[ignore] // Requires DATABASE_URL with migrated database
async fn divisions_scope_to_their_company() {
    let test_db = TestDatabase::new().await;
    let store = &test_db.store;

    let institution = store
        .orgs
        .get_or_create_institution("Test Institution")
        .await
        .expect("Failed to create institution");
    let parks = store
        .orgs
        .get_or_create_company(institution.id, "Parks")
        .await
        .expect("Failed to create company");
    let water = store
        .orgs
        .get_or_create_company(institution.id, "Water")
        .await
        .expect("Failed to create company");

    let parks_ops = store
        .orgs
        .get_or_create_division(parks.id, "Operations")
        .await
        .expect("Failed to create division");
    let water_ops = store
        .orgs
        .get_or_create_division(water.id, "Operations")
        .await
        .expect("Failed to create division");
    let parks_ops_again = store
        .orgs
        .get_or_create_division(parks.id, "operations")
        .await
        .expect("Failed to resolve division");

    assert_ne!(
        parks_ops.id, water_ops.id,
        "same name under different companies must be distinct rows"
    );
    assert_eq!(parks_ops.id, parks_ops_again.id);

    test_db.cleanup().await;
}

/// Role dedup key is the normalized title scoped to the company.
#[tokio::test]
#[ignore] // Requires DATABASE_URL with migrated database
async fn roles_dedup_on_normalized_title_within_company() {
    let test_db = TestDatabase::new().await;
    let store = &test_db.store;

    let institution = store
        .orgs
        .get_or_create_institution("Test Institution")
        .await
        .expect("Failed to create institution");
    let company = store
        .orgs
        .get_or_create_company(institution.id, "Parks")
        .await
        .expect("Failed to create company");
    let other = store
        .orgs
        .get_or_create_company(institution.id, "Water")
        .await
        .expect("Failed to create company");

    let ranger = store
        .roles
        .get_or_create_role(company.id, None, "Park Ranger", Some("Looks after parks"))
        .await
        .expect("Failed to create role");
    let ranger_again = store
        .roles
        .get_or_create_role(company.id, None, "  park   RANGER ", None)
        .await
        .expect("Failed to resolve role");
    let other_ranger = store
        .roles
        .get_or_create_role(other.id, None, "Park Ranger", None)
        .await
        .expect("Failed to create role in other company");

    assert_eq!(ranger.id, ranger_again.id);
    assert!(ranger_again.existing);
    assert_ne!(ranger.id, other_ranger.id);

    test_db.cleanup().await;
}

/// An existing row keeps its attributes; later candidates with the same
/// key never overwrite them.
#[tokio::test]
#[ignore] // Requires DATABASE_URL with migrated database
async fn existing_attributes_are_not_overwritten() {
    let test_db = TestDatabase::new().await;
    let store = &test_db.store;

    let institution = store
        .orgs
        .get_or_create_institution("Test Institution")
        .await
        .expect("Failed to create institution");
    let company = store
        .orgs
        .get_or_create_company(institution.id, "Parks")
        .await
        .expect("Failed to create company");

    let skill = store
        .reference
        .get_or_create_skill(company.id, "Chainsaw Operation", Some("Tree felling"), Some("field"))
        .await
        .expect("Failed to create skill");
    let again = store
        .reference
        .get_or_create_skill(company.id, "chainsaw operation", Some("Different text"), None)
        .await
        .expect("Failed to resolve skill");

    assert_eq!(skill.id, again.id);

    let (description, category): (Option<String>, Option<String>) =
        sqlx::query_as("SELECT description, category FROM skill WHERE id = $1")
            .bind(skill.id)
            .fetch_one(&test_db.pool)
            .await
            .expect("Failed to fetch skill");
    assert_eq!(description.as_deref(), Some("Tree felling"));
    assert_eq!(category.as_deref(), Some("field"));

    test_db.cleanup().await;
}

/// Capability level descriptions are replaceable, one row per
/// (capability, level) pair.
#[tokio::test]
#[ignore] // Requires DATABASE_URL with migrated database
async fn capability_levels_upsert_in_place() {
    let test_db = TestDatabase::new().await;
    let store = &test_db.store;

    let institution = store
        .orgs
        .get_or_create_institution("Test Institution")
        .await
        .expect("Failed to create institution");
    let company = store
        .orgs
        .get_or_create_company(institution.id, "Parks")
        .await
        .expect("Failed to create company");
    let capability = store
        .reference
        .get_or_create_capability(company.id, "Leadership", None)
        .await
        .expect("Failed to create capability");

    let first = store
        .reference
        .upsert_capability_level(capability.id, "intermediate", Some("Leads small teams"))
        .await
        .expect("Failed to create level");
    let second = store
        .reference
        .upsert_capability_level(capability.id, "intermediate", Some("Leads a work area"))
        .await
        .expect("Failed to update level");

    assert_eq!(first, second, "upsert should reuse the same row");

    let (count,): (i64,) = sqlx::query_as(
        "SELECT COUNT(*) FROM capability_level WHERE capability_id = $1 AND level = 'intermediate'",
    )
    .bind(capability.id)
    .fetch_one(&test_db.pool)
    .await
    .expect("Failed to count levels");
    assert_eq!(count, 1);

    let (description,): (Option<String>,) = sqlx::query_as(
        "SELECT description FROM capability_level WHERE capability_id = $1 AND level = 'intermediate'",
    )
    .bind(capability.id)
    .fetch_one(&test_db.pool)
    .await
    .expect("Failed to fetch level");
    assert_eq!(description.as_deref(), Some("Leads a work area"));

    test_db.cleanup().await;
}

/// General roles dedup globally on normalized title.
#[tokio::test]
#[ignore] // Requires DATABASE_URL with migrated database
async fn general_roles_dedup_globally() {
    let test_db = TestDatabase::new().await;
    let store = &test_db.store;

    let first = store
        .reference
        .get_or_create_general_role("Software Engineer", Some("Builds software"), None)
        .await
        .expect("Failed to create general role");
    let second = store
        .reference
        .get_or_create_general_role("  software   engineer ", None, None)
        .await
        .expect("Failed to resolve general role");

    assert_eq!(first.id, second.id);
    assert!(second.existing);

    test_db.cleanup().await;
}
