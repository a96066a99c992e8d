//! Integration tests for multi-table writes: tree persistence, migration
//! re-runs, subject replacement, merges and the administrative reset.

use assert_matches::assert_matches;
use sqlx::PgPool;
use idmap_core::entity_kind::{EntityFamily, EntityKind};
use idmap_core::error::CoreError;
use idmap_core::mapping::{NewMapping, OriginKind, SourceKey};
use idmap_core::paging::{PageRequest, SortColumn, SortDirection, SortOrder};
use idmap_core::tree::{ChildList, CreateMappingTree, MappingTree, TreeNode};
use idmap_db::reconcile;
use idmap_db::repositories::{MappingRepo, MappingTreeRepo, MigrationMarkerRepo};
use idmap_db::MappingStoreError;

const RUN_LABEL: &str = "2023-01-01T12:45:12";

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn node(source_id: SourceKey, target: &str) -> TreeNode {
    TreeNode {
        source_id,
        target_id: target.to_string(),
    }
}

fn seq(parent_id: i64, sequence: i32) -> SourceKey {
    SourceKey::Sequenced {
        parent_id,
        sequence,
    }
}

/// Organization `org_id` with `addresses` address children and `phones`
/// phone children. Target ids are derived from `prefix`.
fn organization_tree(
    org_id: i64,
    prefix: &str,
    addresses: i32,
    phones: i32,
    run_label: Option<&str>,
) -> MappingTree {
    let request = CreateMappingTree {
        parent: node(SourceKey::Simple(org_id), &format!("{prefix}-org")),
        children: vec![
            ChildList {
                kind: EntityKind::OrganizationAddress,
                records: (1..=addresses)
                    .map(|i| node(seq(org_id, i), &format!("{prefix}-ad-{i}")))
                    .collect(),
            },
            ChildList {
                kind: EntityKind::OrganizationPhone,
                records: (1..=phones)
                    .map(|i| node(seq(org_id, i), &format!("{prefix}-ph-{i}")))
                    .collect(),
            },
        ],
        run_label: run_label.map(str::to_string),
        origin: None,
    };
    request.into_tree(EntityFamily::Organization).unwrap()
}

fn movement_tree(movement_id: i64, prefix: &str) -> MappingTree {
    let request = CreateMappingTree {
        parent: node(SourceKey::Simple(movement_id), &format!("{prefix}-mv")),
        children: vec![ChildList {
            kind: EntityKind::ScheduledEvent,
            records: vec![node(seq(movement_id, 1), &format!("{prefix}-ev-1"))],
        }],
        run_label: Some(RUN_LABEL.into()),
        origin: None,
    };
    request.into_tree(EntityFamily::Movement).unwrap()
}

async fn count_family(pool: &PgPool, family: EntityFamily) -> i64 {
    let mut total = 0;
    for kind in family.kinds() {
        total += MappingRepo::count_all(pool, kind).await.unwrap();
    }
    total
}

fn replacement(kind: EntityKind, source_id: SourceKey, target: &str) -> NewMapping {
    NewMapping {
        kind,
        source_id,
        target_id: target.to_string(),
        run_label: None,
        origin: OriginKind::SourceSystemCreated,
    }
}

// ---------------------------------------------------------------------------
// Tree persistence
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_tree_with_two_addresses_and_three_phones(pool: PgPool) {
    let tree = organization_tree(100, "t", 2, 3, Some(RUN_LABEL));

    let inserted = MappingTreeRepo::create(&pool, &tree).await.unwrap();
    assert_eq!(inserted, 6);

    let labelled = MappingRepo::count_by_label(&pool, EntityKind::Organization, RUN_LABEL)
        .await
        .unwrap()
        + MappingRepo::count_by_label(&pool, EntityKind::OrganizationAddress, RUN_LABEL)
            .await
            .unwrap()
        + MappingRepo::count_by_label(&pool, EntityKind::OrganizationPhone, RUN_LABEL)
            .await
            .unwrap();
    assert_eq!(labelled, 6);

    let deleted = MappingTreeRepo::delete_everything(&pool).await.unwrap();
    assert_eq!(deleted, 6);
    for kind in EntityFamily::Organization.kinds() {
        assert_eq!(MappingRepo::count_all(&pool, kind).await.unwrap(), 0, "{kind}");
    }
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_tree_is_atomic_when_last_child_collides(pool: PgPool) {
    let mut tree = organization_tree(100, "t", 2, 2, Some(RUN_LABEL));
    // Last phone reuses the first phone's target id.
    let (_, phones) = tree
        .children
        .iter_mut()
        .find(|(kind, _)| *kind == EntityKind::OrganizationPhone)
        .unwrap();
    phones[1].target_id = phones[0].target_id.clone();
    let offending = phones[1].clone();

    let err = MappingTreeRepo::create(&pool, &tree).await.unwrap_err();
    assert_matches!(
        err,
        MappingStoreError::UniqueViolation { ref attempted, .. } => {
            assert_eq!(**attempted, offending);
        }
    );

    assert_eq!(count_family(&pool, EntityFamily::Organization).await, 0);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_tree_child_conflict_with_stored_record_is_reconciled(pool: PgPool) {
    MappingRepo::insert(
        &pool,
        &replacement(EntityKind::OrganizationPhone, seq(100, 2), "stored-ph"),
    )
    .await
    .unwrap();

    let tree = organization_tree(100, "t", 1, 2, Some(RUN_LABEL));
    let err = MappingTreeRepo::create(&pool, &tree).await.unwrap_err();
    let (attempted, constraint) = assert_matches!(
        err,
        MappingStoreError::UniqueViolation { attempted, constraint } => (attempted, constraint)
    );
    assert_eq!(attempted.kind, EntityKind::OrganizationPhone);
    assert_eq!(attempted.source_id, seq(100, 2));

    let report = reconcile::resolve_conflict(&pool, *attempted, constraint.as_deref()).await;
    assert_eq!(report.existing().target_id, "stored-ph");

    // Only the pre-existing phone survives.
    assert_eq!(count_family(&pool, EntityFamily::Organization).await, 1);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_tree_without_children_stores_parent_only(pool: PgPool) {
    let tree = organization_tree(5, "solo", 0, 0, None);
    let inserted = MappingTreeRepo::create(&pool, &tree).await.unwrap();
    assert_eq!(inserted, 1);
    assert_eq!(count_family(&pool, EntityFamily::Organization).await, 1);
}

// ---------------------------------------------------------------------------
// Migration re-runs
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_organization_remigration_keeps_only_latest_set(pool: PgPool) {
    let first = organization_tree(100, "first", 2, 3, Some("run-1"));
    let outcome = MappingTreeRepo::migrate(&pool, &first).await.unwrap();
    assert_eq!(outcome.purged, 0);
    assert_eq!(outcome.inserted, 6);
    assert_eq!(outcome.marker.run_label, "run-1");

    let second = organization_tree(100, "second", 1, 1, Some("run-2"));
    let outcome = MappingTreeRepo::migrate(&pool, &second).await.unwrap();
    assert_eq!(outcome.purged, 6);
    assert_eq!(outcome.inserted, 3);

    assert_eq!(count_family(&pool, EntityFamily::Organization).await, 3);
    let stale = MappingRepo::find_by_target(&pool, EntityKind::OrganizationPhone, "first-ph-3")
        .await
        .unwrap();
    assert!(stale.is_none());

    let marker = MigrationMarkerRepo::find(&pool, EntityFamily::Organization, 100)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(marker.run_label, "run-2");
    assert!(marker.updated_at >= marker.created_at);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_remigration_leaves_other_subjects_untouched(pool: PgPool) {
    MappingTreeRepo::migrate(&pool, &organization_tree(1, "one", 1, 1, Some("run-1")))
        .await
        .unwrap();
    MappingTreeRepo::migrate(&pool, &organization_tree(2, "two", 1, 1, Some("run-1")))
        .await
        .unwrap();

    MappingTreeRepo::migrate(&pool, &organization_tree(1, "uno", 0, 0, Some("run-2")))
        .await
        .unwrap();

    assert_eq!(count_family(&pool, EntityFamily::Organization).await, 4);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_movement_remigration_is_rejected(pool: PgPool) {
    MappingTreeRepo::migrate(&pool, &movement_tree(9, "a"))
        .await
        .unwrap();

    let result = MappingTreeRepo::migrate(&pool, &movement_tree(9, "b")).await;
    assert_matches!(result, Err(MappingStoreError::UniqueViolation { .. }));

    // The rejected run left the first run's rows in place.
    assert_eq!(count_family(&pool, EntityFamily::Movement).await, 2);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_migration_requires_run_label(pool: PgPool) {
    let tree = organization_tree(1, "x", 0, 0, None);
    let result = MappingTreeRepo::migrate(&pool, &tree).await;
    assert_matches!(
        result,
        Err(MappingStoreError::Domain(CoreError::Validation(_)))
    );
}

// ---------------------------------------------------------------------------
// Replacement and merge
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_replace_swaps_subject_mappings(pool: PgPool) {
    MappingTreeRepo::create(&pool, &organization_tree(100, "old", 2, 2, None))
        .await
        .unwrap();

    let records = vec![
        replacement(EntityKind::Organization, SourceKey::Simple(100), "new-org"),
        replacement(EntityKind::OrganizationEmail, seq(100, 1), "new-em-1"),
    ];
    let outcome = MappingTreeRepo::replace(&pool, EntityFamily::Organization, 100, &records)
        .await
        .unwrap();
    assert_eq!(outcome.deleted, 5);
    assert_eq!(outcome.inserted, 2);

    assert_eq!(count_family(&pool, EntityFamily::Organization).await, 2);
    assert_eq!(
        MappingRepo::count_all(&pool, EntityKind::OrganizationEmail)
            .await
            .unwrap(),
        1
    );
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_replace_subject_without_mappings_is_not_an_error(pool: PgPool) {
    let records = vec![replacement(
        EntityKind::Organization,
        SourceKey::Simple(77),
        "fresh",
    )];
    let outcome = MappingTreeRepo::replace(&pool, EntityFamily::Organization, 77, &records)
        .await
        .unwrap();
    assert_eq!(outcome.deleted, 0);
    assert_eq!(outcome.inserted, 1);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_merge_clears_removed_subject(pool: PgPool) {
    MappingTreeRepo::migrate(&pool, &organization_tree(1, "a", 1, 1, Some("run-1")))
        .await
        .unwrap();
    MappingTreeRepo::migrate(&pool, &organization_tree(2, "b", 2, 0, Some("run-1")))
        .await
        .unwrap();

    let records = vec![
        replacement(EntityKind::Organization, SourceKey::Simple(1), "a-org"),
        replacement(EntityKind::OrganizationAddress, seq(1, 1), "b-ad-1"),
        replacement(EntityKind::OrganizationAddress, seq(1, 2), "b-ad-2"),
    ];
    let outcome =
        MappingTreeRepo::replace_after_merge(&pool, EntityFamily::Organization, 1, 2, &records)
            .await
            .unwrap();
    assert_eq!(outcome.deleted, 6);
    assert_eq!(outcome.inserted, 3);

    for kind in EntityFamily::Organization.kinds() {
        let deleted = MappingRepo::delete_by_subject(&pool, kind, 2).await.unwrap();
        assert_eq!(deleted, 0, "{kind} still has rows for the removed subject");
    }
    assert_eq!(count_family(&pool, EntityFamily::Organization).await, 3);

    let removed_marker = MigrationMarkerRepo::find(&pool, EntityFamily::Organization, 2)
        .await
        .unwrap();
    assert!(removed_marker.is_none());
    let kept_marker = MigrationMarkerRepo::find(&pool, EntityFamily::Organization, 1)
        .await
        .unwrap();
    assert!(kept_marker.is_some());
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_replace_rolls_back_on_collision(pool: PgPool) {
    MappingTreeRepo::create(&pool, &organization_tree(100, "old", 1, 0, None))
        .await
        .unwrap();

    let records = vec![
        replacement(EntityKind::Organization, SourceKey::Simple(100), "dup"),
        replacement(EntityKind::OrganizationAddress, seq(100, 1), "dup-ad"),
        replacement(EntityKind::OrganizationAddress, seq(100, 2), "dup-ad"),
    ];
    let result = MappingTreeRepo::replace(&pool, EntityFamily::Organization, 100, &records).await;
    assert_matches!(result, Err(MappingStoreError::UniqueViolation { .. }));

    // Deletes were rolled back together with the inserts.
    let original = MappingRepo::find_by_target(&pool, EntityKind::Organization, "old-org")
        .await
        .unwrap();
    assert!(original.is_some());
    assert_eq!(count_family(&pool, EntityFamily::Organization).await, 2);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_replace_rejects_records_from_other_family(pool: PgPool) {
    let records = vec![replacement(EntityKind::Movement, SourceKey::Simple(1), "m")];
    let result = MappingTreeRepo::replace(&pool, EntityFamily::Organization, 1, &records).await;
    assert_matches!(
        result,
        Err(MappingStoreError::Domain(CoreError::Validation(_)))
    );
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_replace_rejects_records_keyed_to_another_subject(pool: PgPool) {
    MappingTreeRepo::create(&pool, &organization_tree(100, "old", 1, 1, None))
        .await
        .unwrap();

    let records = vec![
        replacement(EntityKind::Organization, SourceKey::Simple(100), "new-org"),
        replacement(EntityKind::OrganizationPhone, seq(7, 1), "stray-ph"),
    ];
    let result = MappingTreeRepo::replace(&pool, EntityFamily::Organization, 100, &records).await;
    assert_matches!(
        result,
        Err(MappingStoreError::Domain(CoreError::Validation(_)))
    );

    // Nothing was deleted or inserted.
    assert_eq!(count_family(&pool, EntityFamily::Organization).await, 3);
    let stray = MappingRepo::find_by_target(&pool, EntityKind::OrganizationPhone, "stray-ph")
        .await
        .unwrap();
    assert!(stray.is_none());
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_merge_rejects_records_keyed_to_removed_subject(pool: PgPool) {
    MappingTreeRepo::migrate(&pool, &organization_tree(1, "a", 0, 0, Some("run-1")))
        .await
        .unwrap();
    MappingTreeRepo::migrate(&pool, &organization_tree(2, "b", 0, 0, Some("run-1")))
        .await
        .unwrap();

    let records = vec![replacement(
        EntityKind::Organization,
        SourceKey::Simple(2),
        "b",
    )];
    let result =
        MappingTreeRepo::replace_after_merge(&pool, EntityFamily::Organization, 1, 2, &records)
            .await;
    assert_matches!(
        result,
        Err(MappingStoreError::Domain(CoreError::Validation(_)))
    );

    // Both subjects and their markers are untouched.
    for (subject, target) in [(1, "a-org"), (2, "b-org")] {
        let stored = MappingRepo::find_by_source(
            &pool,
            EntityKind::Organization,
            &SourceKey::Simple(subject),
        )
        .await
        .unwrap()
        .unwrap();
        assert_eq!(stored.target_id(), target);
        let marker = MigrationMarkerRepo::find(&pool, EntityFamily::Organization, subject)
            .await
            .unwrap();
        assert!(marker.is_some());
    }
}

// ---------------------------------------------------------------------------
// Paged migration query
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_page_by_run_label(pool: PgPool) {
    for i in 1..=6 {
        let mut mapping = replacement(
            EntityKind::Organization,
            SourceKey::Simple(i),
            &format!("org-{i}"),
        );
        mapping.run_label = Some(RUN_LABEL.into());
        MappingRepo::insert(&pool, &mapping).await.unwrap();
    }
    MappingRepo::insert(
        &pool,
        &replacement(EntityKind::Organization, SourceKey::Simple(99), "unlabelled"),
    )
    .await
    .unwrap();

    let request = PageRequest::new(0, 2);
    let page = MappingRepo::page_by_run_label(&pool, EntityKind::Organization, RUN_LABEL, &request)
        .await
        .unwrap();
    assert_eq!(page.total_elements, 6);
    assert_eq!(page.number_of_elements, 2);
    assert_eq!(page.total_pages, 3);

    // Ties on the label are broken by target id, so pages do not overlap.
    let mut seen: Vec<String> = Vec::new();
    for number in 0..3 {
        let request = PageRequest::new(number, 2);
        let page =
            MappingRepo::page_by_run_label(&pool, EntityKind::Organization, RUN_LABEL, &request)
                .await
                .unwrap();
        seen.extend(page.content.iter().map(|r| r.target_id().to_string()));
    }
    let expected: Vec<String> = (1..=6).map(|i| format!("org-{i}")).collect();
    assert_eq!(seen, expected);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_page_sorted_by_target_descending(pool: PgPool) {
    for i in 1..=3 {
        let mut mapping = replacement(
            EntityKind::Movement,
            SourceKey::Simple(i),
            &format!("mv-{i}"),
        );
        mapping.run_label = Some(RUN_LABEL.into());
        MappingRepo::insert(&pool, &mapping).await.unwrap();
    }

    let mut request = PageRequest::new(0, 10);
    request.sort = SortOrder {
        column: SortColumn::TargetId,
        direction: SortDirection::Desc,
    };
    let page = MappingRepo::page_by_run_label(&pool, EntityKind::Movement, RUN_LABEL, &request)
        .await
        .unwrap();
    let targets: Vec<_> = page.content.iter().map(|r| r.target_id()).collect();
    assert_eq!(targets, vec!["mv-3", "mv-2", "mv-1"]);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_page_past_the_end_is_empty(pool: PgPool) {
    let request = PageRequest::new(5, 20);
    let page = MappingRepo::page_by_run_label(&pool, EntityKind::Organization, "none", &request)
        .await
        .unwrap();
    assert!(page.content.is_empty());
    assert_eq!(page.total_elements, 0);
    assert_eq!(page.total_pages, 0);
}
