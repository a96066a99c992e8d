//! Transactional multi-table writes: tree persistence, migration re-runs,
//! subject replacement and the administrative reset.
//!
//! Every public operation opens one transaction and commits only once every
//! statement has succeeded. An early return drops the transaction, which
//! rolls back all inserts and deletes made during the call.

use serde::Serialize;
use sqlx::{PgPool, Postgres, Transaction};
use idmap_core::entity_kind::{EntityFamily, EntityKind, PurgePolicy};
use idmap_core::error::CoreError;
use idmap_core::mapping::NewMapping;
use idmap_core::tree::MappingTree;
use idmap_core::types::DbId;

use crate::error::MappingStoreError;
use crate::models::migration_marker::MigrationMarker;
use crate::repositories::{MappingRepo, MigrationMarkerRepo};

/// Result of a migration-variant tree write.
#[derive(Debug, Clone, Serialize)]
pub struct MigrationOutcome {
    pub purged: u64,
    pub inserted: usize,
    pub marker: MigrationMarker,
}

/// Result of a replacement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ReplacementOutcome {
    pub deleted: u64,
    pub inserted: usize,
}

/// Coordinates writes that span several mapping tables.
pub struct MappingTreeRepo;

impl MappingTreeRepo {
    /// Persist a parent mapping and all of its child lists atomically.
    ///
    /// The parent is inserted first, then each child kind in family order.
    /// A unique violation on any record rolls back the whole tree and is
    /// returned with that record attached.
    pub async fn create(pool: &PgPool, tree: &MappingTree) -> Result<usize, MappingStoreError> {
        let mut tx = pool.begin().await?;
        let inserted = Self::insert_tree_inner(&mut tx, tree).await?;
        tx.commit().await?;

        tracing::debug!(
            family = %tree.family,
            subject_id = tree.subject_id(),
            inserted,
            "Mapping tree persisted"
        );
        Ok(inserted)
    }

    /// Migration variant of [`Self::create`].
    ///
    /// Purges the subject's existing mappings according to the family's
    /// purge policy, inserts the tree and records the migration marker, all
    /// in one transaction. Re-running with a different child set therefore
    /// leaves only the latest set for families that purge per subject.
    pub async fn migrate(
        pool: &PgPool,
        tree: &MappingTree,
    ) -> Result<MigrationOutcome, MappingStoreError> {
        let run_label = tree.run_label().ok_or_else(|| {
            CoreError::Validation("A migration run requires a run label".into())
        })?;
        let subject_id = tree.subject_id();

        let mut tx = pool.begin().await?;

        let purged = match tree.family.purge_policy() {
            PurgePolicy::PerSubject => {
                Self::delete_subject_inner(&mut tx, tree.family, subject_id).await?
            }
            PurgePolicy::None => 0,
        };
        let inserted = Self::insert_tree_inner(&mut tx, tree).await?;
        let marker =
            MigrationMarkerRepo::upsert(&mut *tx, tree.family, subject_id, run_label).await?;

        tx.commit().await?;

        tracing::debug!(
            family = %tree.family,
            subject_id,
            run_label,
            purged,
            inserted,
            "Mapping tree migrated"
        );
        Ok(MigrationOutcome {
            purged,
            inserted,
            marker,
        })
    }

    /// Replace every mapping of `subject_id` across the family with `records`.
    ///
    /// Every record must belong to the family and be keyed to `subject_id`.
    /// Deleting zero rows is not an error.
    pub async fn replace(
        pool: &PgPool,
        family: EntityFamily,
        subject_id: DbId,
        records: &[NewMapping],
    ) -> Result<ReplacementOutcome, MappingStoreError> {
        Self::replace_subjects(pool, family, subject_id, None, records).await
    }

    /// Merge variant of [`Self::replace`]: clears both subjects, then inserts
    /// `records`, which must all be keyed to the retained subject. The removed
    /// subject's migration marker is dropped as well.
    pub async fn replace_after_merge(
        pool: &PgPool,
        family: EntityFamily,
        retained_subject_id: DbId,
        removed_subject_id: DbId,
        records: &[NewMapping],
    ) -> Result<ReplacementOutcome, MappingStoreError> {
        Self::replace_subjects(
            pool,
            family,
            retained_subject_id,
            Some(removed_subject_id),
            records,
        )
        .await
    }

    /// Delete every mapping of every kind and every migration marker.
    pub async fn delete_everything(pool: &PgPool) -> Result<u64, MappingStoreError> {
        let mut tx = pool.begin().await?;
        let mut deleted = 0;
        for kind in EntityKind::ALL {
            deleted += MappingRepo::delete_all(&mut *tx, kind).await?;
        }
        MigrationMarkerRepo::delete_all(&mut *tx).await?;
        tx.commit().await?;
        Ok(deleted)
    }

    // -----------------------------------------------------------------------
    // Inner helpers (run inside the caller's transaction)
    // -----------------------------------------------------------------------

    async fn replace_subjects(
        pool: &PgPool,
        family: EntityFamily,
        retained_subject_id: DbId,
        removed_subject_id: Option<DbId>,
        records: &[NewMapping],
    ) -> Result<ReplacementOutcome, MappingStoreError> {
        for record in records {
            if !family.contains(record.kind) {
                return Err(CoreError::Validation(format!(
                    "{} does not belong to the {family} family",
                    record.kind
                ))
                .into());
            }
            if record.source_id.subject_id() != retained_subject_id {
                return Err(CoreError::Validation(format!(
                    "{} {} does not belong to subject {retained_subject_id}",
                    record.kind, record.source_id
                ))
                .into());
            }
        }

        let mut tx = pool.begin().await?;

        let mut deleted =
            Self::delete_subject_inner(&mut tx, family, retained_subject_id).await?;
        if let Some(removed) = removed_subject_id {
            deleted += Self::delete_subject_inner(&mut tx, family, removed).await?;
            MigrationMarkerRepo::delete(&mut *tx, family, removed).await?;
        }
        for record in records {
            MappingRepo::insert(&mut *tx, record).await?;
        }

        tx.commit().await?;

        tracing::debug!(
            %family,
            retained_subject_id,
            ?removed_subject_id,
            deleted,
            inserted = records.len(),
            "Mapping set replaced"
        );
        Ok(ReplacementOutcome {
            deleted,
            inserted: records.len(),
        })
    }

    async fn insert_tree_inner(
        tx: &mut Transaction<'_, Postgres>,
        tree: &MappingTree,
    ) -> Result<usize, MappingStoreError> {
        let mut inserted = 0;
        for record in tree.records() {
            MappingRepo::insert(&mut **tx, record).await?;
            inserted += 1;
        }
        Ok(inserted)
    }

    async fn delete_subject_inner(
        tx: &mut Transaction<'_, Postgres>,
        family: EntityFamily,
        subject_id: DbId,
    ) -> Result<u64, MappingStoreError> {
        let mut deleted = 0;
        for kind in family.kinds() {
            deleted += MappingRepo::delete_by_subject(&mut **tx, kind, subject_id).await?;
        }
        Ok(deleted)
    }
}
