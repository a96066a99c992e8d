//! Repository for the `migration_markers` table.

use sqlx::PgExecutor;
use idmap_core::entity_kind::EntityFamily;
use idmap_core::types::DbId;

use crate::models::migration_marker::MigrationMarker;

/// Column list for migration_markers queries.
const COLUMNS: &str = "family, subject_id, run_label, created_at, updated_at";

/// Tracks the latest migration run that touched each subject.
pub struct MigrationMarkerRepo;

impl MigrationMarkerRepo {
    /// Record `run_label` as the latest migration of the subject, replacing
    /// any earlier label.
    pub async fn upsert<'e, E>(
        executor: E,
        family: EntityFamily,
        subject_id: DbId,
        run_label: &str,
    ) -> Result<MigrationMarker, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let query = format!(
            "INSERT INTO migration_markers (family, subject_id, run_label)
             VALUES ($1, $2, $3)
             ON CONFLICT (family, subject_id)
             DO UPDATE SET run_label = EXCLUDED.run_label, updated_at = now()
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, MigrationMarker>(&query)
            .bind(family.as_str())
            .bind(subject_id)
            .bind(run_label)
            .fetch_one(executor)
            .await
    }

    /// Find the marker of a subject.
    pub async fn find<'e, E>(
        executor: E,
        family: EntityFamily,
        subject_id: DbId,
    ) -> Result<Option<MigrationMarker>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let query = format!(
            "SELECT {COLUMNS} FROM migration_markers WHERE family = $1 AND subject_id = $2"
        );
        sqlx::query_as::<_, MigrationMarker>(&query)
            .bind(family.as_str())
            .bind(subject_id)
            .fetch_optional(executor)
            .await
    }

    /// Remove the marker of a subject. Returns `true` if a row was deleted.
    pub async fn delete<'e, E>(
        executor: E,
        family: EntityFamily,
        subject_id: DbId,
    ) -> Result<bool, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let result =
            sqlx::query("DELETE FROM migration_markers WHERE family = $1 AND subject_id = $2")
                .bind(family.as_str())
                .bind(subject_id)
                .execute(executor)
                .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Remove every marker.
    pub async fn delete_all<'e, E>(executor: E) -> Result<u64, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let result = sqlx::query("DELETE FROM migration_markers")
            .execute(executor)
            .await?;
        Ok(result.rows_affected())
    }
}
