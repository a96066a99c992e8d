//! Migration marker model.

use serde::Serialize;
use sqlx::FromRow;
use idmap_core::types::{DbId, Timestamp};

/// A row from the `migration_markers` table: the latest run label that
/// migrated a subject of a family.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct MigrationMarker {
    pub family: String,
    pub subject_id: DbId,
    pub run_label: String,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}
