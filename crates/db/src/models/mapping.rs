//! Row model shared by every `*_mappings` table.

use sqlx::FromRow;
use idmap_core::entity_kind::EntityKind;
use idmap_core::error::CoreError;
use idmap_core::mapping::{MappingRecord, NewMapping, SourceKey};
use idmap_core::types::{DbId, Timestamp};

/// A row from any mapping table.
///
/// Tables without a composite source key project `NULL` for the missing
/// columns, so one row type covers every kind.
#[derive(Debug, Clone, FromRow)]
pub struct MappingRow {
    pub source_id: DbId,
    pub source_seq: Option<i32>,
    pub source_discriminator: Option<String>,
    pub target_id: String,
    pub run_label: Option<String>,
    pub origin: String,
    pub created_at: Timestamp,
}

impl MappingRow {
    /// Convert into a domain record of `kind`.
    pub fn into_record(self, kind: EntityKind) -> Result<MappingRecord, CoreError> {
        let source_id = SourceKey::from_columns(
            kind.source_shape(),
            self.source_id,
            self.source_seq,
            self.source_discriminator,
        )?;
        let origin = self
            .origin
            .parse()
            .map_err(|_| CoreError::Internal(format!("Stored origin '{}' is invalid", self.origin)))?;

        Ok(MappingRecord {
            mapping: NewMapping {
                kind,
                source_id,
                target_id: self.target_id,
                run_label: self.run_label,
                origin,
            },
            created_at: self.created_at,
        })
    }
}
