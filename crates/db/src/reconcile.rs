//! Conflict reconciliation for rejected writes.
//!
//! When the store rejects a write with a unique violation we still need to
//! tell the caller which record it collided with. PostgreSQL names the
//! violated constraint, and the constraint tells which id collided: the
//! lookup goes to that side only. An in-place target update would otherwise
//! find itself through its own source id. Without a recognisable constraint
//! the lookup probes source id first, then target id. If nothing is found
//! (the colliding row was rolled back with the rest of its batch, or was
//! deleted in the meantime) the report is returned degraded rather than
//! failing.

use sqlx::PgPool;
use idmap_core::conflict::{ConflictReport, SimilarMapping};
use idmap_core::entity_kind::{EntityKind, PrimaryKey};
use idmap_core::mapping::NewMapping;

use crate::error::MappingStoreError;
use crate::repositories::MappingRepo;

/// Which id of a mapping a unique constraint covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeySide {
    Source,
    Target,
}

impl KeySide {
    /// Map a constraint name of `kind`'s table onto the id it guards.
    ///
    /// Tables carry `pk_<table>` on their primary-key side and
    /// `uq_<table>_source` / `uq_<table>_target` on the other.
    pub fn from_constraint(kind: EntityKind, constraint: &str) -> Option<Self> {
        let table = kind.table();
        if constraint == format!("pk_{table}") {
            return Some(match kind.primary_key() {
                PrimaryKey::TargetId => KeySide::Target,
                PrimaryKey::SourceId => KeySide::Source,
            });
        }
        match constraint.strip_prefix("uq_")?.strip_prefix(table)? {
            "_source" => Some(KeySide::Source),
            "_target" => Some(KeySide::Target),
            _ => None,
        }
    }
}

/// Look for a stored mapping sharing an id with `attempted`.
///
/// With a known `side` only that id is looked up.
pub async fn find_similar(
    pool: &PgPool,
    attempted: &NewMapping,
    side: Option<KeySide>,
) -> Result<Option<SimilarMapping>, MappingStoreError> {
    if side != Some(KeySide::Target) {
        if let Some(record) =
            MappingRepo::find_by_source(pool, attempted.kind, &attempted.source_id).await?
        {
            return Ok(Some(SimilarMapping::BySource(record)));
        }
    }
    if side == Some(KeySide::Source) {
        return Ok(None);
    }
    let by_target = MappingRepo::find_by_target(pool, attempted.kind, &attempted.target_id).await?;
    Ok(by_target.map(SimilarMapping::ByTarget))
}

/// Build the conflict report for a rejected `attempted` mapping.
///
/// `constraint` is the violated constraint as reported by the store.
/// Probe failures degrade the report instead of replacing the conflict with
/// an unrelated error.
pub async fn resolve_conflict(
    pool: &PgPool,
    attempted: NewMapping,
    constraint: Option<&str>,
) -> ConflictReport {
    let side = constraint.and_then(|name| KeySide::from_constraint(attempted.kind, name));

    let similar = match find_similar(pool, &attempted, side).await {
        Ok(similar) => similar,
        Err(err) => {
            tracing::warn!(error = %err, kind = %attempted.kind, "Conflict probe failed");
            None
        }
    };

    if similar.is_none() {
        tracing::warn!(
            kind = %attempted.kind,
            source_id = %attempted.source_id,
            target_id = %attempted.target_id,
            constraint,
            "Colliding mapping not found, reporting attempted record as existing"
        );
    }

    ConflictReport::new(attempted, similar)
}
