pub mod admin;
pub mod families;
pub mod mappings;

use idmap_core::entity_kind::{EntityFamily, EntityKind};
use idmap_core::error::CoreError;
use idmap_db::{reconcile, DbPool, MappingStoreError};

use crate::config::ServerConfig;
use crate::error::{AppError, AppResult};

/// Parse the `{kind}` path segment.
pub(crate) fn parse_kind(raw: &str) -> AppResult<EntityKind> {
    Ok(raw.parse::<EntityKind>()?)
}

/// Parse the `{family}` path segment.
pub(crate) fn parse_family(raw: &str) -> AppResult<EntityFamily> {
    Ok(raw.parse::<EntityFamily>()?)
}

/// Turn a unique violation from a write into a 409 conflict report.
///
/// The report is built from the exact record the store rejected, so a
/// collision on the third phone of a tree reports that phone, not the parent.
pub(crate) async fn reconciled<T>(
    pool: &DbPool,
    result: Result<T, MappingStoreError>,
) -> AppResult<T> {
    match result {
        Ok(value) => Ok(value),
        Err(MappingStoreError::UniqueViolation {
            attempted,
            constraint,
        }) => {
            let report =
                reconcile::resolve_conflict(pool, *attempted, constraint.as_deref()).await;
            tracing::info!(
                kind = %report.duplicate.kind,
                source_id = %report.duplicate.source_id,
                target_id = %report.duplicate.target_id,
                existing_target_id = %report.existing().target_id,
                degraded = report.is_degraded(),
                "Rejected duplicate mapping",
            );
            Err(AppError::Core(CoreError::DuplicateMapping(Box::new(report))))
        }
        Err(other) => Err(other.into()),
    }
}

/// Reject bulk deletes unless `ALLOW_ADMIN_RESET` is set.
pub(crate) fn require_admin_reset(config: &ServerConfig) -> AppResult<()> {
    if config.allow_admin_reset {
        Ok(())
    } else {
        Err(AppError::Core(CoreError::Forbidden(
            "Bulk mapping deletion is disabled".into(),
        )))
    }
}
