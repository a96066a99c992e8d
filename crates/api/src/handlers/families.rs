//! Handlers for family-wide operations: tree persistence, migration
//! re-runs and mapping-set replacement.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Serialize;
use idmap_core::entity_kind::EntityFamily;
use idmap_core::error::CoreError;
use idmap_core::tree::{CreateMappingTree, ReplaceMappingSet};
use idmap_core::types::DbId;
use idmap_db::repositories::{MappingTreeRepo, MigrationMarkerRepo};

use crate::error::{AppError, AppResult};
use crate::handlers::{parse_family, reconciled};
use crate::response::DataResponse;
use crate::state::AppState;

/// Summary of a persisted tree.
#[derive(Debug, Serialize)]
pub struct TreeCreated {
    pub family: EntityFamily,
    pub subject_id: DbId,
    pub inserted: usize,
}

// ---------------------------------------------------------------------------
// Trees
// ---------------------------------------------------------------------------

/// POST /api/v1/families/{family}/trees
///
/// Persist a parent mapping with its child lists in one transaction.
pub async fn create_tree(
    State(state): State<AppState>,
    Path(family): Path<String>,
    Json(input): Json<CreateMappingTree>,
) -> AppResult<impl IntoResponse> {
    let family = parse_family(&family)?;
    let tree = input.into_tree(family)?;

    let inserted = reconciled(&state.pool, MappingTreeRepo::create(&state.pool, &tree).await).await?;

    tracing::info!(
        family = %family,
        subject_id = tree.subject_id(),
        run_label = tree.run_label().unwrap_or_default(),
        inserted,
        "Mapping tree created",
    );

    Ok((
        StatusCode::CREATED,
        Json(DataResponse {
            data: TreeCreated {
                family,
                subject_id: tree.subject_id(),
                inserted,
            },
        }),
    ))
}

/// POST /api/v1/families/{family}/migrations
///
/// Migration variant of tree persistence. Requires a run label and records
/// it as the subject's migration marker.
pub async fn migrate_tree(
    State(state): State<AppState>,
    Path(family): Path<String>,
    Json(input): Json<CreateMappingTree>,
) -> AppResult<impl IntoResponse> {
    let family = parse_family(&family)?;
    let tree = input.into_tree(family)?;

    let outcome =
        reconciled(&state.pool, MappingTreeRepo::migrate(&state.pool, &tree).await).await?;

    tracing::info!(
        family = %family,
        subject_id = tree.subject_id(),
        run_label = %outcome.marker.run_label,
        purged = outcome.purged,
        inserted = outcome.inserted,
        "Mapping tree migrated",
    );

    Ok((StatusCode::CREATED, Json(DataResponse { data: outcome })))
}

/// GET /api/v1/families/{family}/markers/{subject_id}
pub async fn get_marker(
    State(state): State<AppState>,
    Path((family, subject_id)): Path<(String, DbId)>,
) -> AppResult<impl IntoResponse> {
    let family = parse_family(&family)?;

    let marker = MigrationMarkerRepo::find(&state.pool, family, subject_id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "MigrationMarker",
            id: format!("{family}/{subject_id}"),
        }))?;

    Ok(Json(DataResponse { data: marker }))
}

// ---------------------------------------------------------------------------
// Replacement
// ---------------------------------------------------------------------------

/// PUT /api/v1/families/{family}/subjects/{subject_id}
///
/// Replace every mapping of the subject across the family. A collision while
/// inserting the new set is a 500: the caller's set contradicts itself or
/// another subject's mappings.
pub async fn replace_subject(
    State(state): State<AppState>,
    Path((family, subject_id)): Path<(String, DbId)>,
    Json(input): Json<ReplaceMappingSet>,
) -> AppResult<impl IntoResponse> {
    let family = parse_family(&family)?;
    let records = input.into_records(family)?;

    let outcome = MappingTreeRepo::replace(&state.pool, family, subject_id, &records).await?;

    tracing::info!(
        family = %family,
        subject_id,
        deleted = outcome.deleted,
        inserted = outcome.inserted,
        "Mapping set replaced",
    );

    Ok(StatusCode::NO_CONTENT)
}

/// PUT /api/v1/families/{family}/subjects/{retained}/merge/{removed}
///
/// Clear both subjects after a source-side merge and store the merged set.
pub async fn merge_subjects(
    State(state): State<AppState>,
    Path((family, retained, removed)): Path<(String, DbId, DbId)>,
    Json(input): Json<ReplaceMappingSet>,
) -> AppResult<impl IntoResponse> {
    let family = parse_family(&family)?;
    if retained == removed {
        return Err(AppError::BadRequest(
            "Retained and removed subjects must differ".into(),
        ));
    }
    let records = input.into_records(family)?;

    let outcome =
        MappingTreeRepo::replace_after_merge(&state.pool, family, retained, removed, &records)
            .await?;

    tracing::info!(
        family = %family,
        retained,
        removed,
        deleted = outcome.deleted,
        inserted = outcome.inserted,
        "Mapping sets merged",
    );

    Ok(StatusCode::NO_CONTENT)
}
