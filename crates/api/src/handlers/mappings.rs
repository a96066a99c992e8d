//! Handlers for single-kind mapping operations.
//!
//! Every route is keyed by the `{kind}` path segment; source ids use the
//! `parent:part` text form for composite kinds.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Serialize;
use idmap_core::entity_kind::EntityKind;
use idmap_core::error::CoreError;
use idmap_core::mapping::{validate_run_label, CreateMapping, SourceKey, UpdateMappingTarget};
use idmap_core::paging::{PageParams, PageRequest};
use idmap_db::repositories::MappingRepo;

use crate::error::{AppError, AppResult};
use crate::handlers::{parse_kind, reconciled, require_admin_reset};
use crate::response::DataResponse;
use crate::state::AppState;

/// Count of mappings of one kind carrying a run label.
#[derive(Debug, Serialize)]
pub struct RunLabelCount {
    pub kind: EntityKind,
    pub run_label: String,
    pub count: i64,
}

fn parse_source(kind: EntityKind, raw: &str) -> AppResult<SourceKey> {
    Ok(SourceKey::parse(kind.source_shape(), raw)?)
}

fn not_found(kind: EntityKind, id: impl ToString) -> AppError {
    AppError::Core(CoreError::NotFound {
        entity: kind.as_str(),
        id: id.to_string(),
    })
}

// ---------------------------------------------------------------------------
// Single record
// ---------------------------------------------------------------------------

/// POST /api/v1/mappings/{kind}
///
/// Insert one mapping. A collision on either id returns 409 with the
/// conflict report.
pub async fn create_mapping(
    State(state): State<AppState>,
    Path(kind): Path<String>,
    Json(input): Json<CreateMapping>,
) -> AppResult<impl IntoResponse> {
    let kind = parse_kind(&kind)?;
    let mapping = input.into_new_mapping(kind)?;

    let record = reconciled(&state.pool, MappingRepo::insert(&state.pool, &mapping).await).await?;

    tracing::info!(
        kind = %kind,
        source_id = %record.source_id(),
        target_id = %record.target_id(),
        "Mapping created",
    );

    Ok((StatusCode::CREATED, Json(DataResponse { data: record })))
}

/// GET /api/v1/mappings/{kind}/source/{source_id}
pub async fn get_by_source(
    State(state): State<AppState>,
    Path((kind, source_id)): Path<(String, String)>,
) -> AppResult<impl IntoResponse> {
    let kind = parse_kind(&kind)?;
    let key = parse_source(kind, &source_id)?;

    let record = MappingRepo::find_by_source(&state.pool, kind, &key)
        .await?
        .ok_or_else(|| not_found(kind, &key))?;

    Ok(Json(DataResponse { data: record }))
}

/// GET /api/v1/mappings/{kind}/target/{target_id}
pub async fn get_by_target(
    State(state): State<AppState>,
    Path((kind, target_id)): Path<(String, String)>,
) -> AppResult<impl IntoResponse> {
    let kind = parse_kind(&kind)?;

    let record = MappingRepo::find_by_target(&state.pool, kind, &target_id)
        .await?
        .ok_or_else(|| not_found(kind, &target_id))?;

    Ok(Json(DataResponse { data: record }))
}

/// PUT /api/v1/mappings/{kind}/source/{source_id}
///
/// Correct the target id in place. Only kinds that allow it accept the
/// request; the rest return 400.
pub async fn update_target(
    State(state): State<AppState>,
    Path((kind, source_id)): Path<(String, String)>,
    Json(input): Json<UpdateMappingTarget>,
) -> AppResult<impl IntoResponse> {
    let kind = parse_kind(&kind)?;
    let key = parse_source(kind, &source_id)?;

    let result = MappingRepo::update_target(&state.pool, kind, &key, &input.target_id).await;
    let record = reconciled(&state.pool, result)
        .await?
        .ok_or_else(|| not_found(kind, &key))?;

    tracing::info!(
        kind = %kind,
        source_id = %key,
        target_id = %record.target_id(),
        "Mapping target updated",
    );

    Ok(Json(DataResponse { data: record }))
}

/// DELETE /api/v1/mappings/{kind}/source/{source_id}
pub async fn delete_by_source(
    State(state): State<AppState>,
    Path((kind, source_id)): Path<(String, String)>,
) -> AppResult<impl IntoResponse> {
    let kind = parse_kind(&kind)?;
    let key = parse_source(kind, &source_id)?;

    let deleted = MappingRepo::delete_by_source(&state.pool, kind, &key).await?;
    if deleted == 0 {
        return Err(not_found(kind, &key));
    }

    tracing::info!(kind = %kind, source_id = %key, "Mapping deleted");

    Ok(StatusCode::NO_CONTENT)
}

/// DELETE /api/v1/mappings/{kind}/target/{target_id}
pub async fn delete_by_target(
    State(state): State<AppState>,
    Path((kind, target_id)): Path<(String, String)>,
) -> AppResult<impl IntoResponse> {
    let kind = parse_kind(&kind)?;

    let deleted = MappingRepo::delete_by_target(&state.pool, kind, &target_id).await?;
    if deleted == 0 {
        return Err(not_found(kind, &target_id));
    }

    tracing::info!(kind = %kind, target_id = %target_id, "Mapping deleted");

    Ok(StatusCode::NO_CONTENT)
}

/// DELETE /api/v1/mappings/{kind}
///
/// Delete every mapping of one kind. Disabled unless `ALLOW_ADMIN_RESET` is set.
pub async fn delete_all_of_kind(
    State(state): State<AppState>,
    Path(kind): Path<String>,
) -> AppResult<impl IntoResponse> {
    require_admin_reset(&state.config)?;
    let kind = parse_kind(&kind)?;

    let deleted = MappingRepo::delete_all(&state.pool, kind).await?;

    tracing::warn!(kind = %kind, deleted, "All mappings of kind deleted");

    Ok(StatusCode::NO_CONTENT)
}

// ---------------------------------------------------------------------------
// Migration runs
// ---------------------------------------------------------------------------

/// GET /api/v1/mappings/{kind}/runs/{run_label}?page=&size=&sort=
///
/// Zero-based page of the mappings a migration run produced.
pub async fn page_by_run_label(
    State(state): State<AppState>,
    Path((kind, run_label)): Path<(String, String)>,
    Query(params): Query<PageParams>,
) -> AppResult<impl IntoResponse> {
    let kind = parse_kind(&kind)?;
    validate_run_label(&run_label)?;
    let request = PageRequest::try_from(params)?;

    let page = MappingRepo::page_by_run_label(&state.pool, kind, &run_label, &request).await?;

    Ok(Json(DataResponse { data: page }))
}

/// GET /api/v1/mappings/{kind}/runs/{run_label}/count
pub async fn count_by_run_label(
    State(state): State<AppState>,
    Path((kind, run_label)): Path<(String, String)>,
) -> AppResult<impl IntoResponse> {
    let kind = parse_kind(&kind)?;
    validate_run_label(&run_label)?;

    let count = MappingRepo::count_by_label(&state.pool, kind, &run_label).await?;

    Ok(Json(DataResponse {
        data: RunLabelCount {
            kind,
            run_label,
            count,
        },
    }))
}
