use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use idmap_db::repositories::MappingTreeRepo;

use crate::error::AppResult;
use crate::handlers::require_admin_reset;
use crate::state::AppState;

/// DELETE /api/v1/admin/mappings
///
/// Delete every mapping of every kind plus all migration markers.
/// Disabled unless `ALLOW_ADMIN_RESET` is set.
pub async fn reset_all_mappings(State(state): State<AppState>) -> AppResult<impl IntoResponse> {
    require_admin_reset(&state.config)?;

    let deleted = MappingTreeRepo::delete_everything(&state.pool).await?;

    tracing::warn!(deleted, "All mappings deleted");

    Ok(StatusCode::NO_CONTENT)
}
