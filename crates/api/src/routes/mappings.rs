//! Route definitions for single-kind mapping operations.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::mappings;
use crate::state::AppState;

/// Mapping routes mounted at `/mappings`.
///
/// ```text
/// POST   /{kind}                          -> create_mapping
/// DELETE /{kind}                          -> delete_all_of_kind
/// GET    /{kind}/source/{source_id}       -> get_by_source
/// PUT    /{kind}/source/{source_id}       -> update_target
/// DELETE /{kind}/source/{source_id}       -> delete_by_source
/// GET    /{kind}/target/{target_id}       -> get_by_target
/// DELETE /{kind}/target/{target_id}       -> delete_by_target
/// GET    /{kind}/runs/{run_label}         -> page_by_run_label
/// GET    /{kind}/runs/{run_label}/count   -> count_by_run_label
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/{kind}",
            post(mappings::create_mapping).delete(mappings::delete_all_of_kind),
        )
        .route(
            "/{kind}/source/{source_id}",
            get(mappings::get_by_source)
                .put(mappings::update_target)
                .delete(mappings::delete_by_source),
        )
        .route(
            "/{kind}/target/{target_id}",
            get(mappings::get_by_target).delete(mappings::delete_by_target),
        )
        .route("/{kind}/runs/{run_label}", get(mappings::page_by_run_label))
        .route(
            "/{kind}/runs/{run_label}/count",
            get(mappings::count_by_run_label),
        )
}
