//! Route definitions for family-wide (multi-table) operations.

use axum::routing::{get, post, put};
use axum::Router;

use crate::handlers::families;
use crate::state::AppState;

/// Family routes mounted at `/families`.
///
/// ```text
/// POST /{family}/trees                              -> create_tree
/// POST /{family}/migrations                         -> migrate_tree
/// GET  /{family}/markers/{subject_id}               -> get_marker
/// PUT  /{family}/subjects/{subject_id}              -> replace_subject
/// PUT  /{family}/subjects/{retained}/merge/{removed} -> merge_subjects
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/{family}/trees", post(families::create_tree))
        .route("/{family}/migrations", post(families::migrate_tree))
        .route("/{family}/markers/{subject_id}", get(families::get_marker))
        .route(
            "/{family}/subjects/{subject_id}",
            put(families::replace_subject),
        )
        .route(
            "/{family}/subjects/{retained}/merge/{removed}",
            put(families::merge_subjects),
        )
}
