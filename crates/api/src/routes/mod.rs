pub mod admin;
pub mod families;
pub mod health;
pub mod mappings;

use axum::Router;

use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// Route hierarchy:
///
/// ```text
/// /mappings/{kind}                               insert, delete all of kind
/// /mappings/{kind}/source/{source_id}            get, update target, delete
/// /mappings/{kind}/target/{target_id}            get, delete
/// /mappings/{kind}/runs/{run_label}              page by run label
/// /mappings/{kind}/runs/{run_label}/count        count by run label
///
/// /families/{family}/trees                       persist tree (POST)
/// /families/{family}/migrations                  migrate tree (POST)
/// /families/{family}/markers/{subject_id}        migration marker
/// /families/{family}/subjects/{subject_id}       replace mapping set (PUT)
/// /families/{family}/subjects/{retained}/merge/{removed}
///                                                replace after merge (PUT)
///
/// /admin/mappings                                delete everything (DELETE)
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .nest("/mappings", mappings::router())
        .nest("/families", families::router())
        .nest("/admin", admin::router())
}
