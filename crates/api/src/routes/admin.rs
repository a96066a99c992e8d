use axum::routing::delete;
use axum::Router;

use crate::handlers::admin;
use crate::state::AppState;

/// Administrative routes mounted at `/admin`.
///
/// ```text
/// DELETE /mappings   -> reset_all_mappings
/// ```
pub fn router() -> Router<AppState> {
    Router::new().route("/mappings", delete(admin::reset_all_mappings))
}
