use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use idmap_core::error::CoreError;
use idmap_db::MappingStoreError;

/// Application-level error type for HTTP handlers.
///
/// Wraps [`CoreError`] for domain errors and adds HTTP-specific variants.
/// Implements [`IntoResponse`] to produce consistent JSON error responses.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// A domain-level error from `idmap_core`.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// A database error from sqlx.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A bad request with a human-readable message.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// An internal error with a human-readable message.
    #[error("Internal error: {0}")]
    InternalError(String),
}

/// Convenience type alias for handler return values.
pub type AppResult<T> = Result<T, AppError>;

/// Store errors that reach the HTTP layer unreconciled.
///
/// A unique violation only becomes a 409 when the handler that issued the
/// write resolves it into a conflict report first (see
/// [`crate::handlers::reconciled`]). Anything still carrying a raw violation
/// here is treated as an internal failure.
impl From<MappingStoreError> for AppError {
    fn from(err: MappingStoreError) -> Self {
        match err {
            MappingStoreError::Domain(core) => AppError::Core(core),
            MappingStoreError::Database(db) => AppError::Database(db),
            MappingStoreError::UniqueViolation {
                attempted,
                constraint,
            } => AppError::InternalError(format!(
                "Unexpected unique violation on {} for {} {} -> {}",
                constraint.as_deref().unwrap_or("unknown constraint"),
                attempted.kind,
                attempted.source_id,
                attempted.target_id,
            )),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let mut more_info = None;

        let (status, code, message) = match &self {
            // --- CoreError variants ---
            AppError::Core(core) => match core {
                CoreError::NotFound { entity, id } => (
                    StatusCode::NOT_FOUND,
                    "NOT_FOUND",
                    format!("{entity} with id {id} not found"),
                ),
                CoreError::Validation(msg) => {
                    (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone())
                }
                CoreError::DuplicateMapping(report) => {
                    more_info = Some(report.more_info());
                    (StatusCode::CONFLICT, "CONFLICT", core.to_string())
                }
                CoreError::Forbidden(msg) => (StatusCode::FORBIDDEN, "FORBIDDEN", msg.clone()),
                CoreError::Internal(msg) => {
                    tracing::error!(error = %msg, "Internal core error");
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "INTERNAL_ERROR",
                        "An internal error occurred".to_string(),
                    )
                }
            },

            // --- Database errors ---
            AppError::Database(err) => classify_sqlx_error(err),

            // --- HTTP-specific errors ---
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone()),
            AppError::InternalError(msg) => {
                tracing::error!(error = %msg, "Internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal error occurred".to_string(),
                )
            }
        };

        let mut body = json!({
            "error": message,
            "code": code,
        });
        if let Some(info) = more_info {
            body["moreInfo"] = info;
        }

        (status, axum::Json(body)).into_response()
    }
}

/// Classify a sqlx error into an HTTP status, error code, and message.
///
/// - `RowNotFound` maps to 404.
/// - Everything else maps to 500 with a sanitized message. Unique violations
///   never get here raw; the store classifies them first.
fn classify_sqlx_error(err: &sqlx::Error) -> (StatusCode, &'static str, String) {
    match err {
        sqlx::Error::RowNotFound => (
            StatusCode::NOT_FOUND,
            "NOT_FOUND",
            "Resource not found".to_string(),
        ),
        other => {
            tracing::error!(error = %other, "Database error");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                "An internal error occurred".to_string(),
            )
        }
    }
}
