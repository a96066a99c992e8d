use idmap_core::error::CoreError;
use idmap_core::mapping::NewMapping;

/// PostgreSQL SQLSTATE for `unique_violation`.
const UNIQUE_VIOLATION: &str = "23505";

/// Errors raised by the mapping repositories.
#[derive(Debug, thiserror::Error)]
pub enum MappingStoreError {
    /// An insert or update collided with an existing unique key. Carries the
    /// exact record that was being written.
    #[error("Unique constraint violated by {} {}", .attempted.kind, .attempted.source_id)]
    UniqueViolation {
        attempted: Box<NewMapping>,
        constraint: Option<String>,
    },

    /// The request or a stored row did not fit the domain model.
    #[error(transparent)]
    Domain(#[from] CoreError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl MappingStoreError {
    /// Classify an error raised while writing `attempted`.
    ///
    /// SQLSTATE 23505 becomes [`MappingStoreError::UniqueViolation`]; anything
    /// else is passed through as a database error.
    pub fn from_write(err: sqlx::Error, attempted: &NewMapping) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            if db_err.code().as_deref() == Some(UNIQUE_VIOLATION) {
                return MappingStoreError::UniqueViolation {
                    attempted: Box::new(attempted.clone()),
                    constraint: db_err.constraint().map(str::to_string),
                };
            }
        }
        MappingStoreError::Database(err)
    }
}
