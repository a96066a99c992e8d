use crate::conflict::ConflictReport;

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("Validation failed: {0}")]
    Validation(String),

    /// An insert collided with an existing mapping on one of its unique keys.
    #[error("Duplicate mapping: {} {} already mapped", .0.duplicate.kind, .0.duplicate.source_id)]
    DuplicateMapping(Box<ConflictReport>),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Internal error: {0}")]
    Internal(String),
}
