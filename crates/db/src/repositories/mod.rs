//! Repository layer: one zero-sized struct per concern, async functions over
//! `PgPool` or any `PgExecutor`.

pub mod mapping_repo;
pub mod mapping_tree_repo;
pub mod migration_marker_repo;

pub use mapping_repo::MappingRepo;
pub use mapping_tree_repo::{MappingTreeRepo, MigrationOutcome, ReplacementOutcome};
pub use migration_marker_repo::MigrationMarkerRepo;
