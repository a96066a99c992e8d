pub mod mapping;
pub mod migration_marker;
