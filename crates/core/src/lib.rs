//! Domain types for the identifier mapping service.
//!
//! Pure logic only: entity kinds and families, source keys, mapping records,
//! conflict reports, paging and tree validation. No database access.

pub mod conflict;
pub mod entity_kind;
pub mod error;
pub mod mapping;
pub mod paging;
pub mod tree;
pub mod types;
