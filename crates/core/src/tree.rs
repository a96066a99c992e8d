//! Tree-shaped mapping batches and replacement sets.
//!
//! A tree is a parent mapping plus typed child lists for one entity family.
//! Each child list is tagged with its [`EntityKind`]; the tag alone decides the
//! table and source-key shape of the records built from it. Validation here
//! runs before any I/O so malformed batches never open a transaction.

use serde::Deserialize;

use crate::entity_kind::{EntityFamily, EntityKind};
use crate::error::CoreError;
use crate::mapping::{validate_run_label, NewMapping, OriginKind, SourceKey};
use crate::types::DbId;

// ---------------------------------------------------------------------------
// Request DTOs
// ---------------------------------------------------------------------------

/// One id pair inside a tree request. Kind, label and origin come from the
/// enclosing list and request.
#[derive(Debug, Clone, Deserialize)]
pub struct TreeNode {
    pub source_id: SourceKey,
    pub target_id: String,
}

/// All child mappings of one kind.
#[derive(Debug, Clone, Deserialize)]
pub struct ChildList {
    pub kind: EntityKind,
    #[serde(default)]
    pub records: Vec<TreeNode>,
}

/// Request body for tree persistence.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateMappingTree {
    pub parent: TreeNode,
    #[serde(default)]
    pub children: Vec<ChildList>,
    pub run_label: Option<String>,
    pub origin: Option<OriginKind>,
}

// ---------------------------------------------------------------------------
// Validated tree
// ---------------------------------------------------------------------------

/// A validated tree, every record stamped with the shared label and origin.
/// Child lists are held in the family's fixed insert order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappingTree {
    pub family: EntityFamily,
    pub parent: NewMapping,
    pub children: Vec<(EntityKind, Vec<NewMapping>)>,
}

impl CreateMappingTree {
    /// Validate against `family` and stamp every record. Trees default to
    /// [`OriginKind::Migrated`].
    pub fn into_tree(self, family: EntityFamily) -> Result<MappingTree, CoreError> {
        if let Some(label) = &self.run_label {
            validate_run_label(label)?;
        }
        let origin = self.origin.unwrap_or(OriginKind::Migrated);
        let stamp = |kind: EntityKind, node: TreeNode| -> Result<NewMapping, CoreError> {
            let mapping = NewMapping {
                kind,
                source_id: node.source_id,
                target_id: node.target_id,
                run_label: self.run_label.clone(),
                origin,
            };
            mapping.validate()?;
            Ok(mapping)
        };

        let parent = stamp(family.root(), self.parent)?;
        let subject_id = parent.source_id.subject_id();

        for list in &self.children {
            if !family.contains(list.kind) || list.kind.is_family_root() {
                return Err(CoreError::Validation(format!(
                    "{} is not a child kind of the {family} family",
                    list.kind
                )));
            }
        }

        let mut children = Vec::new();
        for &kind in family.children() {
            let mut records = Vec::new();
            for list in self.children.iter().filter(|list| list.kind == kind) {
                for node in &list.records {
                    if node.source_id.subject_id() != subject_id {
                        return Err(CoreError::Validation(format!(
                            "{kind} {} does not belong to subject {subject_id}",
                            node.source_id
                        )));
                    }
                    records.push(stamp(kind, node.clone())?);
                }
            }
            if !records.is_empty() {
                children.push((kind, records));
            }
        }

        Ok(MappingTree {
            family,
            parent,
            children,
        })
    }
}

impl MappingTree {
    /// The subject a tree is keyed by: the parent's source id.
    pub fn subject_id(&self) -> DbId {
        self.parent.source_id.subject_id()
    }

    pub fn run_label(&self) -> Option<&str> {
        self.parent.run_label.as_deref()
    }

    /// Parent first, then every child in insert order.
    pub fn records(&self) -> impl Iterator<Item = &NewMapping> {
        std::iter::once(&self.parent)
            .chain(self.children.iter().flat_map(|(_, records)| records.iter()))
    }
}

// ---------------------------------------------------------------------------
// Replacement sets
// ---------------------------------------------------------------------------

/// One record of a replacement set.
#[derive(Debug, Clone, Deserialize)]
pub struct ReplacementRecord {
    pub kind: EntityKind,
    pub source_id: SourceKey,
    pub target_id: String,
    pub run_label: Option<String>,
    pub origin: Option<OriginKind>,
}

/// Request body for replacing a subject's mapping set.
#[derive(Debug, Clone, Deserialize)]
pub struct ReplaceMappingSet {
    #[serde(default)]
    pub records: Vec<ReplacementRecord>,
}

impl ReplaceMappingSet {
    /// Validate every record and check it belongs to `family`.
    pub fn into_records(self, family: EntityFamily) -> Result<Vec<NewMapping>, CoreError> {
        self.records
            .into_iter()
            .map(|record| {
                if !family.contains(record.kind) {
                    return Err(CoreError::Validation(format!(
                        "{} does not belong to the {family} family",
                        record.kind
                    )));
                }
                let mapping = NewMapping {
                    kind: record.kind,
                    source_id: record.source_id,
                    target_id: record.target_id,
                    run_label: record.run_label,
                    origin: record.origin.unwrap_or(OriginKind::SourceSystemCreated),
                };
                mapping.validate()?;
                Ok(mapping)
            })
            .collect()
    }
}
