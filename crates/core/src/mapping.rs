//! Mapping records: the stored correspondence between one legacy source id
//! and one target id for a single entity kind.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::entity_kind::{EntityKind, SourceShape};
use crate::error::CoreError;
use crate::types::{DbId, Timestamp};

/// Maximum accepted length of a target id (natural key or UUID text).
pub const MAX_TARGET_ID_LEN: usize = 255;

/// Maximum accepted length of a run label.
pub const MAX_RUN_LABEL_LEN: usize = 64;

// ---------------------------------------------------------------------------
// Source key
// ---------------------------------------------------------------------------

/// A legacy identifier, simple or composite depending on the entity kind.
///
/// Serialized as a bare number for simple keys and as an object for
/// composite ones, e.g. `{"parent_id": 12345, "sequence": 2}`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SourceKey {
    Simple(DbId),
    Sequenced { parent_id: DbId, sequence: i32 },
    Discriminated { parent_id: DbId, discriminator: String },
}

impl SourceKey {
    pub fn shape(&self) -> SourceShape {
        match self {
            SourceKey::Simple(_) => SourceShape::Simple,
            SourceKey::Sequenced { .. } => SourceShape::Sequenced,
            SourceKey::Discriminated { .. } => SourceShape::Discriminated,
        }
    }

    /// The subject this key belongs to: the id itself for simple keys, the
    /// parent id for composite ones.
    pub fn subject_id(&self) -> DbId {
        match self {
            SourceKey::Simple(id) => *id,
            SourceKey::Sequenced { parent_id, .. } | SourceKey::Discriminated { parent_id, .. } => {
                *parent_id
            }
        }
    }

    pub fn sequence(&self) -> Option<i32> {
        match self {
            SourceKey::Sequenced { sequence, .. } => Some(*sequence),
            _ => None,
        }
    }

    pub fn discriminator(&self) -> Option<&str> {
        match self {
            SourceKey::Discriminated { discriminator, .. } => Some(discriminator),
            _ => None,
        }
    }

    /// Parse the textual form used in URL paths: `"<id>"` for simple keys,
    /// `"<parent>:<part>"` for composite ones.
    pub fn parse(shape: SourceShape, raw: &str) -> Result<Self, CoreError> {
        let invalid = || CoreError::Validation(format!("Malformed source id '{raw}'"));
        let parse_id = |s: &str| s.trim().parse::<DbId>().map_err(|_| invalid());

        match shape {
            SourceShape::Simple => Ok(SourceKey::Simple(parse_id(raw)?)),
            SourceShape::Sequenced => {
                let (parent, seq) = raw.split_once(':').ok_or_else(invalid)?;
                Ok(SourceKey::Sequenced {
                    parent_id: parse_id(parent)?,
                    sequence: seq.trim().parse().map_err(|_| invalid())?,
                })
            }
            SourceShape::Discriminated => {
                let (parent, discriminator) = raw.split_once(':').ok_or_else(invalid)?;
                if discriminator.trim().is_empty() {
                    return Err(invalid());
                }
                Ok(SourceKey::Discriminated {
                    parent_id: parse_id(parent)?,
                    discriminator: discriminator.trim().to_string(),
                })
            }
        }
    }

    /// Rebuild a key from its stored columns.
    pub fn from_columns(
        shape: SourceShape,
        source_id: DbId,
        source_seq: Option<i32>,
        source_discriminator: Option<String>,
    ) -> Result<Self, CoreError> {
        match (shape, source_seq, source_discriminator) {
            (SourceShape::Simple, _, _) => Ok(SourceKey::Simple(source_id)),
            (SourceShape::Sequenced, Some(sequence), _) => Ok(SourceKey::Sequenced {
                parent_id: source_id,
                sequence,
            }),
            (SourceShape::Discriminated, _, Some(discriminator)) => Ok(SourceKey::Discriminated {
                parent_id: source_id,
                discriminator,
            }),
            (shape, _, _) => Err(CoreError::Internal(format!(
                "Stored source id {source_id} is missing its {shape:?} component"
            ))),
        }
    }
}

impl fmt::Display for SourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceKey::Simple(id) => write!(f, "{id}"),
            SourceKey::Sequenced {
                parent_id,
                sequence,
            } => write!(f, "{parent_id}:{sequence}"),
            SourceKey::Discriminated {
                parent_id,
                discriminator,
            } => write!(f, "{parent_id}:{discriminator}"),
        }
    }
}

// ---------------------------------------------------------------------------
// Origin
// ---------------------------------------------------------------------------

/// Provenance of a mapping. Informational only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OriginKind {
    Migrated,
    SourceSystemCreated,
    TargetSystemCreated,
}

impl OriginKind {
    pub fn as_str(self) -> &'static str {
        match self {
            OriginKind::Migrated => "MIGRATED",
            OriginKind::SourceSystemCreated => "SOURCE_SYSTEM_CREATED",
            OriginKind::TargetSystemCreated => "TARGET_SYSTEM_CREATED",
        }
    }
}

impl FromStr for OriginKind {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "MIGRATED" => Ok(OriginKind::Migrated),
            "SOURCE_SYSTEM_CREATED" => Ok(OriginKind::SourceSystemCreated),
            "TARGET_SYSTEM_CREATED" => Ok(OriginKind::TargetSystemCreated),
            other => Err(CoreError::Validation(format!("Unknown origin kind '{other}'"))),
        }
    }
}

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

/// A mapping about to be written. Also the `duplicate` side of a conflict.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewMapping {
    pub kind: EntityKind,
    pub source_id: SourceKey,
    pub target_id: String,
    pub run_label: Option<String>,
    pub origin: OriginKind,
}

impl NewMapping {
    /// Check the source key matches the kind's shape and the ids are usable.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.source_id.shape() != self.kind.source_shape() {
            return Err(CoreError::Validation(format!(
                "Source id '{}' does not match the {:?} key shape of {}",
                self.source_id,
                self.kind.source_shape(),
                self.kind
            )));
        }
        validate_target_id(&self.target_id)?;
        if let Some(label) = &self.run_label {
            validate_run_label(label)?;
        }
        Ok(())
    }
}

/// A persisted mapping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MappingRecord {
    #[serde(flatten)]
    pub mapping: NewMapping,
    pub created_at: Timestamp,
}

impl MappingRecord {
    pub fn kind(&self) -> EntityKind {
        self.mapping.kind
    }

    pub fn source_id(&self) -> &SourceKey {
        &self.mapping.source_id
    }

    pub fn target_id(&self) -> &str {
        &self.mapping.target_id
    }
}

/// Request body for a single synchronization insert. The kind comes from the
/// route.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateMapping {
    pub source_id: SourceKey,
    pub target_id: String,
    pub run_label: Option<String>,
    pub origin: Option<OriginKind>,
}

impl CreateMapping {
    /// Resolve into a validated [`NewMapping`]. Live synchronization records
    /// default to [`OriginKind::SourceSystemCreated`].
    pub fn into_new_mapping(self, kind: EntityKind) -> Result<NewMapping, CoreError> {
        let mapping = NewMapping {
            kind,
            source_id: self.source_id,
            target_id: self.target_id,
            run_label: self.run_label,
            origin: self.origin.unwrap_or(OriginKind::SourceSystemCreated),
        };
        mapping.validate()?;
        Ok(mapping)
    }
}

/// Request body for correcting the target id of an updatable kind.
#[derive(Debug, Clone, Deserialize)]
pub struct UpdateMappingTarget {
    pub target_id: String,
}

// ---------------------------------------------------------------------------
// Validation helpers
// ---------------------------------------------------------------------------

pub fn validate_target_id(target_id: &str) -> Result<(), CoreError> {
    if target_id.trim().is_empty() {
        return Err(CoreError::Validation("Target id must not be empty".into()));
    }
    if target_id.len() > MAX_TARGET_ID_LEN {
        return Err(CoreError::Validation(format!(
            "Target id exceeds {MAX_TARGET_ID_LEN} characters"
        )));
    }
    Ok(())
}

pub fn validate_run_label(label: &str) -> Result<(), CoreError> {
    if label.trim().is_empty() {
        return Err(CoreError::Validation("Run label must not be empty".into()));
    }
    if label.len() > MAX_RUN_LABEL_LEN {
        return Err(CoreError::Validation(format!(
            "Run label exceeds {MAX_RUN_LABEL_LEN} characters"
        )));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
