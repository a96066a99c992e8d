//! Entity kinds, the families they form, and their per-kind storage layout.
//!
//! Every mapping table shares the same logical columns; what differs per kind
//! is the shape of the source key, which id column is the primary key, and
//! whether the kind allows a target id to be corrected in place. That static
//! configuration lives here so the repository layer can build SQL from it
//! instead of carrying one hand-written repository per table.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

// ---------------------------------------------------------------------------
// Per-kind configuration enums
// ---------------------------------------------------------------------------

/// How the legacy identifier of a kind is composed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceShape {
    /// A single numeric id.
    Simple,
    /// Parent id plus a sequence number (`source_id`, `source_seq`).
    Sequenced,
    /// Parent id plus a textual discriminator (`source_id`, `source_discriminator`).
    Discriminated,
}

/// Which side of the mapping is the table's primary key.
///
/// The other side always carries a secondary unique constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrimaryKey {
    TargetId,
    SourceId,
}

/// What the migration variant of tree persistence clears before inserting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PurgePolicy {
    /// Delete every record keyed to the subject across the parent and all
    /// child kinds of the family.
    PerSubject,
    /// Purge nothing; a re-run collides on the unique constraints and is
    /// reported as a conflict.
    None,
}

// ---------------------------------------------------------------------------
// Entity kind
// ---------------------------------------------------------------------------

/// A mapped entity kind. Each kind is stored in its own table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Organization,
    OrganizationAddress,
    OrganizationContact,
    OrganizationPhone,
    OrganizationEmail,
    OrganizationWeb,
    Movement,
    VisitBalance,
    ScheduledEvent,
}

impl EntityKind {
    pub const ALL: [EntityKind; 9] = [
        EntityKind::Organization,
        EntityKind::OrganizationAddress,
        EntityKind::OrganizationContact,
        EntityKind::OrganizationPhone,
        EntityKind::OrganizationEmail,
        EntityKind::OrganizationWeb,
        EntityKind::Movement,
        EntityKind::VisitBalance,
        EntityKind::ScheduledEvent,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            EntityKind::Organization => "organization",
            EntityKind::OrganizationAddress => "organization_address",
            EntityKind::OrganizationContact => "organization_contact",
            EntityKind::OrganizationPhone => "organization_phone",
            EntityKind::OrganizationEmail => "organization_email",
            EntityKind::OrganizationWeb => "organization_web",
            EntityKind::Movement => "movement",
            EntityKind::VisitBalance => "visit_balance",
            EntityKind::ScheduledEvent => "scheduled_event",
        }
    }

    /// Name of the table holding this kind's mappings.
    pub fn table(self) -> &'static str {
        match self {
            EntityKind::Organization => "organization_mappings",
            EntityKind::OrganizationAddress => "organization_address_mappings",
            EntityKind::OrganizationContact => "organization_contact_mappings",
            EntityKind::OrganizationPhone => "organization_phone_mappings",
            EntityKind::OrganizationEmail => "organization_email_mappings",
            EntityKind::OrganizationWeb => "organization_web_mappings",
            EntityKind::Movement => "movement_mappings",
            EntityKind::VisitBalance => "visit_balance_mappings",
            EntityKind::ScheduledEvent => "scheduled_event_mappings",
        }
    }

    pub fn source_shape(self) -> SourceShape {
        match self {
            EntityKind::Organization | EntityKind::Movement => SourceShape::Simple,
            EntityKind::VisitBalance => SourceShape::Discriminated,
            EntityKind::OrganizationAddress
            | EntityKind::OrganizationContact
            | EntityKind::OrganizationPhone
            | EntityKind::OrganizationEmail
            | EntityKind::OrganizationWeb
            | EntityKind::ScheduledEvent => SourceShape::Sequenced,
        }
    }

    pub fn primary_key(self) -> PrimaryKey {
        match self {
            EntityKind::Movement => PrimaryKey::SourceId,
            _ => PrimaryKey::TargetId,
        }
    }

    pub fn family(self) -> EntityFamily {
        match self {
            EntityKind::Organization
            | EntityKind::OrganizationAddress
            | EntityKind::OrganizationContact
            | EntityKind::OrganizationPhone
            | EntityKind::OrganizationEmail
            | EntityKind::OrganizationWeb => EntityFamily::Organization,
            EntityKind::Movement | EntityKind::VisitBalance | EntityKind::ScheduledEvent => {
                EntityFamily::Movement
            }
        }
    }

    /// Whether this kind is the parent of its family.
    pub fn is_family_root(self) -> bool {
        self.family().root() == self
    }

    /// Whether a mapping of this kind may have its target id corrected in place.
    pub fn supports_update(self) -> bool {
        matches!(self, EntityKind::ScheduledEvent)
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityKind {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EntityKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| CoreError::Validation(format!("Unknown entity kind '{s}'")))
    }
}

// ---------------------------------------------------------------------------
// Entity family
// ---------------------------------------------------------------------------

/// A parent kind and the child kinds persisted together with it as a tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityFamily {
    Organization,
    Movement,
}

const ORGANIZATION_CHILDREN: &[EntityKind] = &[
    EntityKind::OrganizationAddress,
    EntityKind::OrganizationContact,
    EntityKind::OrganizationPhone,
    EntityKind::OrganizationEmail,
    EntityKind::OrganizationWeb,
];

const MOVEMENT_CHILDREN: &[EntityKind] = &[EntityKind::VisitBalance, EntityKind::ScheduledEvent];

impl EntityFamily {
    pub const ALL: [EntityFamily; 2] = [EntityFamily::Organization, EntityFamily::Movement];

    pub fn as_str(self) -> &'static str {
        match self {
            EntityFamily::Organization => "organization",
            EntityFamily::Movement => "movement",
        }
    }

    pub fn root(self) -> EntityKind {
        match self {
            EntityFamily::Organization => EntityKind::Organization,
            EntityFamily::Movement => EntityKind::Movement,
        }
    }

    /// Child kinds in the fixed order they are inserted.
    pub fn children(self) -> &'static [EntityKind] {
        match self {
            EntityFamily::Organization => ORGANIZATION_CHILDREN,
            EntityFamily::Movement => MOVEMENT_CHILDREN,
        }
    }

    /// The root followed by every child kind.
    pub fn kinds(self) -> impl Iterator<Item = EntityKind> {
        std::iter::once(self.root()).chain(self.children().iter().copied())
    }

    pub fn contains(self, kind: EntityKind) -> bool {
        kind.family() == self
    }

    pub fn purge_policy(self) -> PurgePolicy {
        match self {
            EntityFamily::Organization => PurgePolicy::PerSubject,
            EntityFamily::Movement => PurgePolicy::None,
        }
    }
}

impl fmt::Display for EntityFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityFamily {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EntityFamily::ALL
            .into_iter()
            .find(|family| family.as_str() == s)
            .ok_or_else(|| CoreError::Validation(format!("Unknown entity family '{s}'")))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn kind_names_round_trip_through_from_str() {
        for kind in EntityKind::ALL {
            assert_eq!(kind.as_str().parse::<EntityKind>().unwrap(), kind);
        }
    }

    #[test]
    fn unknown_kind_is_a_validation_error() {
        assert_matches!(
            "organisation".parse::<EntityKind>(),
            Err(CoreError::Validation(_))
        );
    }

    #[test]
    fn every_kind_belongs_to_exactly_one_family() {
        for kind in EntityKind::ALL {
            let owners: Vec<_> = EntityFamily::ALL
                .into_iter()
                .filter(|family| family.kinds().any(|k| k == kind))
                .collect();
            assert_eq!(owners, vec![kind.family()], "{kind}");
        }
    }

    #[test]
    fn organization_family_spans_six_tables() {
        let tables: Vec<_> = EntityFamily::Organization
            .kinds()
            .map(EntityKind::table)
            .collect();
        assert_eq!(tables.len(), 6);
        assert_eq!(tables[0], "organization_mappings");
    }

    #[test]
    fn only_roots_report_family_root() {
        assert!(EntityKind::Organization.is_family_root());
        assert!(EntityKind::Movement.is_family_root());
        assert!(!EntityKind::OrganizationPhone.is_family_root());
        assert!(!EntityKind::VisitBalance.is_family_root());
    }

    #[test]
    fn movement_is_keyed_by_source_id() {
        assert_eq!(EntityKind::Movement.primary_key(), PrimaryKey::SourceId);
        assert_eq!(EntityKind::Organization.primary_key(), PrimaryKey::TargetId);
    }

    #[test]
    fn purge_policies_differ_per_family() {
        assert_eq!(
            EntityFamily::Organization.purge_policy(),
            PurgePolicy::PerSubject
        );
        assert_eq!(EntityFamily::Movement.purge_policy(), PurgePolicy::None);
    }
}
