//! Conflict reports produced when an insert collides with an existing mapping.
//!
//! The store only tells us *that* a unique key collided. Finding the record it
//! collided with is a best-effort probe (source id first, then target id), so
//! the probe outcome is kept explicit: a report either carries the similar
//! mapping it found or is marked degraded, in which case the attempted record
//! stands in for the existing side.

use serde::Serialize;
use serde_json::json;

use crate::mapping::{MappingRecord, NewMapping};

/// The record a conflicting insert was matched against, and on which id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "matched_on", content = "record", rename_all = "snake_case")]
pub enum SimilarMapping {
    BySource(MappingRecord),
    ByTarget(MappingRecord),
}

impl SimilarMapping {
    pub fn record(&self) -> &MappingRecord {
        match self {
            SimilarMapping::BySource(record) | SimilarMapping::ByTarget(record) => record,
        }
    }
}

/// Attempted record plus whatever the probe found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConflictReport {
    pub duplicate: NewMapping,
    pub similar: Option<SimilarMapping>,
}

impl ConflictReport {
    pub fn new(duplicate: NewMapping, similar: Option<SimilarMapping>) -> Self {
        Self { duplicate, similar }
    }

    /// True when neither probe found the colliding record.
    pub fn is_degraded(&self) -> bool {
        self.similar.is_none()
    }

    /// Attributes of the existing side, falling back to the attempted record.
    pub fn existing(&self) -> &NewMapping {
        self.similar
            .as_ref()
            .map(|similar| &similar.record().mapping)
            .unwrap_or(&self.duplicate)
    }

    /// The `moreInfo` payload: `{ "duplicate": {..}, "existing": {..} }`.
    pub fn more_info(&self) -> serde_json::Value {
        let existing = match &self.similar {
            Some(similar) => serde_json::to_value(similar.record()),
            None => serde_json::to_value(&self.duplicate),
        }
        .unwrap_or(serde_json::Value::Null);

        json!({
            "duplicate": self.duplicate,
            "existing": existing,
        })
    }
}
