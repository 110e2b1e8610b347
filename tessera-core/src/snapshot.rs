//! Serializable zone state.
//!
//! A snapshot is the list of entity records. Components and modes are stored
//! as `{kind name → flat record}` so that a reader needs only the registry
//! to rebuild them. Decoding is lenient: [`RawSnapshot`] keeps each entity as
//! untyped JSON so one corrupt record cannot take its neighbours down with it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::TesseraError;
use crate::types::{EntityId, Record};

/// Persisted mode of an entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModeRecord {
    /// Registered mode kind name.
    pub kind: String,
    /// Mode state.
    #[serde(default)]
    pub state: Record,
}

/// Persisted entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityRecord {
    /// Entity id, kept across restore.
    pub id: EntityId,
    /// Whether the entity receives messages.
    #[serde(default)]
    pub hearing: bool,
    /// Current mode, if any.
    #[serde(default)]
    pub mode: Option<ModeRecord>,
    /// Kind name → component record, in attachment order. Every value is a
    /// JSON object.
    #[serde(default)]
    pub components: Record,
}

impl EntityRecord {
    /// Record for an entity with no mode and no components.
    #[must_use]
    pub fn new(id: EntityId) -> Self {
        Self {
            id,
            hearing: false,
            mode: None,
            components: Record::new(),
        }
    }

    /// Kind names in attachment order.
    pub fn kinds(&self) -> impl Iterator<Item = &str> + '_ {
        self.components.keys().map(String::as_str)
    }
}

/// Complete state of one zone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZoneSnapshot {
    /// Zone name.
    pub zone: String,
    /// When the snapshot was taken.
    pub taken_at: DateTime<Utc>,
    /// Every entity, ordered by id.
    pub entities: Vec<EntityRecord>,
}

impl ZoneSnapshot {
    /// Convert to the lenient form used by restore.
    ///
    /// # Errors
    /// Fails only if a record cannot be represented as JSON.
    pub fn to_raw(&self) -> crate::error::Result<RawSnapshot> {
        Ok(RawSnapshot {
            zone: self.zone.clone(),
            taken_at: Some(self.taken_at),
            entities: self
                .entities
                .iter()
                .map(serde_json::to_value)
                .collect::<Result<_, _>>()?,
        })
    }
}

/// A snapshot whose entities have not been decoded yet.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawSnapshot {
    /// Zone name.
    #[serde(default)]
    pub zone: String,
    /// When the snapshot was taken, if recorded.
    #[serde(default)]
    pub taken_at: Option<DateTime<Utc>>,
    /// One JSON value per entity.
    #[serde(default)]
    pub entities: Vec<serde_json::Value>,
}

impl RawSnapshot {
    /// Parse a snapshot from JSON text.
    ///
    /// # Errors
    /// Fails if the text is not a JSON object with an `entities` array.
    pub fn from_json(json: &str) -> crate::error::Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

/// An entity that could not be restored.
#[derive(Debug)]
pub struct RestoreError {
    /// Position of the record in the snapshot.
    pub index: usize,
    /// Entity id, if the record got far enough to have one.
    pub entity: Option<EntityId>,
    /// What went wrong.
    pub error: TesseraError,
}

/// Outcome of restoring a snapshot.
#[derive(Debug, Default)]
pub struct RestoreReport {
    /// Entities rebuilt successfully.
    pub restored: Vec<EntityId>,
    /// One entry per entity that was skipped.
    pub errors: Vec<RestoreError>,
}

impl RestoreReport {
    /// Whether every entity was restored.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}
