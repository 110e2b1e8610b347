//! Human-readable names and descriptions.

use serde::{Deserialize, Serialize};
use tessera_core::registry::{ComponentKind, from_record};
use tessera_core::types::{self, EntityId, Record};
use tessera_core::{Component, Zone};

/// Name and description of an entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Named {
    /// Lower-case name as used mid-sentence, e.g. "a sticky key".
    pub name: String,
    /// Shown when the entity is looked at.
    #[serde(default)]
    pub description: String,
}

impl Named {
    /// Kind name.
    pub const KIND: &'static str = "Named";

    /// A named entity with a description.
    #[must_use]
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
        }
    }

    /// The name with its first letter capitalized, for sentence starts.
    #[must_use]
    pub fn title(&self) -> String {
        upper_first(&self.name)
    }

    /// Registration.
    #[must_use]
    pub fn kind() -> ComponentKind {
        ComponentKind::new(Self::KIND, from_record::<Self>)
    }
}

impl Component for Named {
    fn kind(&self) -> &'static str {
        Self::KIND
    }

    fn to_record(&self) -> Record {
        types::encode(self).unwrap_or_default()
    }
}

/// The entity's name, or `something` if it has none.
#[must_use]
pub fn name_of(zone: &Zone, id: EntityId) -> String {
    zone.component::<Named>(id)
        .map_or_else(|| "something".to_string(), |n| n.name.clone())
}

/// The entity's name, capitalized.
#[must_use]
pub fn title_of(zone: &Zone, id: EntityId) -> String {
    upper_first(&name_of(zone, id))
}

fn upper_first(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
