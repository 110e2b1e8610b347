//! Entities: identity plus a component store and an optional mode.

use std::hash::{Hash, Hasher};

use crate::component::ComponentStore;
use crate::mode::ModeState;
use crate::snapshot::{EntityRecord, ModeRecord};
use crate::types::{EntityId, Record};

/// Anything that exists in a zone: a room, an item, a character.
///
/// Entities are created and destroyed through the [`Zone`](crate::zone::Zone),
/// which also keeps its kind index and tick set in sync with the component
/// store. Equality and hashing consider the id only.
#[derive(Debug)]
pub struct Entity {
    id: EntityId,
    hearing: bool,
    mode: Option<Box<dyn ModeState>>,
    components: ComponentStore,
}

impl Entity {
    pub(crate) fn new(id: EntityId) -> Self {
        Self {
            id,
            hearing: false,
            mode: None,
            components: ComponentStore::new(),
        }
    }

    /// Entity id.
    #[must_use]
    pub fn id(&self) -> EntityId {
        self.id
    }

    /// Whether messages told to this entity are delivered.
    #[must_use]
    pub fn hearing(&self) -> bool {
        self.hearing
    }

    pub(crate) fn set_hearing(&mut self, hearing: bool) {
        self.hearing = hearing;
    }

    /// Current mode state.
    #[must_use]
    pub fn mode(&self) -> Option<&dyn ModeState> {
        self.mode.as_deref()
    }

    pub(crate) fn mode_mut(&mut self) -> Option<&mut dyn ModeState> {
        match self.mode.as_mut() {
            Some(mode) => Some(&mut **mode),
            None => None,
        }
    }

    /// Kind name of the current mode.
    #[must_use]
    pub fn mode_kind(&self) -> Option<&'static str> {
        self.mode.as_ref().map(|m| m.kind())
    }

    pub(crate) fn replace_mode(
        &mut self,
        mode: Option<Box<dyn ModeState>>,
    ) -> Option<Box<dyn ModeState>> {
        std::mem::replace(&mut self.mode, mode)
    }

    /// Attached components.
    #[must_use]
    pub fn components(&self) -> &ComponentStore {
        &self.components
    }

    pub(crate) fn components_mut(&mut self) -> &mut ComponentStore {
        &mut self.components
    }

    /// Whether every kind in `kinds` is attached.
    #[must_use]
    pub fn has(&self, kinds: &[&str]) -> bool {
        self.components.has_all(kinds)
    }

    /// Serialize the entity, its mode and its components.
    #[must_use]
    pub fn to_record(&self) -> EntityRecord {
        let components = self
            .components
            .iter()
            .map(|(kind, c)| (kind.to_string(), serde_json::Value::Object(c.to_record())))
            .collect::<Record>();
        EntityRecord {
            id: self.id,
            hearing: self.hearing,
            mode: self.mode.as_ref().map(|m| ModeRecord {
                kind: m.kind().to_string(),
                state: m.to_record(),
            }),
            components,
        }
    }
}

impl PartialEq for Entity {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Entity {}

impl Hash for Entity {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}
