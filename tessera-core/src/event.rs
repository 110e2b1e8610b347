//! The event object threaded through one action dispatch.
//!
//! An [`Event`] is a typed attribute bag: fields that were never set read as
//! `None` instead of failing, so interceptors can probe for optional data
//! without knowing which action produced the event.

use std::collections::BTreeMap;
use std::fmt;

use crate::types::EntityId;

/// A single event field value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Free text, e.g. a descriptor captured from the command.
    Text(String),
    /// Reference to an entity in the same zone.
    Entity(EntityId),
    /// Numeric value.
    Number(f64),
    /// Boolean flag.
    Flag(bool),
}

impl From<&str> for Value {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

impl From<String> for Value {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<EntityId> for Value {
    fn from(id: EntityId) -> Self {
        Self::Entity(id)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Self::Number(n)
    }
}

impl From<bool> for Value {
    fn from(flag: bool) -> Self {
        Self::Flag(flag)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(text) => f.write_str(text),
            Self::Entity(id) => write!(f, "#{id}"),
            Self::Number(n) => write!(f, "{n}"),
            Self::Flag(flag) => write!(f, "{flag}"),
        }
    }
}

/// Named fields carried into an action, either captured from a command
/// pattern or supplied by a programmatic call.
pub type Fields = BTreeMap<String, Value>;

/// Build a [`Fields`] map from `(name, value)` pairs.
#[must_use]
pub fn fields<K, V, I>(pairs: I) -> Fields
where
    K: Into<String>,
    V: Into<Value>,
    I: IntoIterator<Item = (K, V)>,
{
    pairs
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect()
}

/// Transient state for one resolved action.
///
/// Created at dispatch start and discarded once the action's phases
/// complete; never persisted.
#[derive(Debug, Clone)]
pub struct Event {
    action: String,
    actor: EntityId,
    prevented: bool,
    fields: Fields,
}

impl Event {
    /// Create an event for `action` performed by `actor`.
    #[must_use]
    pub fn new(action: impl Into<String>, actor: EntityId, fields: Fields) -> Self {
        Self {
            action: action.into(),
            actor,
            prevented: false,
            fields,
        }
    }

    /// Qualified id of the action being dispatched.
    #[must_use]
    pub fn action(&self) -> &str {
        &self.action
    }

    /// The entity performing the action.
    #[must_use]
    pub fn actor(&self) -> EntityId {
        self.actor
    }

    /// Veto the action's default behavior. Once set this cannot be cleared.
    pub fn prevent_default(&mut self) {
        self.prevented = true;
    }

    /// Whether any interceptor has vetoed the default behavior.
    #[must_use]
    pub fn prevented(&self) -> bool {
        self.prevented
    }

    /// Raw field lookup.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// Whether `key` has been set.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }

    /// Text field, or `None` when absent or not text.
    #[must_use]
    pub fn text(&self, key: &str) -> Option<&str> {
        match self.fields.get(key) {
            Some(Value::Text(text)) => Some(text),
            _ => None,
        }
    }

    /// Entity field, or `None` when absent or not an entity.
    #[must_use]
    pub fn entity(&self, key: &str) -> Option<EntityId> {
        match self.fields.get(key) {
            Some(Value::Entity(id)) => Some(*id),
            _ => None,
        }
    }

    /// Numeric field, or `None` when absent or not a number.
    #[must_use]
    pub fn number(&self, key: &str) -> Option<f64> {
        match self.fields.get(key) {
            Some(Value::Number(n)) => Some(*n),
            _ => None,
        }
    }

    /// Boolean field; absent reads as `false`.
    #[must_use]
    pub fn flag(&self, key: &str) -> bool {
        matches!(self.fields.get(key), Some(Value::Flag(true)))
    }

    /// Set or overwrite a field.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.fields.insert(key.into(), value.into());
    }

    /// Remove a field, returning its previous value.
    pub fn unset(&mut self, key: &str) -> Option<Value> {
        self.fields.remove(key)
    }

    /// All fields currently set.
    #[must_use]
    pub fn fields(&self) -> &Fields {
        &self.fields
    }
}
