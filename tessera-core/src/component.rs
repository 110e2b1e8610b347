//! Component instances and the per-entity component store.
//!
//! A component holds state only. Its behavior (actions, interceptors, tick)
//! is declared once on its [`ComponentKind`](crate::registry::ComponentKind)
//! and reaches the instance through the zone, which keeps every callback free
//! of long-lived borrows and makes re-entrant dispatch safe.

use std::any::Any;
use std::fmt;

use crate::types::{EntityId, Record};

/// Downcasting support for trait objects.
///
/// Implemented for every `'static` type; always call it on the trait object
/// itself (`&dyn Component`), not on a `Box`.
pub trait AsAny: Any {
    /// Borrow as `&dyn Any`.
    fn as_any(&self) -> &dyn Any;
    /// Borrow as `&mut dyn Any`.
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Any> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// State attached to one entity.
pub trait Component: AsAny + Send + fmt::Debug {
    /// Registered kind name. Must match the name of the
    /// [`ComponentKind`](crate::registry::ComponentKind) that decodes it.
    fn kind(&self) -> &'static str;

    /// Serialize state to a flat record.
    fn to_record(&self) -> Record {
        Record::new()
    }

    /// Called after the component is bound to `owner`.
    fn on_attach(&mut self, _owner: EntityId) {}

    /// Called before the component is removed from `owner`.
    fn on_detach(&mut self, _owner: EntityId) {}
}

impl dyn Component {
    /// Downcast to a concrete component type.
    #[must_use]
    pub fn downcast_ref<T: Component>(&self) -> Option<&T> {
        self.as_any().downcast_ref::<T>()
    }

    /// Downcast to a concrete component type, mutably.
    pub fn downcast_mut<T: Component>(&mut self) -> Option<&mut T> {
        self.as_any_mut().downcast_mut::<T>()
    }
}

/// Attachment-ordered map from kind name to component instance.
///
/// An entity holds at most one instance per kind. Iteration order is the
/// order components were attached, which is the order interceptors fire in.
#[derive(Debug, Default)]
pub struct ComponentStore {
    slots: Vec<(&'static str, Box<dyn Component>)>,
}

impl ComponentStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a component. Returns it back if the kind is already present.
    pub(crate) fn insert(
        &mut self,
        kind: &'static str,
        component: Box<dyn Component>,
    ) -> Result<(), Box<dyn Component>> {
        if self.has(kind) {
            return Err(component);
        }
        self.slots.push((kind, component));
        Ok(())
    }

    /// Remove the component of `kind`, if attached.
    pub(crate) fn remove(&mut self, kind: &str) -> Option<Box<dyn Component>> {
        let index = self.slots.iter().position(|(k, _)| *k == kind)?;
        Some(self.slots.remove(index).1)
    }

    /// Component of `kind`, or `None` when not attached.
    #[must_use]
    pub fn get(&self, kind: &str) -> Option<&dyn Component> {
        self.slots
            .iter()
            .find(|(k, _)| *k == kind)
            .map(|(_, c)| &**c)
    }

    /// Mutable component of `kind`, or `None` when not attached.
    pub fn get_mut(&mut self, kind: &str) -> Option<&mut dyn Component> {
        match self.slots.iter_mut().find(|(k, _)| *k == kind) {
            Some((_, c)) => Some(&mut **c),
            None => None,
        }
    }

    /// First attached component of concrete type `T`.
    #[must_use]
    pub fn get_as<T: Component>(&self) -> Option<&T> {
        self.slots
            .iter()
            .find_map(|(_, c)| (**c).downcast_ref::<T>())
    }

    /// First attached component of concrete type `T`, mutably.
    pub fn get_as_mut<T: Component>(&mut self) -> Option<&mut T> {
        self.slots
            .iter_mut()
            .find_map(|(_, c)| (**c).downcast_mut::<T>())
    }

    /// Whether a component of `kind` is attached.
    #[must_use]
    pub fn has(&self, kind: &str) -> bool {
        self.slots.iter().any(|(k, _)| *k == kind)
    }

    /// Whether components of every kind in `kinds` are attached.
    #[must_use]
    pub fn has_all(&self, kinds: &[&str]) -> bool {
        kinds.iter().all(|kind| self.has(kind))
    }

    /// Attached kind names in attachment order.
    #[must_use]
    pub fn kinds(&self) -> Vec<&'static str> {
        self.slots.iter().map(|(k, _)| *k).collect()
    }

    /// Iterate `(kind, component)` in attachment order.
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &dyn Component)> + '_ {
        self.slots.iter().map(|(k, c)| (*k, &**c))
    }

    /// Number of attached components.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Whether no components are attached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}
