//! # tessera-content: Stock Aspects for Tessera
//!
//! The plugin layer on top of the content-agnostic `tessera-core` engine.
//! Nothing here is special to the engine: every aspect registers through
//! the same [`ComponentKind`](tessera_core::ComponentKind) builder a game
//! would use.
//!
//! ## Modules
//!
//! - `named`: names and descriptions
//! - `spatial`: containment plus `say`, `look`, `get`, `drop`, `inventory`
//! - `items`: `StickyBlob` (hard to drop) and `Usable` (`use`, `use ... on`)
//! - `creatures`: `Psychic` (repeats speech) and `Bird` (ticking noise)
//! - `admin`: `!query`, `!inspect`, `!spawn`, `!destroy`, `!edit`, `!alias`
//! - `confirm`: the yes/no mode behind `!destroy`
//! - `world`: a demo world for the `tessera` runner

#![deny(clippy::unwrap_used)]
#![deny(missing_docs)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

use std::sync::Arc;

use tessera_core::error::Result;
use tessera_core::{Registry, RegistryBuilder};

pub mod admin;
pub mod confirm;
pub mod creatures;
pub mod items;
pub mod named;
pub mod spatial;
pub mod world;

pub use admin::Admin;
pub use confirm::Confirm;
pub use creatures::{Bird, Psychic};
pub use items::{StickyBlob, Usable};
pub use named::Named;
pub use spatial::Spatial;

/// A builder with every stock kind and mode registered, ready for a game to
/// add its own.
///
/// # Errors
/// Only fails if a stock kind collides with another, which is a bug.
pub fn registry_builder() -> Result<RegistryBuilder> {
    Registry::builder()
        .component(Named::kind())?
        .component(Spatial::kind())?
        .component(StickyBlob::kind())?
        .component(Usable::kind())?
        .component(Psychic::kind())?
        .component(Bird::kind())?
        .component(Admin::kind())?
        .mode(Confirm::mode_kind())
}

/// The stock registry, built and shared.
///
/// # Errors
/// Propagates registration and pattern errors.
pub fn default_registry() -> Result<Arc<Registry>> {
    Ok(Arc::new(registry_builder()?.build()?))
}
