//! # Tessera Core Library
//!
//! Content-agnostic engine for text-driven multi-user worlds.
//!
//! Everything in a world (rooms, items, characters) is an entity, and all
//! behavior comes from the components attached to it:
//!
//! - **Registry**: every component kind and mode kind, with the actions,
//!   interceptors and tick callbacks they declare
//! - **Resolver**: raw text to the best-matching action plus captured fields
//! - **Pipeline**: prepare, hook points, run, with veto through
//!   `prevent_default`
//! - **Zone**: the single owner of a set of entities, their tick set, and
//!   the inbound/outbound queues
//! - **Snapshots**: lossless entity records with lenient, per-entity restore
//!
//! ## Re-entrancy
//!
//! Components hold state only. Behavior lives in plain functions that
//! receive `&mut Zone`, so an interceptor can dispatch further actions,
//! attach or detach components, or destroy entities without any interior
//! mutability.

#![deny(clippy::unwrap_used)]
#![deny(missing_docs)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod component;
pub mod config;
pub mod entity;
pub mod error;
pub mod event;
pub mod inbound;
pub mod metrics;
pub mod mode;
pub mod persistence;
pub mod pipeline;
pub mod registry;
pub mod snapshot;
pub mod types;
pub mod zone;

pub use component::{Component, ComponentStore};
pub use config::ZoneConfig;
pub use entity::Entity;
pub use error::TesseraError;
pub use event::{Event, Fields, Value};
pub use mode::{Command, Explore, ModeState};
pub use pipeline::{Flow, HookPoint, Outcome, Phase, dispatch};
pub use registry::{ActionDef, ComponentKind, ModeKind, Registry, RegistryBuilder};
pub use snapshot::{EntityRecord, RawSnapshot, RestoreReport, ZoneSnapshot};
pub use types::*;
pub use zone::{OutboundMessage, Zone, ZoneHandle};
