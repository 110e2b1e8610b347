//! Error types for the tessera engine.

use thiserror::Error;

use crate::types::EntityId;

/// Top-level error type for all engine operations.
///
/// Content callbacks (actions, interceptors, ticks) report their own faults
/// through `anyhow::Error`; those are caught by the engine and never surface
/// here.
#[derive(Error, Debug)]
pub enum TesseraError {
    /// A component kind was registered twice.
    #[error("Component kind registered twice: {0}")]
    DuplicateKind(String),

    /// A mode kind was registered twice.
    #[error("Mode kind registered twice: {0}")]
    DuplicateMode(String),

    /// Two actions resolved to the same qualified id.
    #[error("Action declared twice: {0}")]
    DuplicateAction(String),

    /// An action pattern failed to compile.
    #[error("Invalid pattern for action {action}: {reason}")]
    InvalidPattern {
        /// Qualified action id.
        action: String,
        /// Compiler message from `regex`.
        reason: String,
    },

    /// A component kind hooks an action nobody declares.
    #[error("Component kind {kind} hooks undeclared action {action}")]
    UnknownHookTarget {
        /// Kind declaring the interceptor.
        kind: String,
        /// The action it tries to intercept.
        action: String,
    },

    /// A snapshot or command referenced a component kind that is not registered.
    #[error("Unknown component kind: {0}")]
    UnknownKind(String),

    /// A snapshot referenced a mode kind that is not registered.
    #[error("Unknown mode kind: {0}")]
    UnknownMode(String),

    /// A programmatic call referenced an action that is not registered.
    #[error("Unknown action: {0}")]
    UnknownAction(String),

    /// Entity not found in the zone.
    #[error("Entity not found: {0}")]
    EntityNotFound(EntityId),

    /// The id is the last one representable, so no id can follow it.
    #[error("Entity id out of range: {0}")]
    IdOutOfRange(EntityId),

    /// An entity with this id already lives in the zone.
    #[error("Entity already exists: {0}")]
    DuplicateEntity(EntityId),

    /// The entity already holds a component of this kind.
    #[error("Entity {entity} already has component {kind}")]
    AlreadyAttached {
        /// Target entity.
        entity: EntityId,
        /// Kind being attached.
        kind: String,
    },

    /// The entity holds no component of this kind.
    #[error("Entity {entity} has no component {kind}")]
    NotAttached {
        /// Target entity.
        entity: EntityId,
        /// Kind being detached.
        kind: String,
    },

    /// Component or mode state could not be rebuilt from its record.
    #[error("Malformed record for {kind}: {reason}")]
    Record {
        /// Component or mode kind.
        kind: String,
        /// Decoder message.
        reason: String,
    },

    /// Serialization or deserialization failure.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// SQLite persistence error.
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Generic I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for TesseraError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// Convenience Result type alias.
pub type Result<T> = std::result::Result<T, TesseraError>;
