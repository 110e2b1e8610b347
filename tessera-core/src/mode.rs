//! Modes: per-entity command interpreters.
//!
//! An entity's mode decides what its textual input means. [`Explore`] is the
//! default and resolves commands through the registry; content crates add
//! their own modes (confirmation prompts, menus) through
//! [`RegistryBuilder::mode`](crate::registry::RegistryBuilder::mode).

use std::fmt;

use rand::seq::SliceRandom;
use tracing::debug;

use crate::component::AsAny;
use crate::event::Fields;
use crate::pipeline::dispatch;
use crate::registry::ModeKind;
use crate::types::{EntityId, Record};
use crate::zone::Zone;

/// Fallback when no unknown-command replies are configured.
const DEFAULT_UNKNOWN_REPLY: &str = "Unknown command.";

/// Per-entity state of a mode.
pub trait ModeState: AsAny + Send + fmt::Debug {
    /// Registered mode kind name.
    fn kind(&self) -> &'static str;

    /// Serialize state to a flat record.
    fn to_record(&self) -> Record {
        Record::new()
    }
}

impl dyn ModeState {
    /// Downcast to a concrete mode state type.
    #[must_use]
    pub fn downcast_ref<T: ModeState>(&self) -> Option<&T> {
        self.as_any().downcast_ref::<T>()
    }

    /// Downcast to a concrete mode state type, mutably.
    pub fn downcast_mut<T: ModeState>(&mut self) -> Option<&mut T> {
        self.as_any_mut().downcast_mut::<T>()
    }
}

/// Input handed to a mode.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Raw text typed by a player.
    Text(String),
    /// Programmatic invocation of a qualified action.
    Invoke {
        /// Qualified action id.
        action: String,
        /// Fields supplied by the caller.
        fields: Fields,
    },
}

impl Command {
    /// Programmatic invocation.
    #[must_use]
    pub fn invoke(action: impl Into<String>, fields: Fields) -> Self {
        Self::Invoke {
            action: action.into(),
            fields,
        }
    }
}

impl From<&str> for Command {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

impl From<String> for Command {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

/// The default mode: resolve text against every registered action.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Explore;

impl Explore {
    /// Mode kind name.
    pub const KIND: &'static str = "Explore";

    /// Registration for the built-in explore mode.
    #[must_use]
    pub fn mode_kind() -> ModeKind {
        ModeKind::new(
            Self::KIND,
            explore,
            |_| Ok(Box::new(Explore)),
            || Box::new(Explore),
        )
    }
}

impl ModeState for Explore {
    fn kind(&self) -> &'static str {
        Self::KIND
    }
}

/// Interpret a command the way [`Explore`] does.
///
/// Other modes may fall back to this for input they do not handle
/// themselves. Unmatched text gets a randomly chosen unknown-command reply.
///
/// # Errors
/// Fails when an invocation names an unregistered action.
pub fn explore(zone: &mut Zone, actor: EntityId, command: Command) -> anyhow::Result<()> {
    match command {
        Command::Text(text) => match zone.registry().resolve(&text) {
            Some(resolution) => {
                dispatch(zone, actor, &resolution.action, resolution.fields)?;
            }
            None => {
                debug!(entity = %actor, command = %text, "No action matched");
                zone.counters().record_resolution_miss();
                let reply = unknown_command_reply(zone);
                zone.tell(actor, reply);
            }
        },
        Command::Invoke { action, fields } => {
            dispatch(zone, actor, &action, fields)?;
        }
    }
    Ok(())
}

fn unknown_command_reply(zone: &mut Zone) -> String {
    let replies = zone.config().zone.unknown_command_replies.clone();
    replies
        .choose(zone.rng())
        .cloned()
        .unwrap_or_else(|| DEFAULT_UNKNOWN_REPLY.to_string())
}
