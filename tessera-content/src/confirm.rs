//! A yes/no prompt as a mode of its own.
//!
//! While an entity is in [`Confirm`], its next command is an answer rather
//! than an action: `yes` or `y` carries out the pending operation, anything
//! else cancels it. Either way the entity returns to
//! [`Explore`](tessera_core::Explore).

use serde::{Deserialize, Serialize};
use tessera_core::registry::{ModeKind, normalize};
use tessera_core::types::{self, EntityId, Record};
use tessera_core::{Command, Explore, ModeState, Zone};
use tracing::info;

/// What the prompt is waiting to do.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Pending {
    /// Nothing; any answer just returns to exploring.
    #[default]
    Nothing,
    /// Destroy this entity.
    Destroy {
        /// Entity to destroy.
        target: EntityId,
    },
}

/// Mode state of an entity that owes an answer.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Confirm {
    /// The operation awaiting the answer.
    #[serde(default)]
    pub pending: Pending,
}

impl Confirm {
    /// Mode kind name.
    pub const KIND: &'static str = "Confirm";

    /// Prompt for destroying `target`.
    #[must_use]
    pub fn destroy(target: EntityId) -> Self {
        Self {
            pending: Pending::Destroy { target },
        }
    }

    /// Registration.
    #[must_use]
    pub fn mode_kind() -> ModeKind {
        ModeKind::new(
            Self::KIND,
            answer,
            |record| Ok(Box::new(types::decode::<Confirm>(record)?)),
            || Box::new(Confirm::default()),
        )
    }
}

impl ModeState for Confirm {
    fn kind(&self) -> &'static str {
        Self::KIND
    }

    fn to_record(&self) -> Record {
        types::encode(self).unwrap_or_default()
    }
}

fn answer(zone: &mut Zone, actor: EntityId, command: Command) -> anyhow::Result<()> {
    let pending = zone
        .mode_state::<Confirm>(actor)
        .map(|c| c.pending)
        .ok_or_else(|| anyhow::anyhow!("entity {actor} is not awaiting confirmation"))?;
    let accepted = match &command {
        Command::Text(text) => matches!(normalize(text).to_lowercase().as_str(), "yes" | "y"),
        Command::Invoke { .. } => false,
    };

    zone.set_mode(actor, Some(Box::new(Explore)))?;
    if !accepted {
        zone.tell(actor, "Cancelled.");
        return Ok(());
    }

    match pending {
        Pending::Nothing => zone.tell(actor, "There is nothing to confirm."),
        Pending::Destroy { target } => {
            if zone.contains(target) {
                zone.destroy(target)?;
                info!(admin = %actor, entity = %target, "Admin destroyed entity");
                zone.tell(actor, format!("Destroyed [{target}]."));
            } else {
                zone.tell(actor, "No such entity.");
            }
        }
    }
    Ok(())
}
