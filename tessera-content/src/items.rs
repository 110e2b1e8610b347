//! Item aspects: [`StickyBlob`] and [`Usable`].

use rand::Rng;
use serde::{Deserialize, Serialize};
use tessera_core::registry::{ActionDef, ComponentKind, from_record};
use tessera_core::types::{self, EntityId, Record};
use tessera_core::{Component, Event, Flow, Zone};

use crate::named::name_of;
use crate::spatial::{Spatial, nearby, pick};

// ---------------------------------------------------------------------------
// StickyBlob
// ---------------------------------------------------------------------------

fn default_stickiness() -> f64 {
    0.5
}

/// An item that is hard to let go of.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StickyBlob {
    /// Chance in `[0, 1]` that a drop fails.
    #[serde(default = "default_stickiness")]
    pub stickiness: f64,
}

impl Default for StickyBlob {
    fn default() -> Self {
        Self {
            stickiness: default_stickiness(),
        }
    }
}

impl StickyBlob {
    /// Kind name.
    pub const KIND: &'static str = "StickyBlob";

    /// Registration.
    #[must_use]
    pub fn kind() -> ComponentKind {
        ComponentKind::new(Self::KIND, from_record::<Self>).before("Spatial.drop", stick)
    }
}

impl Component for StickyBlob {
    fn kind(&self) -> &'static str {
        Self::KIND
    }

    fn to_record(&self) -> Record {
        types::encode(self).unwrap_or_default()
    }
}

fn stick(zone: &mut Zone, owner: EntityId, event: &mut Event) -> anyhow::Result<()> {
    if event.entity("target") != Some(owner) {
        return Ok(());
    }
    let stickiness = zone
        .component::<StickyBlob>(owner)
        .map_or(0.0, |blob| blob.stickiness);
    if zone.rng().gen_range(0.0..1.0) < stickiness {
        let name = name_of(zone, owner);
        zone.tell(
            event.actor(),
            format!("You try to drop {name}, but it sticks to your hand."),
        );
        event.prevent_default();
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Usable
// ---------------------------------------------------------------------------

/// Provides `use <thing>` and `use <item> on <target>`.
///
/// Both actions do nothing by default; other aspects give them meaning by
/// intercepting and preventing the default reply.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usable;

impl Usable {
    /// Kind name.
    pub const KIND: &'static str = "Usable";

    /// Registration.
    #[must_use]
    pub fn kind() -> ComponentKind {
        ComponentKind::new(Self::KIND, from_record::<Self>)
            .action(
                ActionDef::new("use", r"^use (?P<descriptor>.+)$")
                    .prepare(use_prepare)
                    .run(use_run),
            )
            .action(
                ActionDef::new(
                    "use_on",
                    r"^use (?P<item_descriptor>.+) on (?P<target_descriptor>.+)$",
                )
                .prepare(use_on_prepare)
                .run(use_on_run),
            )
    }
}

impl Component for Usable {
    fn kind(&self) -> &'static str {
        Self::KIND
    }
}

/// Resolve `descriptor` among the actor's surroundings, telling the actor
/// when nothing fits.
fn pick_nearby(zone: &mut Zone, actor: EntityId, descriptor: &str) -> Option<EntityId> {
    let found = pick(zone, &nearby(zone, actor), descriptor);
    if found.is_none() {
        zone.tell(actor, format!("You don't see \"{descriptor}\" here."));
    }
    found
}

fn use_prepare(zone: &mut Zone, event: &mut Event) -> anyhow::Result<Flow> {
    let actor = event.actor();
    if !zone.has(actor, &[Spatial::KIND]) {
        zone.tell(actor, "You're unable to do that.");
        return Ok(Flow::Halt);
    }
    let descriptor = event.text("descriptor").unwrap_or_default().to_string();
    let Some(target) = pick_nearby(zone, actor, &descriptor) else {
        return Ok(Flow::Halt);
    };
    event.set("target", target);
    Ok(Flow::witnessed_by(vec![actor, target]))
}

fn use_run(zone: &mut Zone, event: &mut Event) -> anyhow::Result<()> {
    if !event.prevented() {
        zone.tell(event.actor(), "You can't use that.");
    }
    Ok(())
}

fn use_on_prepare(zone: &mut Zone, event: &mut Event) -> anyhow::Result<Flow> {
    let actor = event.actor();
    if !zone.has(actor, &[Spatial::KIND]) {
        zone.tell(actor, "You're unable to do that.");
        return Ok(Flow::Halt);
    }
    let item_descriptor = event.text("item_descriptor").unwrap_or_default().to_string();
    let Some(item) = pick_nearby(zone, actor, &item_descriptor) else {
        return Ok(Flow::Halt);
    };
    let target_descriptor = event.text("target_descriptor").unwrap_or_default().to_string();
    let Some(target) = pick_nearby(zone, actor, &target_descriptor) else {
        return Ok(Flow::Halt);
    };
    event.set("item", item);
    event.set("target", target);

    let mut witnesses = vec![actor, item];
    if target != item {
        witnesses.push(target);
    }
    Ok(Flow::witnessed_by(witnesses))
}

fn use_on_run(zone: &mut Zone, event: &mut Event) -> anyhow::Result<()> {
    if !event.prevented() {
        zone.tell(event.actor(), "Nothing happens.");
    }
    Ok(())
}
