//! Containment and the everyday actions built on it.
//!
//! An entity with [`Spatial`] sits inside at most one container. Rooms are
//! spatial entities without a container; a character's inventory is simply
//! the set of entities whose container is that character. Contents are
//! derived from the containers, never stored twice.
//!
//! | action          | command                         | witnesses                    |
//! |-----------------|---------------------------------|------------------------------|
//! | `Spatial.say`   | `say <message>`, `'<message>`   | everyone in the room         |
//! | `Spatial.look`  | `look`, `look [at] <thing>`     | actor, target                |
//! | `Spatial.get`   | `get <thing>`, `take <thing>`   | actor, item, room-mates      |
//! | `Spatial.drop`  | `drop <thing>`                  | actor, item, room-mates      |
//! | `Spatial.inventory` | `i`, `inv`, `inventory`     | actor                        |

use serde::{Deserialize, Serialize};
use tessera_core::registry::{ActionDef, ComponentKind, from_record};
use tessera_core::types::{self, EntityId, Record};
use tessera_core::{Component, Event, Flow, Zone};

use crate::named::{Named, name_of, title_of};

/// Position in the containment tree.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Spatial {
    /// The entity this one is inside, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub container: Option<EntityId>,
}

impl Spatial {
    /// Kind name.
    pub const KIND: &'static str = "Spatial";

    /// A top-level entity such as a room.
    #[must_use]
    pub fn root() -> Self {
        Self::default()
    }

    /// An entity placed inside `container`.
    #[must_use]
    pub fn inside(container: EntityId) -> Self {
        Self {
            container: Some(container),
        }
    }

    /// Registration.
    #[must_use]
    pub fn kind() -> ComponentKind {
        ComponentKind::new(Self::KIND, from_record::<Self>)
            .action(
                ActionDef::new("say", r"^(?:say |')(?P<message>.+)$")
                    .prepare(say_prepare)
                    .run(say_run),
            )
            .action(
                ActionDef::new("look", r"^l(?:ook)?(?: at)?(?: (?P<descriptor>.+))?$")
                    .prepare(look_prepare)
                    .run(look_run),
            )
            .action(
                ActionDef::new("get", r"^(?:get|take) (?P<descriptor>.+)$")
                    .prepare(get_prepare)
                    .run(get_run),
            )
            .action(
                ActionDef::new("drop", r"^drop (?P<descriptor>.+)$")
                    .prepare(drop_prepare)
                    .run(drop_run),
            )
            .action(
                ActionDef::new("inventory", r"^(?:i|inv|inventory)$")
                    .prepare(inventory_prepare)
                    .run(inventory_run),
            )
    }
}

impl Component for Spatial {
    fn kind(&self) -> &'static str {
        Self::KIND
    }

    fn to_record(&self) -> Record {
        types::encode(self).unwrap_or_default()
    }
}

// ---------------------------------------------------------------------------
// Queries
// ---------------------------------------------------------------------------

/// The entity's container.
#[must_use]
pub fn container_of(zone: &Zone, id: EntityId) -> Option<EntityId> {
    zone.component::<Spatial>(id)?.container
}

/// Everything directly inside `container`, ascending by id.
#[must_use]
pub fn contents_of(zone: &Zone, container: EntityId) -> Vec<EntityId> {
    zone.with_kind(Spatial::KIND)
        .into_iter()
        .filter(|id| container_of(zone, *id) == Some(container))
        .collect()
}

/// Everyone sharing the entity's container, excluding the entity itself.
#[must_use]
pub fn room_mates(zone: &Zone, id: EntityId) -> Vec<EntityId> {
    container_of(zone, id)
        .map(|room| contents_of(zone, room))
        .unwrap_or_default()
        .into_iter()
        .filter(|other| *other != id)
        .collect()
}

/// Move `thing` into `container`.
///
/// # Errors
/// Fails if `thing` is not spatial or `container` does not exist.
pub fn place(zone: &mut Zone, thing: EntityId, container: EntityId) -> anyhow::Result<()> {
    anyhow::ensure!(zone.contains(container), "container {container} does not exist");
    let spatial = zone
        .component_mut::<Spatial>(thing)
        .ok_or_else(|| anyhow::anyhow!("entity {thing} is not spatial"))?;
    spatial.container = Some(container);
    Ok(())
}

/// Tell every room-mate of `source` the same thing.
pub fn emit(zone: &mut Zone, source: EntityId, message: &str) {
    for other in room_mates(zone, source) {
        zone.tell(other, message);
    }
}

/// Find one of `candidates` by `#id` or by name.
///
/// Exact names win over partial ones; among equals the lowest id wins.
#[must_use]
pub fn pick(zone: &Zone, candidates: &[EntityId], descriptor: &str) -> Option<EntityId> {
    let descriptor = descriptor.trim();
    if let Some(raw) = descriptor.strip_prefix('#') {
        let id = EntityId(raw.parse().ok()?);
        return candidates.contains(&id).then_some(id);
    }

    let wanted = descriptor.to_lowercase();
    let names: Vec<(EntityId, String)> = candidates
        .iter()
        .filter_map(|id| {
            zone.component::<Named>(*id)
                .map(|n| (*id, n.name.to_lowercase()))
        })
        .collect();
    names
        .iter()
        .find(|(_, name)| *name == wanted)
        .or_else(|| names.iter().find(|(_, name)| name.contains(&wanted)))
        .map(|(id, _)| *id)
}

/// Things the actor can refer to: its inventory, then the room and whatever
/// else is in it.
#[must_use]
pub fn nearby(zone: &Zone, actor: EntityId) -> Vec<EntityId> {
    let mut found = contents_of(zone, actor);
    if let Some(room) = container_of(zone, actor) {
        found.push(room);
        found.extend(room_mates(zone, actor));
    }
    found
}

fn everyone_here(zone: &Zone, actor: EntityId) -> Vec<EntityId> {
    let mut witnesses = vec![actor];
    witnesses.extend(room_mates(zone, actor));
    witnesses
}

fn require_spatial(zone: &mut Zone, actor: EntityId) -> bool {
    if zone.has(actor, &[Spatial::KIND]) {
        return true;
    }
    zone.tell(actor, "You're unable to do that.");
    false
}

fn descriptor(event: &Event) -> String {
    event.text("descriptor").unwrap_or_default().to_string()
}

fn target(event: &Event) -> anyhow::Result<EntityId> {
    event
        .entity("target")
        .ok_or_else(|| anyhow::anyhow!("{} ran without a target", event.action()))
}

/// Comma-separated names, or `None` for an empty list.
fn listing(zone: &Zone, ids: &[EntityId]) -> Option<String> {
    (!ids.is_empty()).then(|| {
        ids.iter()
            .map(|id| name_of(zone, *id))
            .collect::<Vec<_>>()
            .join(", ")
    })
}

// ---------------------------------------------------------------------------
// say
// ---------------------------------------------------------------------------

fn say_prepare(zone: &mut Zone, event: &mut Event) -> anyhow::Result<Flow> {
    let actor = event.actor();
    if !require_spatial(zone, actor) {
        return Ok(Flow::Halt);
    }
    Ok(Flow::witnessed_by(everyone_here(zone, actor)))
}

fn say_run(zone: &mut Zone, event: &mut Event) -> anyhow::Result<()> {
    if event.prevented() {
        return Ok(());
    }
    let actor = event.actor();
    let message = event.text("message").unwrap_or_default().to_string();
    zone.tell(actor, format!("You say, \"{message}\"."));
    let heard = format!("{} says, \"{message}\".", title_of(zone, actor));
    emit(zone, actor, &heard);
    Ok(())
}

// ---------------------------------------------------------------------------
// look
// ---------------------------------------------------------------------------

fn look_prepare(zone: &mut Zone, event: &mut Event) -> anyhow::Result<Flow> {
    let actor = event.actor();
    if !require_spatial(zone, actor) {
        return Ok(Flow::Halt);
    }

    let wanted = descriptor(event);
    let target = if wanted.is_empty() {
        container_of(zone, actor)
    } else {
        pick(zone, &nearby(zone, actor), &wanted)
    };
    let Some(target) = target else {
        if wanted.is_empty() {
            zone.tell(actor, "You see nothing here.");
        } else {
            zone.tell(actor, format!("You don't see \"{wanted}\" here."));
        }
        return Ok(Flow::Halt);
    };

    event.set("target", target);
    Ok(Flow::witnessed_by(vec![actor, target]))
}

fn look_run(zone: &mut Zone, event: &mut Event) -> anyhow::Result<()> {
    if event.prevented() {
        return Ok(());
    }
    let actor = event.actor();
    let target = target(event)?;

    let title = title_of(zone, target);
    zone.tell(actor, title);
    let description = zone
        .component::<Named>(target)
        .map(|n| n.description.clone())
        .unwrap_or_default();
    if !description.is_empty() {
        zone.tell(actor, description);
    }

    let visible: Vec<_> = contents_of(zone, target)
        .into_iter()
        .filter(|id| *id != actor)
        .collect();
    if let Some(list) = listing(zone, &visible) {
        let lead = if Some(target) == container_of(zone, actor) {
            "You see"
        } else {
            "It holds"
        };
        zone.tell(actor, format!("{lead}: {list}."));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// get
// ---------------------------------------------------------------------------

fn get_prepare(zone: &mut Zone, event: &mut Event) -> anyhow::Result<Flow> {
    let actor = event.actor();
    if !require_spatial(zone, actor) {
        return Ok(Flow::Halt);
    }

    let wanted = descriptor(event);
    let Some(item) = pick(zone, &room_mates(zone, actor), &wanted) else {
        zone.tell(actor, format!("You don't see \"{wanted}\" here."));
        return Ok(Flow::Halt);
    };
    if zone.get(item).is_some_and(|e| e.mode().is_some()) {
        let name = name_of(zone, item);
        zone.tell(actor, format!("You can't pick up {name}."));
        return Ok(Flow::Halt);
    }

    event.set("target", item);
    let mut witnesses = vec![actor, item];
    witnesses.extend(room_mates(zone, actor).into_iter().filter(|id| *id != item));
    Ok(Flow::witnessed_by(witnesses))
}

fn get_run(zone: &mut Zone, event: &mut Event) -> anyhow::Result<()> {
    if event.prevented() {
        return Ok(());
    }
    let actor = event.actor();
    let item = target(event)?;
    place(zone, item, actor)?;

    let name = name_of(zone, item);
    zone.tell(actor, format!("You pick up {name}."));
    let seen = format!("{} picks up {name}.", title_of(zone, actor));
    emit(zone, actor, &seen);
    Ok(())
}

// ---------------------------------------------------------------------------
// drop
// ---------------------------------------------------------------------------

fn drop_prepare(zone: &mut Zone, event: &mut Event) -> anyhow::Result<Flow> {
    let actor = event.actor();
    if !require_spatial(zone, actor) {
        return Ok(Flow::Halt);
    }

    let wanted = descriptor(event);
    let Some(item) = pick(zone, &contents_of(zone, actor), &wanted) else {
        zone.tell(actor, format!("You aren't carrying \"{wanted}\"."));
        return Ok(Flow::Halt);
    };
    if container_of(zone, actor).is_none() {
        zone.tell(actor, "There is nowhere to drop that.");
        return Ok(Flow::Halt);
    }

    event.set("target", item);
    let mut witnesses = vec![actor, item];
    witnesses.extend(room_mates(zone, actor));
    Ok(Flow::witnessed_by(witnesses))
}

fn drop_run(zone: &mut Zone, event: &mut Event) -> anyhow::Result<()> {
    if event.prevented() {
        return Ok(());
    }
    let actor = event.actor();
    let item = target(event)?;
    let room = container_of(zone, actor)
        .ok_or_else(|| anyhow::anyhow!("actor {actor} left the room mid-drop"))?;
    place(zone, item, room)?;

    let name = name_of(zone, item);
    zone.tell(actor, format!("You drop {name}."));
    let seen = format!("{} drops {name}.", title_of(zone, actor));
    emit(zone, actor, &seen);
    Ok(())
}

// ---------------------------------------------------------------------------
// inventory
// ---------------------------------------------------------------------------

fn inventory_prepare(zone: &mut Zone, event: &mut Event) -> anyhow::Result<Flow> {
    Ok(if require_spatial(zone, event.actor()) {
        Flow::before()
    } else {
        Flow::Halt
    })
}

fn inventory_run(zone: &mut Zone, event: &mut Event) -> anyhow::Result<()> {
    if event.prevented() {
        return Ok(());
    }
    let actor = event.actor();
    let carried = contents_of(zone, actor);
    match listing(zone, &carried) {
        Some(list) => zone.tell(actor, format!("You are carrying: {list}.")),
        None => zone.tell(actor, "You aren't carrying anything."),
    }
    Ok(())
}
