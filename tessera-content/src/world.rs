//! A small demo world for the runner and the content tests.

use tessera_core::error::Result;
use tessera_core::{EntityId, Explore, Zone};
use tracing::info;

use crate::admin::Admin;
use crate::creatures::{Bird, Psychic};
use crate::items::{StickyBlob, Usable};
use crate::named::Named;
use crate::spatial::Spatial;

/// Ids of everything [`seed`] created.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DemoWorld {
    /// The only room.
    pub room: EntityId,
    /// A hearing admin character standing in the room.
    pub player: EntityId,
    /// A sticky key lying in the room.
    pub key: EntityId,
    /// A lever nobody has given a purpose yet.
    pub lever: EntityId,
    /// A chatty sparrow.
    pub sparrow: EntityId,
    /// A parrot in explore mode that repeats what it hears.
    pub parrot: EntityId,
}

/// Spawn a character who can act and hear, standing in `room`.
///
/// # Errors
/// Fails if `room` does not exist or a kind is not registered.
pub fn character(zone: &mut Zone, room: EntityId, name: &str) -> Result<EntityId> {
    let id = zone.spawn_with(vec![
        Box::new(Named::new(name, format!("{name} looks around expectantly."))),
        Box::new(Spatial::inside(room)),
    ])?;
    zone.set_hearing(id, true)?;
    zone.enter_mode(id, Explore::KIND)?;
    Ok(id)
}

/// Populate an empty zone with a courtyard and a few things to try.
///
/// # Errors
/// Fails if a stock kind is missing from the zone's registry.
pub fn seed(zone: &mut Zone) -> Result<DemoWorld> {
    let room = zone.spawn_with(vec![
        Box::new(Named::new(
            "the courtyard",
            "Ivy climbs the walls of a quiet, sunlit courtyard.",
        )),
        Box::new(Spatial::root()),
    ])?;

    let player = character(zone, room, "the caretaker")?;
    zone.attach(player, Box::new(Admin::default()))?;

    let key = zone.spawn_with(vec![
        Box::new(Named::new("a sticky key", "It glistens with something viscous.")),
        Box::new(Spatial::inside(room)),
        Box::new(StickyBlob { stickiness: 0.5 }),
    ])?;
    let lever = zone.spawn_with(vec![
        Box::new(Named::new("a rusty lever", "It is set into the wall.")),
        Box::new(Spatial::inside(room)),
        Box::new(Usable),
    ])?;
    let sparrow = zone.spawn_with(vec![
        Box::new(Named::new("a sparrow", "A small brown bird.")),
        Box::new(Spatial::inside(room)),
        Box::new(Bird::default()),
    ])?;
    let parrot = zone.spawn_with(vec![
        Box::new(Named::new("a parrot", "It watches you with one beady eye.")),
        Box::new(Spatial::inside(room)),
        Box::new(Psychic),
        Box::new(Bird {
            noisiness: 0.02,
            noise: "squawk".to_string(),
        }),
    ])?;
    zone.enter_mode(parrot, Explore::KIND)?;

    info!(zone = %zone.name(), entities = zone.len(), "Demo world seeded");
    Ok(DemoWorld {
        room,
        player,
        key,
        lever,
        sparrow,
        parrot,
    })
}
