//! Shared fixtures for the engine integration tests.
//!
//! A handful of tiny aspects that exercise the pipeline without any real
//! game content: targets are addressed by numeric id only.

#![allow(dead_code)]

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use tessera_core::config::ZoneConfig;
use tessera_core::pipeline::{Flow, dispatch};
use tessera_core::registry::{ActionDef, ComponentKind, Registry, from_record};
use tessera_core::types::{self, EntityId, Record};
use tessera_core::{Component, Event, Explore, Zone, ZoneHandle};

// ---------------------------------------------------------------------------
// Message capture
// ---------------------------------------------------------------------------

/// Every message delivered so far, as `(entity, text)`.
pub fn drain(handle: &ZoneHandle) -> Vec<(EntityId, String)> {
    handle
        .outbound
        .try_iter()
        .map(|m| {
            let text = serde_json::from_str::<String>(&m.payload).unwrap_or(m.payload);
            (m.entity, text)
        })
        .collect()
}

/// Messages delivered to `entity`, in order.
pub fn heard(handle: &ZoneHandle, entity: EntityId) -> Vec<String> {
    drain(handle)
        .into_iter()
        .filter(|(e, _)| *e == entity)
        .map(|(_, text)| text)
        .collect()
}

/// Assert that some message contains `needle`.
pub fn assert_saw(messages: &[String], needle: &str) {
    assert!(
        messages.iter().any(|m| m.contains(needle)),
        "{needle:?} not found in {messages:?}"
    );
}

// ---------------------------------------------------------------------------
// Helpers shared by the fixture actions
// ---------------------------------------------------------------------------

fn target_from_descriptor(zone: &mut Zone, event: &mut Event) -> Option<EntityId> {
    let descriptor = event.text("descriptor").unwrap_or_default().to_string();
    let target = descriptor.parse::<u64>().ok().map(EntityId).filter(|id| zone.contains(*id));
    match target {
        Some(id) => {
            event.set("target", id);
            Some(id)
        }
        None => {
            zone.tell(event.actor(), format!("No such entity {descriptor:?}."));
            None
        }
    }
}

fn everyone(zone: &Zone) -> Vec<EntityId> {
    zone.entities().collect()
}

fn append_trail(event: &mut Event, mark: String) {
    let trail = match event.text("trail") {
        Some(t) if !t.is_empty() => format!("{t},{mark}"),
        _ => mark,
    };
    event.set("trail", trail);
}

// ---------------------------------------------------------------------------
// Visible
// ---------------------------------------------------------------------------

/// Lets its holder look at entities by id. Everyone witnesses the look.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct Visible;

impl Component for Visible {
    fn kind(&self) -> &'static str {
        "Visible"
    }
}

fn look_prepare(zone: &mut Zone, event: &mut Event) -> anyhow::Result<Flow> {
    Ok(match target_from_descriptor(zone, event) {
        Some(_) => Flow::witnessed_by(everyone(zone)),
        None => Flow::Halt,
    })
}

fn look_run(zone: &mut Zone, event: &mut Event) -> anyhow::Result<()> {
    if event.prevented() {
        return Ok(());
    }
    if let Some(target) = event.entity("target") {
        zone.tell(event.actor(), format!("You see #{target}."));
    }
    Ok(())
}

fn visible_kind() -> ComponentKind {
    ComponentKind::new("Visible", from_record::<Visible>).action(
        ActionDef::new("look_at", r"^l(?:ook)?(?: at)? (?P<descriptor>.+)")
            .prepare(look_prepare)
            .run(look_run),
    )
}

// ---------------------------------------------------------------------------
// Colorful
// ---------------------------------------------------------------------------

/// Stateful aspect with two actions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Colorful {
    pub color: String,
}

impl Colorful {
    pub fn new(color: &str) -> Self {
        Self {
            color: color.to_string(),
        }
    }
}

impl Component for Colorful {
    fn kind(&self) -> &'static str {
        "Colorful"
    }

    fn to_record(&self) -> Record {
        types::encode(self).unwrap_or_default()
    }
}

fn colorful_target(zone: &mut Zone, event: &mut Event, refusal: &str) -> Flow {
    let Some(target) = target_from_descriptor(zone, event) else {
        return Flow::Halt;
    };
    if zone.component::<Colorful>(target).is_none() {
        zone.tell(event.actor(), format!("#{target} {refusal}."));
        return Flow::Halt;
    }
    Flow::witnessed_by(everyone(zone))
}

fn color_of_prepare(zone: &mut Zone, event: &mut Event) -> anyhow::Result<Flow> {
    Ok(colorful_target(zone, event, "has no particular color"))
}

fn color_of_run(zone: &mut Zone, event: &mut Event) -> anyhow::Result<()> {
    if event.prevented() {
        return Ok(());
    }
    let target = event.entity("target").ok_or_else(|| anyhow::anyhow!("no target"))?;
    let color = zone
        .component::<Colorful>(target)
        .map(|c| c.color.clone())
        .unwrap_or_default();
    zone.tell(event.actor(), format!("#{target} is {color}."));
    Ok(())
}

fn paint_prepare(zone: &mut Zone, event: &mut Event) -> anyhow::Result<Flow> {
    Ok(colorful_target(zone, event, "cannot be painted"))
}

fn paint_run(zone: &mut Zone, event: &mut Event) -> anyhow::Result<()> {
    if event.prevented() {
        return Ok(());
    }
    let target = event.entity("target").ok_or_else(|| anyhow::anyhow!("no target"))?;
    let color = event.text("color").unwrap_or_default().to_string();
    if let Some(colorful) = zone.component_mut::<Colorful>(target) {
        colorful.color.clone_from(&color);
    }
    zone.tell(event.actor(), format!("#{target} is now {color}."));
    Ok(())
}

fn colorful_kind() -> ComponentKind {
    ComponentKind::new("Colorful", from_record::<Colorful>)
        .action(
            ActionDef::new("color_of", r"^color(?: of)? (?P<descriptor>.+)")
                .prepare(color_of_prepare)
                .run(color_of_run),
        )
        .action(
            ActionDef::new("paint", r"^paint (?P<descriptor>\S+) (?P<color>.+)")
                .prepare(paint_prepare)
                .run(paint_run),
        )
}

// ---------------------------------------------------------------------------
// Glowing
// ---------------------------------------------------------------------------

/// Inert aspect carrying a float, for record round-trips.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Glowing {
    pub brightness: f64,
}

impl Component for Glowing {
    fn kind(&self) -> &'static str {
        "Glowing"
    }

    fn to_record(&self) -> Record {
        types::encode(self).unwrap_or_default()
    }
}

fn glowing_kind() -> ComponentKind {
    ComponentKind::new("Glowing", from_record::<Glowing>)
}

// ---------------------------------------------------------------------------
// BlackHole
// ---------------------------------------------------------------------------

/// Overrides actions declared by other kinds.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct BlackHole;

impl Component for BlackHole {
    fn kind(&self) -> &'static str {
        "BlackHole"
    }
}

fn absorb_paint(_zone: &mut Zone, owner: EntityId, event: &mut Event) -> anyhow::Result<()> {
    if event.entity("target") == Some(owner) {
        event.set("color", "black");
    }
    Ok(())
}

fn prevent_look_at(zone: &mut Zone, owner: EntityId, event: &mut Event) -> anyhow::Result<()> {
    if event.entity("target") == Some(owner) {
        zone.tell(
            event.actor(),
            format!("You're unable to look directly at #{owner}."),
        );
        event.prevent_default();
    }
    Ok(())
}

fn black_hole_kind() -> ComponentKind {
    ComponentKind::new("BlackHole", from_record::<BlackHole>)
        .before("Colorful.paint", absorb_paint)
        .before("Visible.look_at", prevent_look_at)
}

// ---------------------------------------------------------------------------
// Counter (ticking)
// ---------------------------------------------------------------------------

/// Counts the ticks it has seen.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct Counter {
    pub ticks: u32,
}

impl Component for Counter {
    fn kind(&self) -> &'static str {
        "Counter"
    }

    fn to_record(&self) -> Record {
        types::encode(self).unwrap_or_default()
    }
}

fn count_tick(zone: &mut Zone, owner: EntityId) -> anyhow::Result<()> {
    let counter = zone
        .component_mut::<Counter>(owner)
        .ok_or_else(|| anyhow::anyhow!("counter vanished"))?;
    counter.ticks += 1;
    Ok(())
}

fn counter_kind() -> ComponentKind {
    ComponentKind::new("Counter", from_record::<Counter>).ticking(count_tick)
}

// ---------------------------------------------------------------------------
// Spawner (ticking): spawns a fresh Counter entity every tick
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct Spawner;

impl Component for Spawner {
    fn kind(&self) -> &'static str {
        "Spawner"
    }
}

fn spawn_tick(zone: &mut Zone, _owner: EntityId) -> anyhow::Result<()> {
    zone.spawn_with(vec![Box::new(Counter::default())])?;
    Ok(())
}

fn spawner_kind() -> ComponentKind {
    ComponentKind::new("Spawner", from_record::<Spawner>).ticking(spawn_tick)
}

// ---------------------------------------------------------------------------
// Reaper (ticking): destroys every other ticking entity
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct Reaper;

impl Component for Reaper {
    fn kind(&self) -> &'static str {
        "Reaper"
    }
}

fn reap_tick(zone: &mut Zone, owner: EntityId) -> anyhow::Result<()> {
    for id in zone.ticking() {
        if id != owner {
            zone.destroy(id)?;
        }
    }
    Ok(())
}

fn reaper_kind() -> ComponentKind {
    ComponentKind::new("Reaper", from_record::<Reaper>).ticking(reap_tick)
}

// ---------------------------------------------------------------------------
// Ordering fixtures
// ---------------------------------------------------------------------------

/// Appends `First@<owner>` (twice, from two interceptors) to the `trail`.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct First;

impl Component for First {
    fn kind(&self) -> &'static str {
        "First"
    }
}

/// Appends `Second@<owner>` to the `trail` and records whether the event
/// was already prevented.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct Second;

impl Component for Second {
    fn kind(&self) -> &'static str {
        "Second"
    }
}

fn first_a(_zone: &mut Zone, owner: EntityId, event: &mut Event) -> anyhow::Result<()> {
    append_trail(event, format!("First.a@{owner}"));
    Ok(())
}

fn first_b(_zone: &mut Zone, owner: EntityId, event: &mut Event) -> anyhow::Result<()> {
    append_trail(event, format!("First.b@{owner}"));
    Ok(())
}

fn second_hook(_zone: &mut Zone, owner: EntityId, event: &mut Event) -> anyhow::Result<()> {
    append_trail(event, format!("Second@{owner}"));
    let prevented = event.prevented();
    event.set("saw_prevented", prevented);
    Ok(())
}

// ---------------------------------------------------------------------------
// Fault and mutation fixtures
// ---------------------------------------------------------------------------

/// Its interceptor always fails.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct Faulty;

impl Component for Faulty {
    fn kind(&self) -> &'static str {
        "Faulty"
    }
}

fn faulty_hook(_zone: &mut Zone, _owner: EntityId, _event: &mut Event) -> anyhow::Result<()> {
    anyhow::bail!("faulty interceptor")
}

/// Detaches its owner's `Second` before `Second` gets a chance to run.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct Shy;

impl Component for Shy {
    fn kind(&self) -> &'static str {
        "Shy"
    }
}

fn shy_hook(zone: &mut Zone, owner: EntityId, _event: &mut Event) -> anyhow::Result<()> {
    if zone.has(owner, &["Second"]) {
        zone.detach(owner, "Second")?;
    }
    Ok(())
}

/// Answers a look by asking for its own color, re-entrantly.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct Echo;

impl Component for Echo {
    fn kind(&self) -> &'static str {
        "Echo"
    }
}

fn echo_hook(zone: &mut Zone, owner: EntityId, event: &mut Event) -> anyhow::Result<()> {
    let outcome = dispatch(
        zone,
        owner,
        "Colorful.color_of",
        tessera_core::event::fields([("descriptor", owner.to_string())]),
    )?;
    event.set("echoed", !outcome.halted);
    Ok(())
}

fn watcher_kinds() -> Vec<ComponentKind> {
    vec![
        ComponentKind::new("First", from_record::<First>)
            .before("Visible.look_at", first_a)
            .before("Visible.look_at", first_b),
        ComponentKind::new("Second", from_record::<Second>).before("Visible.look_at", second_hook),
        ComponentKind::new("Faulty", from_record::<Faulty>).before("Visible.look_at", faulty_hook),
        ComponentKind::new("Shy", from_record::<Shy>).before("Visible.look_at", shy_hook),
        ComponentKind::new("Echo", from_record::<Echo>).before("Visible.look_at", echo_hook),
    ]
}

// ---------------------------------------------------------------------------
// Registry and zone
// ---------------------------------------------------------------------------

/// Registry holding every fixture kind.
pub fn registry() -> Arc<Registry> {
    let mut builder = Registry::builder();
    let kinds = [
        visible_kind(),
        colorful_kind(),
        glowing_kind(),
        black_hole_kind(),
        counter_kind(),
        spawner_kind(),
        reaper_kind(),
    ]
    .into_iter()
    .chain(watcher_kinds());
    for kind in kinds {
        builder = builder.component(kind).expect("register fixture kind");
    }
    Arc::new(builder.build().expect("build fixture registry"))
}

/// A zone with a seeded RNG.
pub fn zone() -> (Zone, ZoneHandle) {
    let mut config = ZoneConfig::default();
    config.zone.name = "fixture".to_string();
    config.zone.rng_seed = Some(42);
    config.zone.unknown_command_replies = vec!["What?".to_string()];
    Zone::new(registry(), config)
}

/// Spawn a hearing entity in explore mode holding `components`.
pub fn player(zone: &mut Zone, components: Vec<Box<dyn Component>>) -> EntityId {
    let id = zone.spawn_with(components).expect("spawn player");
    zone.set_hearing(id, true).expect("hearing");
    zone.set_mode(id, Some(Box::new(Explore))).expect("mode");
    id
}
