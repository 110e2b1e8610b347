//! Admin meta-commands.
//!
//! Every command starts with `!` and is refused with "You're unable to do
//! that." unless the actor holds [`Admin`]. Entity arguments accept either
//! a numeric id or one of the admin's aliases; `!spawn` aliases the new
//! entity as `!s`.
//!
//! | command                                   | action              |
//! |-------------------------------------------|---------------------|
//! | `!query [text]`                           | `Admin.query`       |
//! | `!inspect <entity>`                       | `Admin.inspect`     |
//! | `!spawn`                                  | `Admin.spawn`       |
//! | `!destroy <entity>`                       | `Admin.destroy`     |
//! | `!edit <entity> attach <Kind> [json]`     | `Admin.attach`      |
//! | `!edit <entity> detach <Kind>`            | `Admin.detach`      |
//! | `!edit <entity> set hearing <json>`       | `Admin.set`         |
//! | `!alias add <name> <entity>`              | `Admin.alias_add`   |
//! | `!alias rm <name>`                        | `Admin.alias_remove`|
//! | `!alias [list]`                           | `Admin.alias_list`  |

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tessera_core::event::fields;
use tessera_core::registry::{ActionDef, ComponentKind, from_record};
use tessera_core::types::{self, EntityId, Record};
use tessera_core::{Component, Event, Flow, Zone, dispatch};
use tracing::info;

use crate::confirm::Confirm;
use crate::named::Named;

/// Alias under which `!spawn` registers the entity it created.
pub const SPAWN_ALIAS: &str = "!s";

/// Grants the admin meta-commands and holds the admin's aliases.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Admin {
    /// Alias → entity.
    #[serde(default)]
    pub aliases: BTreeMap<String, EntityId>,
}

impl Admin {
    /// Kind name.
    pub const KIND: &'static str = "Admin";

    /// Registration.
    #[must_use]
    pub fn kind() -> ComponentKind {
        ComponentKind::new(Self::KIND, from_record::<Self>)
            .action(
                ActionDef::new("query", r"^!q(?:uery)?(?: (?P<query>.+))?$")
                    .prepare(admin_only)
                    .run(query),
            )
            .action(
                ActionDef::new("inspect", r"^!i(?:nspect)? (?P<entity>\S+)$")
                    .prepare(with_entity)
                    .run(inspect),
            )
            .action(
                ActionDef::new("spawn", r"^!s(?:pawn)?$")
                    .prepare(admin_only)
                    .run(spawn),
            )
            .action(
                ActionDef::new("destroy", r"^!d(?:estroy)? (?P<entity>\S+)$")
                    .prepare(with_entity)
                    .run(destroy),
            )
            .action(
                ActionDef::new(
                    "attach",
                    r"^!e(?:dit)? (?P<entity>\S+) attach (?P<kind>\S+)(?: (?P<arguments>.+))?$",
                )
                .prepare(with_entity)
                .run(attach),
            )
            .action(
                ActionDef::new("detach", r"^!e(?:dit)? (?P<entity>\S+) detach (?P<kind>\S+)$")
                    .prepare(with_entity)
                    .run(detach),
            )
            .action(
                ActionDef::new(
                    "set",
                    r"^!e(?:dit)? (?P<entity>\S+) set (?P<attribute>\S+) (?P<value>.+)$",
                )
                .prepare(with_entity)
                .run(set_attribute),
            )
            .action(
                ActionDef::new(
                    "alias_add",
                    r"^!a(?:lias)? (?:add|create|set) (?P<alias>\S+) (?P<entity>\S+)$",
                )
                .prepare(alias_add_prepare)
                .run(alias_add),
            )
            .action(
                ActionDef::new(
                    "alias_remove",
                    r"^!a(?:lias)? (?:rm|remove|del|delete|unset) (?P<alias>\S+)$",
                )
                .prepare(admin_only)
                .run(alias_remove),
            )
            .action(
                ActionDef::new("alias_list", r"^!a(?:lias)?(?: list)?$")
                    .prepare(admin_only)
                    .run(alias_list),
            )
    }
}

impl Component for Admin {
    fn kind(&self) -> &'static str {
        Self::KIND
    }

    fn to_record(&self) -> Record {
        types::encode(self).unwrap_or_default()
    }
}

// ---------------------------------------------------------------------------
// Argument checks
// ---------------------------------------------------------------------------

fn require_admin(zone: &mut Zone, actor: EntityId) -> bool {
    if zone.has(actor, &[Admin::KIND]) {
        return true;
    }
    zone.tell(actor, "You're unable to do that.");
    false
}

/// Turn an alias or numeric id into an id, without checking existence.
fn parse_entity(zone: &mut Zone, actor: EntityId, raw: &str) -> Option<EntityId> {
    let aliased = zone
        .component::<Admin>(actor)
        .and_then(|admin| admin.aliases.get(raw).copied());
    if aliased.is_some() {
        return aliased;
    }
    if let Ok(id) = raw.parse::<u64>() {
        return Some(EntityId(id));
    }
    zone.tell(actor, "Entity ID must be numeric.");
    None
}

fn admin_only(zone: &mut Zone, event: &mut Event) -> anyhow::Result<Flow> {
    Ok(if require_admin(zone, event.actor()) {
        Flow::before()
    } else {
        Flow::Halt
    })
}

/// Admin check plus the `entity` argument, stored as `target`.
fn with_entity(zone: &mut Zone, event: &mut Event) -> anyhow::Result<Flow> {
    let actor = event.actor();
    if !require_admin(zone, actor) {
        return Ok(Flow::Halt);
    }
    let raw = event.text("entity").unwrap_or_default().to_string();
    let Some(id) = parse_entity(zone, actor, &raw) else {
        return Ok(Flow::Halt);
    };
    if !zone.contains(id) {
        zone.tell(actor, format!("No such entity \"{id}\"."));
        return Ok(Flow::Halt);
    }
    event.set("target", id);
    Ok(Flow::before())
}

fn target(event: &Event) -> anyhow::Result<EntityId> {
    event
        .entity("target")
        .ok_or_else(|| anyhow::anyhow!("{} ran without a target", event.action()))
}

// ---------------------------------------------------------------------------
// Queries
// ---------------------------------------------------------------------------

fn query(zone: &mut Zone, event: &mut Event) -> anyhow::Result<()> {
    if event.prevented() {
        return Ok(());
    }
    let actor = event.actor();
    let wanted = event.text("query").map(str::to_lowercase);
    let matches: Vec<String> = zone
        .entities()
        .filter_map(|id| {
            let name = zone
                .component::<Named>(id)
                .map_or_else(|| "something unnamed".to_string(), |n| n.name.clone());
            let hit = wanted
                .as_deref()
                .is_none_or(|q| name.to_lowercase().contains(q));
            hit.then(|| format!("[{id}] {name}"))
        })
        .collect();
    for line in matches {
        zone.tell(actor, line);
    }
    Ok(())
}

fn inspect(zone: &mut Zone, event: &mut Event) -> anyhow::Result<()> {
    if event.prevented() {
        return Ok(());
    }
    let actor = event.actor();
    let id = target(event)?;
    let record = zone
        .entity_record(id)
        .ok_or_else(|| anyhow::anyhow!("entity {id} vanished"))?;

    let mut lines = vec![
        format!("[{id}]"),
        format!("  hearing: {}", record.hearing),
    ];
    if let Some(mode) = &record.mode {
        lines.push(format!("  mode: {}", mode.kind));
    }
    for (kind, state) in &record.components {
        lines.push(format!("  {kind}"));
        if let serde_json::Value::Object(fields) = state {
            for (key, value) in fields {
                lines.push(format!("    {key}: {value}"));
            }
        }
    }
    for line in lines {
        zone.tell(actor, line);
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Lifecycle
// ---------------------------------------------------------------------------

fn spawn(zone: &mut Zone, event: &mut Event) -> anyhow::Result<()> {
    if event.prevented() {
        return Ok(());
    }
    let actor = event.actor();
    let id = zone.spawn()?;
    info!(admin = %actor, entity = %id, "Admin spawned entity");
    dispatch(
        zone,
        actor,
        "Admin.alias_add",
        fields([("alias", SPAWN_ALIAS.to_string()), ("entity", id.to_string())]),
    )?;
    zone.tell(actor, format!("Spawned [{id}]."));
    Ok(())
}

/// Asks for confirmation; [`Confirm`] performs the destroy.
fn destroy(zone: &mut Zone, event: &mut Event) -> anyhow::Result<()> {
    if event.prevented() {
        return Ok(());
    }
    let actor = event.actor();
    let id = target(event)?;
    zone.set_mode(actor, Some(Box::new(Confirm::destroy(id))))?;
    zone.tell(actor, format!("Really destroy [{id}]? (yes/no)"));
    Ok(())
}

// ---------------------------------------------------------------------------
// Editing
// ---------------------------------------------------------------------------

fn attach(zone: &mut Zone, event: &mut Event) -> anyhow::Result<()> {
    if event.prevented() {
        return Ok(());
    }
    let actor = event.actor();
    let id = target(event)?;
    let requested = event.text("kind").unwrap_or_default().to_string();

    let Some(kind) = zone.registry().kind_name(&requested) else {
        zone.tell(actor, format!("No such component \"{requested}\"."));
        return Ok(());
    };
    if zone.has(id, &[kind]) {
        zone.tell(actor, format!("[{id}] already has component \"{kind}\"."));
        return Ok(());
    }

    let arguments = event.text("arguments").unwrap_or("{}").to_string();
    match attach_from_json(zone, id, kind, &arguments) {
        Ok(()) => zone.tell(actor, format!("[{id}] is now \"{kind}\".")),
        Err(err) => {
            zone.tell(actor, format!("[{id}] failed to attach \"{kind}\":"));
            zone.tell(actor, format!("  {err:#}"));
        }
    }
    Ok(())
}

fn attach_from_json(
    zone: &mut Zone,
    id: EntityId,
    kind: &str,
    arguments: &str,
) -> anyhow::Result<()> {
    let record: Record = serde_json::from_str(arguments)?;
    let component = zone.registry().decode_component(kind, &record)?;
    zone.attach(id, component)?;
    Ok(())
}

fn detach(zone: &mut Zone, event: &mut Event) -> anyhow::Result<()> {
    if event.prevented() {
        return Ok(());
    }
    let actor = event.actor();
    let id = target(event)?;
    let requested = event.text("kind").unwrap_or_default().to_string();

    let Some(kind) = zone.registry().kind_name(&requested) else {
        zone.tell(actor, format!("No such component \"{requested}\"."));
        return Ok(());
    };
    if !zone.has(id, &[kind]) {
        zone.tell(actor, format!("[{id}] has no component \"{kind}\"."));
        return Ok(());
    }
    zone.detach(id, kind)?;
    zone.tell(actor, format!("[{id}] is no longer \"{kind}\"."));
    Ok(())
}

fn set_attribute(zone: &mut Zone, event: &mut Event) -> anyhow::Result<()> {
    if event.prevented() {
        return Ok(());
    }
    let actor = event.actor();
    let id = target(event)?;
    let attribute = event.text("attribute").unwrap_or_default().to_string();
    let raw = event.text("value").unwrap_or_default().to_string();

    if attribute != "hearing" {
        zone.tell(actor, format!("Unknown attribute \"{attribute}\"."));
        return Ok(());
    }
    match serde_json::from_str::<bool>(&raw) {
        Ok(hearing) => {
            zone.set_hearing(id, hearing)?;
            zone.tell(actor, "OK.");
        }
        Err(err) => {
            zone.tell(actor, format!("[{id}] failed to set \"{attribute}\":"));
            zone.tell(actor, format!("  {err}"));
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Aliases
// ---------------------------------------------------------------------------

/// Unlike the other entity arguments, an alias may point at an id that does
/// not exist (yet).
fn alias_add_prepare(zone: &mut Zone, event: &mut Event) -> anyhow::Result<Flow> {
    let actor = event.actor();
    if !require_admin(zone, actor) {
        return Ok(Flow::Halt);
    }
    let raw = event.text("entity").unwrap_or_default().to_string();
    let Some(id) = parse_entity(zone, actor, &raw) else {
        return Ok(Flow::Halt);
    };
    event.set("target", id);
    Ok(Flow::before())
}

fn alias_add(zone: &mut Zone, event: &mut Event) -> anyhow::Result<()> {
    if event.prevented() {
        return Ok(());
    }
    let id = target(event)?;
    let alias = event.text("alias").unwrap_or_default().to_string();
    let admin = zone
        .component_mut::<Admin>(event.actor())
        .ok_or_else(|| anyhow::anyhow!("admin aspect vanished"))?;
    admin.aliases.insert(alias, id);
    Ok(())
}

fn alias_remove(zone: &mut Zone, event: &mut Event) -> anyhow::Result<()> {
    if event.prevented() {
        return Ok(());
    }
    let actor = event.actor();
    let alias = event.text("alias").unwrap_or_default().to_string();
    let removed = zone
        .component_mut::<Admin>(actor)
        .and_then(|admin| admin.aliases.remove(&alias));
    if removed.is_none() {
        zone.tell(actor, format!("No alias \"{alias}\"."));
    }
    Ok(())
}

fn alias_list(zone: &mut Zone, event: &mut Event) -> anyhow::Result<()> {
    if event.prevented() {
        return Ok(());
    }
    let actor = event.actor();
    let lines: Vec<String> = zone
        .component::<Admin>(actor)
        .map(|admin| {
            admin
                .aliases
                .iter()
                .map(|(alias, id)| format!("{alias}: {id}"))
                .collect()
        })
        .unwrap_or_default();
    if lines.is_empty() {
        zone.tell(actor, "No aliases.");
    }
    for line in lines {
        zone.tell(actor, line);
    }
    Ok(())
}
