//! Component registry and action resolver.
//!
//! Every component kind and mode kind is registered exactly once at startup
//! through a [`RegistryBuilder`]. The resulting [`Registry`] is immutable and
//! shared by reference (`Arc<Registry>`) with every zone; nothing looks kinds
//! up through ambient globals.
//!
//! ```text
//! RegistryBuilder ──component()──► kinds, actions, hooks
//!                 ──mode()───────► modes
//!                 ──build()──────► Registry (validated, immutable)
//! ```

use std::collections::HashMap;
use std::fmt;

use regex::Regex;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::component::Component;
use crate::error::{Result, TesseraError};
use crate::event::{Event, Fields, Value};
use crate::mode::{Command, Explore, ModeState};
use crate::pipeline::{Flow, Phase};
use crate::types::{self, EntityId, Record};
use crate::zone::Zone;

// ---------------------------------------------------------------------------
// Callback signatures
// ---------------------------------------------------------------------------

/// First half of an action: validate, resolve targets, choose hook points.
pub type PrepareFn = fn(&mut Zone, &mut Event) -> anyhow::Result<Flow>;
/// Second half of an action: default behavior. Must check `event.prevented()`.
pub type RunFn = fn(&mut Zone, &mut Event) -> anyhow::Result<()>;
/// Interceptor, called with the zone, the entity owning the intercepting
/// component, and the event.
pub type HookFn = fn(&mut Zone, EntityId, &mut Event) -> anyhow::Result<()>;
/// Periodic callback for ticking components.
pub type TickFn = fn(&mut Zone, EntityId) -> anyhow::Result<()>;
/// Rebuild a component from its record.
pub type DecodeFn = fn(&Record) -> anyhow::Result<Box<dyn Component>>;
/// Interpret a command for an entity in this mode.
pub type PerformFn = fn(&mut Zone, EntityId, Command) -> anyhow::Result<()>;
/// Rebuild mode state from its record.
pub type ModeDecodeFn = fn(&Record) -> anyhow::Result<Box<dyn ModeState>>;
/// Fresh mode state.
pub type ModeInitFn = fn() -> Box<dyn ModeState>;

/// Decoder for components whose state derives `Deserialize`.
///
/// # Errors
/// Fails when the record does not match `T`'s fields.
pub fn from_record<T>(record: &Record) -> anyhow::Result<Box<dyn Component>>
where
    T: Component + DeserializeOwned,
{
    Ok(Box::new(types::decode::<T>(record)?))
}

fn proceed_before(_zone: &mut Zone, _event: &mut Event) -> anyhow::Result<Flow> {
    Ok(Flow::before())
}

fn do_nothing(_zone: &mut Zone, _event: &mut Event) -> anyhow::Result<()> {
    Ok(())
}

// ---------------------------------------------------------------------------
// Declarations
// ---------------------------------------------------------------------------

/// Declaration of an action owned by a component kind.
#[derive(Clone)]
pub struct ActionDef {
    name: &'static str,
    pattern: &'static str,
    prepare: PrepareFn,
    run: RunFn,
}

impl ActionDef {
    /// Declare an action matched by `pattern`.
    ///
    /// Without further configuration the action fires one "before" hook
    /// point witnessed by the actor and has no default behavior.
    #[must_use]
    pub fn new(name: &'static str, pattern: &'static str) -> Self {
        Self {
            name,
            pattern,
            prepare: proceed_before,
            run: do_nothing,
        }
    }

    /// Set the prepare step.
    #[must_use]
    pub fn prepare(mut self, prepare: PrepareFn) -> Self {
        self.prepare = prepare;
        self
    }

    /// Set the run step.
    #[must_use]
    pub fn run(mut self, run: RunFn) -> Self {
        self.run = run;
        self
    }
}

impl fmt::Debug for ActionDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionDef")
            .field("name", &self.name)
            .field("pattern", &self.pattern)
            .finish_non_exhaustive()
    }
}

/// Declaration of a component kind: its decoder, actions, interceptors and
/// optional tick callback.
pub struct ComponentKind {
    name: &'static str,
    decode: DecodeFn,
    tick: Option<TickFn>,
    actions: Vec<ActionDef>,
    hooks: Vec<(Phase, String, HookFn)>,
}

impl ComponentKind {
    /// Declare a kind named `name`, rebuilt from records by `decode`.
    #[must_use]
    pub fn new(name: &'static str, decode: DecodeFn) -> Self {
        Self {
            name,
            decode,
            tick: None,
            actions: Vec::new(),
            hooks: Vec::new(),
        }
    }

    /// Declare an action. Its id is `"<kind>.<name>"`.
    #[must_use]
    pub fn action(mut self, action: ActionDef) -> Self {
        self.actions.push(action);
        self
    }

    /// Intercept the "before" phase of `target` (a qualified action id).
    #[must_use]
    pub fn before(mut self, target: impl Into<String>, hook: HookFn) -> Self {
        self.hooks.push((Phase::Before, target.into(), hook));
        self
    }

    /// Intercept the "after" phase of `target`.
    ///
    /// Reserved: no built-in action emits an "after" hook point, so these
    /// interceptors only run for content actions that emit one explicitly.
    #[must_use]
    pub fn after(mut self, target: impl Into<String>, hook: HookFn) -> Self {
        self.hooks.push((Phase::After, target.into(), hook));
        self
    }

    /// Make entities holding this kind part of the zone tick set.
    #[must_use]
    pub fn ticking(mut self, tick: TickFn) -> Self {
        self.tick = Some(tick);
        self
    }

    /// Kind name.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }
}

/// Declaration of a mode kind.
#[derive(Clone, Copy)]
pub struct ModeKind {
    name: &'static str,
    perform: PerformFn,
    decode: ModeDecodeFn,
    initial: ModeInitFn,
}

impl ModeKind {
    /// Declare a mode kind.
    #[must_use]
    pub fn new(
        name: &'static str,
        perform: PerformFn,
        decode: ModeDecodeFn,
        initial: ModeInitFn,
    ) -> Self {
        Self {
            name,
            perform,
            decode,
            initial,
        }
    }

    /// Mode kind name.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// The mode's command interpreter.
    #[must_use]
    pub fn perform(&self) -> PerformFn {
        self.perform
    }

    /// Fresh state for this mode.
    #[must_use]
    pub fn initial(&self) -> Box<dyn ModeState> {
        (self.initial)()
    }
}

impl fmt::Debug for ModeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModeKind")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Compiled registry
// ---------------------------------------------------------------------------

/// A registered action with its compiled pattern.
pub struct Action {
    id: String,
    kind: &'static str,
    pattern: Regex,
    prepare: PrepareFn,
    run: RunFn,
}

impl Action {
    /// Qualified id, `"<kind>.<name>"`.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Kind that declared the action.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        self.kind
    }

    /// Pattern source.
    #[must_use]
    pub fn pattern(&self) -> &str {
        self.pattern.as_str()
    }

    pub(crate) fn prepare_fn(&self) -> PrepareFn {
        self.prepare
    }

    pub(crate) fn run_fn(&self) -> RunFn {
        self.run
    }
}

impl fmt::Debug for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Action")
            .field("id", &self.id)
            .field("pattern", &self.pattern.as_str())
            .finish_non_exhaustive()
    }
}

struct KindEntry {
    decode: DecodeFn,
    tick: Option<TickFn>,
}

/// Result of matching raw input against the registered patterns.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    /// Qualified id of the selected action.
    pub action: String,
    /// Named capture groups that participated in the match.
    pub fields: Fields,
}

/// Immutable lookup tables for kinds, actions, hooks and modes.
pub struct Registry {
    kinds: HashMap<&'static str, KindEntry>,
    kind_order: Vec<&'static str>,
    actions: Vec<Action>,
    action_index: HashMap<String, usize>,
    hooks: HashMap<(&'static str, Phase), HashMap<String, Vec<HookFn>>>,
    modes: HashMap<&'static str, ModeKind>,
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut modes: Vec<_> = self.modes.keys().collect();
        modes.sort();
        f.debug_struct("Registry")
            .field("kinds", &self.kind_order)
            .field("actions", &self.actions.len())
            .field("modes", &modes)
            .finish()
    }
}

impl Registry {
    /// Start building a registry. The built-in [`Explore`] mode is
    /// registered already.
    #[must_use]
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::new()
    }

    /// Normalize `text` and select the best matching action.
    ///
    /// Every registered pattern is tried against the whitespace-normalized
    /// command; a match counts only when it begins at the start of the
    /// command. Among matches the longest pattern source wins, and ties go to
    /// the action registered first. Returns `None` when nothing matches.
    #[must_use]
    pub fn resolve(&self, text: &str) -> Option<Resolution> {
        let command = normalize(text);
        let mut best: Option<(&Action, regex::Captures<'_>)> = None;

        for action in &self.actions {
            let Some(captures) = action.pattern.captures(&command) else {
                continue;
            };
            if captures.get(0).is_none_or(|m| m.start() != 0) {
                continue;
            }
            let longer = best
                .as_ref()
                .is_none_or(|(current, _)| action.pattern().len() > current.pattern().len());
            if longer {
                best = Some((action, captures));
            }
        }

        let (action, captures) = best?;
        let fields = action
            .pattern
            .capture_names()
            .flatten()
            .filter_map(|name| {
                captures
                    .name(name)
                    .map(|m| (name.to_string(), Value::Text(m.as_str().to_string())))
            })
            .collect();

        debug!(command = %command, action = %action.id, "Resolved command");
        Some(Resolution {
            action: action.id.clone(),
            fields,
        })
    }

    /// Look up an action by qualified id.
    #[must_use]
    pub fn action(&self, id: &str) -> Option<&Action> {
        self.action_index.get(id).map(|&i| &self.actions[i])
    }

    /// All actions in registration order.
    pub fn actions(&self) -> impl Iterator<Item = &Action> + '_ {
        self.actions.iter()
    }

    /// Interceptors that `kind` registered against `phase` of `action`, in
    /// declaration order.
    #[must_use]
    pub fn hooks(&self, kind: &'static str, phase: Phase, action: &str) -> &[HookFn] {
        self.hooks
            .get(&(kind, phase))
            .and_then(|by_action| by_action.get(action))
            .map_or(&[], Vec::as_slice)
    }

    /// The interned name of a registered component kind.
    #[must_use]
    pub fn kind_name(&self, kind: &str) -> Option<&'static str> {
        self.kinds.get_key_value(kind).map(|(name, _)| *name)
    }

    /// Registered component kinds in registration order.
    #[must_use]
    pub fn kinds(&self) -> &[&'static str] {
        &self.kind_order
    }

    /// Tick callback of `kind`, if it is a ticking kind.
    #[must_use]
    pub fn tick_fn(&self, kind: &str) -> Option<TickFn> {
        self.kinds.get(kind).and_then(|entry| entry.tick)
    }

    /// Whether components of `kind` require ticking.
    #[must_use]
    pub fn is_ticking(&self, kind: &str) -> bool {
        self.tick_fn(kind).is_some()
    }

    /// Rebuild a component of `kind` from its record.
    ///
    /// # Errors
    /// [`TesseraError::UnknownKind`] for unregistered kinds and
    /// [`TesseraError::Record`] when the decoder rejects the record.
    pub fn decode_component(&self, kind: &str, record: &Record) -> Result<Box<dyn Component>> {
        let entry = self
            .kinds
            .get(kind)
            .ok_or_else(|| TesseraError::UnknownKind(kind.to_string()))?;
        let component = (entry.decode)(record).map_err(|e| TesseraError::Record {
            kind: kind.to_string(),
            reason: format!("{e:#}"),
        })?;
        if component.kind() != kind {
            return Err(TesseraError::Record {
                kind: kind.to_string(),
                reason: format!("decoder produced a {} component", component.kind()),
            });
        }
        Ok(component)
    }

    /// Look up a mode kind.
    #[must_use]
    pub fn mode(&self, name: &str) -> Option<&ModeKind> {
        self.modes.get(name)
    }

    /// Rebuild mode state of kind `name` from its record.
    ///
    /// # Errors
    /// [`TesseraError::UnknownMode`] or [`TesseraError::Record`].
    pub fn decode_mode(&self, name: &str, record: &Record) -> Result<Box<dyn ModeState>> {
        let mode = self
            .modes
            .get(name)
            .ok_or_else(|| TesseraError::UnknownMode(name.to_string()))?;
        (mode.decode)(record).map_err(|e| TesseraError::Record {
            kind: name.to_string(),
            reason: format!("{e:#}"),
        })
    }
}

/// Collapse runs of whitespace and trim the ends.
#[must_use]
pub fn normalize(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Collects kind declarations and validates them into a [`Registry`].
pub struct RegistryBuilder {
    kinds: Vec<ComponentKind>,
    modes: Vec<ModeKind>,
}

impl Default for RegistryBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl RegistryBuilder {
    /// Create a builder with the built-in [`Explore`] mode registered.
    #[must_use]
    pub fn new() -> Self {
        Self {
            kinds: Vec::new(),
            modes: vec![Explore::mode_kind()],
        }
    }

    /// Register a component kind.
    ///
    /// # Errors
    /// [`TesseraError::DuplicateKind`] if the name is taken.
    pub fn component(mut self, kind: ComponentKind) -> Result<Self> {
        if self.kinds.iter().any(|k| k.name == kind.name) {
            return Err(TesseraError::DuplicateKind(kind.name.to_string()));
        }
        self.kinds.push(kind);
        Ok(self)
    }

    /// Register a mode kind.
    ///
    /// # Errors
    /// [`TesseraError::DuplicateMode`] if the name is taken.
    pub fn mode(mut self, mode: ModeKind) -> Result<Self> {
        if self.modes.iter().any(|m| m.name == mode.name) {
            return Err(TesseraError::DuplicateMode(mode.name.to_string()));
        }
        self.modes.push(mode);
        Ok(self)
    }

    /// Compile patterns and build the lookup tables.
    ///
    /// # Errors
    /// Fails on invalid patterns, duplicate action ids, or interceptors
    /// targeting actions no kind declares.
    pub fn build(self) -> Result<Registry> {
        let mut actions = Vec::new();
        let mut action_index = HashMap::new();

        for kind in &self.kinds {
            for def in &kind.actions {
                let id = format!("{}.{}", kind.name, def.name);
                let pattern = Regex::new(def.pattern).map_err(|e| TesseraError::InvalidPattern {
                    action: id.clone(),
                    reason: e.to_string(),
                })?;
                if action_index.insert(id.clone(), actions.len()).is_some() {
                    return Err(TesseraError::DuplicateAction(id));
                }
                actions.push(Action {
                    id,
                    kind: kind.name,
                    pattern,
                    prepare: def.prepare,
                    run: def.run,
                });
            }
        }

        let mut hooks: HashMap<(&'static str, Phase), HashMap<String, Vec<HookFn>>> =
            HashMap::new();
        for kind in &self.kinds {
            for (phase, target, hook) in &kind.hooks {
                if !action_index.contains_key(target) {
                    return Err(TesseraError::UnknownHookTarget {
                        kind: kind.name.to_string(),
                        action: target.clone(),
                    });
                }
                hooks
                    .entry((kind.name, *phase))
                    .or_default()
                    .entry(target.clone())
                    .or_default()
                    .push(*hook);
            }
        }

        let kind_order = self.kinds.iter().map(|k| k.name).collect();
        let kinds = self
            .kinds
            .into_iter()
            .map(|k| {
                (
                    k.name,
                    KindEntry {
                        decode: k.decode,
                        tick: k.tick,
                    },
                )
            })
            .collect();
        let modes = self.modes.into_iter().map(|m| (m.name, m)).collect();

        Ok(Registry {
            kinds,
            kind_order,
            actions,
            action_index,
            hooks,
            modes,
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
