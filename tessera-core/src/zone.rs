//! Zones: the single owner of a set of entities.
//!
//! A [`Zone`] owns its entities, the per-kind index and the tick set, and is
//! driven by one thread. Everything crossing the thread boundary goes through
//! the [`ZoneHandle`]: commands in through the [`InboundQueue`], messages out
//! through a `crossbeam_channel`.
//!
//! ```text
//! transport ──push──► InboundQueue ──drain──► Zone::perform ──► mode ──► dispatch
//!     ▲                                                                     │
//!     └──────────── Receiver<OutboundMessage> ◄──────── Zone::tell ◄────────┘
//! ```

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use chrono::Utc;
use crossbeam_channel::{Receiver, Sender};
use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::Serialize;
use tracing::{debug, info, info_span, warn};

use crate::component::Component;
use crate::config::ZoneConfig;
use crate::entity::Entity;
use crate::error::{Result, TesseraError};
use crate::inbound::InboundQueue;
use crate::metrics::{ZoneCounters, spans};
use crate::mode::{Command, ModeState};
use crate::persistence::SnapshotStore;
use crate::registry::Registry;
use crate::snapshot::{EntityRecord, RawSnapshot, RestoreError, RestoreReport, ZoneSnapshot};
use crate::types::EntityId;

// ---------------------------------------------------------------------------
// Transport-facing types
// ---------------------------------------------------------------------------

/// A message for one entity, serialized as JSON.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    /// Recipient.
    pub entity: EntityId,
    /// JSON payload.
    pub payload: String,
}

/// The transport side of a zone.
#[derive(Clone)]
pub struct ZoneHandle {
    /// Push commands here.
    pub inbound: InboundQueue,
    /// Messages for hearing entities arrive here.
    pub outbound: Receiver<OutboundMessage>,
    /// Shared counters.
    pub counters: Arc<ZoneCounters>,
}

// ---------------------------------------------------------------------------
// Zone
// ---------------------------------------------------------------------------

/// A set of entities driven by one thread.
pub struct Zone {
    registry: Arc<Registry>,
    config: ZoneConfig,
    entities: BTreeMap<EntityId, Entity>,
    by_kind: HashMap<&'static str, BTreeSet<EntityId>>,
    ticking: BTreeSet<EntityId>,
    next_id: u64,
    inbound: InboundQueue,
    outbound: Sender<OutboundMessage>,
    rng: StdRng,
    counters: Arc<ZoneCounters>,
    tick_count: u64,
}

impl std::fmt::Debug for Zone {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Zone")
            .field("name", &self.config.zone.name)
            .field("entities", &self.entities.len())
            .field("ticking", &self.ticking.len())
            .field("tick_count", &self.tick_count)
            .finish_non_exhaustive()
    }
}

impl Zone {
    /// Create an empty zone and its transport handle.
    #[must_use]
    pub fn new(registry: Arc<Registry>, config: ZoneConfig) -> (Self, ZoneHandle) {
        let (tx, rx) = crossbeam_channel::unbounded();
        let inbound = InboundQueue::new(config.zone.inbound_capacity);
        let counters = Arc::new(ZoneCounters::new());
        let rng = match config.zone.rng_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        info!(zone = %config.zone.name, "Zone opened");

        let handle = ZoneHandle {
            inbound: inbound.clone(),
            outbound: rx,
            counters: Arc::clone(&counters),
        };
        let zone = Self {
            registry,
            config,
            entities: BTreeMap::new(),
            by_kind: HashMap::new(),
            ticking: BTreeSet::new(),
            next_id: 1,
            inbound,
            outbound: tx,
            rng,
            counters,
            tick_count: 0,
        };
        (zone, handle)
    }

    /// Zone name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.config.zone.name
    }

    /// The shared registry.
    #[must_use]
    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// Zone configuration.
    #[must_use]
    pub fn config(&self) -> &ZoneConfig {
        &self.config
    }

    /// Shared counters.
    #[must_use]
    pub fn counters(&self) -> &Arc<ZoneCounters> {
        &self.counters
    }

    /// The zone's random source. Seeded from `zone.rng_seed` when set.
    pub fn rng(&mut self) -> &mut StdRng {
        &mut self.rng
    }

    /// Ticks completed since the zone was opened.
    #[must_use]
    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    // -----------------------------------------------------------------------
    // Entity lifecycle
    // -----------------------------------------------------------------------

    /// Create an entity with no components, no mode and hearing off.
    ///
    /// # Errors
    /// [`TesseraError::IdOutOfRange`] once every id has been handed out.
    pub fn spawn(&mut self) -> Result<EntityId> {
        let id = EntityId(self.next_id);
        self.next_id = id.0.checked_add(1).ok_or(TesseraError::IdOutOfRange(id))?;
        self.entities.insert(id, Entity::new(id));
        debug!(entity = %id, "Entity spawned");
        Ok(id)
    }

    /// Create an entity and attach `components` in order.
    ///
    /// # Errors
    /// Fails if a component kind is unregistered or repeated; the entity is
    /// destroyed again in that case.
    pub fn spawn_with(&mut self, components: Vec<Box<dyn Component>>) -> Result<EntityId> {
        let id = self.spawn()?;
        for component in components {
            if let Err(err) = self.attach(id, component) {
                self.destroy(id)?;
                return Err(err);
            }
        }
        Ok(id)
    }

    /// Recreate an entity from its record, keeping its id.
    ///
    /// Everything is decoded before the entity is inserted, so a failure
    /// leaves the zone untouched.
    ///
    /// # Errors
    /// [`TesseraError::DuplicateEntity`] if the id is taken,
    /// [`TesseraError::IdOutOfRange`] for the last representable id; unknown kinds,
    /// unknown modes and malformed records as reported by the registry.
    pub fn insert_record(&mut self, record: &EntityRecord) -> Result<EntityId> {
        if self.entities.contains_key(&record.id) {
            return Err(TesseraError::DuplicateEntity(record.id));
        }
        let after = record
            .id
            .0
            .checked_add(1)
            .ok_or(TesseraError::IdOutOfRange(record.id))?;

        let mode = match &record.mode {
            Some(m) => Some(self.registry.decode_mode(&m.kind, &m.state)?),
            None => None,
        };
        let mut components = Vec::with_capacity(record.components.len());
        for (kind, state) in &record.components {
            let serde_json::Value::Object(state) = state else {
                return Err(TesseraError::Record {
                    kind: kind.clone(),
                    reason: "component record is not an object".to_string(),
                });
            };
            components.push(self.registry.decode_component(kind, state)?);
        }

        let id = record.id;
        let mut entity = Entity::new(id);
        entity.set_hearing(record.hearing);
        entity.replace_mode(mode);
        self.entities.insert(id, entity);
        self.next_id = self.next_id.max(after);

        for component in components {
            if let Err(err) = self.attach(id, component) {
                self.destroy(id)?;
                return Err(err);
            }
        }
        Ok(id)
    }

    /// Detach every component and remove the entity.
    ///
    /// # Errors
    /// [`TesseraError::EntityNotFound`] if the entity does not exist.
    pub fn destroy(&mut self, id: EntityId) -> Result<()> {
        let kinds = self
            .entities
            .get(&id)
            .map(|e| e.components().kinds())
            .ok_or(TesseraError::EntityNotFound(id))?;
        for kind in kinds {
            self.detach(id, kind)?;
        }
        self.entities.remove(&id);
        self.ticking.remove(&id);
        debug!(entity = %id, "Entity destroyed");
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Component store
    // -----------------------------------------------------------------------

    /// Attach a component, updating the kind index and tick set.
    ///
    /// # Errors
    /// Unknown kind, missing entity, or a component of that kind already
    /// attached.
    pub fn attach(&mut self, id: EntityId, mut component: Box<dyn Component>) -> Result<()> {
        let kind = self
            .registry
            .kind_name(component.kind())
            .ok_or_else(|| TesseraError::UnknownKind(component.kind().to_string()))?;
        let entity = self
            .entities
            .get_mut(&id)
            .ok_or(TesseraError::EntityNotFound(id))?;
        if entity.components().has(kind) {
            return Err(TesseraError::AlreadyAttached {
                entity: id,
                kind: kind.to_string(),
            });
        }

        component.on_attach(id);
        if entity.components_mut().insert(kind, component).is_err() {
            return Err(TesseraError::AlreadyAttached {
                entity: id,
                kind: kind.to_string(),
            });
        }

        self.by_kind.entry(kind).or_default().insert(id);
        if self.registry.is_ticking(kind) {
            self.ticking.insert(id);
        }
        debug!(entity = %id, kind = kind, "Component attached");
        Ok(())
    }

    /// Detach the component of `kind` and return it.
    ///
    /// # Errors
    /// Missing entity, or no component of that kind attached.
    pub fn detach(&mut self, id: EntityId, kind: &str) -> Result<Box<dyn Component>> {
        let entity = self
            .entities
            .get_mut(&id)
            .ok_or(TesseraError::EntityNotFound(id))?;
        let mut component =
            entity
                .components_mut()
                .remove(kind)
                .ok_or_else(|| TesseraError::NotAttached {
                    entity: id,
                    kind: kind.to_string(),
                })?;
        component.on_detach(id);

        let still_ticking = entity
            .components()
            .kinds()
            .into_iter()
            .any(|k| self.registry.is_ticking(k));
        if !still_ticking {
            self.ticking.remove(&id);
        }
        if let Some(ids) = self.by_kind.get_mut(kind) {
            ids.remove(&id);
            if ids.is_empty() {
                self.by_kind.remove(kind);
            }
        }
        debug!(entity = %id, kind = kind, "Component detached");
        Ok(component)
    }

    /// Whether the entity exists and holds every kind in `kinds`.
    #[must_use]
    pub fn has(&self, id: EntityId, kinds: &[&str]) -> bool {
        self.entities.get(&id).is_some_and(|e| e.has(kinds))
    }

    /// Typed access to a component.
    #[must_use]
    pub fn component<T: Component>(&self, id: EntityId) -> Option<&T> {
        self.entities.get(&id)?.components().get_as::<T>()
    }

    /// Typed mutable access to a component.
    pub fn component_mut<T: Component>(&mut self, id: EntityId) -> Option<&mut T> {
        self.entities
            .get_mut(&id)?
            .components_mut()
            .get_as_mut::<T>()
    }

    // -----------------------------------------------------------------------
    // Modes and hearing
    // -----------------------------------------------------------------------

    /// Typed access to the entity's mode state.
    #[must_use]
    pub fn mode_state<T: ModeState>(&self, id: EntityId) -> Option<&T> {
        self.entities.get(&id)?.mode()?.downcast_ref::<T>()
    }

    /// Typed mutable access to the entity's mode state.
    pub fn mode_state_mut<T: ModeState>(&mut self, id: EntityId) -> Option<&mut T> {
        self.entities.get_mut(&id)?.mode_mut()?.downcast_mut::<T>()
    }

    /// Replace the entity's mode. `None` leaves it unable to act.
    ///
    /// # Errors
    /// Missing entity, or a mode kind the registry does not know.
    pub fn set_mode(&mut self, id: EntityId, mode: Option<Box<dyn ModeState>>) -> Result<()> {
        if let Some(m) = &mode {
            if self.registry.mode(m.kind()).is_none() {
                return Err(TesseraError::UnknownMode(m.kind().to_string()));
            }
        }
        let entity = self
            .entities
            .get_mut(&id)
            .ok_or(TesseraError::EntityNotFound(id))?;
        let previous = entity.replace_mode(mode);
        debug!(
            entity = %id,
            from = previous.as_ref().map(|m| m.kind()),
            to = entity.mode_kind(),
            "Mode changed"
        );
        Ok(())
    }

    /// Put the entity into a fresh instance of the named mode.
    ///
    /// # Errors
    /// Missing entity, or a mode kind the registry does not know.
    pub fn enter_mode(&mut self, id: EntityId, kind: &str) -> Result<()> {
        let initial = self
            .registry
            .mode(kind)
            .map(crate::registry::ModeKind::initial)
            .ok_or_else(|| TesseraError::UnknownMode(kind.to_string()))?;
        self.set_mode(id, Some(initial))
    }

    /// Turn message delivery on or off.
    ///
    /// # Errors
    /// [`TesseraError::EntityNotFound`] if the entity does not exist.
    pub fn set_hearing(&mut self, id: EntityId, hearing: bool) -> Result<()> {
        self.entities
            .get_mut(&id)
            .ok_or(TesseraError::EntityNotFound(id))?
            .set_hearing(hearing);
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    /// Look up an entity.
    #[must_use]
    pub fn get(&self, id: EntityId) -> Option<&Entity> {
        self.entities.get(&id)
    }

    /// Whether the entity exists.
    #[must_use]
    pub fn contains(&self, id: EntityId) -> bool {
        self.entities.contains_key(&id)
    }

    /// All entity ids in ascending order.
    pub fn entities(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.entities.keys().copied()
    }

    /// Number of entities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// Whether the zone has no entities.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Ids of entities holding a component of `kind`, ascending.
    #[must_use]
    pub fn with_kind(&self, kind: &str) -> Vec<EntityId> {
        self.by_kind
            .get(kind)
            .map(|ids| ids.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Ids of entities holding at least one ticking component, ascending.
    #[must_use]
    pub fn ticking(&self) -> Vec<EntityId> {
        self.ticking.iter().copied().collect()
    }

    /// Whether the entity is in the tick set.
    #[must_use]
    pub fn is_ticking(&self, id: EntityId) -> bool {
        self.ticking.contains(&id)
    }

    // -----------------------------------------------------------------------
    // Commands and messages
    // -----------------------------------------------------------------------

    /// Hand a command to the entity's current mode.
    ///
    /// Entities without a mode cannot act: the command is logged and
    /// dropped. Failures inside the mode are logged and counted.
    pub fn perform(&mut self, id: EntityId, command: impl Into<Command>) {
        let command = command.into();
        let Some(entity) = self.entities.get(&id) else {
            warn!(entity = %id, "Command for unknown entity dropped");
            return;
        };
        let Some(kind) = entity.mode_kind() else {
            warn!(entity = %id, command = ?command, "Entity has no mode; command dropped");
            return;
        };
        let Some(perform) = self.registry.mode(kind).map(|m| m.perform()) else {
            warn!(entity = %id, mode = kind, "Entity mode is not registered; command dropped");
            return;
        };

        self.counters.record_command();
        if let Err(err) = perform(self, id, command) {
            warn!(
                entity = %id,
                mode = kind,
                error = %format_args!("{err:#}"),
                "Command failed"
            );
            self.counters.record_action_fault();
        }
    }

    /// Send `message` to the entity if it is hearing.
    ///
    /// Messages for non-hearing or missing entities are silently dropped.
    pub fn tell(&mut self, id: EntityId, message: impl Serialize) {
        if !self.entities.get(&id).is_some_and(Entity::hearing) {
            self.counters.record_message_dropped();
            return;
        }
        let payload = match serde_json::to_string(&message) {
            Ok(payload) => payload,
            Err(err) => {
                warn!(entity = %id, error = %err, "Message could not be serialized");
                self.counters.record_message_dropped();
                return;
            }
        };
        if self
            .outbound
            .send(OutboundMessage { entity: id, payload })
            .is_err()
        {
            debug!(entity = %id, "Outbound channel closed; message dropped");
            self.counters.record_message_dropped();
            return;
        }
        self.counters.record_message_sent();
    }

    // -----------------------------------------------------------------------
    // Loop
    // -----------------------------------------------------------------------

    /// Call every ticking component's tick callback once.
    ///
    /// The tick set is snapshotted first: entities that start ticking during
    /// this pass wait for the next one, and entities that stop ticking or are
    /// destroyed before their turn are skipped.
    pub fn tick(&mut self) {
        let _span = info_span!(spans::ZONE_TICK, tick = self.tick_count).entered();
        let registry = Arc::clone(&self.registry);

        for id in self.ticking() {
            let Some(kinds) = self.entities.get(&id).map(|e| e.components().kinds()) else {
                continue;
            };
            for kind in kinds {
                let Some(tick) = registry.tick_fn(kind) else {
                    continue;
                };
                if !self.has(id, &[kind]) {
                    continue;
                }
                if let Err(err) = tick(self, id) {
                    warn!(
                        entity = %id,
                        kind = kind,
                        error = %format_args!("{err:#}"),
                        "Tick failed"
                    );
                    self.counters.record_tick_fault();
                }
            }
        }

        self.tick_count += 1;
        self.counters.record_tick();
    }

    /// Perform up to `zone.max_commands_per_step` queued commands in arrival
    /// order. Returns how many were taken from the queue.
    pub fn drain_inbound(&mut self) -> usize {
        let commands = self.inbound.drain(self.config.zone.max_commands_per_step);
        let n = commands.len();
        for command in commands {
            debug!(
                entity = %command.entity,
                waited_ms = command.received_at.elapsed().as_millis(),
                "Inbound command"
            );
            self.perform(command.entity, command.text);
        }
        n
    }

    /// Drain inbound commands, then tick once.
    pub fn step(&mut self) {
        let _span = info_span!(spans::ZONE_STEP, zone = %self.config.zone.name).entered();
        self.drain_inbound();
        self.tick();
    }

    /// Run the zone loop until `stop` is set.
    ///
    /// Commands are drained every poll interval and ticks run every tick
    /// interval. With a store, the zone is saved every
    /// `persistence.auto_save_interval_ticks` ticks and once more on exit.
    ///
    /// # Errors
    /// Fails only if the final save fails; periodic save failures are logged.
    pub fn run_until(
        &mut self,
        stop: &AtomicBool,
        store: Option<&dyn SnapshotStore>,
    ) -> Result<()> {
        let tick_interval = self.config.zone.tick_interval();
        let poll_interval = self.config.zone.poll_interval();
        let auto_save = self.config.persistence.auto_save_interval_ticks;
        let mut next_tick = Instant::now() + tick_interval;
        info!(zone = %self.name(), tick_ms = tick_interval.as_millis(), "Zone loop started");

        while !stop.load(Ordering::Relaxed) {
            self.drain_inbound();

            let now = Instant::now();
            if now >= next_tick {
                self.tick();
                next_tick += tick_interval;
                if next_tick < now {
                    next_tick = now + tick_interval;
                }
                if let Some(store) = store {
                    if auto_save > 0 && self.tick_count % auto_save == 0 {
                        if let Err(err) = self.save_to(store) {
                            warn!(zone = %self.name(), error = %err, "Auto-save failed");
                        }
                    }
                }
            }

            let until_tick = next_tick.saturating_duration_since(Instant::now());
            std::thread::sleep(poll_interval.min(until_tick));
        }

        info!(zone = %self.name(), ticks = self.tick_count, "Zone loop stopped");
        if let Some(store) = store {
            self.save_to(store)?;
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Snapshots
    // -----------------------------------------------------------------------

    /// Record of one entity.
    #[must_use]
    pub fn entity_record(&self, id: EntityId) -> Option<EntityRecord> {
        self.entities.get(&id).map(Entity::to_record)
    }

    /// Serialize every entity.
    #[must_use]
    pub fn to_snapshot(&self) -> ZoneSnapshot {
        ZoneSnapshot {
            zone: self.config.zone.name.clone(),
            taken_at: Utc::now(),
            entities: self.entities.values().map(Entity::to_record).collect(),
        }
    }

    /// Rebuild entities from a typed snapshot.
    ///
    /// Entities that fail to rebuild are skipped and reported; the rest are
    /// restored.
    pub fn restore(&mut self, snapshot: &ZoneSnapshot) -> RestoreReport {
        let mut report = RestoreReport::default();
        for (index, record) in snapshot.entities.iter().enumerate() {
            self.restore_one(index, record, &mut report);
        }
        self.log_restore(&report);
        report
    }

    /// Rebuild entities from an undecoded snapshot.
    ///
    /// Like [`restore`](Self::restore), but an entity whose JSON does not
    /// even parse as a record is reported and skipped as well.
    pub fn restore_raw(&mut self, snapshot: RawSnapshot) -> RestoreReport {
        let mut report = RestoreReport::default();
        for (index, value) in snapshot.entities.into_iter().enumerate() {
            let entity = value
                .get("id")
                .and_then(serde_json::Value::as_u64)
                .map(EntityId);
            match serde_json::from_value::<EntityRecord>(value) {
                Ok(record) => self.restore_one(index, &record, &mut report),
                Err(err) => {
                    warn!(index, error = %err, "Snapshot entity is malformed; skipped");
                    report.errors.push(RestoreError {
                        index,
                        entity,
                        error: err.into(),
                    });
                }
            }
        }
        self.log_restore(&report);
        report
    }

    fn restore_one(&mut self, index: usize, record: &EntityRecord, report: &mut RestoreReport) {
        match self.insert_record(record) {
            Ok(id) => report.restored.push(id),
            Err(err) => {
                warn!(
                    index,
                    entity = %record.id,
                    error = %err,
                    "Snapshot entity could not be restored; skipped"
                );
                report.errors.push(RestoreError {
                    index,
                    entity: Some(record.id),
                    error: err,
                });
            }
        }
    }

    fn log_restore(&self, report: &RestoreReport) {
        info!(
            zone = %self.name(),
            restored = report.restored.len(),
            skipped = report.errors.len(),
            "Snapshot restored"
        );
    }

    /// Save a snapshot of this zone to `store`.
    ///
    /// # Errors
    /// Propagates store failures.
    pub fn save_to(&self, store: &dyn SnapshotStore) -> Result<()> {
        let _span = info_span!(spans::PERSIST_SAVE, zone = %self.name()).entered();
        store.save(self.name(), &self.to_snapshot())?;
        self.counters.record_snapshot_saved();
        Ok(())
    }

    /// Load this zone's snapshot from `store` and restore it.
    ///
    /// Returns `None` if the store holds no snapshot for this zone.
    ///
    /// # Errors
    /// Propagates store failures; per-entity problems land in the report.
    pub fn load_from(&mut self, store: &dyn SnapshotStore) -> Result<Option<RestoreReport>> {
        let _span = info_span!(spans::PERSIST_LOAD, zone = %self.name()).entered();
        let name = self.name().to_string();
        Ok(store.load(&name)?.map(|raw| self.restore_raw(raw)))
    }
}
