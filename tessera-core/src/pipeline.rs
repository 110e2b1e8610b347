//! Action dispatch: prepare, hook points, run.
//!
//! ```text
//! dispatch(actor, action, fields)
//!   │
//!   ├─► prepare ──► Halt ───────────────────────► Outcome { halted }
//!   │       │
//!   │       └─► Proceed([hook points])
//!   │                 │
//!   │                 ├─► for each witness (emitted order)
//!   │                 │     for each attached kind (attachment order)
//!   │                 │       for each interceptor (declaration order)
//!   │                 │
//!   └─► run (checks event.prevented()) ─────────► Outcome
//! ```
//!
//! Dispatch is plain recursion over `&mut Zone`: an interceptor or run step
//! may dispatch further actions, which complete before control returns.

use std::fmt;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::error::{Result, TesseraError};
use crate::event::{Event, Fields};
use crate::registry::Registry;
use crate::types::EntityId;
use crate::zone::Zone;

/// Hook phase an interceptor is registered against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    /// Before the default behavior; may veto it.
    Before,
    /// After the default behavior.
    After,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Before => f.write_str("before"),
            Self::After => f.write_str("after"),
        }
    }
}

/// One point at which interceptors are offered the event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HookPoint {
    /// Which interceptors are consulted.
    pub phase: Phase,
    /// Entities whose components are consulted. `None` means the actor.
    pub witnesses: Option<Vec<EntityId>>,
}

impl HookPoint {
    /// A "before" point witnessed by the actor.
    #[must_use]
    pub fn before() -> Self {
        Self {
            phase: Phase::Before,
            witnesses: None,
        }
    }

    /// An "after" point witnessed by the actor.
    #[must_use]
    pub fn after() -> Self {
        Self {
            phase: Phase::After,
            witnesses: None,
        }
    }

    /// Replace the witness list.
    #[must_use]
    pub fn witnessed_by(mut self, witnesses: Vec<EntityId>) -> Self {
        self.witnesses = Some(witnesses);
        self
    }
}

/// What a prepare step decided.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Flow {
    /// Stop now; no hook points and no run step.
    Halt,
    /// Fire these hook points in order, then run.
    Proceed(Vec<HookPoint>),
}

impl Flow {
    /// One "before" point witnessed by the actor.
    #[must_use]
    pub fn before() -> Self {
        Self::Proceed(vec![HookPoint::before()])
    }

    /// One "before" point witnessed by `witnesses`.
    #[must_use]
    pub fn witnessed_by(witnesses: Vec<EntityId>) -> Self {
        Self::Proceed(vec![HookPoint::before().witnessed_by(witnesses)])
    }

    /// No hook points; go straight to run.
    #[must_use]
    pub fn unobserved() -> Self {
        Self::Proceed(Vec::new())
    }
}

/// Result of one dispatch.
#[derive(Debug, Clone)]
pub struct Outcome {
    /// The event as it stood when the dispatch finished.
    pub event: Event,
    /// The prepare step halted, or failed.
    pub halted: bool,
    /// A callback failed during the dispatch.
    pub faulted: bool,
}

impl Outcome {
    /// Whether an interceptor vetoed the default behavior.
    #[must_use]
    pub fn vetoed(&self) -> bool {
        self.event.prevented()
    }
}

/// Dispatch `action` for `actor` with the given fields.
///
/// Callback failures are logged, counted and reported through
/// [`Outcome::faulted`]; they never propagate. A failing interceptor
/// abandons the rest of its hook point, but later points and the run step
/// still execute. A failing prepare step abandons the dispatch.
///
/// # Errors
/// [`TesseraError::UnknownAction`] if no kind declares `action`.
pub fn dispatch(zone: &mut Zone, actor: EntityId, action: &str, fields: Fields) -> Result<Outcome> {
    let registry = Arc::clone(zone.registry());
    let def = registry
        .action(action)
        .ok_or_else(|| TesseraError::UnknownAction(action.to_string()))?;
    zone.counters().record_action();

    let mut event = Event::new(def.id(), actor, fields);
    debug!(entity = %actor, action = %def.id(), "Dispatching action");

    let points = match (def.prepare_fn())(zone, &mut event) {
        Ok(Flow::Proceed(points)) => points,
        Ok(Flow::Halt) => {
            return Ok(Outcome {
                event,
                halted: true,
                faulted: false,
            });
        }
        Err(err) => {
            warn!(
                entity = %actor,
                action = %def.id(),
                error = %format_args!("{err:#}"),
                "Action prepare failed"
            );
            zone.counters().record_action_fault();
            return Ok(Outcome {
                event,
                halted: true,
                faulted: true,
            });
        }
    };

    let mut faulted = false;
    for point in &points {
        if !fire(zone, &registry, point, &mut event) {
            faulted = true;
        }
    }

    if event.prevented() {
        zone.counters().record_veto();
        debug!(entity = %actor, action = %def.id(), "Default behavior prevented");
    }

    if let Err(err) = (def.run_fn())(zone, &mut event) {
        warn!(
            entity = %actor,
            action = %def.id(),
            error = %format_args!("{err:#}"),
            "Action run failed"
        );
        zone.counters().record_action_fault();
        faulted = true;
    }

    Ok(Outcome {
        event,
        halted: false,
        faulted,
    })
}

/// Offer the event to every interceptor selected by `point`.
///
/// The witness's kinds are snapshotted when the witness is reached; a
/// component detached by an earlier interceptor is skipped, and a witness
/// destroyed mid-point is skipped entirely. Returns `false` if an
/// interceptor failed and the point was abandoned.
fn fire(zone: &mut Zone, registry: &Registry, point: &HookPoint, event: &mut Event) -> bool {
    let witnesses = point
        .witnesses
        .clone()
        .unwrap_or_else(|| vec![event.actor()]);

    for witness in witnesses {
        let Some(kinds) = zone.get(witness).map(|e| e.components().kinds()) else {
            debug!(entity = %witness, action = %event.action(), "Witness no longer exists");
            continue;
        };

        for kind in kinds {
            let action = event.action().to_string();
            for hook in registry.hooks(kind, point.phase, &action) {
                if !zone.has(witness, &[kind]) {
                    break;
                }
                if let Err(err) = hook(zone, witness, event) {
                    warn!(
                        entity = %witness,
                        kind = kind,
                        action = %action,
                        phase = %point.phase,
                        error = %format_args!("{err:#}"),
                        "Interceptor failed; abandoning hook point"
                    );
                    zone.counters().record_interceptor_fault();
                    return false;
                }
            }
        }
    }
    true
}
