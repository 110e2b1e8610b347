//! Runtime counters for one zone.
//!
//! Lock-free `AtomicU64`s incremented on the dispatch and tick paths and read
//! by the transport side through [`ZoneHandle`](crate::zone::ZoneHandle).

use std::sync::atomic::{AtomicU64, Ordering};

// ---------------------------------------------------------------------------
// Counters (lock-free)
// ---------------------------------------------------------------------------

/// Atomic counters for high-frequency zone events.
#[derive(Debug)]
pub struct ZoneCounters {
    /// Commands handed to a mode.
    pub commands_dispatched: AtomicU64,
    /// Text commands no action matched.
    pub resolution_misses: AtomicU64,
    /// Actions dispatched, textual or programmatic.
    pub actions_dispatched: AtomicU64,
    /// Actions whose default behavior was vetoed.
    pub actions_vetoed: AtomicU64,
    /// Interceptors that returned an error.
    pub interceptor_faults: AtomicU64,
    /// Prepare/run steps or modes that returned an error.
    pub action_faults: AtomicU64,
    /// Completed zone ticks.
    pub ticks: AtomicU64,
    /// Tick callbacks that returned an error.
    pub tick_faults: AtomicU64,
    /// Messages delivered to the outbound channel.
    pub messages_sent: AtomicU64,
    /// Messages discarded because the target was not hearing.
    pub messages_dropped: AtomicU64,
    /// Snapshots written to a store.
    pub snapshots_saved: AtomicU64,
}

impl ZoneCounters {
    /// Create a new set of zeroed counters.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            commands_dispatched: AtomicU64::new(0),
            resolution_misses: AtomicU64::new(0),
            actions_dispatched: AtomicU64::new(0),
            actions_vetoed: AtomicU64::new(0),
            interceptor_faults: AtomicU64::new(0),
            action_faults: AtomicU64::new(0),
            ticks: AtomicU64::new(0),
            tick_faults: AtomicU64::new(0),
            messages_sent: AtomicU64::new(0),
            messages_dropped: AtomicU64::new(0),
            snapshots_saved: AtomicU64::new(0),
        }
    }

    pub(crate) fn record_command(&self) {
        self.commands_dispatched.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_resolution_miss(&self) {
        self.resolution_misses.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_action(&self) {
        self.actions_dispatched.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_veto(&self) {
        self.actions_vetoed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_interceptor_fault(&self) {
        self.interceptor_faults.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_action_fault(&self) {
        self.action_faults.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_tick(&self) {
        self.ticks.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_tick_fault(&self) {
        self.tick_faults.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_message_sent(&self) {
        self.messages_sent.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_message_dropped(&self) {
        self.messages_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_snapshot_saved(&self) {
        self.snapshots_saved.fetch_add(1, Ordering::Relaxed);
    }

    /// Snapshot all counters for export.
    #[must_use]
    pub fn snapshot(&self) -> CounterSnapshot {
        CounterSnapshot {
            commands_dispatched: self.commands_dispatched.load(Ordering::Relaxed),
            resolution_misses: self.resolution_misses.load(Ordering::Relaxed),
            actions_dispatched: self.actions_dispatched.load(Ordering::Relaxed),
            actions_vetoed: self.actions_vetoed.load(Ordering::Relaxed),
            interceptor_faults: self.interceptor_faults.load(Ordering::Relaxed),
            action_faults: self.action_faults.load(Ordering::Relaxed),
            ticks: self.ticks.load(Ordering::Relaxed),
            tick_faults: self.tick_faults.load(Ordering::Relaxed),
            messages_sent: self.messages_sent.load(Ordering::Relaxed),
            messages_dropped: self.messages_dropped.load(Ordering::Relaxed),
            snapshots_saved: self.snapshots_saved.load(Ordering::Relaxed),
        }
    }
}

impl Default for ZoneCounters {
    fn default() -> Self {
        Self::new()
    }
}

/// Counter values at a point in time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CounterSnapshot {
    /// Commands handed to a mode.
    pub commands_dispatched: u64,
    /// Text commands no action matched.
    pub resolution_misses: u64,
    /// Actions dispatched.
    pub actions_dispatched: u64,
    /// Actions vetoed.
    pub actions_vetoed: u64,
    /// Interceptor failures.
    pub interceptor_faults: u64,
    /// Prepare/run/mode failures.
    pub action_faults: u64,
    /// Completed ticks.
    pub ticks: u64,
    /// Tick callback failures.
    pub tick_faults: u64,
    /// Messages delivered.
    pub messages_sent: u64,
    /// Messages discarded.
    pub messages_dropped: u64,
    /// Snapshots written.
    pub snapshots_saved: u64,
}

impl CounterSnapshot {
    /// Format as a one-line human-readable summary.
    #[must_use]
    pub fn summary(&self) -> String {
        format!(
            "commands={} misses={} actions={} vetoed={} faults={}/{}/{} ticks={} \
             sent={} dropped={} saves={}",
            self.commands_dispatched,
            self.resolution_misses,
            self.actions_dispatched,
            self.actions_vetoed,
            self.interceptor_faults,
            self.action_faults,
            self.tick_faults,
            self.ticks,
            self.messages_sent,
            self.messages_dropped,
            self.snapshots_saved,
        )
    }
}

// ---------------------------------------------------------------------------
// Tracing Span Names
// ---------------------------------------------------------------------------

/// Span names used with `tracing::span!`.
pub mod spans {
    /// One zone step (inbound drain plus due tick).
    pub const ZONE_STEP: &str = "tessera::zone::step";
    /// One tick pass over the tick set.
    pub const ZONE_TICK: &str = "tessera::zone::tick";
    /// Snapshot save.
    pub const PERSIST_SAVE: &str = "tessera::persist::save";
    /// Snapshot load and restore.
    pub const PERSIST_LOAD: &str = "tessera::persist::load";
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
