//! Inbound command queue.
//!
//! The transport layer pushes `(entity, text)` pairs from any thread; the
//! zone drains them in arrival order at the start of each step. Back-pressure
//! is a hard capacity: pushes beyond it are refused and counted.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;

use crate::types::EntityId;

/// A command waiting to be performed.
#[derive(Debug, Clone)]
pub struct InboundCommand {
    /// Entity the command is for.
    pub entity: EntityId,
    /// Raw command text.
    pub text: String,
    /// When the command was queued.
    pub received_at: Instant,
}

/// Thread-safe bounded FIFO of inbound commands.
///
/// Cloning is cheap and shares the underlying queue.
#[derive(Clone)]
pub struct InboundQueue {
    inner: Arc<Mutex<InboundQueueInner>>,
}

struct InboundQueueInner {
    queue: VecDeque<InboundCommand>,
    capacity: usize,
    total_received: u64,
    total_dropped: u64,
}

/// Statistics about the inbound queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueStats {
    /// Current queue depth.
    pub depth: usize,
    /// Total commands accepted.
    pub total_received: u64,
    /// Total commands refused (queue full).
    pub total_dropped: u64,
}

impl InboundQueue {
    /// Create a queue holding at most `capacity` commands.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(InboundQueueInner {
                queue: VecDeque::new(),
                capacity,
                total_received: 0,
                total_dropped: 0,
            })),
        }
    }

    /// Queue a command. Returns `false` if the queue is full.
    pub fn push(&self, entity: EntityId, text: impl Into<String>) -> bool {
        let mut inner = self.inner.lock();

        if inner.queue.len() >= inner.capacity {
            inner.total_dropped += 1;
            return false;
        }

        inner.total_received += 1;
        inner.queue.push_back(InboundCommand {
            entity,
            text: text.into(),
            received_at: Instant::now(),
        });
        true
    }

    /// Remove up to `limit` commands in arrival order.
    pub fn drain(&self, limit: usize) -> Vec<InboundCommand> {
        let mut inner = self.inner.lock();
        let n = limit.min(inner.queue.len());
        inner.queue.drain(..n).collect()
    }

    /// Current queue depth.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().queue.len()
    }

    /// Whether the queue is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.lock().queue.is_empty()
    }

    /// Get queue statistics.
    #[must_use]
    pub fn stats(&self) -> QueueStats {
        let inner = self.inner.lock();
        QueueStats {
            depth: inner.queue.len(),
            total_received: inner.total_received,
            total_dropped: inner.total_dropped,
        }
    }
}
