//! Broadcast handle for run events

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;

use crate::types::{Event, EventEnvelope};

/// One 180s run at a 2s cadence emits about a hundred events.
const DEFAULT_CAPACITY: usize = 512;

/// Cloneable handle the sequencer publishes run events on.
///
/// Envelopes carry a sequence number assigned in emission order and shared
/// by every clone, so a subscriber that lagged can tell what it missed.
#[derive(Clone, Debug)]
pub struct EventBus {
    sender: broadcast::Sender<EventEnvelope>,
    next_seq: Arc<AtomicU64>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            next_seq: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Stamp `event` and send it to current subscribers.
    ///
    /// Returns how many subscribers received it. With none, the event is
    /// still numbered and then dropped.
    pub fn emit(&self, event: Event) -> usize {
        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
        self.sender.send(EventEnvelope::new(seq, event)).unwrap_or(0)
    }

    /// Receive events emitted from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<EventEnvelope> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Number of events emitted so far.
    pub fn emitted(&self) -> u64 {
        self.next_seq.load(Ordering::Relaxed)
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
