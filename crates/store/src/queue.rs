use std::collections::VecDeque;

use metrics::counter;
use steve_core::QueueAction;
use tracing::warn;

/// FIFO of pending cache mutations with a fixed capacity. Overflow drops the
/// oldest action and raises a flag so the owner can resync.
pub struct EventQueue {
    items: VecDeque<QueueAction>,
    cap: usize,
    dropped: u64,
    overflowed: bool,
}

impl EventQueue {
    pub fn with_capacity(cap: usize) -> Self {
        Self { items: VecDeque::new(), cap: cap.max(1), dropped: 0, overflowed: false }
    }

    pub fn len(&self) -> usize { self.items.len() }
    pub fn is_empty(&self) -> bool { self.items.is_empty() }
    pub fn dropped(&self) -> u64 { self.dropped }

    pub fn push(&mut self, action: QueueAction) {
        if self.items.len() >= self.cap {
            if let Some(old) = self.items.pop_front() {
                self.dropped += 1;
                self.overflowed = true;
                counter!("steve_queue_dropped_total", 1u64);
                warn!(ty = %old.ty(), cap = self.cap, "event queue full; dropped oldest action");
            }
        }
        self.items.push_back(action);
    }

    /// Record events lost before reaching the queue.
    pub fn mark_lost(&mut self) { self.overflowed = true; }

    /// Take everything queued so far, in arrival order.
    pub fn drain(&mut self) -> Vec<QueueAction> { self.items.drain(..).collect() }

    /// Whether actions were dropped since the last call.
    pub fn take_overflow(&mut self) -> bool { std::mem::take(&mut self.overflowed) }
}
