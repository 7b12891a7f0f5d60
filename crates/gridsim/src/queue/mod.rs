//! Per-center future-event queue.

use std::collections::BinaryHeap;

use parking_lot::Mutex;

use crate::event::{ClientId, EventKind, FutureEvent};

#[derive(Default)]
struct Inner {
    heap: BinaryHeap<FutureEvent>,
    next_seq: u64,
}

/// Time-ordered queue of the pending events of one center.
///
/// Any thread may push. Only the worker owning the center pops, but cancellation may run concurrently with pushes
/// from other workers, so every operation takes the internal lock.
#[derive(Default)]
pub struct EventQueue {
    inner: Mutex<Inner>,
}

impl EventQueue {
    /// Creates an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an event. Events with equal times are popped in push order.
    pub fn push(&self, mut event: FutureEvent) {
        let mut inner = self.inner.lock();
        let seq = inner.next_seq;
        inner.next_seq += 1;
        event.set_seq(seq);
        inner.heap.push(event);
    }

    /// Removes and returns the earliest event.
    pub fn pop(&self) -> Option<FutureEvent> {
        self.inner.lock().heap.pop()
    }

    /// Returns the time of the earliest event.
    pub fn peek_time(&self) -> Option<f64> {
        self.inner.lock().heap.peek().map(|e| e.time())
    }

    /// Returns the number of pending events.
    pub fn len(&self) -> usize {
        self.inner.lock().heap.len()
    }

    /// Returns true if there are no pending events.
    pub fn is_empty(&self) -> bool {
        self.inner.lock().heap.is_empty()
    }

    /// Removes the earliest pending event of the given kind carrying the given client.
    ///
    /// Returns `None` if no such event is pending, e.g. because it was already processed.
    pub fn remove(&self, kind: EventKind, client: Option<ClientId>) -> Option<FutureEvent> {
        let mut inner = self.inner.lock();
        let mut events = std::mem::take(&mut inner.heap).into_vec();
        let position = events
            .iter()
            .enumerate()
            .filter(|(_, e)| e.matches(kind, client))
            .max_by(|(_, a), (_, b)| a.cmp(b))
            .map(|(idx, _)| idx);
        let removed = position.map(|idx| events.swap_remove(idx));
        inner.heap = BinaryHeap::from(events);
        removed
    }

    /// Drops every pending event and returns how many were dropped.
    pub fn clear(&self) -> usize {
        let mut inner = self.inner.lock();
        let count = inner.heap.len();
        inner.heap.clear();
        count
    }
}
