//! Outbound call queue.
//!
//! Calls accumulate here between exchanges. Insertion order is the order the
//! peer runs them. Every operation takes the queue lock once, so appends,
//! supersedes and drains never interleave.

use std::collections::VecDeque;
use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};

use callbridge_protocol::CallRecord;

/// Identifier of a queued call, unique within one queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CallId(u64);

impl CallId {
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for CallId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A call waiting for the next exchange.
#[derive(Debug, Clone, PartialEq)]
pub struct QueuedCall {
    pub id: CallId,
    pub record: CallRecord,
}

#[derive(Debug, Default)]
struct QueueState {
    next_id: u64,
    calls: VecDeque<QueuedCall>,
}

impl QueueState {
    fn push(&mut self, record: CallRecord) -> CallId {
        let id = CallId(self.next_id);
        self.next_id = self.next_id.wrapping_add(1);
        self.calls.push_back(QueuedCall { id, record });
        id
    }
}

/// FIFO of calls pending transmission to the peer.
#[derive(Debug, Default)]
pub struct CallQueue {
    state: Mutex<QueueState>,
}

impl CallQueue {
    pub fn new() -> Self {
        Self::default()
    }

    // Critical sections never leave the queue half-updated.
    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append a call.
    pub fn enqueue(&self, record: CallRecord) -> CallId {
        self.lock().push(record)
    }

    /// Drop every queued call named `name`, then append `record`.
    ///
    /// Returns the new call's id and how many calls were dropped.
    pub fn supersede_and_enqueue(&self, name: &str, record: CallRecord) -> (CallId, usize) {
        let mut state = self.lock();
        let before = state.calls.len();
        state.calls.retain(|c| c.record.method != name);
        let removed = before - state.calls.len();
        (state.push(record), removed)
    }

    /// Take every queued call, in order.
    ///
    /// A call enqueued concurrently lands either in this snapshot or in the
    /// queue for the next one, never both.
    pub fn drain_snapshot(&self) -> Vec<QueuedCall> {
        self.lock().calls.drain(..).collect()
    }

    /// Copy the queued calls, in order, without removing them.
    pub fn snapshot(&self) -> Vec<QueuedCall> {
        self.lock().calls.iter().cloned().collect()
    }

    /// Remove a delivered call.
    ///
    /// Returns false if the call is no longer queued (superseded meanwhile).
    pub fn acknowledge(&self, id: CallId) -> bool {
        let mut state = self.lock();
        // Snapshots are written in queue order, so the call is usually first.
        if state.calls.front().is_some_and(|c| c.id == id) {
            return state.calls.pop_front().is_some();
        }
        match state.calls.iter().position(|c| c.id == id) {
            Some(index) => state.calls.remove(index).is_some(),
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.lock().calls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().calls.is_empty()
    }

    /// Method names of the queued calls, in order.
    pub fn pending_methods(&self) -> Vec<String> {
        self.lock()
            .calls
            .iter()
            .map(|c| c.record.method.clone())
            .collect()
    }
}
