//! `EventQueue`: the kernel's pending-resumption queue.
//!
//! Events are keyed by `(due_time, sequence)`.  The sequence number is a
//! monotonically increasing counter assigned at schedule time, so events due
//! at the same instant pop in the order they were scheduled (FIFO).  Both
//! keys are totally ordered, which makes a `BTreeMap` a drop-in priority
//! queue with O(log E) push and pop.

use std::collections::BTreeMap;

use agv_core::{ProcessId, SimTime};

#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
struct EventKey {
    due: SimTime,
    seq: u64,
}

/// Priority queue of `(due_time, process)` resumptions.
#[derive(Default)]
pub struct EventQueue {
    inner: BTreeMap<EventKey, ProcessId>,
    next_seq: u64,
}

impl EventQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule `process` to resume at `due`.  Returns the sequence number
    /// assigned to the event.
    pub fn schedule(&mut self, due: SimTime, process: ProcessId) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.inner.insert(EventKey { due, seq }, process);
        seq
    }

    /// Remove and return the earliest event.
    pub fn pop(&mut self) -> Option<(SimTime, ProcessId)> {
        self.inner.pop_first().map(|(key, pid)| (key.due, pid))
    }

    /// Due time of the earliest event, or `None` if empty.
    pub fn peek_time(&self) -> Option<SimTime> {
        self.inner.keys().next().map(|k| k.due)
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Total number of events ever scheduled.
    pub fn scheduled_total(&self) -> u64 {
        self.next_seq
    }
}
