//! Priority dispatch queue.
//!
//! Highest priority first; within a priority tier, first enqueued first.
//! Every operation takes the queue's own lock, so callers never coordinate.

use crate::engine::lock;
use crate::speech::SpeechUnit;
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::Mutex;

#[derive(Debug)]
struct Queued {
    seq: u64,
    unit: SpeechUnit,
}

impl PartialEq for Queued {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Queued {}

impl PartialOrd for Queued {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Queued {
    // Max-heap: greater pops first.
    fn cmp(&self, other: &Self) -> Ordering {
        self.unit
            .priority()
            .cmp(&other.unit.priority())
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

#[derive(Debug, Default)]
struct Inner {
    heap: BinaryHeap<Queued>,
    next_seq: u64,
}

impl Inner {
    fn push(&mut self, unit: SpeechUnit) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.heap.push(Queued { seq, unit });
    }
}

/// Pending units awaiting the dispatch worker.
#[derive(Debug, Default)]
pub struct DispatchQueue {
    inner: Mutex<Inner>,
}

impl DispatchQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, unit: SpeechUnit) {
        lock(&self.inner).push(unit);
    }

    /// Enqueues a batch under one lock, so no other push interleaves with it.
    /// Returns the number of units added.
    pub fn push_all<I>(&self, units: I) -> usize
    where
        I: IntoIterator<Item = SpeechUnit>,
    {
        let mut inner = lock(&self.inner);
        let mut added = 0;
        for unit in units {
            inner.push(unit);
            added += 1;
        }
        added
    }

    pub fn pop(&self) -> Option<SpeechUnit> {
        lock(&self.inner).heap.pop().map(|q| q.unit)
    }

    /// Drops every pending unit. Returns how many were dropped.
    pub fn clear(&self) -> usize {
        let mut inner = lock(&self.inner);
        let dropped = inner.heap.len();
        inner.heap.clear();
        dropped
    }

    pub fn len(&self) -> usize {
        lock(&self.inner).heap.len()
    }

    pub fn is_empty(&self) -> bool {
        lock(&self.inner).heap.is_empty()
    }
}
