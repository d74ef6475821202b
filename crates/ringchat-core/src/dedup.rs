//! Bounded history of frame fingerprints.
//!
//! A FIFO plus a parallel set: the FIFO gives eviction order, the set gives
//! O(1) membership. Both always hold exactly the same fingerprints.

use std::collections::{HashSet, VecDeque};

/// Number of fingerprints a node remembers.
pub const HISTORY_CAPACITY: usize = 64;

#[derive(Debug, Clone)]
pub struct DedupHistory {
    order: VecDeque<u32>,
    seen: HashSet<u32>,
    capacity: usize,
}

impl DedupHistory {
    pub fn new() -> Self {
        Self::with_capacity(HISTORY_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            order: VecDeque::with_capacity(capacity),
            seen: HashSet::with_capacity(capacity),
            capacity: capacity.max(1),
        }
    }

    pub fn contains(&self, fingerprint: u32) -> bool {
        self.seen.contains(&fingerprint)
    }

    /// Record a fingerprint. Returns false if it was already present, in
    /// which case nothing changes.
    pub fn insert(&mut self, fingerprint: u32) -> bool {
        if self.seen.contains(&fingerprint) {
            return false;
        }
        if self.order.len() == self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.seen.remove(&oldest);
            }
        }
        self.order.push_back(fingerprint);
        self.seen.insert(fingerprint);
        true
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

impl Default for DedupHistory {
    fn default() -> Self {
        Self::new()
    }
}
