//! Deadline-ordered index of pending entries.
//!
//! Entries are bucketed by deadline; within a bucket they are ordered by
//! insertion sequence. Unlike a lazy-deletion heap, removal is exact, so the
//! length is always the number of live entries.

use crate::core::time::Tick;
use std::collections::BTreeMap;

/// Position of an entry in the index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DeadlineKey {
    /// Absolute deadline.
    pub deadline: Tick,
    /// Insertion sequence, breaks ties between equal deadlines.
    pub sequence: u64,
}

/// Ordered map from deadline to the entries due at that deadline.
#[derive(Debug)]
pub struct DeadlineIndex<E> {
    buckets: BTreeMap<Tick, BTreeMap<u64, E>>,
    len: usize,
}

impl<E> DeadlineIndex<E> {
    /// Create an empty index.
    pub fn new() -> Self {
        Self {
            buckets: BTreeMap::new(),
            len: 0,
        }
    }

    /// Insert an entry. Returns any entry previously stored under the same key.
    pub fn insert(&mut self, key: DeadlineKey, entry: E) -> Option<E> {
        let previous = self
            .buckets
            .entry(key.deadline)
            .or_default()
            .insert(key.sequence, entry);
        if previous.is_none() {
            self.len += 1;
        }
        previous
    }

    /// Remove a single entry.
    pub fn remove(&mut self, key: DeadlineKey) -> Option<E> {
        let bucket = self.buckets.get_mut(&key.deadline)?;
        let entry = bucket.remove(&key.sequence)?;
        if bucket.is_empty() {
            self.buckets.remove(&key.deadline);
        }
        self.len -= 1;
        Some(entry)
    }

    /// Remove and return every entry with `deadline <= now`.
    ///
    /// Entries come out in ascending deadline order, ties by sequence.
    pub fn pop_due(&mut self, now: Tick) -> Vec<(DeadlineKey, E)> {
        let due = match now.ms.checked_add(1) {
            Some(next) => {
                let later = self.buckets.split_off(&Tick::new(next));
                std::mem::replace(&mut self.buckets, later)
            }
            None => std::mem::take(&mut self.buckets),
        };

        let mut popped = Vec::new();
        for (deadline, bucket) in due {
            for (sequence, entry) in bucket {
                popped.push((DeadlineKey { deadline, sequence }, entry));
            }
        }
        self.len -= popped.len();
        popped
    }

    /// Remove and return every entry, in deadline order.
    pub fn drain(&mut self) -> Vec<(DeadlineKey, E)> {
        self.pop_due(Tick::MAX)
    }

    /// Earliest deadline in the index.
    pub fn next_deadline(&self) -> Option<Tick> {
        self.buckets.keys().next().copied()
    }

    /// Iterate entries in deadline order without removing them.
    pub fn iter(&self) -> impl Iterator<Item = (DeadlineKey, &E)> {
        self.buckets.iter().flat_map(|(deadline, bucket)| {
            bucket.iter().map(move |(sequence, entry)| {
                (
                    DeadlineKey {
                        deadline: *deadline,
                        sequence: *sequence,
                    },
                    entry,
                )
            })
        })
    }

    /// Number of indexed entries.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Check if the index is empty.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl<E> Default for DeadlineIndex<E> {
    fn default() -> Self {
        Self::new()
    }
}
