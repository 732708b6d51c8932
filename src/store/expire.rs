use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};
use std::time::SystemTime;

/// Stale heap entries tolerated before the heap is rebuilt.
const COMPACT_SLACK: usize = 64;

/// Tracks key expiration deadlines using a min-heap + map.
///
/// Deadlines are wall-clock instants so that absolute expiry (`expireat`)
/// and relative expiry share one representation.
#[derive(Debug, Default)]
pub struct Expiry {
    /// Maps key → deadline
    deadlines: HashMap<String, SystemTime>,
    /// Min-heap ordered by soonest deadline
    heap: BinaryHeap<Reverse<(SystemTime, String)>>,
}

impl Expiry {
    /// Set a deadline for a key. Overwrites any previous deadline.
    pub fn set_deadline(&mut self, key: String, deadline: SystemTime) {
        self.deadlines.insert(key.clone(), deadline);
        self.heap.push(Reverse((deadline, key)));
        self.maybe_compact();
    }

    /// Remove any deadline for a key, returning it.
    pub fn remove(&mut self, key: &str) -> Option<SystemTime> {
        // Lazy removal: stale heap entries are skipped in `drain_expired`.
        let removed = self.deadlines.remove(key);
        if removed.is_some() {
            self.maybe_compact();
        }
        removed
    }

    /// Rebuild the heap from live deadlines once stale entries dominate it.
    fn maybe_compact(&mut self) {
        if self.heap.len() <= 2 * self.deadlines.len() + COMPACT_SLACK {
            return;
        }
        self.heap = self
            .deadlines
            .iter()
            .map(|(key, deadline)| Reverse((*deadline, key.clone())))
            .collect();
    }

    /// Returns the deadline for a key, if one is set.
    pub fn get_deadline(&self, key: &str) -> Option<SystemTime> {
        self.deadlines.get(key).copied()
    }

    pub fn len(&self) -> usize {
        self.deadlines.len()
    }

    pub fn clear(&mut self) {
        self.deadlines.clear();
        self.heap.clear();
    }

    /// Drain every key whose deadline is at or before `now`.
    pub fn drain_expired(&mut self, now: SystemTime) -> Vec<String> {
        let mut expired = Vec::new();

        while let Some(Reverse((deadline, _))) = self.heap.peek() {
            if *deadline > now {
                break;
            }
            let Some(Reverse((deadline, key))) = self.heap.pop() else {
                break;
            };

            // Only the entry matching the current deadline is authoritative.
            if self.deadlines.get(&key) == Some(&deadline) {
                self.deadlines.remove(&key);
                expired.push(key);
            }
        }

        expired
    }
}
