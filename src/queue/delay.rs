//! Min-heap of keys waiting for their ready time.
//!
//! Only the earliest pending ready time per key is kept: scheduling a key
//! again for a later time is a no-op, for an earlier time it supersedes the
//! previous entry. Superseded heap entries stay in the heap and are skipped
//! when they surface. A cancelled key's entries are skipped the same way.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};

use tokio::time::Instant;

use crate::key::ReconcileKey;

#[derive(Debug, PartialEq, Eq, PartialOrd, Ord)]
struct Entry {
    ready: Instant,
    seq: u64,
    key: ReconcileKey,
}

#[derive(Debug, Default)]
pub(crate) struct DelayHeap {
    heap: BinaryHeap<Reverse<Entry>>,
    waiting: HashMap<ReconcileKey, Instant>,
    seq: u64,
}

impl DelayHeap {
    /// Schedules `key` for `ready`. Returns false if an earlier or equal
    /// ready time was already pending.
    pub(crate) fn schedule(&mut self, key: ReconcileKey, ready: Instant) -> bool {
        if self.waiting.get(&key).is_some_and(|at| *at <= ready) {
            return false;
        }
        self.waiting.insert(key.clone(), ready);
        self.seq = self.seq.wrapping_add(1);
        self.heap.push(Reverse(Entry {
            ready,
            seq: self.seq,
            key,
        }));
        true
    }

    /// Drops the pending ready time of `key`. Its heap entry is skipped when
    /// it surfaces.
    pub(crate) fn cancel(&mut self, key: &ReconcileKey) -> bool {
        self.waiting.remove(key).is_some()
    }

    /// Removes and returns every key whose ready time is `<= now`, earliest first.
    pub(crate) fn pop_ready(&mut self, now: Instant) -> Vec<ReconcileKey> {
        let mut ready = Vec::new();
        while self.heap.peek().is_some_and(|Reverse(e)| e.ready <= now) {
            let Some(Reverse(entry)) = self.heap.pop() else {
                break;
            };
            if self.waiting.get(&entry.key) == Some(&entry.ready) {
                self.waiting.remove(&entry.key);
                ready.push(entry.key);
            }
        }
        ready
    }

    /// Earliest ready time in the heap (possibly of a superseded entry).
    pub(crate) fn next_ready(&self) -> Option<Instant> {
        self.heap.peek().map(|Reverse(e)| e.ready)
    }

    /// Number of keys waiting.
    pub(crate) fn len(&self) -> usize {
        self.waiting.len()
    }

    pub(crate) fn clear(&mut self) {
        self.heap.clear();
        self.waiting.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn pops_in_ready_order() {
        let now = Instant::now();
        let mut h = DelayHeap::default();
        h.schedule(ReconcileKey::cluster("late"), now + Duration::from_secs(2));
        h.schedule(ReconcileKey::cluster("early"), now + Duration::from_secs(1));

        assert!(h.pop_ready(now).is_empty());
        assert_eq!(h.next_ready(), Some(now + Duration::from_secs(1)));
        assert_eq!(
            h.pop_ready(now + Duration::from_secs(5)),
            vec![ReconcileKey::cluster("early"), ReconcileKey::cluster("late")]
        );
        assert_eq!(h.len(), 0);
    }

    #[test]
    fn keeps_earliest_time_per_key() {
        let now = Instant::now();
        let k = ReconcileKey::cluster("k");
        let mut h = DelayHeap::default();

        assert!(h.schedule(k.clone(), now + Duration::from_secs(5)));
        assert!(!h.schedule(k.clone(), now + Duration::from_secs(9)));
        assert!(h.schedule(k.clone(), now + Duration::from_secs(1)));
        assert_eq!(h.len(), 1);

        assert_eq!(h.pop_ready(now + Duration::from_secs(1)), vec![k.clone()]);
        assert!(h.pop_ready(now + Duration::from_secs(10)).is_empty());
    }

    #[test]
    fn cancelled_key_is_skipped() {
        let now = Instant::now();
        let k = ReconcileKey::cluster("k");
        let mut h = DelayHeap::default();

        h.schedule(k.clone(), now + Duration::from_secs(1));
        assert!(h.cancel(&k));
        assert!(!h.cancel(&k));
        assert_eq!(h.len(), 0);
        assert!(h.pop_ready(now + Duration::from_secs(2)).is_empty());

        h.schedule(k.clone(), now + Duration::from_secs(3));
        assert_eq!(h.pop_ready(now + Duration::from_secs(3)), vec![k]);
    }
}
