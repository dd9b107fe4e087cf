use std::collections::BTreeMap;
use std::time::{Duration, Instant};

/// Deadline-ordered one-shot timers, at most one per key.
///
/// Nothing in here reads the clock: callers pass `now` in, which is what lets
/// the whole core run against synthetic instants in tests. Timers sharing a
/// deadline fire in scheduling order.
#[derive(Debug, Clone)]
pub struct TimerQueue<K: Ord + Clone> {
    entries: BTreeMap<(Instant, u64), K>,
    index: BTreeMap<K, (Instant, u64)>,
    next_seq: u64,
}

impl<K: Ord + Clone> Default for TimerQueue<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Ord + Clone> TimerQueue<K> {
    pub fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
            index: BTreeMap::new(),
            next_seq: 0,
        }
    }

    /// Arms `key` to fire at `at`, replacing any pending timer for the same key.
    pub fn schedule(&mut self, key: K, at: Instant) {
        self.cancel(&key);
        let slot = (at, self.next_seq);
        self.next_seq += 1;
        self.entries.insert(slot, key.clone());
        self.index.insert(key, slot);
    }

    pub fn cancel(&mut self, key: &K) -> bool {
        match self.index.remove(key) {
            Some(slot) => {
                self.entries.remove(&slot);
                true
            }
            None => false,
        }
    }

    pub fn is_scheduled(&self, key: &K) -> bool {
        self.index.contains_key(key)
    }

    pub fn deadline_of(&self, key: &K) -> Option<Instant> {
        self.index.get(key).map(|(at, _)| *at)
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.entries.keys().next().map(|(at, _)| *at)
    }

    /// Removes and returns the earliest timer whose deadline is at or before `now`.
    pub fn pop_due(&mut self, now: Instant) -> Option<(Instant, K)> {
        let (&slot, _) = self.entries.iter().next()?;
        if slot.0 > now {
            return None;
        }
        let key = self.entries.remove(&slot)?;
        self.index.remove(&key);
        Some((slot.0, key))
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.index.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Next deadline of a periodic timer that was due at `at` and fired at `now`.
/// Missed ticks are dropped, the same as tokio's `MissedTickBehavior::Skip`.
pub fn next_tick(at: Instant, interval: Duration, now: Instant) -> Instant {
    let next = at + interval;
    if next > now {
        next
    } else {
        now + interval
    }
}
