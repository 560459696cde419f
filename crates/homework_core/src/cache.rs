//! crates/homework_core/src/cache.rs
//!
//! A keyed query cache with explicit invalidation.
//!
//! Every key carries a generation counter. `invalidate` bumps it, and a fetch
//! remembers the generation it started under: if the generation moved before
//! the fetch resolved, its result is discarded instead of overwriting fresher
//! data. Fetches started under the same generation are ordered by a per-key
//! sequence number so a slow, older fetch never replaces a newer one.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::ports::PortError;

/// Proof that a fetch was started. Hand it back to `complete` or `fail`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchTicket<K> {
    key: K,
    generation: u64,
    seq: u64,
}

impl<K> FetchTicket<K> {
    pub fn key(&self) -> &K {
        &self.key
    }
}

/// A snapshot of one cache entry as a view would render it.
#[derive(Debug)]
pub struct QueryState<V> {
    /// Latest data, possibly stale.
    pub data: Option<Arc<V>>,
    /// True when `data` reflects every mutation seen so far.
    pub fresh: bool,
    pub loading: bool,
    /// The last fetch failure, kept until a fetch succeeds.
    pub error: Option<PortError>,
}

impl<V> Clone for QueryState<V> {
    fn clone(&self) -> Self {
        Self {
            data: self.data.clone(),
            fresh: self.fresh,
            loading: self.loading,
            error: self.error.clone(),
        }
    }
}

impl<V> Default for QueryState<V> {
    fn default() -> Self {
        Self {
            data: None,
            fresh: false,
            loading: false,
            error: None,
        }
    }
}

struct Entry<V> {
    value: Option<Arc<V>>,
    fresh: bool,
    generation: u64,
    next_seq: u64,
    applied_seq: u64,
    in_flight: usize,
    error: Option<PortError>,
}

impl<V> Default for Entry<V> {
    fn default() -> Self {
        Self {
            value: None,
            fresh: false,
            generation: 0,
            next_seq: 1,
            applied_seq: 0,
            in_flight: 0,
            error: None,
        }
    }
}

pub struct QueryCache<K, V> {
    entries: Mutex<HashMap<K, Entry<V>>>,
}

impl<K, V> Default for QueryCache<K, V>
where
    K: Eq + Hash + Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> QueryCache<K, V>
where
    K: Eq + Hash + Clone,
{
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<K, Entry<V>>> {
        // A panic while holding the lock cannot leave an entry half-written.
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Fresh data for `key`, or `None` when missing or invalidated.
    pub fn get(&self, key: &K) -> Option<Arc<V>> {
        self.lock()
            .get(key)
            .filter(|e| e.fresh)
            .and_then(|e| e.value.clone())
    }

    pub fn state(&self, key: &K) -> QueryState<V> {
        match self.lock().get(key) {
            Some(entry) => QueryState {
                data: entry.value.clone(),
                fresh: entry.fresh,
                loading: entry.in_flight > 0,
                error: entry.error.clone(),
            },
            None => QueryState::default(),
        }
    }

    /// Marks `key` stale. Data already held stays readable through `state`.
    pub fn invalidate(&self, key: &K) {
        let mut entries = self.lock();
        let entry = entries.entry(key.clone()).or_default();
        entry.generation += 1;
        entry.fresh = false;
    }

    /// Invalidates every key for which `pred` holds.
    pub fn invalidate_where<F>(&self, pred: F)
    where
        F: Fn(&K) -> bool,
    {
        for (key, entry) in self.lock().iter_mut() {
            if pred(key) {
                entry.generation += 1;
                entry.fresh = false;
            }
        }
    }

    /// Drops the data held for `key`, stale data included.
    ///
    /// The entry's counters survive so that a fetch still in flight for the
    /// removed key cannot repopulate it.
    pub fn remove(&self, key: &K) {
        if let Some(entry) = self.lock().get_mut(key) {
            entry.generation += 1;
            entry.value = None;
            entry.fresh = false;
            entry.error = None;
        }
    }

    pub fn begin_fetch(&self, key: &K) -> FetchTicket<K> {
        let mut entries = self.lock();
        let entry = entries.entry(key.clone()).or_default();
        let seq = entry.next_seq;
        entry.next_seq += 1;
        entry.in_flight += 1;
        FetchTicket {
            key: key.clone(),
            generation: entry.generation,
            seq,
        }
    }

    /// Stores a fetch result. Returns false when the result was stale and dropped.
    pub fn complete(&self, ticket: FetchTicket<K>, value: V) -> bool {
        let mut entries = self.lock();
        let Some(entry) = entries.get_mut(&ticket.key) else {
            return false;
        };
        entry.in_flight = entry.in_flight.saturating_sub(1);
        if ticket.generation != entry.generation || ticket.seq <= entry.applied_seq {
            return false;
        }
        entry.value = Some(Arc::new(value));
        entry.fresh = true;
        entry.applied_seq = ticket.seq;
        entry.error = None;
        true
    }

    /// Records a failed fetch. Existing data is kept.
    pub fn fail(&self, ticket: FetchTicket<K>, error: PortError) {
        let mut entries = self.lock();
        let Some(entry) = entries.get_mut(&ticket.key) else {
            return;
        };
        entry.in_flight = entry.in_flight.saturating_sub(1);
        if ticket.generation == entry.generation && ticket.seq > entry.applied_seq {
            entry.error = Some(error);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn completed_fetch_is_fresh_until_invalidated() {
        let cache: QueryCache<&str, Vec<u32>> = QueryCache::new();
        let ticket = cache.begin_fetch(&"assignments");
        assert!(cache.state(&"assignments").loading);

        assert!(cache.complete(ticket, vec![1, 2]));
        assert_eq!(cache.get(&"assignments").as_deref(), Some(&vec![1, 2]));

        cache.invalidate(&"assignments");
        assert!(cache.get(&"assignments").is_none());
        let state = cache.state(&"assignments");
        assert!(!state.fresh);
        assert_eq!(state.data.as_deref(), Some(&vec![1, 2]));
    }

    #[test]
    fn fetch_started_before_invalidation_is_discarded() {
        let cache: QueryCache<&str, Vec<u32>> = QueryCache::new();
        let stale = cache.begin_fetch(&"assignments");
        cache.invalidate(&"assignments");
        let fresh = cache.begin_fetch(&"assignments");

        assert!(cache.complete(fresh, vec![2]));
        assert!(!cache.complete(stale, vec![1]));
        assert_eq!(cache.get(&"assignments").as_deref(), Some(&vec![2]));
        assert!(!cache.state(&"assignments").loading);
    }

    #[test]
    fn older_fetch_in_same_generation_does_not_overwrite_newer() {
        let cache: QueryCache<&str, u32> = QueryCache::new();
        let first = cache.begin_fetch(&"k");
        let second = cache.begin_fetch(&"k");

        assert!(cache.complete(second, 2));
        assert!(!cache.complete(first, 1));
        assert_eq!(cache.get(&"k").as_deref(), Some(&2));
    }

    #[test]
    fn failure_keeps_previous_data() {
        let cache: QueryCache<&str, u32> = QueryCache::new();
        let ticket = cache.begin_fetch(&"k");
        cache.complete(ticket, 7);
        cache.invalidate(&"k");

        let ticket = cache.begin_fetch(&"k");
        cache.fail(ticket, PortError::Remote("offline".to_string()));

        let state = cache.state(&"k");
        assert_eq!(state.data.as_deref(), Some(&7));
        assert_eq!(state.error, Some(PortError::Remote("offline".to_string())));
        assert!(!state.fresh);
    }

    #[test]
    fn fetch_in_flight_across_remove_is_discarded() {
        let cache: QueryCache<&str, Vec<u32>> = QueryCache::new();
        assert!(cache.complete(cache.begin_fetch(&"assignments"), vec![1]));

        let in_flight = cache.begin_fetch(&"assignments");
        cache.remove(&"assignments");
        assert!(cache.state(&"assignments").data.is_none());

        assert!(!cache.complete(in_flight, vec![42]));
        let state = cache.state(&"assignments");
        assert!(state.data.is_none());
        assert!(!state.fresh);
        assert!(!state.loading);

        let late_failure = cache.begin_fetch(&"assignments");
        cache.remove(&"assignments");
        cache.fail(late_failure, PortError::Remote("offline".to_string()));
        assert!(cache.state(&"assignments").error.is_none());
    }

    #[test]
    fn completing_an_unknown_key_stores_nothing() {
        let cache: QueryCache<&str, u32> = QueryCache::new();
        let ticket = cache.begin_fetch(&"a");
        let orphan = FetchTicket {
            key: "b",
            ..ticket
        };
        assert!(!cache.complete(orphan, 1));
        assert!(cache.state(&"b").data.is_none());
    }

    #[test]
    fn invalidate_where_only_touches_matching_keys() {
        let cache: QueryCache<(&str, u8), u32> = QueryCache::new();
        for key in [("assignments", 1), ("assignments", 2), ("subjects", 1)] {
            let ticket = cache.begin_fetch(&key);
            cache.complete(ticket, 0);
        }

        cache.invalidate_where(|(name, _)| *name == "assignments");

        assert!(cache.get(&("assignments", 1)).is_none());
        assert!(cache.get(&("assignments", 2)).is_none());
        assert!(cache.get(&("subjects", 1)).is_some());
    }
}
