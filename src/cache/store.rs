//! Cache Store Module
//!
//! Main cache engine combining the entry index with the recency list under a
//! single lock, bounded by a total payload size.

use std::fmt;
use std::mem;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::cache::entry::{copy_payload, CacheEntry, CacheHit, SlotId};
use crate::cache::index::EntryIndex;
use crate::cache::lru::RecencyList;
use crate::cache::{CacheStats, DEFAULT_CAPACITY, DEFAULT_INITIAL_SLOTS, DEFAULT_LOAD_FACTOR};
use crate::error::{CacheError, Result};

// == Cache Config ==
/// Parameters fixed when a cache is built.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheConfig {
    /// Maximum aggregate payload size in bytes
    pub capacity: usize,
    /// Index slots reserved up front
    pub initial_slots: usize,
    /// Fill ratio at which the index grows, in (0, 1]
    pub load_factor: f32,
}

impl CacheConfig {
    /// Default index policy with the given byte budget.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity,
            ..Self::default()
        }
    }

    /// Checks that the configuration can produce a working cache.
    pub fn validate(&self) -> Result<()> {
        if self.capacity == 0 {
            return Err(CacheError::InvalidConfig(
                "capacity must be greater than 0".to_string(),
            ));
        }
        if self.initial_slots == 0 {
            return Err(CacheError::InvalidConfig(
                "initial_slots must be greater than 0".to_string(),
            ));
        }
        if !(self.load_factor > 0.0 && self.load_factor <= 1.0) {
            return Err(CacheError::InvalidConfig(format!(
                "load_factor must be in (0, 1], got {}",
                self.load_factor
            )));
        }
        Ok(())
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            initial_slots: DEFAULT_INITIAL_SLOTS,
            load_factor: DEFAULT_LOAD_FACTOR,
        }
    }
}

/// Callback observing every entry the cache drops, with its key and size.
///
/// It runs after the cache lock has been released, so it may call back
/// into the cache.
pub type RemovalListener = Arc<dyn Fn(&str, usize) + Send + Sync>;

// == Add Outcome ==
/// Why an `add` call left the cache untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// The key was empty
    EmptyKey,
    /// The payload was empty
    EmptyPayload,
    /// The payload alone exceeds the cache capacity
    PayloadTooLarge,
    /// Memory for the key or payload copy could not be reserved
    AllocationFailed,
}

impl RejectReason {
    /// True for rejections caused by the arguments rather than by memory.
    pub fn is_invalid_input(self) -> bool {
        !matches!(self, RejectReason::AllocationFailed)
    }
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            RejectReason::EmptyKey => "empty key",
            RejectReason::EmptyPayload => "empty payload",
            RejectReason::PayloadTooLarge => "payload exceeds capacity",
            RejectReason::AllocationFailed => "allocation failed",
        };
        f.write_str(text)
    }
}

/// Result of an `add` call.
///
/// Callers that treat the cache as best-effort may ignore it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddOutcome {
    /// A new entry was stored
    Inserted,
    /// An existing entry received the new payload
    Updated,
    /// Nothing was stored
    Rejected(RejectReason),
}

impl AddOutcome {
    pub fn is_accepted(&self) -> bool {
        !matches!(self, AddOutcome::Rejected(_))
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AddOutcome::Inserted => "inserted",
            AddOutcome::Updated => "updated",
            AddOutcome::Rejected(_) => "rejected",
        }
    }
}

// == Cache State ==
/// Everything guarded by the cache lock.
#[derive(Debug)]
struct CacheState {
    index: EntryIndex,
    recency: RecencyList,
    /// Sum of the sizes of every entry in `index`
    current_size: usize,
    stats: CacheStats,
    /// Keep dropped entries for the removal listener
    retain_removed: bool,
    /// Entries dropped by the current operation, reported once unlocked
    removed: Vec<CacheEntry>,
}

impl CacheState {
    fn retire(&mut self, entry: CacheEntry) {
        if self.retain_removed {
            self.removed.push(entry);
        }
    }

    fn take_removed(&mut self) -> Vec<CacheEntry> {
        mem::take(&mut self.removed)
    }

    // == Evict ==
    /// Removes the least recently used entry. Returns false on an empty cache.
    fn evict_lru(&mut self) -> bool {
        let Some(victim) = self.recency.tail() else {
            return false;
        };

        self.recency.detach(&mut self.index, victim);
        if let Some(entry) = self.index.erase(victim) {
            self.current_size -= entry.size();
            self.stats.record_eviction();
            debug!(key = entry.key(), size = entry.size(), "Evicted least recently used entry");
            self.retire(entry);
        }
        true
    }

    /// Evicts until `incoming` more bytes fit, or nothing is left to evict.
    fn make_room(&mut self, incoming: usize, capacity: usize) {
        while self.current_size + incoming > capacity {
            if !self.evict_lru() {
                break;
            }
        }
    }

    // == Update Path ==
    fn update(&mut self, slot: SlotId, payload: &[u8], capacity: usize) -> AddOutcome {
        let old_size = self.index.get(slot).map_or(0, CacheEntry::size);
        self.current_size -= old_size;

        // Unlinked before eviction so it can never be chosen as the victim.
        self.recency.detach(&mut self.index, slot);
        self.make_room(payload.len(), capacity);

        match copy_payload(payload) {
            Ok(buf) => {
                if let Some(entry) = self.index.get_mut(slot) {
                    entry.replace_payload(buf);
                }
                self.current_size += payload.len();
                self.recency.attach_to_head(&mut self.index, slot);
                AddOutcome::Updated
            }
            Err(err) => {
                if let Some(entry) = self.index.erase(slot) {
                    warn!(key = entry.key(), error = %err, "Dropped entry whose payload could not be replaced");
                    self.retire(entry);
                }
                AddOutcome::Rejected(RejectReason::AllocationFailed)
            }
        }
    }

    // == Insert Path ==
    fn insert(&mut self, key: &str, payload: &[u8], capacity: usize) -> AddOutcome {
        self.make_room(payload.len(), capacity);

        let inserted = CacheEntry::try_new(key, payload).and_then(|entry| self.index.insert(entry));
        let slot = match inserted {
            Ok(slot) => slot,
            Err(err) => {
                warn!(key, size = payload.len(), error = %err, "Discarded new entry");
                return AddOutcome::Rejected(RejectReason::AllocationFailed);
            }
        };

        self.recency.attach_to_head(&mut self.index, slot);
        self.current_size += payload.len();
        AddOutcome::Inserted
    }

    // == Teardown ==
    fn clear(&mut self) -> usize {
        let mut count = 0;
        for entry in self.index.clear() {
            count += 1;
            self.retire(entry);
        }
        self.recency.reset();
        self.current_size = 0;
        count
    }
}

// == Proxy Cache ==
/// Thread-safe LRU cache of byte payloads bounded by their total size.
///
/// Every operation runs under one exclusive lock, so concurrent calls are
/// linearizable and `current_size() <= capacity()` holds whenever the lock
/// is free. Share it between threads with `Arc`.
pub struct ProxyCache {
    capacity: usize,
    listener: Option<RemovalListener>,
    /// Counted outside the lock so invalid input never contends
    rejected: AtomicU64,
    state: Mutex<CacheState>,
}

impl ProxyCache {
    // == Constructors ==
    /// Builds an empty cache.
    ///
    /// # Errors
    /// Returns [`CacheError::InvalidConfig`] for an unusable configuration and
    /// [`CacheError::Allocation`] if the index cannot be allocated. Callers at
    /// process startup should treat either as fatal.
    pub fn new(config: CacheConfig) -> Result<Self> {
        Self::build(config, None)
    }

    /// Builds an empty cache with the default index policy.
    pub fn with_capacity(capacity: usize) -> Result<Self> {
        Self::new(CacheConfig::with_capacity(capacity))
    }

    /// Builds an empty cache that reports every dropped entry to `listener`.
    ///
    /// The listener runs on the thread whose call dropped the entries, after
    /// the lock is released. A panicking listener skips the remaining
    /// notifications of that call but leaves the cache consistent.
    pub fn with_removal_listener(config: CacheConfig, listener: RemovalListener) -> Result<Self> {
        Self::build(config, Some(listener))
    }

    fn build(config: CacheConfig, listener: Option<RemovalListener>) -> Result<Self> {
        config.validate()?;

        let index = EntryIndex::with_policy(config.initial_slots, config.load_factor)?;

        info!(
            capacity = config.capacity,
            initial_slots = config.initial_slots,
            load_factor = config.load_factor,
            "Proxy cache initialized"
        );

        Ok(Self {
            capacity: config.capacity,
            rejected: AtomicU64::new(0),
            state: Mutex::new(CacheState {
                index,
                recency: RecencyList::new(),
                current_size: 0,
                stats: CacheStats::new(),
                retain_removed: listener.is_some(),
                removed: Vec::new(),
            }),
            listener,
        })
    }

    // == Find ==
    /// Looks up `key`, marking it most recently used on a hit.
    ///
    /// An empty key is never cached and returns `None` without taking the
    /// lock.
    pub fn find(&self, key: &str) -> Option<CacheHit> {
        if key.is_empty() {
            return None;
        }

        let mut guard = self.state.lock();
        let state = &mut *guard;

        match state.index.find(key) {
            Some(slot) => {
                state.recency.move_to_head(&mut state.index, slot);
                state.stats.record_hit();
                state.index.get(slot).map(CacheEntry::to_hit)
            }
            None => {
                state.stats.record_miss();
                None
            }
        }
    }

    // == Add ==
    /// Stores a copy of `payload` under `key`, evicting least recently used
    /// entries until it fits.
    ///
    /// Empty keys, empty payloads and payloads larger than the capacity are
    /// rejected without effect.
    pub fn add(&self, key: &str, payload: &[u8]) -> AddOutcome {
        if let Err(reason) = self.check_input(key, payload) {
            debug!(key, size = payload.len(), %reason, "Rejected cache add");
            self.rejected.fetch_add(1, Ordering::Relaxed);
            return AddOutcome::Rejected(reason);
        }

        let (outcome, removed) = {
            let mut guard = self.state.lock();
            let state = &mut *guard;

            let outcome = match state.index.find(key) {
                Some(slot) => state.update(slot, payload, self.capacity),
                None => state.insert(key, payload, self.capacity),
            };

            match outcome {
                AddOutcome::Inserted => state.stats.record_insert(),
                AddOutcome::Updated => state.stats.record_update(),
                AddOutcome::Rejected(_) => {
                    self.rejected.fetch_add(1, Ordering::Relaxed);
                }
            }
            (outcome, state.take_removed())
        };

        self.notify_removed(removed);
        outcome
    }

    fn notify_removed(&self, removed: Vec<CacheEntry>) {
        if let Some(listener) = &self.listener {
            for entry in &removed {
                listener(entry.key(), entry.size());
            }
        }
    }

    fn check_input(&self, key: &str, payload: &[u8]) -> std::result::Result<(), RejectReason> {
        if key.is_empty() {
            Err(RejectReason::EmptyKey)
        } else if payload.is_empty() {
            Err(RejectReason::EmptyPayload)
        } else if payload.len() > self.capacity {
            Err(RejectReason::PayloadTooLarge)
        } else {
            Ok(())
        }
    }

    // == Destroy ==
    /// Drops every entry and the cache itself.
    pub fn destroy(self) {
        let (count, removed) = {
            let mut state = self.state.lock();
            let count = state.clear();
            (count, state.take_removed())
        };
        self.notify_removed(removed);
        info!(removed = count, "Proxy cache destroyed");
    }

    // == Accessors ==
    /// Maximum aggregate payload size in bytes.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Sum of all cached payload sizes.
    pub fn current_size(&self) -> usize {
        self.state.lock().current_size
    }

    pub fn len(&self) -> usize {
        self.state.lock().index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.lock().index.is_empty()
    }

    /// True if `key` is cached. Does not affect recency.
    pub fn contains(&self, key: &str) -> bool {
        self.state.lock().index.find(key).is_some()
    }

    /// Cached keys from most to least recently used.
    pub fn keys_by_recency(&self) -> Vec<String> {
        let state = self.state.lock();
        state
            .recency
            .iter(&state.index)
            .filter_map(|slot| state.index.get(slot))
            .map(|entry| entry.key().to_string())
            .collect()
    }

    /// Snapshot of counters and occupancy.
    pub fn stats(&self) -> CacheStats {
        let state = self.state.lock();
        let mut stats = state.stats.clone();
        stats.rejected = self.rejected.load(Ordering::Relaxed);
        stats.set_occupancy(state.index.len(), state.current_size, self.capacity);
        stats
    }

    /// Verifies the structural invariants, describing the first violation.
    #[cfg(test)]
    pub(crate) fn check_invariants(&self) -> std::result::Result<(), String> {
        let state = self.state.lock();
        let index = &state.index;

        let listed: Vec<SlotId> = state.recency.iter(index).take(index.len() + 1).collect();
        if listed.len() != index.len() {
            return Err(format!("list has {} nodes, index has {}", listed.len(), index.len()));
        }
        if state.recency.len() != listed.len() {
            return Err(format!("list length {} != walked {}", state.recency.len(), listed.len()));
        }
        if state.recency.head().is_none() != state.recency.tail().is_none() {
            return Err("head and tail disagree on emptiness".to_string());
        }
        if state.recency.tail() != listed.last().copied() {
            return Err("tail is not the last node".to_string());
        }

        let mut total = 0;
        let mut prev = None;
        for slot in &listed {
            let entry = index.get(*slot).ok_or("list points at an empty slot")?;
            if index.find(entry.key()) != Some(*slot) {
                return Err(format!("index does not map {} to its slot", entry.key()));
            }
            if entry.links.prev != prev {
                return Err(format!("broken back link at {}", entry.key()));
            }
            prev = Some(*slot);
            total += entry.size();
        }

        if total != state.current_size {
            return Err(format!("current_size {} != sum {}", state.current_size, total));
        }
        if state.current_size > self.capacity {
            return Err(format!("current_size {} exceeds capacity {}", state.current_size, self.capacity));
        }
        Ok(())
    }
}

impl fmt::Debug for ProxyCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProxyCache")
            .field("capacity", &self.capacity)
            .field("has_listener", &self.listener.is_some())
            .field("rejected", &self.rejected)
            .field("state", &self.state)
            .finish()
    }
}

impl Drop for ProxyCache {
    fn drop(&mut self) {
        let state = self.state.get_mut();
        state.clear();
        let removed = state.take_removed();
        self.notify_removed(removed);
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::entry::with_failing_allocations;
    use std::panic::{self, AssertUnwindSafe};
    use std::sync::atomic::AtomicBool;
    use std::sync::{Arc, Mutex as StdMutex, OnceLock, Weak};
    use std::thread;

    fn cache(capacity: usize) -> ProxyCache {
        ProxyCache::with_capacity(capacity).unwrap()
    }

    fn assert_consistent(cache: &ProxyCache) {
        if let Err(violation) = cache.check_invariants() {
            panic!("invariant violated: {}", violation);
        }
    }

    #[test]
    fn test_cache_new() {
        let cache = cache(100);
        assert!(cache.is_empty());
        assert_eq!(cache.len(), 0);
        assert_eq!(cache.current_size(), 0);
        assert_eq!(cache.capacity(), 100);
        assert_consistent(&cache);
    }

    #[test]
    fn test_invalid_configs() {
        assert!(matches!(
            ProxyCache::with_capacity(0),
            Err(CacheError::InvalidConfig(_))
        ));

        let no_slots = CacheConfig {
            initial_slots: 0,
            ..CacheConfig::default()
        };
        assert!(ProxyCache::new(no_slots).is_err());

        for load_factor in [0.0, -1.0, 1.5, f32::NAN] {
            let config = CacheConfig {
                load_factor,
                ..CacheConfig::default()
            };
            assert!(config.validate().is_err(), "load_factor {} accepted", load_factor);
        }
    }

    #[test]
    fn test_add_and_find() {
        let cache = cache(1024);
        let data = b"This is the webpage content.";

        assert_eq!(cache.add("http://example.com/resource", data), AddOutcome::Inserted);

        let hit = cache.find("http://example.com/resource").unwrap();
        assert_eq!(hit.key, "http://example.com/resource");
        assert_eq!(hit.payload.len(), data.len());
        assert_eq!(hit.payload.as_ref(), data);
        assert_eq!(cache.current_size(), data.len());
        assert_consistent(&cache);
    }

    #[test]
    fn test_find_missing_and_empty_key() {
        let cache = cache(100);
        assert!(cache.find("nope").is_none());
        assert!(cache.find("").is_none());

        // Empty key never reaches the index
        let stats = cache.stats();
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.hits, 0);
    }

    #[test]
    fn test_invalid_input_is_noop() {
        let cache = cache(100);
        cache.add("keep", b"x");

        assert_eq!(
            cache.add("", b"data"),
            AddOutcome::Rejected(RejectReason::EmptyKey)
        );
        assert_eq!(
            cache.add("k", b""),
            AddOutcome::Rejected(RejectReason::EmptyPayload)
        );
        assert_eq!(
            cache.add("k", &[0u8; 101]),
            AddOutcome::Rejected(RejectReason::PayloadTooLarge)
        );

        assert_eq!(cache.len(), 1);
        assert_eq!(cache.current_size(), 1);
        assert!(!cache.contains("k"));
        assert_eq!(cache.stats().rejected, 3);
        assert_consistent(&cache);
    }

    #[test]
    fn test_payload_exactly_capacity() {
        let cache = cache(100);
        cache.add("small", b"abc");

        assert_eq!(cache.add("full", &[7u8; 100]), AddOutcome::Inserted);
        assert!(!cache.contains("small"));
        assert_eq!(cache.current_size(), 100);
        assert_consistent(&cache);
    }

    #[test]
    fn test_lru_eviction_scenario() {
        let cache = cache(100);

        cache.add("http://item1.com", b"I am the first data block.");
        cache.add("http://item2.com", b"I am the second data block.");
        cache.add("http://item3.com", b"I am the third data block.");
        assert_eq!(cache.current_size(), 79);

        assert!(cache.find("http://item1.com").is_some());
        assert!(cache.find("http://item2.com").is_some());
        assert!(cache.find("http://item3.com").is_some());

        // 79 + 36 = 115 > 100, so exactly item1 (26 bytes) has to go
        assert_eq!(cache.add("http://item4.com", &[b'd'; 36]), AddOutcome::Inserted);
        assert_eq!(cache.current_size(), 89);

        assert!(cache.find("http://item4.com").is_some());
        assert!(cache.find("http://item3.com").is_some());
        assert!(cache.find("http://item2.com").is_some());
        assert!(cache.find("http://item1.com").is_none());
        assert_eq!(cache.stats().evictions, 1);
        assert_consistent(&cache);
    }

    #[test]
    fn test_update_item_scenario() {
        let cache = cache(100);

        cache.add("url1", b"old_data");
        cache.add("url2", b"some_data");
        assert_eq!(cache.add("url1", b"NEW_DATA_REPLACED"), AddOutcome::Updated);

        let hit = cache.find("url1").unwrap();
        assert_eq!(hit.payload.as_ref(), b"NEW_DATA_REPLACED");
        assert_eq!(cache.current_size(), 26);
        assert_eq!(cache.keys_by_recency(), vec!["url1", "url2"]);

        cache.add("url3", b"filler data number one");
        cache.add("url4", b"filler data number two");
        cache.add("url5", b"filler data number thr");
        assert_eq!(cache.current_size(), 92);

        cache.add("url6", b"Evict url2 now!");
        assert_eq!(cache.current_size(), 98);

        assert!(cache.find("url1").is_some());
        assert!(cache.find("url2").is_none());
        assert_eq!(cache.len(), 5);
        assert_consistent(&cache);
    }

    #[test]
    fn test_update_never_evicts_itself() {
        let cache = cache(100);
        cache.add("a", &[1u8; 50]);
        cache.add("b", &[2u8; 40]);

        // "a" is the LRU entry but is being updated, so "b" goes instead
        assert_eq!(cache.add("a", &[3u8; 70]), AddOutcome::Updated);

        assert!(!cache.contains("b"));
        assert_eq!(cache.find("a").unwrap().payload.as_ref(), &[3u8; 70][..]);
        assert_eq!(cache.current_size(), 70);
        assert_consistent(&cache);
    }

    #[test]
    fn test_update_shrinking_evicts_nothing() {
        let cache = cache(100);
        cache.add("a", &[1u8; 60]);
        cache.add("b", &[2u8; 40]);

        cache.add("a", &[1u8; 10]);
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.current_size(), 50);
        assert_eq!(cache.keys_by_recency(), vec!["a", "b"]);
    }

    #[test]
    fn test_find_moves_to_head() {
        let cache = cache(100);
        cache.add("a", b"1");
        cache.add("b", b"2");
        cache.add("c", b"3");
        assert_eq!(cache.keys_by_recency(), vec!["c", "b", "a"]);

        cache.find("a");
        assert_eq!(cache.keys_by_recency(), vec!["a", "c", "b"]);
        assert_consistent(&cache);
    }

    #[test]
    fn test_repeated_find_is_stable() {
        let cache = cache(100);
        cache.add("a", b"payload");
        let size = cache.current_size();

        for _ in 0..10 {
            assert_eq!(cache.find("a").unwrap().payload.as_ref(), b"payload");
            assert_eq!(cache.current_size(), size);
        }
        assert_eq!(cache.stats().hits, 10);
    }

    #[test]
    fn test_contains_does_not_touch() {
        let cache = cache(100);
        cache.add("a", b"1");
        cache.add("b", b"2");

        assert!(cache.contains("a"));
        assert_eq!(cache.keys_by_recency(), vec!["b", "a"]);
    }

    #[test]
    fn test_insert_allocation_failure_leaves_no_trace() {
        let cache = cache(100);
        cache.add("a", b"1234");

        let outcome = with_failing_allocations(|| cache.add("b", b"5678"));
        assert_eq!(outcome, AddOutcome::Rejected(RejectReason::AllocationFailed));

        assert!(!cache.contains("b"));
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.current_size(), 4);
        assert_consistent(&cache);
    }

    #[test]
    fn test_update_allocation_failure_drops_entry() {
        let cache = cache(100);
        cache.add("a", b"1234");
        cache.add("b", b"5678");

        let outcome = with_failing_allocations(|| cache.add("a", b"new-bytes"));
        assert_eq!(outcome, AddOutcome::Rejected(RejectReason::AllocationFailed));

        assert!(!cache.contains("a"));
        assert!(cache.contains("b"));
        assert_eq!(cache.current_size(), 4);
        assert_consistent(&cache);
    }

    #[test]
    fn test_stats_snapshot() {
        let cache = cache(10);
        cache.add("a", b"12345");
        cache.add("a", b"123");
        cache.add("b", b"12345678"); // 3 + 8 > 10 evicts a
        cache.find("b");
        cache.find("a");

        let stats = cache.stats();
        assert_eq!(stats.inserts, 2);
        assert_eq!(stats.updates, 1);
        assert_eq!(stats.evictions, 1);
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.total_entries, 1);
        assert_eq!(stats.current_size, 8);
        assert_eq!(stats.capacity, 10);
    }

    #[test]
    fn test_removal_listener_sees_each_entry_once() {
        let removed = Arc::new(StdMutex::new(Vec::new()));
        let sink = removed.clone();
        let cache = ProxyCache::with_removal_listener(
            CacheConfig::with_capacity(10),
            Arc::new(move |key: &str, _size: usize| sink.lock().unwrap().push(key.to_string())),
        )
        .unwrap();

        cache.add("a", b"12345");
        cache.add("b", b"12345");
        cache.add("c", b"12345"); // evicts a
        cache.destroy(); // drops b and c

        let mut removed = removed.lock().unwrap().clone();
        assert_eq!(removed[0], "a");
        removed.sort();
        assert_eq!(removed, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_panicking_listener_leaves_cache_consistent() {
        let fired = Arc::new(AtomicBool::new(false));
        let flag = fired.clone();
        let cache = ProxyCache::with_removal_listener(
            CacheConfig::with_capacity(10),
            Arc::new(move |_key: &str, _size: usize| {
                if !flag.swap(true, Ordering::SeqCst) {
                    panic!("listener failure");
                }
            }),
        )
        .unwrap();

        cache.add("a", b"12345");
        cache.add("b", b"12345");
        let result = panic::catch_unwind(AssertUnwindSafe(|| cache.add("c", b"12345")));
        assert!(result.is_err());
        assert!(fired.load(Ordering::SeqCst));

        // The add itself completed before the listener ran
        assert_eq!(cache.keys_by_recency(), vec!["c", "b"]);
        assert_eq!(cache.current_size(), 10);
        assert_consistent(&cache);

        assert_eq!(cache.add("big", &[0u8; 10]), AddOutcome::Inserted);
        assert_eq!(cache.current_size(), 10);
        assert_consistent(&cache);
    }

    #[test]
    fn test_listener_may_call_back_into_cache() {
        let handle: Arc<OnceLock<Weak<ProxyCache>>> = Arc::new(OnceLock::new());
        let seen = Arc::new(StdMutex::new(Vec::new()));

        let listener_handle = handle.clone();
        let sink = seen.clone();
        let cache = Arc::new(
            ProxyCache::with_removal_listener(
                CacheConfig::with_capacity(10),
                Arc::new(move |key: &str, _size: usize| {
                    if let Some(cache) = listener_handle.get().and_then(Weak::upgrade) {
                        sink.lock().unwrap().push((key.to_string(), cache.len(), cache.contains(key)));
                    }
                }),
            )
            .unwrap(),
        );
        handle.set(Arc::downgrade(&cache)).unwrap();

        cache.add("a", b"12345");
        cache.add("b", b"12345");
        cache.add("c", b"12345");

        assert_eq!(*seen.lock().unwrap(), vec![("a".to_string(), 2, false)]);
        drop(cache);
    }

    #[test]
    fn test_update_failure_reports_dropped_entry() {
        let removed = Arc::new(StdMutex::new(Vec::new()));
        let sink = removed.clone();
        let cache = ProxyCache::with_removal_listener(
            CacheConfig::with_capacity(100),
            Arc::new(move |key: &str, size: usize| sink.lock().unwrap().push((key.to_string(), size))),
        )
        .unwrap();

        cache.add("a", b"1234");
        with_failing_allocations(|| cache.add("a", b"new-bytes"));

        assert_eq!(*removed.lock().unwrap(), vec![("a".to_string(), 4)]);
    }

    #[test]
    fn test_invalid_input_does_not_wait_for_lock() {
        let cache = cache(10);

        let guard = cache.state.lock();
        assert_eq!(cache.add("", b"x"), AddOutcome::Rejected(RejectReason::EmptyKey));
        assert_eq!(
            cache.add("k", &[0u8; 11]),
            AddOutcome::Rejected(RejectReason::PayloadTooLarge)
        );
        drop(guard);

        assert_eq!(cache.stats().rejected, 2);
    }

    #[test]
    fn test_independent_instances() {
        let first = cache(100);
        let second = cache(100);

        first.add("shared", b"first");
        assert!(second.find("shared").is_none());

        second.add("shared", b"second");
        assert_eq!(first.find("shared").unwrap().payload.as_ref(), b"first");
    }

    #[test]
    fn test_hit_outlives_eviction() {
        let cache = cache(10);
        cache.add("a", b"0123456789");
        let hit = cache.find("a").unwrap();

        cache.add("b", b"9876543210");
        assert!(!cache.contains("a"));
        assert_eq!(hit.payload.as_ref(), b"0123456789");
    }

    #[test]
    fn test_concurrent_add_and_find() {
        const THREADS: usize = 8;
        const OPS: usize = 500;

        let cache = Arc::new(cache(4096));

        let handles: Vec<_> = (0..THREADS)
            .map(|t| {
                let cache = cache.clone();
                thread::spawn(move || {
                    for i in 0..OPS {
                        let url = format!("http://thread{}-item{}.com", t, i);
                        let data = format!("data from thread {}, op {}", t, i);
                        cache.add(&url, data.as_bytes());
                        if let Some(hit) = cache.find(&url) {
                            assert_eq!(hit.payload.as_ref(), data.as_bytes());
                        }
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        assert!(cache.current_size() <= cache.capacity());
        assert!(!cache.is_empty());
        assert_consistent(&cache);

        let stats = cache.stats();
        assert_eq!(stats.inserts, (THREADS * OPS) as u64);
        assert_eq!(stats.inserts - stats.evictions, stats.total_entries as u64);
    }

    #[test]
    fn test_destroy_after_use() {
        let cache = cache(100);
        for i in 0..10 {
            cache.add(&format!("k{}", i), b"0123456789");
        }
        cache.destroy();
    }
}
