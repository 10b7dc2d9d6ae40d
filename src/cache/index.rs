//! Entry Index Module
//!
//! Owns every cached entry. Entries live in an arena of slots; a hash map
//! resolves keys to slots. Slot ids double as the recency list's links.

use std::collections::HashMap;
use std::fmt;

use crate::cache::entry::{CacheEntry, Links, SlotId};
use crate::cache::lru::LinkStore;
use crate::error::{CacheError, Result};

// == Entry Index ==
/// Key-to-entry map with O(1) average find, insert and erase.
pub struct EntryIndex {
    keys: HashMap<String, SlotId>,
    slots: Vec<Option<CacheEntry>>,
    free: Vec<SlotId>,
    /// Element count the current reservation was sized for
    reserved: usize,
    load_factor: f32,
}

impl EntryIndex {
    // == Constructor ==
    /// Allocates an index sized for `initial_capacity` entries.
    ///
    /// Whenever the element count would pass `reserved * load_factor`, the
    /// reservation doubles.
    ///
    /// # Errors
    /// Returns [`CacheError::Allocation`] if the initial reservation fails.
    pub fn with_policy(initial_capacity: usize, load_factor: f32) -> Result<Self> {
        let mut keys = HashMap::new();
        keys.try_reserve(initial_capacity)
            .map_err(|e| CacheError::Allocation(format!("index of {} slots: {}", initial_capacity, e)))?;

        let mut slots = Vec::new();
        slots
            .try_reserve(initial_capacity)
            .map_err(|e| CacheError::Allocation(format!("arena of {} slots: {}", initial_capacity, e)))?;

        Ok(Self {
            keys,
            slots,
            free: Vec::new(),
            reserved: initial_capacity,
            load_factor,
        })
    }

    // == Find ==
    /// Resolves `key` to its slot.
    pub fn find(&self, key: &str) -> Option<SlotId> {
        self.keys.get(key).copied()
    }

    pub fn get(&self, slot: SlotId) -> Option<&CacheEntry> {
        self.slots.get(slot.0).and_then(Option::as_ref)
    }

    pub fn get_mut(&mut self, slot: SlotId) -> Option<&mut CacheEntry> {
        self.slots.get_mut(slot.0).and_then(Option::as_mut)
    }

    // == Insert ==
    /// Takes ownership of `entry` and maps its key to a slot.
    ///
    /// The key must not already be present.
    ///
    /// # Errors
    /// Returns [`CacheError::Allocation`] if the index cannot grow. The entry
    /// is dropped and the index is unchanged.
    pub fn insert(&mut self, entry: CacheEntry) -> Result<SlotId> {
        debug_assert!(!self.keys.contains_key(entry.key()), "duplicate key in index");

        self.grow_if_needed()?;

        let mut key = String::new();
        key.try_reserve_exact(entry.key().len())
            .map_err(|e| CacheError::Allocation(format!("index key: {}", e)))?;
        key.push_str(entry.key());

        let slot = match self.free.pop() {
            Some(slot) => {
                self.slots[slot.0] = Some(entry);
                slot
            }
            None => {
                let slot = SlotId(self.slots.len());
                self.slots.push(Some(entry));
                slot
            }
        };

        self.keys.insert(key, slot);
        Ok(slot)
    }

    fn grow_if_needed(&mut self) -> Result<()> {
        let threshold = (self.reserved as f64 * f64::from(self.load_factor)) as usize;
        if self.keys.len() < threshold {
            return Ok(());
        }

        let additional = self.reserved.max(1);
        self.keys
            .try_reserve(additional)
            .map_err(|e| CacheError::Allocation(format!("growing index: {}", e)))?;
        self.slots
            .try_reserve(additional)
            .map_err(|e| CacheError::Allocation(format!("growing arena: {}", e)))?;
        self.free
            .try_reserve(additional)
            .map_err(|e| CacheError::Allocation(format!("growing free list: {}", e)))?;
        self.reserved += additional;
        Ok(())
    }

    // == Erase ==
    /// Removes the entry in `slot` along with its key mapping.
    ///
    /// The removed entry is returned so the caller decides when it drops.
    pub fn erase(&mut self, slot: SlotId) -> Option<CacheEntry> {
        let entry = self.slots.get_mut(slot.0)?.take()?;
        self.keys.remove(entry.key());
        self.free.push(slot);
        Some(entry)
    }

    // == Clear ==
    /// Empties the index, handing every stored entry back to the caller.
    pub fn clear(&mut self) -> impl Iterator<Item = CacheEntry> {
        self.keys.clear();
        self.free.clear();
        std::mem::take(&mut self.slots).into_iter().flatten()
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

impl LinkStore for EntryIndex {
    fn links(&self, slot: SlotId) -> Option<&Links> {
        self.get(slot).map(|entry| &entry.links)
    }

    fn links_mut(&mut self, slot: SlotId) -> Option<&mut Links> {
        self.get_mut(slot).map(|entry| &mut entry.links)
    }
}

impl fmt::Debug for EntryIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntryIndex")
            .field("len", &self.keys.len())
            .field("slots", &self.slots.len())
            .field("reserved", &self.reserved)
            .field("load_factor", &self.load_factor)
            .finish()
    }
}
