//! Cache Entry Module
//!
//! Defines the record stored for each cached object and the handle returned
//! to readers.

use bytes::Bytes;

use crate::error::{CacheError, Result};

// == Slot Id ==
/// Position of an entry inside the index arena.
///
/// Recency links are expressed as slot ids so that they never own the entry
/// they point at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SlotId(pub(crate) usize);

// == Links ==
/// Neighbour references of an entry inside the recency list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Links {
    /// Towards the most recently used end
    pub prev: Option<SlotId>,
    /// Towards the least recently used end
    pub next: Option<SlotId>,
}

impl Links {
    /// True when the node has no neighbours recorded.
    pub fn is_unlinked(&self) -> bool {
        self.prev.is_none() && self.next.is_none()
    }
}

// == Cache Entry ==
/// A single cached object.
///
/// The payload length is the entry's size; the two are never stored
/// separately.
#[derive(Debug)]
pub struct CacheEntry {
    key: String,
    payload: Bytes,
    pub(crate) links: Links,
}

impl CacheEntry {
    // == Constructor ==
    /// Builds a detached entry holding owned copies of `key` and `payload`.
    ///
    /// # Errors
    /// Returns [`CacheError::Allocation`] if either copy cannot be allocated.
    /// Nothing is leaked in that case.
    pub fn try_new(key: &str, payload: &[u8]) -> Result<Self> {
        let key = copy_key(key)?;
        let payload = copy_payload(payload)?;

        Ok(Self {
            key,
            payload,
            links: Links::default(),
        })
    }

    /// The identifier this entry is stored under.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// The cached bytes.
    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    /// Payload length in bytes.
    pub fn size(&self) -> usize {
        self.payload.len()
    }

    /// Swaps in a new payload, returning the previous one.
    pub fn replace_payload(&mut self, payload: Bytes) -> Bytes {
        std::mem::replace(&mut self.payload, payload)
    }

    /// Read-only handle handed out to callers of `find`.
    pub fn to_hit(&self) -> CacheHit {
        CacheHit {
            key: self.key.clone(),
            payload: self.payload.clone(),
        }
    }
}

// == Cache Hit ==
/// Result of a successful lookup.
///
/// `payload` shares the cached buffer; holding it does not pin the entry in
/// the cache, and later updates never change the bytes it refers to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheHit {
    /// The requested key
    pub key: String,
    /// The cached bytes
    pub payload: Bytes,
}

// == Fallible Copies ==
/// Copies `data` into a freshly allocated buffer, reporting allocation failure
/// instead of aborting.
pub fn copy_payload(data: &[u8]) -> Result<Bytes> {
    fail_point()?;

    let mut buf = Vec::new();
    buf.try_reserve_exact(data.len())
        .map_err(|e| CacheError::Allocation(format!("payload of {} bytes: {}", data.len(), e)))?;
    buf.extend_from_slice(data);
    Ok(Bytes::from(buf))
}

fn copy_key(key: &str) -> Result<String> {
    let mut buf = String::new();
    buf.try_reserve_exact(key.len())
        .map_err(|e| CacheError::Allocation(format!("key of {} bytes: {}", key.len(), e)))?;
    buf.push_str(key);
    Ok(buf)
}

#[cfg(not(test))]
#[inline(always)]
fn fail_point() -> Result<()> {
    Ok(())
}

#[cfg(test)]
thread_local! {
    static FAIL_ALLOCATIONS: std::cell::Cell<bool> = const { std::cell::Cell::new(false) };
}

#[cfg(test)]
fn fail_point() -> Result<()> {
    if FAIL_ALLOCATIONS.with(|flag| flag.get()) {
        return Err(CacheError::Allocation("injected failure".to_string()));
    }
    Ok(())
}

/// Runs `f` with every payload allocation on the current thread failing.
#[cfg(test)]
pub(crate) fn with_failing_allocations<T>(f: impl FnOnce() -> T) -> T {
    FAIL_ALLOCATIONS.with(|flag| flag.set(true));
    let out = f();
    FAIL_ALLOCATIONS.with(|flag| flag.set(false));
    out
}
