//! Cache Module
//!
//! Provides a size-bounded, thread-safe byte cache with LRU eviction.

mod entry;
mod index;
mod lru;
mod stats;
mod store;


// Re-export public types
pub use entry::{CacheEntry, CacheHit, Links, SlotId};
pub use index::EntryIndex;
pub use lru::{LinkStore, RecencyList};
pub use stats::CacheStats;
pub use store::{AddOutcome, CacheConfig, ProxyCache, RejectReason, RemovalListener};

// == Public Constants ==
/// Default maximum aggregate payload size in bytes
pub const DEFAULT_CAPACITY: usize = 10 * 1024 * 1024; // 10 MiB

/// Default number of index slots reserved up front
pub const DEFAULT_INITIAL_SLOTS: usize = 1024;

/// Default fill ratio at which the index grows
pub const DEFAULT_LOAD_FACTOR: f32 = 0.75;
