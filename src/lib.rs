//! Proxy Cache - A size-bounded in-memory LRU cache for proxied payloads
//!
//! Stores byte payloads under string keys (typically URLs), evicting the least
//! recently used entries once the total payload size would exceed the
//! configured capacity. Safe to share between threads.

pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod models;
pub mod tasks;

pub use api::AppState;
pub use cache::{AddOutcome, CacheConfig, CacheHit, ProxyCache, RejectReason};
pub use config::Config;
pub use error::CacheError;
pub use tasks::spawn_stats_reporter;
