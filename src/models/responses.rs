//! Response DTOs for the cache API
//!
//! Defines the structure of outgoing JSON response bodies.

use serde::Serialize;

use crate::cache::{AddOutcome, CacheStats};

/// Response body for a successful store (PUT /cache/*key)
#[derive(Debug, Clone, Serialize)]
pub struct AddResponse {
    /// Success message
    pub message: String,
    /// The key that was stored
    pub key: String,
    /// Number of payload bytes stored
    pub size: usize,
    /// Whether the key was new ("inserted") or replaced ("updated")
    pub outcome: &'static str,
}

impl AddResponse {
    /// Creates a new AddResponse
    pub fn new(key: impl Into<String>, size: usize, outcome: AddOutcome) -> Self {
        let key = key.into();
        Self {
            message: format!("Key '{}' cached successfully", key),
            key,
            size,
            outcome: outcome.as_str(),
        }
    }
}

/// Response body for the stats endpoint (GET /stats)
#[derive(Debug, Clone, Serialize)]
pub struct StatsResponse {
    /// Number of cache hits
    pub hits: u64,
    /// Number of cache misses
    pub misses: u64,
    /// Number of new entries stored
    pub inserts: u64,
    /// Number of replaced payloads
    pub updates: u64,
    /// Number of evictions
    pub evictions: u64,
    /// Number of rejected stores
    pub rejected: u64,
    /// Current number of entries in cache
    pub total_entries: usize,
    /// Cached payload bytes
    pub current_size: usize,
    /// Maximum cached payload bytes
    pub capacity: usize,
    /// Hit rate (hits / (hits + misses))
    pub hit_rate: f64,
    /// current_size / capacity
    pub fill_ratio: f64,
}

impl From<CacheStats> for StatsResponse {
    fn from(stats: CacheStats) -> Self {
        Self {
            hit_rate: stats.hit_rate(),
            fill_ratio: stats.fill_ratio(),
            hits: stats.hits,
            misses: stats.misses,
            inserts: stats.inserts,
            updates: stats.updates,
            evictions: stats.evictions,
            rejected: stats.rejected,
            total_entries: stats.total_entries,
            current_size: stats.current_size,
            capacity: stats.capacity,
        }
    }
}

/// Response body for the health endpoint (GET /health)
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Health status (e.g., "healthy")
    pub status: String,
    /// Current timestamp in ISO 8601 format
    pub timestamp: String,
}

impl HealthResponse {
    /// Creates a new HealthResponse with current timestamp
    pub fn healthy() -> Self {
        Self {
            status: "healthy".to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}
