//! Configuration Module
//!
//! Handles loading and managing server configuration from environment variables.

use std::env;
use std::str::FromStr;

use crate::cache::{CacheConfig, DEFAULT_CAPACITY, DEFAULT_INITIAL_SLOTS, DEFAULT_LOAD_FACTOR};

/// Server configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// Maximum aggregate payload size in bytes
    pub capacity: usize,
    /// Initial number of index slots
    pub initial_slots: usize,
    /// Index load factor before it grows
    pub load_factor: f32,
    /// HTTP server port
    pub server_port: u16,
    /// Interval in seconds between statistics log lines
    pub stats_interval: u64,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `CACHE_CAPACITY` - Maximum cached bytes (default: 10 MiB)
    /// - `CACHE_INITIAL_SLOTS` - Initial index capacity (default: 1024)
    /// - `CACHE_LOAD_FACTOR` - Index growth threshold (default: 0.75)
    /// - `SERVER_PORT` - HTTP server port (default: 3000)
    /// - `STATS_INTERVAL` - Statistics log frequency in seconds (default: 60)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            capacity: env_or("CACHE_CAPACITY", defaults.capacity),
            initial_slots: env_or("CACHE_INITIAL_SLOTS", defaults.initial_slots),
            load_factor: env_or("CACHE_LOAD_FACTOR", defaults.load_factor),
            server_port: env_or("SERVER_PORT", defaults.server_port),
            stats_interval: env_or("STATS_INTERVAL", defaults.stats_interval),
        }
    }

    /// Returns the cache engine part of this configuration.
    pub fn cache_config(&self) -> CacheConfig {
        CacheConfig {
            capacity: self.capacity,
            initial_slots: self.initial_slots,
            load_factor: self.load_factor,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            initial_slots: DEFAULT_INITIAL_SLOTS,
            load_factor: DEFAULT_LOAD_FACTOR,
            server_port: 3000,
            stats_interval: 60,
        }
    }
}

fn env_or<T: FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
