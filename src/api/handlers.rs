//! API Handlers
//!
//! HTTP request handlers for each cache endpoint.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Path, RawQuery, State},
    http::header,
    response::{IntoResponse, Response},
    Json,
};

use crate::cache::{AddOutcome, ProxyCache, RejectReason};
use crate::config::Config;
use crate::error::{CacheError, Result};
use crate::models::{AddResponse, HealthResponse, StatsResponse};

/// Application state shared across all handlers.
///
/// The cache does its own locking, so handlers only need a shared handle.
#[derive(Clone)]
pub struct AppState {
    /// Shared cache engine
    pub cache: Arc<ProxyCache>,
}

impl AppState {
    /// Creates a new AppState around the given cache.
    pub fn new(cache: ProxyCache) -> Self {
        Self {
            cache: Arc::new(cache),
        }
    }

    /// Creates a new AppState from configuration.
    ///
    /// # Errors
    /// Fails if the configured cache cannot be built.
    pub fn from_config(config: &Config) -> Result<Self> {
        let cache = ProxyCache::new(config.cache_config())?;
        Ok(Self::new(cache))
    }
}

/// Builds the cache key from the captured path and the raw query string.
///
/// URLs that differ only in their query are different resources.
fn cache_key(path: String, query: Option<String>) -> String {
    match query {
        Some(query) => format!("{}?{}", path, query),
        None => path,
    }
}

/// Handler for PUT /cache/*key
///
/// Stores the raw request body under the key, query string included.
pub async fn put_handler(
    State(state): State<AppState>,
    Path(path): Path<String>,
    RawQuery(query): RawQuery,
    body: Bytes,
) -> Result<Json<AddResponse>> {
    let key = cache_key(path, query);
    let outcome = state.cache.add(&key, &body);

    match outcome {
        AddOutcome::Inserted | AddOutcome::Updated => {
            Ok(Json(AddResponse::new(key, body.len(), outcome)))
        }
        AddOutcome::Rejected(reason) => Err(rejection_error(
            reason,
            &key,
            body.len(),
            state.cache.capacity(),
        )),
    }
}

/// Maps a refused store to the error the client sees.
fn rejection_error(reason: RejectReason, key: &str, size: usize, capacity: usize) -> CacheError {
    match reason {
        RejectReason::PayloadTooLarge => CacheError::PayloadTooLarge(format!(
            "{} bytes exceeds cache capacity of {} bytes",
            size, capacity
        )),
        reason if reason.is_invalid_input() => CacheError::InvalidRequest(reason.to_string()),
        _ => CacheError::Allocation(format!("could not store {} bytes for '{}'", size, key)),
    }
}

/// Handler for GET /cache/*key
///
/// Returns the cached bytes as `application/octet-stream`.
pub async fn get_handler(
    State(state): State<AppState>,
    Path(path): Path<String>,
    RawQuery(query): RawQuery,
) -> Result<Response> {
    let key = cache_key(path, query);
    let hit = state.cache.find(&key).ok_or(CacheError::NotFound(key))?;

    Ok((
        [(header::CONTENT_TYPE, "application/octet-stream")],
        hit.payload,
    )
        .into_response())
}

/// Handler for GET /stats
///
/// Returns current cache statistics.
pub async fn stats_handler(State(state): State<AppState>) -> Json<StatsResponse> {
    Json(StatsResponse::from(state.cache.stats()))
}

/// Handler for GET /health
///
/// Returns health status of the server.
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::healthy())
}
