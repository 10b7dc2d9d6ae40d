//! Error types for the proxy cache
//!
//! Provides unified error handling using thiserror.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

// == Cache Error Enum ==
/// Unified error type for the cache engine and its HTTP surface.
#[derive(Error, Debug)]
pub enum CacheError {
    /// Configuration values cannot produce a working cache
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Memory for the index or a payload could not be reserved
    #[error("Allocation failed: {0}")]
    Allocation(String),

    /// Key not found in cache
    #[error("Key not found: {0}")]
    NotFound(String),

    /// Invalid request data
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Payload larger than the whole cache budget
    #[error("Payload too large: {0}")]
    PayloadTooLarge(String),
}

// == IntoResponse Implementation ==
impl IntoResponse for CacheError {
    fn into_response(self) -> Response {
        let status = match &self {
            CacheError::NotFound(_) => StatusCode::NOT_FOUND,
            CacheError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            CacheError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            CacheError::Allocation(_) => StatusCode::SERVICE_UNAVAILABLE,
            CacheError::InvalidConfig(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(json!({
            "error": self.to_string()
        }));

        (status, body).into_response()
    }
}

// == Result Type Alias ==
/// Convenience Result type for the proxy cache.
pub type Result<T> = std::result::Result<T, CacheError>;
