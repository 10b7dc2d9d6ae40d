//! Response models for the cache API
//!
//! Request bodies are raw payload bytes, so only responses need DTOs.

pub mod responses;

// Re-export commonly used types
pub use responses::{AddResponse, HealthResponse, StatsResponse};
