//! Background Tasks Module
//!
//! Contains background tasks that run periodically during server operation.
//!
//! # Tasks
//! - Stats reporter: Logs cache occupancy and hit rate at configured intervals

mod reporter;

pub use reporter::spawn_stats_reporter;
