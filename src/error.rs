//! # Scheduler Error Handling
//!
//! This module defines the `ScheduleError` enum, which represents the
//! failure modes exposed by the gateway downlink scheduler.

use thiserror::Error;

/// Represents the different error types that can occur in the scheduler.
#[derive(Debug, Error)]
pub enum ScheduleError {
    /// Returned by `GetOption`/`Schedule` once the scheduler has no
    /// subscriber and its background state has been torn down.
    #[error("schedule is not active")]
    Inactive,

    /// Returned by `Schedule` when the given reservation id was never
    /// created, has already been committed, or has expired.
    #[error("unknown reservation id: {0}")]
    NotFound(String),
}
