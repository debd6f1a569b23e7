//! # Scheduler Instrumentation
//!
//! Lightweight, always-on counters for the scheduler's lifecycle events.
//! This is observability, not the rate limiting the scheduler explicitly
//! does not do: it never influences scheduling decisions, only reports on
//! them. Shaped after `instrumentation::stats`'s counters-plus-snapshot
//! pattern, simplified to atomics since a single `Schedule` only ever
//! needs process-local counters rather than a keyed device registry.

use std::sync::atomic::{AtomicU64, Ordering};

/// Counters tracking what a `Schedule` has done since it was created.
#[derive(Debug, Default)]
pub struct Stats {
    reservations_made: AtomicU64,
    reservations_scheduled: AtomicU64,
    reservations_expired: AtomicU64,
    downlinks_dispatched: AtomicU64,
    downlinks_dropped: AtomicU64,
}

/// A point-in-time snapshot of `Stats`, suitable for logging or export.
#[derive(Debug, Clone, Copy, serde::Serialize)]
pub struct StatsSnapshot {
    pub reservations_made: u64,
    pub reservations_scheduled: u64,
    pub reservations_expired: u64,
    pub downlinks_dispatched: u64,
    pub downlinks_dropped: u64,
}

impl StatsSnapshot {
    /// Renders the snapshot as pretty-printed JSON, for logging or a CLI's
    /// `--json` output.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

impl Stats {
    pub fn record_reservation(&self) {
        self.reservations_made.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_scheduled(&self) {
        self.reservations_scheduled.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_expired(&self) {
        self.reservations_expired.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_dispatched(&self) {
        self.downlinks_dispatched.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_dropped(&self) {
        self.downlinks_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            reservations_made: self.reservations_made.load(Ordering::Relaxed),
            reservations_scheduled: self.reservations_scheduled.load(Ordering::Relaxed),
            reservations_expired: self.reservations_expired.load(Ordering::Relaxed),
            downlinks_dispatched: self.downlinks_dispatched.load(Ordering::Relaxed),
            downlinks_dropped: self.downlinks_dropped.load(Ordering::Relaxed),
        }
    }
}
