//! # Gateway Time Base Reconstruction
//!
//! The gateway reports time as a free-running 32-bit microsecond counter
//! that wraps roughly every 71 minutes. This module extends every observed
//! 32-bit reading into a monotone 64-bit microsecond value and tracks the
//! wall-clock offset needed to translate a full timestamp into an absolute
//! instant.

use chrono::{DateTime, Duration as ChronoDuration, TimeZone, Utc};

const COUNTER_MODULUS: u64 = 1 << 32;

/// Extends a 32-bit LSB reading into a monotone 64-bit value given the
/// previously reconstructed full timestamp.
///
/// 1. If `lsb` (as a signed value) is ahead of `full` (also as signed),
///    `full` has not been established yet — bootstrap with `lsb` as-is.
/// 2. Otherwise, if the low 32 bits of `full` are `<= lsb`, the reading
///    falls in the same 32-bit epoch as `full`.
/// 3. Otherwise the counter has wrapped since `full` was observed.
pub fn reconstruct_full_timestamp(full: u64, lsb: u32) -> u64 {
    if (lsb as i64) - (full as i64) > 0 {
        return lsb as u64;
    }

    let epoch = full / COUNTER_MODULUS;
    let low = (full % COUNTER_MODULUS) as u32;
    if low <= lsb {
        epoch * COUNTER_MODULUS + lsb as u64
    } else {
        (epoch + 1) * COUNTER_MODULUS + lsb as u64
    }
}

/// Tracks the gateway's reconstructed time base: the last full timestamp
/// seen and the wall-clock offset needed to translate a full timestamp
/// into an absolute instant.
#[derive(Debug, Clone, Copy)]
pub struct TimeBase {
    last_full_timestamp: u64,
    /// The absolute instant that gateway timestamp `0` maps to; wall time
    /// for a full timestamp `t` is `epoch_anchor + t microseconds`.
    epoch_anchor: DateTime<Utc>,
    synced: bool,
}

impl Default for TimeBase {
    fn default() -> Self {
        Self {
            last_full_timestamp: 0,
            epoch_anchor: Utc.timestamp_opt(0, 0).unwrap(),
            synced: false,
        }
    }
}

impl TimeBase {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds a gateway microsecond counter reading, extending it against
    /// the last known full timestamp and recomputing the wall-clock
    /// offset. The offset is recomputed on every sync so that clock drift
    /// between gateway and router is absorbed.
    pub fn sync(&mut self, lsb: u32) {
        self.last_full_timestamp = if self.synced {
            reconstruct_full_timestamp(self.last_full_timestamp, lsb)
        } else {
            lsb as u64
        };
        self.synced = true;

        let now = Utc::now();
        self.epoch_anchor = now - ChronoDuration::microseconds(self.last_full_timestamp as i64);
    }

    /// Reconstructs a full 64-bit timestamp from a 32-bit LSB reading
    /// without mutating the stored state (used by `GetOption`, which must
    /// not advance the time base itself).
    pub fn full_timestamp(&self, lsb: u32) -> u64 {
        reconstruct_full_timestamp(self.last_full_timestamp, lsb)
    }

    /// Translates a full microsecond timestamp into an absolute instant
    /// using the current epoch offset.
    pub fn wall_time(&self, full_timestamp: u64) -> DateTime<Utc> {
        self.epoch_anchor + ChronoDuration::microseconds(full_timestamp as i64)
    }

    pub fn last_full_timestamp(&self) -> u64 {
        self.last_full_timestamp
    }
}
