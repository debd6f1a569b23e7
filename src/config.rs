//! # Scheduler Configuration
//!
//! The gateway downlink scheduler needs two timing constants to turn an
//! intended airtime into a dispatch deadline: the round-trip time to the
//! gateway and a fixed buffer on top of it. The original implementation
//! kept these as mutable package-level variables; here they are fields on
//! an injected config struct instead, so a process can run more than one
//! `Schedule` with different timing assumptions.

use std::time::Duration;

/// Default gateway round-trip time, used when the gateway status provider
/// has no reading yet or reports a zero RTT.
pub const DEFAULT_GATEWAY_RTT: Duration = Duration::from_millis(100);

/// Default buffer added on top of the gateway RTT to account for
/// scheduling jitter on the router side.
pub const DEFAULT_GATEWAY_BUFFER_TIME: Duration = Duration::from_millis(500);

/// Timing configuration for a `Schedule`.
#[derive(Debug, Clone, Copy, serde::Serialize, serde::Deserialize)]
pub struct ScheduleConfig {
    /// Round-trip time to the gateway, used as a fallback when the
    /// gateway status provider has no reading.
    pub gateway_rtt: Duration,
    /// Fixed buffer added to the RTT when computing the dispatch
    /// deadline for a committed downlink.
    pub gateway_buffer_time: Duration,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            gateway_rtt: DEFAULT_GATEWAY_RTT,
            gateway_buffer_time: DEFAULT_GATEWAY_BUFFER_TIME,
        }
    }
}
