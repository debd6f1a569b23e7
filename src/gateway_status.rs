//! # Gateway Status Provider
//!
//! The scheduler consults the gateway's last known round-trip time to
//! decide how early a downlink must leave the router to arrive in time.
//! This trait is the seam for that lookup so the scheduler can be tested
//! without a real gateway connection, following the same dependency
//! injection shape as `mbus::serial_testable::SerialPort`.

/// Reports the gateway's most recently observed status.
#[async_trait::async_trait]
pub trait GatewayStatusProvider: Send + Sync {
    /// Returns the gateway's last known round-trip time in milliseconds,
    /// or `None` if no status has been received yet.
    async fn rtt_ms(&self) -> Option<u32>;
}

/// A status provider with no gateway connection; always reports no RTT
/// reading, so the scheduler falls back to its configured default.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoGatewayStatus;

#[async_trait::async_trait]
impl GatewayStatusProvider for NoGatewayStatus {
    async fn rtt_ms(&self) -> Option<u32> {
        None
    }
}
