//! # Downlink Message Schema
//!
//! The scheduler treats a downlink as opaque apart from its payload length
//! and the fields needed to compute time of air. This mirrors the original
//! `router_pb.DownlinkMessage` / `pb_lorawan.TxConfiguration` surface, kept
//! to the minimum the scheduler reads.

use bytes::Bytes;

/// LoRaWAN modulation scheme used for a downlink.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum Modulation {
    Lora,
    Fsk,
}

/// The LoRaWAN-specific transmission parameters of a downlink.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct LorawanTxConfig {
    pub modulation: Modulation,
    /// Data rate identifier, e.g. `"SF7BW125"`. Only read for LoRa.
    pub data_rate: String,
    /// Coding rate identifier, e.g. `"4/5"`. Only read for LoRa.
    pub coding_rate: String,
    /// Bit rate in bits per second. Only read for FSK.
    pub bit_rate: u32,
}

/// Protocol-specific transmission configuration for a downlink. The
/// scheduler only understands the LoRaWAN variant; any other protocol
/// configuration is treated as "no time-of-air to compute", and the
/// reservation's length-based duration estimate is kept.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub enum ProtocolConfiguration {
    Lorawan(LorawanTxConfig),
    Other,
}

/// A downlink frame as handed to the scheduler by its caller.
#[derive(Debug, Clone)]
pub struct DownlinkMessage {
    pub payload: Bytes,
    pub protocol_configuration: ProtocolConfiguration,
}

impl DownlinkMessage {
    pub fn new(payload: impl Into<Bytes>, protocol_configuration: ProtocolConfiguration) -> Self {
        Self {
            payload: payload.into(),
            protocol_configuration,
        }
    }
}
