//! # Time-of-Air Computation
//!
//! Computes how long a physical-layer frame occupies the air, following
//! the formulas in Semtech AN1200.13 ("LoRa Modem Designer's Guide"). This
//! is the scheduler's only dependency on modulation-specific arithmetic;
//! everything else in the crate treats a downlink's duration as an opaque
//! `u32` of microseconds.

use std::time::Duration;

/// Computes time of air for a LoRa or FSK payload. Injected into
/// `Schedule` so alternate implementations (e.g. a vendor SDK binding)
/// can be substituted without touching the scheduler itself.
pub trait TimeOfAir: Send + Sync {
    /// Computes LoRa time of air. Returns `None` if `data_rate` or
    /// `coding_rate` cannot be parsed.
    fn compute_lora(&self, payload_len: u32, data_rate: &str, coding_rate: &str) -> Option<Duration>;

    /// Computes FSK time of air from payload length and bit rate.
    fn compute_fsk(&self, payload_len: u32, bit_rate: u32) -> Option<Duration>;
}

/// Default `TimeOfAir` implementation using the Semtech AN1200.13
/// formulas, parameterized by EU868-style preamble/sync-word lengths.
#[derive(Debug, Clone, Copy, Default)]
pub struct Semtech;

const PREAMBLE_LEN_SYMBOLS: f64 = 8.0;
const SYNC_WORD_LEN_SYMBOLS: f64 = 4.25;

/// Parses a LoRaWAN data rate string such as `"SF7BW125"` into
/// (spreading factor, bandwidth in kHz).
fn parse_data_rate(data_rate: &str) -> Option<(f64, f64)> {
    let rest = data_rate.strip_prefix("SF")?;
    let sf_end = rest.find("BW")?;
    let sf: f64 = rest[..sf_end].parse().ok()?;
    let bw_khz: f64 = rest[sf_end + 2..].parse().ok()?;
    Some((sf, bw_khz))
}

/// Parses a coding rate string such as `"4/5"` into its numerator
/// (always 4 for LoRaWAN) and denominator.
fn parse_coding_rate(coding_rate: &str) -> Option<f64> {
    let (_, denom) = coding_rate.split_once('/')?;
    denom.parse().ok()
}

impl TimeOfAir for Semtech {
    fn compute_lora(&self, payload_len: u32, data_rate: &str, coding_rate: &str) -> Option<Duration> {
        let (sf, bw_khz) = parse_data_rate(data_rate)?;
        let cr_denom = parse_coding_rate(coding_rate)?;
        if bw_khz <= 0.0 || sf <= 0.0 {
            return None;
        }
        let coding_rate_overhead = cr_denom - 4.0;

        let symbol_duration_us = 2f64.powf(sf) / bw_khz * 1000.0;
        let preamble_duration_us =
            (PREAMBLE_LEN_SYMBOLS + SYNC_WORD_LEN_SYMBOLS) * symbol_duration_us;

        let low_data_rate_optimize = if sf >= 11.0 { 1.0 } else { 0.0 };
        let payload_symbol_nb = (((8.0 * payload_len as f64 - 4.0 * sf + 28.0 + 16.0)
            / (4.0 * (sf - 2.0 * low_data_rate_optimize)))
            .ceil()
            .max(0.0))
            * (coding_rate_overhead + 4.0)
            + 8.0;
        let payload_duration_us = payload_symbol_nb * symbol_duration_us;

        let total_us = preamble_duration_us + payload_duration_us;
        Some(Duration::from_micros(total_us.floor() as u64))
    }

    fn compute_fsk(&self, payload_len: u32, bit_rate: u32) -> Option<Duration> {
        if bit_rate == 0 {
            return None;
        }
        let bits = payload_len as f64 * 8.0;
        let seconds = bits / bit_rate as f64;
        Some(Duration::from_micros((seconds * 1_000_000.0).floor() as u64))
    }
}
