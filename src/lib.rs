//! # gw-scheduler - Gateway Downlink Scheduler for a LoRaWAN Network Router
//!
//! `gw-scheduler` reconstructs a gateway's free-running microsecond
//! counter into a monotone timeline, arbitrates candidate downlink slots
//! against one another so a caller can detect conflicts before
//! committing, and dispatches committed downlinks onto a channel at the
//! moment each must leave the router to arrive on time.
//!
//! ## Usage
//!
//! ```toml
//! [dependencies]
//! gw-scheduler = "0.1.0"
//! ```
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use gw_scheduler::{Schedule, ScheduleConfig, NoGatewayStatus, Semtech};
//!
//! # async fn run() {
//! let schedule = Schedule::new(
//!     ScheduleConfig::default(),
//!     Arc::new(NoGatewayStatus),
//!     Arc::new(Semtech),
//! );
//! schedule.sync(0).await;
//! let downlinks = schedule.subscribe().await;
//! let (id, conflict_score) = schedule.get_option(1_000_000, 50_000).await.unwrap();
//! # let _ = (id, conflict_score, downlinks);
//! # }
//! ```

pub mod config;
pub mod conflict_index;
pub mod downlink;
pub mod error;
pub mod gateway_status;
pub mod id;
pub mod jit_queue;
pub mod logging;
pub mod schedule;
pub mod stats;
pub mod timebase;
pub mod toa;

pub use crate::config::ScheduleConfig;
pub use crate::downlink::{DownlinkMessage, LorawanTxConfig, Modulation, ProtocolConfiguration};
pub use crate::error::ScheduleError;
pub use crate::gateway_status::{GatewayStatusProvider, NoGatewayStatus};
pub use crate::logging::{init_logger, log_info};
pub use crate::schedule::{DownlinkReceiver, Schedule};
pub use crate::stats::StatsSnapshot;
pub use crate::toa::{Semtech, TimeOfAir};
