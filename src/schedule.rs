//! # Scheduler Façade
//!
//! `Schedule` is the public entry point: it owns the time base, the
//! reservation table, and references to the conflict index and
//! just-in-time dispatch queue, and spawns the two background loops that
//! keep them bounded and emit committed downlinks at the right moment.
//!
//! The locking shape mirrors the original `Schedule`'s single
//! `sync.RWMutex` embedding: one `tokio::sync::RwLock` around everything
//! that `GetOption`/`Schedule`/`Subscribe`/`Stop` mutate. Per-item locks
//! are not needed here: reservations are only ever touched while holding
//! this lock, and `schedule()` builds an independent dispatch copy before
//! releasing it, so no item is ever aliased between the reservation table
//! and the dispatch queue.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{mpsc, Mutex as AsyncMutex, RwLock};

use crate::conflict_index::ConflictIndex;
use crate::downlink::{DownlinkMessage, Modulation, ProtocolConfiguration};
use crate::error::ScheduleError;
use crate::config::ScheduleConfig;
use crate::gateway_status::GatewayStatusProvider;
use crate::id::random_id;
use crate::jit_queue::{DispatchItem, JitQueue};
use crate::stats::{Stats, StatsSnapshot};
use crate::timebase::TimeBase;
use crate::toa::TimeOfAir;

/// A reserved-but-not-yet-committed slot.
#[derive(Debug, Clone)]
struct Reservation {
    full_timestamp: u64,
    wall_time: DateTime<Utc>,
    duration_us: u32,
}

/// The receive side of a `Schedule`'s downlink channel. Wraps the
/// receiver in a shared lock so that, exactly like
/// `wmbus::radio::lora::irq_queue::IrqEventQueue`, more than one task can
/// hold this handle and race to pull the next payload — only one of them
/// receives any given frame.
#[derive(Clone)]
pub struct DownlinkReceiver(Arc<AsyncMutex<mpsc::Receiver<DownlinkMessage>>>);

impl DownlinkReceiver {
    /// Receives the next dispatched downlink, or `None` once the
    /// scheduler has stopped and the channel has closed.
    pub async fn recv(&self) -> Option<DownlinkMessage> {
        self.0.lock().await.recv().await
    }
}

struct ScheduleState {
    time_base: TimeBase,
    active: bool,
    subscriber_count: u32,
    reservations: std::collections::HashMap<String, Reservation>,
    conflict_index: Option<Arc<ConflictIndex>>,
    dispatch_queue: Option<Arc<JitQueue<DownlinkMessage>>>,
    downlink_rx: Option<DownlinkReceiver>,
}

impl ScheduleState {
    fn new() -> Self {
        Self {
            time_base: TimeBase::new(),
            active: false,
            subscriber_count: 0,
            reservations: std::collections::HashMap::new(),
            conflict_index: None,
            dispatch_queue: None,
            downlink_rx: None,
        }
    }
}

/// The gateway downlink scheduler. Bound to one gateway for its lifetime;
/// construct one per gateway connection.
pub struct Schedule {
    state: Arc<RwLock<ScheduleState>>,
    config: ScheduleConfig,
    gateway_status: Arc<dyn GatewayStatusProvider>,
    toa: Arc<dyn TimeOfAir>,
    stats: Arc<Stats>,
}

impl Schedule {
    /// Creates a new, inert scheduler. It becomes active on the first
    /// `subscribe()` call.
    pub fn new(
        config: ScheduleConfig,
        gateway_status: Arc<dyn GatewayStatusProvider>,
        toa: Arc<dyn TimeOfAir>,
    ) -> Self {
        Self {
            state: Arc::new(RwLock::new(ScheduleState::new())),
            config,
            gateway_status,
            toa,
            stats: Arc::new(Stats::default()),
        }
    }

    /// Feeds a gateway microsecond counter reading, extending the time
    /// base and recomputing the wall-clock offset. Never fails and works
    /// regardless of activation state.
    pub async fn sync(&self, timestamp: u32) {
        let mut state = self.state.write().await;
        state.time_base.sync(timestamp);
    }

    /// Reserves a candidate slot and returns its id plus a conflict score:
    /// `+100` for every overlapping committed downlink, `+1` for every
    /// overlapping outstanding (uncommitted) option. A score of `0` means
    /// no conflicts.
    pub async fn get_option(&self, timestamp: u32, length: u32) -> Result<(String, u32), ScheduleError> {
        let mut state = self.state.write().await;
        if !state.active {
            return Err(ScheduleError::Inactive);
        }

        let id = random_id();
        let full_timestamp = state.time_base.full_timestamp(timestamp);
        let wall_time = state.time_base.wall_time(full_timestamp);

        state.reservations.insert(
            id.clone(),
            Reservation {
                full_timestamp,
                wall_time,
                duration_us: length,
            },
        );

        let conflict_index = state
            .conflict_index
            .clone()
            .expect("conflict index exists while active");

        // `add` only takes its own internal synchronous mutex, so this runs
        // to completion without awaiting anything else while `state` is
        // still held, matching the scheduler-lock invariant.
        let overlaps = conflict_index.add(
            id.clone(),
            full_timestamp,
            full_timestamp + length as u64,
            false,
        );
        drop(state);

        let mut score = 0u32;
        for entry in overlaps {
            score += if entry.committed { 100 } else { 1 };
        }

        self.stats.record_reservation();
        Ok((id, score))
    }

    /// Commits a reserved slot to an actual downlink frame: computes its
    /// time of air, removes it from the reservation table, and inserts a
    /// dispatch copy into the just-in-time queue keyed by the deadline at
    /// which it must leave the router.
    ///
    /// The dispatch deadline is the *original* reservation wall time
    /// (i.e. the start of the intended transmission window) advanced
    /// earlier by the gateway RTT and buffer time. It is not recomputed
    /// from the possibly different, just-calculated duration — this
    /// preserves the original scheduler's behavior rather than silently
    /// changing what "intended airtime" means.
    pub async fn schedule(&self, id: &str, downlink: DownlinkMessage) -> Result<(), ScheduleError> {
        let (reservation, conflict_index, dispatch_queue) = {
            let mut state = self.state.write().await;
            if !state.active {
                return Err(ScheduleError::Inactive);
            }
            let reservation = state
                .reservations
                .remove(id)
                .ok_or_else(|| ScheduleError::NotFound(id.to_string()))?;
            let conflict_index = state
                .conflict_index
                .clone()
                .expect("conflict index exists while active");
            let dispatch_queue = state
                .dispatch_queue
                .clone()
                .expect("dispatch queue exists while active");
            (reservation, conflict_index, dispatch_queue)
        };

        conflict_index.mark_committed(id);

        let _duration_us = self.compute_duration(&downlink, reservation.duration_us);

        let lead = self.resolve_dispatch_lead().await;
        let deadline = reservation.wall_time
            - chrono::Duration::from_std(lead).unwrap_or_else(|_| chrono::Duration::zero());

        dispatch_queue.add(DispatchItem {
            id: id.to_string(),
            deadline,
            payload: downlink,
        });

        self.stats.record_scheduled();
        Ok(())
    }

    /// Resolves the time the dispatch loop must beat: gateway RTT (from
    /// the status provider if it has a non-zero reading, otherwise the
    /// configured default) plus the configured buffer time.
    async fn resolve_dispatch_lead(&self) -> Duration {
        let rtt = match self.gateway_status.rtt_ms().await {
            Some(ms) if ms != 0 => Duration::from_millis(ms as u64),
            _ => self.config.gateway_rtt,
        };
        rtt + self.config.gateway_buffer_time
    }

    /// Computes a downlink's time of air from its modulation parameters.
    /// Falls back to the reservation's length-based estimate if the
    /// protocol configuration isn't LoRaWAN, or if the rate strings can't
    /// be parsed.
    fn compute_duration(&self, downlink: &DownlinkMessage, fallback_us: u32) -> u32 {
        let ProtocolConfiguration::Lorawan(cfg) = &downlink.protocol_configuration else {
            return fallback_us;
        };

        let payload_len = downlink.payload.len() as u32;
        let computed = match cfg.modulation {
            Modulation::Lora => self.toa.compute_lora(payload_len, &cfg.data_rate, &cfg.coding_rate),
            Modulation::Fsk => self.toa.compute_fsk(payload_len, cfg.bit_rate),
        };

        match computed {
            Some(d) => d.as_micros() as u32,
            None => {
                log::warn!(
                    "time-of-air computation failed for modulation {:?}; falling back to reservation duration",
                    cfg.modulation
                );
                fallback_us
            }
        }
    }

    /// Activates the scheduler if it is inactive, and returns a handle to
    /// its downlink channel. Calling `subscribe()` again while already
    /// active returns a handle to the *same* channel rather than creating
    /// a new one or bumping the subscriber count — this mirrors the
    /// source, which only increments its subscriber counter inside the
    /// first-activation branch.
    pub async fn subscribe(&self) -> DownlinkReceiver {
        let mut state = self.state.write().await;

        if !state.active {
            let conflict_index = Arc::new(ConflictIndex::new(state.time_base.last_full_timestamp()));
            let dispatch_queue = Arc::new(JitQueue::new());
            let (tx, rx) = mpsc::channel(1);
            let receiver = DownlinkReceiver(Arc::new(AsyncMutex::new(rx)));

            state.reservations.clear();
            state.conflict_index = Some(conflict_index.clone());
            state.dispatch_queue = Some(dispatch_queue.clone());
            state.downlink_rx = Some(receiver);
            state.active = true;
            state.subscriber_count = 1;

            tokio::spawn(dispatch_loop(dispatch_queue.clone(), tx, self.stats.clone()));
            tokio::spawn(expiry_loop(conflict_index, dispatch_queue, self.state.clone(), self.stats.clone()));
        }

        state
            .downlink_rx
            .clone()
            .expect("downlink receiver exists while active")
    }

    /// Detaches one subscriber. Once the subscriber count drops below 1,
    /// the conflict index is destroyed, which cascades: the expiry loop
    /// exits and tears down the dispatch queue, which causes the dispatch
    /// loop to close the downlink channel.
    pub async fn stop(&self) {
        let mut state = self.state.write().await;
        if state.subscriber_count > 0 {
            state.subscriber_count -= 1;
        }
        if state.subscriber_count < 1 {
            if let Some(conflict_index) = state.conflict_index.clone() {
                conflict_index.destroy();
            }
        }
    }

    /// Reports whether the scheduler currently has an active downlink
    /// channel.
    pub async fn is_active(&self) -> bool {
        self.state.read().await.active
    }

    /// Returns a snapshot of the scheduler's lifecycle counters.
    pub async fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }
}

/// Repeatedly pulls the next deadline-ready item from the dispatch queue
/// and publishes it on the downlink channel without blocking: if no
/// consumer is ready, the frame is dropped. Exits and closes the channel
/// once the queue is destroyed.
async fn dispatch_loop(queue: Arc<JitQueue<DownlinkMessage>>, tx: mpsc::Sender<DownlinkMessage>, stats: Arc<Stats>) {
    while let Some(item) = queue.next().await {
        match tx.try_send(item.payload) {
            Ok(()) => stats.record_dispatched(),
            Err(_) => {
                log::debug!("dropping downlink {}: no consumer ready at deadline", item.id);
                stats.record_dropped();
            }
        }
    }
    // `tx` is dropped here, closing the channel for any receiver.
}

/// Drains conflict index expiries until it is destroyed, then tears down
/// the dispatch queue and the façade's active-state references.
async fn expiry_loop(
    conflict_index: Arc<ConflictIndex>,
    dispatch_queue: Arc<JitQueue<DownlinkMessage>>,
    state: Arc<RwLock<ScheduleState>>,
    stats: Arc<Stats>,
) {
    while conflict_index.expire().await.is_some() {
        stats.record_expired();
    }

    dispatch_queue.destroy();

    let mut state = state.write().await;
    state.dispatch_queue = None;
    state.reservations.clear();
    state.conflict_index = None;
    state.downlink_rx = None;
    state.active = false;
}
