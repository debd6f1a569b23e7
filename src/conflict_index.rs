//! # Conflict Index
//!
//! An ordered multiset of half-open `[start, end)` intervals over the
//! 64-bit full-timestamp axis. `add` inserts an interval and returns every
//! currently-stored interval it overlaps; a background consumer drains
//! expired entries (those whose `end` has passed) by calling `expire()` in
//! a loop.
//!
//! Grounded on the "balanced tree keyed on start with a secondary max-end
//! annotation, or a skiplist" design note: this implementation keys a
//! `BTreeMap` by interval `end`, which is exactly the field the expiry
//! loop needs to pop in order, and accepts an output-sensitive linear scan
//! for overlap queries given the handful of in-flight options a single
//! gateway's radio channel ever holds concurrently.

use std::collections::BTreeMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tokio::sync::Notify;

/// An entry stored in the conflict index: the reservation id plus its
/// reserved interval and whether it has since been committed.
#[derive(Debug, Clone)]
pub struct ConflictEntry {
    pub id: String,
    pub start: u64,
    pub end: u64,
    pub committed: bool,
}

struct Inner {
    // Keyed by interval end (microseconds since gateway boot); the
    // expiry loop always wants the smallest end first.
    by_end: BTreeMap<u64, Vec<ConflictEntry>>,
    destroyed: bool,
}

/// Interval index backing the scheduler's conflict scoring and expiry.
pub struct ConflictIndex {
    inner: Mutex<Inner>,
    notify: Notify,
    /// Converts a full gateway timestamp into a wall-clock `Instant` so the
    /// expiry loop can sleep until the right moment. Injected so tests can
    /// control the passage of time without Cargo needing a real gateway.
    now_offset: Instant,
    epoch_start: u64,
}

impl ConflictIndex {
    /// Creates a fresh index. `epoch_start`/`now_offset` anchor the full
    /// timestamp axis to wall-clock time: a full timestamp `t` corresponds
    /// to `now_offset + (t - epoch_start)` microseconds.
    pub fn new(epoch_start: u64) -> Self {
        Self {
            inner: Mutex::new(Inner {
                by_end: BTreeMap::new(),
                destroyed: false,
            }),
            notify: Notify::new(),
            now_offset: Instant::now(),
            epoch_start,
        }
    }

    fn instant_for(&self, full_timestamp: u64) -> Instant {
        let delta_us = full_timestamp.saturating_sub(self.epoch_start);
        self.now_offset + Duration::from_micros(delta_us)
    }

    /// Inserts `[start, end)` under the given id and returns every
    /// previously-stored interval it overlaps. Overlap is strict:
    /// `[a,b) ∩ [c,d) != ∅`.
    pub fn add(&self, id: String, start: u64, end: u64, committed: bool) -> Vec<ConflictEntry> {
        let mut inner = self.inner.lock().unwrap();
        if inner.destroyed {
            return Vec::new();
        }

        let mut overlapping = Vec::new();
        for entries in inner.by_end.values() {
            for entry in entries {
                if entry.start < end && start < entry.end {
                    overlapping.push(entry.clone());
                }
            }
        }

        inner.by_end.entry(end).or_default().push(ConflictEntry {
            id,
            start,
            end,
            committed,
        });

        self.notify.notify_waiters();
        overlapping
    }

    /// Marks every stored entry with the given id as committed, so future
    /// `add` calls score against it at the higher, committed weight.
    pub fn mark_committed(&self, id: &str) {
        let mut inner = self.inner.lock().unwrap();
        for entries in inner.by_end.values_mut() {
            for entry in entries.iter_mut() {
                if entry.id == id {
                    entry.committed = true;
                }
            }
        }
    }

    /// Blocks until the earliest-expiring entry's `end` has passed, then
    /// removes and returns it. Returns `None` once the index is destroyed
    /// and has no more entries.
    pub async fn expire(&self) -> Option<ConflictEntry> {
        loop {
            let wait_until = {
                let inner = self.inner.lock().unwrap();
                if inner.destroyed && inner.by_end.is_empty() {
                    return None;
                }
                inner.by_end.keys().next().copied()
            };

            match wait_until {
                None => {
                    // Nothing queued; wait for an insert or destruction.
                    self.notify.notified().await;
                    let destroyed = self.inner.lock().unwrap().destroyed;
                    if destroyed && self.inner.lock().unwrap().by_end.is_empty() {
                        return None;
                    }
                    continue;
                }
                Some(end) => {
                    let deadline = self.instant_for(end);
                    tokio::select! {
                        _ = tokio::time::sleep_until(deadline.into()) => {
                            let mut inner = self.inner.lock().unwrap();
                            if let Some(mut entries) = inner.by_end.remove(&end) {
                                if let Some(first) = entries.pop() {
                                    if !entries.is_empty() {
                                        inner.by_end.insert(end, entries);
                                    }
                                    return Some(first);
                                }
                            }
                            continue;
                        }
                        _ = self.notify.notified() => {
                            continue;
                        }
                    }
                }
            }
        }
    }

    /// Wakes the expiry loop and marks the index destroyed; further
    /// `add` calls are rejected.
    pub fn destroy(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.destroyed = true;
        inner.by_end.clear();
        drop(inner);
        self.notify.notify_waiters();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_reservation_has_no_overlap() {
        let idx = ConflictIndex::new(0);
        let overlaps = idx.add("a".into(), 1_000, 11_000, false);
        assert!(overlaps.is_empty());
    }

    #[test]
    fn overlapping_reservation_is_reported() {
        let idx = ConflictIndex::new(0);
        idx.add("a".into(), 1_000, 11_000, false);
        let overlaps = idx.add("b".into(), 5_000, 15_000, false);
        assert_eq!(overlaps.len(), 1);
        assert_eq!(overlaps[0].id, "a");
    }

    #[test]
    fn non_overlapping_reservation_is_not_reported() {
        let idx = ConflictIndex::new(0);
        idx.add("a".into(), 1_000, 11_000, false);
        let overlaps = idx.add("b".into(), 20_000, 30_000, false);
        assert!(overlaps.is_empty());
    }

    #[test]
    fn committed_entries_are_scored_separately_from_overlap_count() {
        let idx = ConflictIndex::new(0);
        idx.add("a".into(), 1_000, 11_000, true);
        let overlaps = idx.add("b".into(), 5_000, 15_000, false);
        assert_eq!(overlaps.len(), 1);
        assert!(overlaps[0].committed);
    }

    #[tokio::test]
    async fn destroy_unblocks_expire() {
        let idx = std::sync::Arc::new(ConflictIndex::new(0));
        idx.add("a".into(), 0, u64::MAX / 2, false);
        let idx2 = idx.clone();
        let handle = tokio::spawn(async move { idx2.expire().await });
        idx.destroy();
        let result = tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("expire should unblock promptly")
            .unwrap();
        assert!(result.is_none());
    }
}
