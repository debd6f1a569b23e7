//! # Just-in-Time Dispatch Queue
//!
//! A time-ordered queue of committed downlinks keyed on the wall-clock
//! deadline by which each must leave the router. `next()` blocks until the
//! head item's deadline arrives, then yields it and removes it from the
//! queue. Shaped the same way as `wmbus::radio::lora::irq_queue`'s
//! `IrqEventQueue`: a mutex-protected structure plus an async accessor
//! that blocks for the next item, with an explicit destroy path instead of
//! relying on channel closure.

use chrono::{DateTime, Utc};
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::Mutex;
use tokio::sync::Notify;

/// An item committed for dispatch: the reservation id, the wall-clock
/// deadline it must leave the router by, and its payload.
#[derive(Debug, Clone)]
pub struct DispatchItem<T> {
    pub id: String,
    pub deadline: DateTime<Utc>,
    pub payload: T,
}

struct HeapEntry<T> {
    deadline: DateTime<Utc>,
    item: DispatchItem<T>,
}

impl<T> PartialEq for HeapEntry<T> {
    fn eq(&self, other: &Self) -> bool {
        self.deadline == other.deadline
    }
}
impl<T> Eq for HeapEntry<T> {}
impl<T> PartialOrd for HeapEntry<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
impl<T> Ord for HeapEntry<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed so `BinaryHeap` (a max-heap) pops the earliest deadline.
        other.deadline.cmp(&self.deadline)
    }
}

struct Inner<T> {
    heap: BinaryHeap<HeapEntry<T>>,
    destroyed: bool,
}

/// A min-heap of dispatch items ordered by deadline, with blocking
/// `next()` semantics.
pub struct JitQueue<T> {
    inner: Mutex<Inner<T>>,
    notify: Notify,
}

impl<T> Default for JitQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> JitQueue<T> {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                heap: BinaryHeap::new(),
                destroyed: false,
            }),
            notify: Notify::new(),
        }
    }

    /// Inserts an item. No-op once the queue has been destroyed.
    pub fn add(&self, item: DispatchItem<T>) {
        let mut inner = self.inner.lock().unwrap();
        if inner.destroyed {
            return;
        }
        inner.heap.push(HeapEntry {
            deadline: item.deadline,
            item,
        });
        drop(inner);
        self.notify.notify_waiters();
    }

    /// Blocks until the head item's deadline arrives, then removes and
    /// returns it. Returns `None` once the queue is destroyed.
    pub async fn next(&self) -> Option<DispatchItem<T>> {
        loop {
            let wait_until = {
                let inner = self.inner.lock().unwrap();
                if inner.destroyed {
                    return None;
                }
                inner.heap.peek().map(|e| e.deadline)
            };

            match wait_until {
                None => {
                    self.notify.notified().await;
                    if self.inner.lock().unwrap().destroyed {
                        return None;
                    }
                    continue;
                }
                Some(deadline) => {
                    let now = Utc::now();
                    if deadline > now {
                        let std_duration = (deadline - now).to_std().unwrap_or_default();
                        tokio::select! {
                            _ = tokio::time::sleep(std_duration) => {}
                            _ = self.notify.notified() => { continue; }
                        }
                    }

                    let mut inner = self.inner.lock().unwrap();
                    if inner.destroyed {
                        return None;
                    }
                    // Re-check the head: a higher-priority item or
                    // destruction may have arrived while we slept.
                    if let Some(top) = inner.heap.peek() {
                        if top.deadline <= Utc::now() {
                            return inner.heap.pop().map(|e| e.item);
                        }
                    }
                    continue;
                }
            }
        }
    }

    /// Wakes any blocked `next()` call and marks the queue destroyed;
    /// subsequent `next()` calls return `None` immediately.
    pub fn destroy(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.destroyed = true;
        inner.heap.clear();
        drop(inner);
        self.notify.notify_waiters();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;

    #[tokio::test]
    async fn yields_items_in_deadline_order() {
        let queue: JitQueue<&'static str> = JitQueue::new();
        let now = Utc::now();
        queue.add(DispatchItem {
            id: "late".into(),
            deadline: now,
            payload: "late",
        });
        queue.add(DispatchItem {
            id: "early".into(),
            deadline: now - ChronoDuration::milliseconds(50),
            payload: "early",
        });

        let first = queue.next().await.unwrap();
        assert_eq!(first.payload, "early");
        let second = queue.next().await.unwrap();
        assert_eq!(second.payload, "late");
    }

    #[tokio::test]
    async fn destroy_unblocks_pending_next() {
        let queue = std::sync::Arc::new(JitQueue::<()>::new());
        let q2 = queue.clone();
        let handle = tokio::spawn(async move { q2.next().await });
        tokio::task::yield_now().await;
        queue.destroy();
        let result = tokio::time::timeout(std::time::Duration::from_secs(1), handle)
            .await
            .unwrap()
            .unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn next_waits_until_deadline() {
        let queue: JitQueue<&'static str> = JitQueue::new();
        let deadline = Utc::now() + ChronoDuration::milliseconds(80);
        queue.add(DispatchItem {
            id: "a".into(),
            deadline,
            payload: "a",
        });

        let start = std::time::Instant::now();
        let item = queue.next().await.unwrap();
        assert_eq!(item.payload, "a");
        assert!(start.elapsed() >= std::time::Duration::from_millis(60));
    }
}
