//! Bounded producer/consumer queue for resolved drop events.
//!
//! Event-source callbacks push on whatever threads the platform owns; a
//! single worker thread pops. The queue is a fixed ring guarded by one mutex
//! with separate not-full/not-empty condition variables, so a full queue
//! applies backpressure to producers instead of growing without bound.
//!
//! Shutdown is cooperative and one-way: [`BoundedQueue::close`] wakes every
//! blocked producer and consumer. Producers observe the closed state and
//! fail their push; consumers keep draining whatever was queued before the
//! close and then see end-of-stream.

use std::sync::{Condvar, Mutex};

use thiserror::Error;
use tracing::debug;

/// Errors surfaced by queue operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum QueueError {
    /// The queue was closed; the item was not inserted.
    #[error("queue is closed")]
    Closed,
}

struct Ring<T> {
    slots: Vec<Option<T>>,
    head: usize,
    len: usize,
    open: bool,
}

/// Fixed-capacity blocking queue with cooperative shutdown.
pub struct BoundedQueue<T> {
    ring: Mutex<Ring<T>>,
    not_full: Condvar,
    not_empty: Condvar,
}

impl<T> BoundedQueue<T> {
    /// Creates a queue holding at most `capacity` items.
    ///
    /// A zero `capacity` is bumped to one slot.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let mut slots = Vec::with_capacity(capacity);
        slots.resize_with(capacity, || None);

        Self {
            ring: Mutex::new(Ring {
                slots,
                head: 0,
                len: 0,
                open: true,
            }),
            not_full: Condvar::new(),
            not_empty: Condvar::new(),
        }
    }

    /// Inserts `item` at the logical tail, blocking while the queue is full.
    ///
    /// Returns [`QueueError::Closed`] without inserting if the queue is
    /// closed, including when the close happens while this call is blocked.
    pub fn push(&self, item: T) -> Result<(), QueueError> {
        let mut ring = self.ring.lock().unwrap_or_else(|e| e.into_inner());

        while ring.len == ring.slots.len() && ring.open {
            ring = self
                .not_full
                .wait(ring)
                .unwrap_or_else(|e| e.into_inner());
        }

        if !ring.open {
            return Err(QueueError::Closed);
        }

        let tail = (ring.head + ring.len) % ring.slots.len();
        ring.slots[tail] = Some(item);
        ring.len += 1;

        drop(ring);
        self.not_empty.notify_one();

        Ok(())
    }

    /// Removes the logical head, blocking while the queue is empty.
    ///
    /// Returns `None` only when the queue is closed and fully drained.
    pub fn pop(&self) -> Option<T> {
        let mut ring = self.ring.lock().unwrap_or_else(|e| e.into_inner());

        while ring.len == 0 && ring.open {
            ring = self
                .not_empty
                .wait(ring)
                .unwrap_or_else(|e| e.into_inner());
        }

        if ring.len == 0 {
            return None;
        }

        let head = ring.head;
        let item = ring.slots[head].take();
        ring.head = (ring.head + 1) % ring.slots.len();
        ring.len -= 1;

        drop(ring);
        self.not_full.notify_one();

        debug_assert!(item.is_some(), "occupied slot must hold an item");
        item
    }

    /// Closes the queue, waking all blocked producers and consumers.
    ///
    /// Items already queued remain poppable; once drained, `pop` yields
    /// end-of-stream. Closing an already-closed queue is a no-op.
    pub fn close(&self) {
        {
            let mut ring = self.ring.lock().unwrap_or_else(|e| e.into_inner());
            if !ring.open {
                return;
            }
            ring.open = false;
        }

        debug!("event queue closed");
        self.not_full.notify_all();
        self.not_empty.notify_all();
    }

    /// Current number of queued items.
    pub fn len(&self) -> usize {
        self.ring.lock().unwrap_or_else(|e| e.into_inner()).len
    }

    /// Returns `true` when no items are queued.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T> std::fmt::Debug for BoundedQueue<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let ring = self.ring.lock().unwrap_or_else(|e| e.into_inner());
        f.debug_struct("BoundedQueue")
            .field("capacity", &ring.slots.len())
            .field("len", &ring.len)
            .field("open", &ring.open)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::mpsc;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    use super::*;

    #[test]
    fn pops_in_push_order() {
        let queue = BoundedQueue::new(8);
        for i in 0..5 {
            queue.push(i).unwrap();
        }
        for i in 0..5 {
            assert_eq!(queue.pop(), Some(i));
        }
    }

    #[test]
    fn ring_wraps_across_capacity_boundary() {
        let queue = BoundedQueue::new(3);
        queue.push(1).unwrap();
        queue.push(2).unwrap();
        assert_eq!(queue.pop(), Some(1));
        queue.push(3).unwrap();
        queue.push(4).unwrap();
        assert_eq!(queue.pop(), Some(2));
        assert_eq!(queue.pop(), Some(3));
        assert_eq!(queue.pop(), Some(4));
    }

    #[test]
    fn push_blocks_until_pop_frees_a_slot() {
        let queue = Arc::new(BoundedQueue::new(1));
        queue.push(1).unwrap();

        let producer = {
            let queue = Arc::clone(&queue);
            thread::spawn(move || queue.push(2))
        };

        // Give the producer time to block on the full queue.
        thread::sleep(Duration::from_millis(50));
        assert_eq!(queue.pop(), Some(1));

        producer.join().unwrap().unwrap();
        assert_eq!(queue.pop(), Some(2));
    }

    #[test]
    fn pop_blocks_until_push_arrives() {
        let queue = Arc::new(BoundedQueue::new(4));
        let (started_tx, started_rx) = mpsc::channel();

        let consumer = {
            let queue = Arc::clone(&queue);
            thread::spawn(move || {
                started_tx.send(()).unwrap();
                queue.pop()
            })
        };

        started_rx.recv().unwrap();
        thread::sleep(Duration::from_millis(20));
        queue.push(7).unwrap();

        assert_eq!(consumer.join().unwrap(), Some(7));
    }

    #[test]
    fn close_drains_queued_items_then_ends() {
        let queue = BoundedQueue::new(8);
        queue.push("a").unwrap();
        queue.push("b").unwrap();
        queue.close();

        assert_eq!(queue.pop(), Some("a"));
        assert_eq!(queue.pop(), Some("b"));
        assert_eq!(queue.pop(), None);
        // End-of-stream is sticky.
        assert_eq!(queue.pop(), None);
    }

    #[test]
    fn push_after_close_fails_without_inserting() {
        let queue = BoundedQueue::new(2);
        queue.close();
        assert_eq!(queue.push(1), Err(QueueError::Closed));
        assert!(queue.is_empty());
    }

    #[test]
    fn close_unblocks_waiting_producer() {
        let queue = Arc::new(BoundedQueue::new(1));
        queue.push(1).unwrap();

        let producer = {
            let queue = Arc::clone(&queue);
            thread::spawn(move || queue.push(2))
        };

        thread::sleep(Duration::from_millis(50));
        queue.close();

        assert_eq!(producer.join().unwrap(), Err(QueueError::Closed));
        // The first item is still drainable.
        assert_eq!(queue.pop(), Some(1));
        assert_eq!(queue.pop(), None);
    }

    #[test]
    fn close_unblocks_waiting_consumer() {
        let queue = Arc::new(BoundedQueue::<u32>::new(4));

        let consumer = {
            let queue = Arc::clone(&queue);
            thread::spawn(move || queue.pop())
        };

        thread::sleep(Duration::from_millis(50));
        queue.close();

        assert_eq!(consumer.join().unwrap(), None);
    }

    #[test]
    fn concurrent_producers_lose_no_items() {
        let queue = Arc::new(BoundedQueue::new(4));
        let mut producers = Vec::new();

        for base in 0..4u32 {
            let queue = Arc::clone(&queue);
            producers.push(thread::spawn(move || {
                for i in 0..25 {
                    queue.push(base * 100 + i).unwrap();
                }
            }));
        }

        let consumer = {
            let queue = Arc::clone(&queue);
            thread::spawn(move || {
                let mut seen = Vec::new();
                while let Some(item) = queue.pop() {
                    seen.push(item);
                }
                seen
            })
        };

        for producer in producers {
            producer.join().unwrap();
        }
        queue.close();

        let mut seen = consumer.join().unwrap();
        assert_eq!(seen.len(), 100);
        seen.sort_unstable();
        seen.dedup();
        assert_eq!(seen.len(), 100);
    }
}
