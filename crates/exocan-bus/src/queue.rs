//! Bounded hand-off between the synchronizer thread and bus readers.

use std::collections::VecDeque;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

/// Frames buffered between the synchronizer and [`ExoBus::recv`](crate::ExoBus::recv).
pub const DEFAULT_QUEUE_CAPACITY: usize = 5;

/// Why a push did not enqueue; the item is handed back.
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum PushError<T> {
    /// The queue is at capacity (only from [`DeliveryQueue::try_push`]).
    #[error("delivery queue full")]
    Full(T),
    /// The queue has been closed.
    #[error("delivery queue closed")]
    Closed(T),
}

impl<T> PushError<T> {
    /// Recover the rejected item.
    pub fn into_inner(self) -> T {
        match self {
            Self::Full(item) | Self::Closed(item) => item,
        }
    }
}

struct State<T> {
    items: VecDeque<T>,
    closed: bool,
}

/// Fixed-capacity FIFO with blocking push and timed pop.
///
/// A full queue blocks the producer, which in turn stops the synchronizer
/// from reading the transport. Closing wakes every waiter: pushes fail from
/// then on, pops drain what is left and then return `None`.
pub struct DeliveryQueue<T> {
    state: Mutex<State<T>>,
    not_empty: Condvar,
    not_full: Condvar,
    capacity: usize,
}

impl<T> DeliveryQueue<T> {
    /// Create a queue holding at most `capacity` items (minimum 1).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            state: Mutex::new(State {
                items: VecDeque::with_capacity(capacity),
                closed: false,
            }),
            not_empty: Condvar::new(),
            not_full: Condvar::new(),
            capacity,
        }
    }

    /// Enqueue, blocking while the queue is full.
    pub fn push(&self, item: T) -> Result<(), PushError<T>> {
        let mut state = self.lock();
        while !state.closed && state.items.len() >= self.capacity {
            state = self
                .not_full
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
        if state.closed {
            return Err(PushError::Closed(item));
        }
        state.items.push_back(item);
        drop(state);
        self.not_empty.notify_one();
        Ok(())
    }

    /// Enqueue without blocking.
    pub fn try_push(&self, item: T) -> Result<(), PushError<T>> {
        let mut state = self.lock();
        if state.closed {
            return Err(PushError::Closed(item));
        }
        if state.items.len() >= self.capacity {
            return Err(PushError::Full(item));
        }
        state.items.push_back(item);
        drop(state);
        self.not_empty.notify_one();
        Ok(())
    }

    /// Dequeue, waiting up to `timeout` (`None` waits indefinitely).
    ///
    /// Returns `None` on timeout, or once the queue is closed and empty. A
    /// timeout too large to represent as a deadline waits indefinitely.
    pub fn pop(&self, timeout: Option<Duration>) -> Option<T> {
        let deadline = timeout.and_then(|timeout| Instant::now().checked_add(timeout));
        let mut state = self.lock();
        loop {
            if let Some(item) = state.items.pop_front() {
                drop(state);
                self.not_full.notify_one();
                return Some(item);
            }
            if state.closed {
                return None;
            }
            match deadline {
                None => {
                    state = self
                        .not_empty
                        .wait(state)
                        .unwrap_or_else(PoisonError::into_inner);
                }
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return None;
                    }
                    let (guard, _) = self
                        .not_empty
                        .wait_timeout(state, deadline - now)
                        .unwrap_or_else(PoisonError::into_inner);
                    state = guard;
                }
            }
        }
    }

    /// Dequeue without blocking.
    pub fn try_pop(&self) -> Option<T> {
        let item = self.lock().items.pop_front();
        if item.is_some() {
            self.not_full.notify_one();
        }
        item
    }

    /// Close the queue and wake every waiter. Idempotent.
    pub fn close(&self) {
        self.lock().closed = true;
        self.not_empty.notify_all();
        self.not_full.notify_all();
    }

    /// Items currently queued.
    pub fn len(&self) -> usize {
        self.lock().items.len()
    }

    /// Whether no items are queued.
    pub fn is_empty(&self) -> bool {
        self.lock().items.is_empty()
    }

    /// Maximum number of queued items.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Whether [`close`](Self::close) has been called.
    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    fn lock(&self) -> MutexGuard<'_, State<T>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<T> Default for DeliveryQueue<T> {
    fn default() -> Self {
        Self::new(DEFAULT_QUEUE_CAPACITY)
    }
}

impl<T> std::fmt::Debug for DeliveryQueue<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.lock();
        f.debug_struct("DeliveryQueue")
            .field("len", &state.items.len())
            .field("capacity", &self.capacity)
            .field("closed", &state.closed)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::thread;

    use super::*;

    #[test]
    fn fifo_order() {
        let queue = DeliveryQueue::new(3);
        queue.push(1).expect("push should succeed");
        queue.push(2).expect("push should succeed");
        queue.push(3).expect("push should succeed");

        assert_eq!(queue.len(), 3);
        assert_eq!(queue.try_pop(), Some(1));
        assert_eq!(queue.try_pop(), Some(2));
        assert_eq!(queue.try_pop(), Some(3));
        assert_eq!(queue.try_pop(), None);
    }

    #[test]
    fn sixth_push_blocks_until_pop() {
        let queue = Arc::new(DeliveryQueue::new(DEFAULT_QUEUE_CAPACITY));
        for i in 0..5 {
            queue.push(i).expect("push below capacity should succeed");
        }
        assert_eq!(queue.try_push(99), Err(PushError::Full(99)));

        let pushed = Arc::new(AtomicBool::new(false));
        let producer = {
            let queue = Arc::clone(&queue);
            let pushed = Arc::clone(&pushed);
            thread::spawn(move || {
                queue.push(5).expect("blocked push should complete");
                pushed.store(true, Ordering::SeqCst);
            })
        };

        thread::sleep(Duration::from_millis(100));
        assert!(!pushed.load(Ordering::SeqCst), "sixth push must block");

        assert_eq!(queue.pop(Some(Duration::from_secs(1))), Some(0));
        producer.join().expect("producer thread should finish");
        assert!(pushed.load(Ordering::SeqCst));
        assert_eq!(queue.len(), 5);
    }

    #[test]
    fn pop_times_out_when_empty() {
        let queue: DeliveryQueue<u8> = DeliveryQueue::default();
        let started = Instant::now();
        assert_eq!(queue.pop(Some(Duration::from_millis(50))), None);
        assert!(started.elapsed() >= Duration::from_millis(50));
    }

    #[test]
    fn zero_timeout_does_not_block() {
        let queue: DeliveryQueue<u8> = DeliveryQueue::default();
        assert_eq!(queue.pop(Some(Duration::ZERO)), None);
        queue.push(7).expect("push should succeed");
        assert_eq!(queue.pop(Some(Duration::ZERO)), Some(7));
    }

    #[test]
    fn huge_timeout_returns_queued_item() {
        let queue = DeliveryQueue::new(2);
        queue.push(1u8).expect("push should succeed");
        assert_eq!(queue.pop(Some(Duration::MAX)), Some(1));
    }

    #[test]
    fn huge_timeout_waits_for_push() {
        let queue = Arc::new(DeliveryQueue::new(1));
        let consumer = {
            let queue = Arc::clone(&queue);
            thread::spawn(move || queue.pop(Some(Duration::MAX)))
        };

        thread::sleep(Duration::from_millis(20));
        queue.push(9u8).expect("push should succeed");
        assert_eq!(consumer.join().expect("consumer should finish"), Some(9));
    }

    #[test]
    fn pop_wakes_on_push() {
        let queue = Arc::new(DeliveryQueue::new(1));
        let consumer = {
            let queue = Arc::clone(&queue);
            thread::spawn(move || queue.pop(None))
        };

        thread::sleep(Duration::from_millis(20));
        queue.push(42u32).expect("push should succeed");
        assert_eq!(consumer.join().expect("consumer should finish"), Some(42));
    }

    #[test]
    fn close_releases_blocked_producer() {
        let queue = Arc::new(DeliveryQueue::new(1));
        queue.push(1).expect("push should succeed");

        let producer = {
            let queue = Arc::clone(&queue);
            thread::spawn(move || queue.push(2))
        };

        thread::sleep(Duration::from_millis(20));
        queue.close();

        let result = producer.join().expect("producer should finish");
        assert_eq!(result, Err(PushError::Closed(2)));
    }

    #[test]
    fn close_drains_then_returns_none() {
        let queue = DeliveryQueue::new(2);
        queue.push("a").expect("push should succeed");
        queue.close();

        assert!(queue.is_closed());
        assert_eq!(queue.push("b").map_err(PushError::into_inner), Err("b"));
        assert_eq!(queue.pop(None), Some("a"));
        assert_eq!(queue.pop(None), None);
    }

    #[test]
    fn capacity_is_at_least_one() {
        let queue: DeliveryQueue<u8> = DeliveryQueue::new(0);
        assert_eq!(queue.capacity(), 1);
        assert!(queue.is_empty());
    }
}
