//! Bounded FIFO shared by all ingress requests and all dispatch workers.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::{mpsc, Mutex};

use super::types::RawEvent;

/// Reasons an event could not be placed on the queue.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnqueueError {
    #[error("queue stayed full for {0:?}")]
    Timeout(Duration),

    #[error("queue closed")]
    Closed,
}

/// Bounded event queue.
///
/// Cloning is cheap; every clone refers to the same channel. Each event is
/// handed to exactly one consumer, in enqueue order.
#[derive(Clone)]
pub struct EventQueue {
    inner: Arc<QueueInner>,
}

struct QueueInner {
    capacity: usize,
    tx: mpsc::Sender<RawEvent>,
    // Shared by the workers. Whoever holds the lock is the next to receive.
    rx: Mutex<mpsc::Receiver<RawEvent>>,
}

impl EventQueue {
    /// Create a queue holding at most `capacity` pending events.
    ///
    /// Panics if `capacity` is zero or above `Semaphore::MAX_PERMITS`;
    /// callers validate options first.
    pub fn new(capacity: usize) -> Self {
        let (tx, rx) = mpsc::channel(capacity);
        Self {
            inner: Arc::new(QueueInner {
                capacity,
                tx,
                rx: Mutex::new(rx),
            }),
        }
    }

    /// Wait up to `timeout` for space, then give up on the event.
    pub async fn enqueue(&self, event: RawEvent, timeout: Duration) -> Result<(), EnqueueError> {
        self.inner
            .tx
            .send_timeout(event, timeout)
            .await
            .map_err(|e| match e {
                mpsc::error::SendTimeoutError::Timeout(_) => EnqueueError::Timeout(timeout),
                mpsc::error::SendTimeoutError::Closed(_) => EnqueueError::Closed,
            })
    }

    /// Wait for the next event.
    ///
    /// Cancel-safe: dropping the future before it resolves loses nothing.
    pub async fn dequeue(&self) -> Option<RawEvent> {
        let mut rx = self.inner.rx.lock().await;
        rx.recv().await
    }

    /// Number of events waiting for a worker.
    pub fn len(&self) -> usize {
        self.inner.capacity - self.inner.tx.capacity()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.inner.capacity
    }
}
