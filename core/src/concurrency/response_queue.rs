//! Bounded, closable many-producer/single-consumer queue.
//!
//! A bounded tokio channel provides the backpressure. A cancellation token
//! carries the closed state so that producers waiting for room observe a
//! close instead of blocking on a full queue nobody reads anymore.

use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;

use crate::error::QueueClosed;

/// Default number of outcomes a discovery run buffers.
pub const DEFAULT_QUEUE_CAPACITY: usize = 100;

/// Fixed-capacity queue with cooperative backpressure.
#[derive(Debug)]
pub struct ResponseQueue<T> {
    sender: mpsc::Sender<T>,
    receiver: Mutex<mpsc::Receiver<T>>,
    closed: CancellationToken,
}

impl<T: Send> ResponseQueue<T> {
    /// Create a queue holding at most `capacity` items.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    pub fn new(capacity: usize) -> Self {
        let (sender, receiver) = mpsc::channel(capacity);
        Self {
            sender,
            receiver: Mutex::new(receiver),
            closed: CancellationToken::new(),
        }
    }

    /// Push an item, waiting for room if the queue is full.
    ///
    /// Fails without pushing once the queue is closed, including while
    /// waiting for room.
    pub async fn send(&self, item: T) -> Result<(), QueueClosed> {
        let permit = self.reserve().await?;
        if self.closed.is_cancelled() {
            return Err(QueueClosed);
        }
        permit.send(item);
        Ok(())
    }

    /// Wait until the queue has room for at least one more item.
    ///
    /// The room is not held: a concurrent producer may take it first.
    pub async fn wait_headroom(&self) -> Result<(), QueueClosed> {
        self.reserve().await.map(drop)
    }

    /// Take the next item.
    ///
    /// Returns `None` once the queue is closed and every item pushed before
    /// the close has been taken.
    pub async fn recv(&self) -> Option<T> {
        let mut receiver = self.receiver.lock().await;
        if let Ok(item) = receiver.try_recv() {
            return Some(item);
        }

        tokio::select! {
            item = receiver.recv() => item,
            () = self.closed.cancelled() => receiver.try_recv().ok(),
        }
    }

    /// Close the queue. Idempotent.
    ///
    /// Pending and later sends fail with [`QueueClosed`].
    pub fn close(&self) {
        self.closed.cancel();
    }

    /// Returns true once [`ResponseQueue::close`] was called.
    pub fn is_closed(&self) -> bool {
        self.closed.is_cancelled()
    }

    /// Returns true if no more items fit.
    pub fn is_full(&self) -> bool {
        self.sender.capacity() == 0
    }

    /// Number of occupied slots, including ones reserved by in-flight sends.
    pub fn len(&self) -> usize {
        self.sender.max_capacity() - self.sender.capacity()
    }

    /// Returns true if no slots are occupied.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Maximum number of items the queue holds.
    pub fn capacity(&self) -> usize {
        self.sender.max_capacity()
    }

    async fn reserve(&self) -> Result<mpsc::Permit<'_, T>, QueueClosed> {
        if self.closed.is_cancelled() {
            return Err(QueueClosed);
        }

        tokio::select! {
            biased;
            () = self.closed.cancelled() => Err(QueueClosed),
            permit = self.sender.reserve() => permit.map_err(|_| QueueClosed),
        }
    }
}
