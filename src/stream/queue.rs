//! Bounded hand-off queue between frame acquisition and publishing
//!
//! A live source cannot be paused, so the queue has to declare what happens
//! when the publishing side falls behind:
//!
//! - [`BackpressurePolicy::DropOldest`] keeps the newest frames and discards
//!   the oldest queued ones. Acquisition never waits.
//! - [`BackpressurePolicy::Block`] makes acquisition wait for space. Only
//!   suitable for finite sources (replays, tests) where every frame matters.

use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, mpsc};
use tracing::warn;

/// What acquisition does when the hand-off queue is full
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackpressurePolicy {
    /// Discard the oldest queued frame
    #[default]
    DropOldest,

    /// Wait until the publishing stage makes room
    Block,
}

/// The receiving side has gone away
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueClosed;

/// Create a bounded queue with the given policy
pub fn frame_queue<T>(
    capacity: usize,
    policy: BackpressurePolicy,
) -> (QueueSender<T>, QueueReceiver<T>)
where
    T: Clone + Send + 'static,
{
    let capacity = capacity.max(1);
    match policy {
        BackpressurePolicy::DropOldest => {
            let (tx, rx) = broadcast::channel(capacity);
            let rx = QueueReceiver { inner: ReceiverInner::DropOldest(rx), dropped: 0 };
            (QueueSender::DropOldest(tx), rx)
        }
        BackpressurePolicy::Block => {
            let (tx, rx) = mpsc::channel(capacity);
            (QueueSender::Block(tx), QueueReceiver { inner: ReceiverInner::Block(rx), dropped: 0 })
        }
    }
}

/// Producer half of the hand-off queue
#[derive(Debug)]
pub enum QueueSender<T> {
    DropOldest(broadcast::Sender<T>),
    Block(mpsc::Sender<T>),
}

impl<T: Clone + Send + 'static> QueueSender<T> {
    /// Enqueue an item, applying the backpressure policy.
    pub async fn push(&self, item: T) -> Result<(), QueueClosed> {
        match self {
            QueueSender::DropOldest(tx) => tx.send(item).map(|_| ()).map_err(|_| QueueClosed),
            QueueSender::Block(tx) => tx.send(item).await.map_err(|_| QueueClosed),
        }
    }

    pub fn policy(&self) -> BackpressurePolicy {
        match self {
            QueueSender::DropOldest(_) => BackpressurePolicy::DropOldest,
            QueueSender::Block(_) => BackpressurePolicy::Block,
        }
    }
}

#[derive(Debug)]
enum ReceiverInner<T> {
    DropOldest(broadcast::Receiver<T>),
    Block(mpsc::Receiver<T>),
}

/// Consumer half of the hand-off queue
#[derive(Debug)]
pub struct QueueReceiver<T> {
    inner: ReceiverInner<T>,
    dropped: u64,
}

impl<T: Clone + Send + 'static> QueueReceiver<T> {
    /// Next item, or `None` once the sender is gone and the queue is drained.
    pub async fn pop(&mut self) -> Option<T> {
        match &mut self.inner {
            ReceiverInner::DropOldest(rx) => loop {
                match rx.recv().await {
                    Ok(item) => return Some(item),
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        self.dropped += skipped;
                        warn!(
                            skipped,
                            total_dropped = self.dropped,
                            "Publishing behind acquisition, dropped oldest frames"
                        );
                    }
                    Err(broadcast::error::RecvError::Closed) => return None,
                }
            },
            ReceiverInner::Block(rx) => rx.recv().await,
        }
    }

    /// Items discarded by the drop-oldest policy so far
    pub fn dropped(&self) -> u64 {
        self.dropped
    }
}
