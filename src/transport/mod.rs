//! Publish/subscribe transport abstraction
//!
//! The transport owns routing, delivery guarantees and QoS. This crate only
//! needs it to carry a payload and an attachment in one unit: if a transport
//! can deliver one without the other, integrity verification downstream is
//! meaningless, so [`TransportCapabilities::atomic_attachment`] is checked
//! before any publisher is built on top of it.

pub mod memory;

use std::fmt;
use std::sync::Arc;

use crate::types::Qos;
use crate::Result;

pub use memory::MemoryBus;

/// One delivered unit: payload plus the attachment sent with it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sample {
    /// Topic the sample was published on
    pub topic: Arc<str>,

    /// Payload bytes (zero-copy via Arc)
    pub payload: Arc<[u8]>,

    /// Attachment bytes, if the publisher sent any
    pub attachment: Option<Arc<[u8]>>,
}

/// Callback invoked by the transport for every delivered sample
///
/// May be called repeatedly and, depending on the transport, concurrently.
pub type SampleCallback = Arc<dyn Fn(Sample) + Send + Sync + 'static>;

/// What a transport guarantees about delivery
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransportCapabilities {
    /// Payload and attachment are delivered together or not at all
    pub atomic_attachment: bool,

    /// Samples from one publisher arrive in publish order
    pub ordered_per_publisher: bool,
}

/// Publish/subscribe transport collaborator
#[async_trait::async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Delivery guarantees of this transport
    fn capabilities(&self) -> TransportCapabilities;

    /// Send one payload with its attachment as a single unit.
    ///
    /// Retry and backpressure policy belong to the transport.
    async fn publish(
        &self,
        topic: &str,
        payload: Vec<u8>,
        attachment: Vec<u8>,
        qos: Qos,
    ) -> Result<()>;

    /// Register `callback` for every sample published on `topic`.
    ///
    /// Callbacks stop when the returned [`Subscription`] is dropped or
    /// unsubscribed; callbacks already running complete normally.
    fn subscribe(&self, topic: &str, callback: SampleCallback) -> Result<Subscription>;
}

/// Handle to an active subscription
///
/// Dropping the handle unsubscribes.
pub struct Subscription {
    topic: Arc<str>,
    undeclare: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl Subscription {
    /// Create a handle that runs `undeclare` once when released
    pub fn new(
        topic: impl Into<Arc<str>>,
        undeclare: impl FnOnce() + Send + Sync + 'static,
    ) -> Self {
        Self { topic: topic.into(), undeclare: Some(Box::new(undeclare)) }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Stop further callbacks
    pub fn unsubscribe(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if let Some(undeclare) = self.undeclare.take() {
            undeclare();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.release();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("topic", &self.topic)
            .field("active", &self.undeclare.is_some())
            .finish()
    }
}
