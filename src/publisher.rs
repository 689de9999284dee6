//! Frame message publisher
//!
//! Serializes a message, tags the exact serialized bytes, and hands both to
//! the transport in a single send. No retries happen here.

use std::sync::Arc;
use tracing::{debug, trace};

use crate::codec;
use crate::integrity::IntegrityTag;
use crate::transport::Transport;
use crate::types::Qos;
use crate::{FrameError, FrameMessage, Result};

/// What was sent for one published message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishReceipt {
    /// Integrity tag sent as attachment
    pub tag: IntegrityTag,

    /// Serialized payload size in bytes
    pub payload_len: usize,
}

/// Publishes frame messages on one topic
pub struct FramePublisher<T: Transport + ?Sized> {
    transport: Arc<T>,
    topic: String,
    qos: Qos,
}

impl<T: Transport + ?Sized> FramePublisher<T> {
    /// Declare a publisher on `topic`.
    ///
    /// # Errors
    ///
    /// Returns [`FrameError::TransportCapability`] if the transport cannot
    /// deliver payload and attachment as one unit.
    pub fn new(transport: Arc<T>, topic: impl Into<String>, qos: Qos) -> Result<Self> {
        let topic = topic.into();
        let caps = transport.capabilities();
        if !caps.atomic_attachment {
            return Err(FrameError::TransportCapability {
                requirement: format!(
                    "topic '{}' needs payload and attachment delivered together",
                    topic
                ),
            });
        }
        if !caps.ordered_per_publisher {
            debug!(
                topic = %topic,
                "Transport does not preserve publish order; timestamps may arrive out of order"
            );
        }

        debug!(
            topic = %topic,
            priority = ?qos.priority,
            express = qos.express,
            "Publisher declared"
        );
        Ok(Self { transport, topic, qos })
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn qos(&self) -> Qos {
        self.qos
    }

    /// Serialize, tag and send one message.
    pub async fn publish(&self, message: &FrameMessage) -> Result<PublishReceipt> {
        let payload = codec::serialize(message)?;
        let tag = IntegrityTag::compute(&payload);
        let payload_len = payload.len();

        self.transport.publish(&self.topic, payload, tag.to_attachment(), self.qos).await?;

        trace!(topic = %self.topic, tag = %tag, payload_len, "Published frame message");
        Ok(PublishReceipt { tag, payload_len })
    }
}
