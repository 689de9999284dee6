//! Verified frame subscription
//!
//! Wires a [`Verifier`] into a transport callback. Only units whose digest
//! matches are decoded and handed downstream; everything else is dropped and
//! counted. When mismatches persist, the subscription's fault signal fires so
//! the owner can alert or shut down.

use futures::Stream;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::SubscriberConfig;
use crate::transport::{Sample, Subscription, Transport};
use crate::verifier::{Verdict, Verifier, VerifierStats};
use crate::{FrameError, FrameMessage, Result};

/// Active verified subscription
///
/// Dropping it unsubscribes. Callbacks already dispatched by the transport run
/// to completion.
pub struct FrameSubscriber {
    subscription: Subscription,
    verifier: Arc<Verifier>,
    fault: CancellationToken,
}

impl FrameSubscriber {
    /// Subscribe and call `handler` with every verified, decoded message.
    ///
    /// # Errors
    ///
    /// - [`FrameError::Config`] if `config` fails validation
    /// - [`FrameError::TransportCapability`] if the transport can split
    ///   payload and attachment
    /// - Any error the transport returns while declaring the subscription
    pub fn subscribe<T, F>(transport: &T, config: &SubscriberConfig, handler: F) -> Result<Self>
    where
        T: Transport + ?Sized,
        F: Fn(FrameMessage) + Send + Sync + 'static,
    {
        config.validate()?;
        if !transport.capabilities().atomic_attachment {
            return Err(FrameError::TransportCapability {
                requirement: format!(
                    "topic '{}' needs payload and attachment delivered together",
                    config.topic
                ),
            });
        }

        let verifier =
            Arc::new(Verifier::new(config.topic.as_str(), config.max_consecutive_mismatches));
        let fault = CancellationToken::new();

        let callback_verifier = Arc::clone(&verifier);
        let callback_fault = fault.clone();
        let callback = Arc::new(move |sample: Sample| {
            match callback_verifier.verify(&sample.payload, sample.attachment.as_deref()) {
                Verdict::Decoded(message) => handler(message),
                verdict if verdict.is_escalation() => {
                    if !callback_fault.is_cancelled() {
                        warn!(
                            topic = %sample.topic,
                            "Subscription faulted on persistent integrity mismatches"
                        );
                    }
                    callback_fault.cancel();
                }
                // Logged by the verifier
                Verdict::Rejected(_) => {}
            }
        });

        let subscription = transport.subscribe(&config.topic, callback)?;
        info!(
            topic = %config.topic,
            max_consecutive_mismatches = config.max_consecutive_mismatches,
            "Verified subscription declared"
        );

        Ok(Self { subscription, verifier, fault })
    }

    /// Subscribe and receive verified messages as a stream.
    ///
    /// Messages are buffered up to `config.channel_capacity`; if the consumer
    /// falls behind further, new messages are dropped with a warning because
    /// the transport callback cannot wait. The stream ends when the returned
    /// subscriber is dropped.
    pub fn stream<T>(
        transport: &T,
        config: &SubscriberConfig,
    ) -> Result<(Self, impl Stream<Item = FrameMessage> + Send + 'static)>
    where
        T: Transport + ?Sized,
    {
        let (tx, rx) = mpsc::channel(config.channel_capacity.max(1));
        let topic = config.topic.clone();
        let subscriber = Self::subscribe(transport, config, move |message| {
            if let Err(mpsc::error::TrySendError::Full(message)) = tx.try_send(message) {
                warn!(
                    topic = %topic,
                    timestamp = %message.timestamp(),
                    "Consumer lagging, dropping verified frame"
                );
            }
        })?;
        Ok((subscriber, ReceiverStream::new(rx)))
    }

    pub fn topic(&self) -> &str {
        self.subscription.topic()
    }

    /// Verification counters so far
    pub fn stats(&self) -> VerifierStats {
        self.verifier.stats()
    }

    pub fn verifier(&self) -> &Verifier {
        &self.verifier
    }

    /// Whether persistent mismatches have been seen
    pub fn is_faulted(&self) -> bool {
        self.fault.is_cancelled()
    }

    /// Wait until persistent mismatches are seen
    pub async fn faulted(&self) {
        self.fault.cancelled().await
    }

    /// Stop receiving; in-flight callbacks complete
    pub fn unsubscribe(self) {
        debug!(topic = %self.subscription.topic(), stats = ?self.verifier.stats(), "Unsubscribing");
        self.subscription.unsubscribe();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::integrity::tag;
    use crate::transport::MemoryBus;
    use crate::{FramePublisher, Qos, codec};
    use crate::test_utils::fixture_wall_start;
    use chrono::TimeDelta;
    use futures::StreamExt;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn config(threshold: u32) -> SubscriberConfig {
        SubscriberConfig {
            topic: "frames".to_string(),
            max_consecutive_mismatches: threshold,
            channel_capacity: 8,
        }
    }

    fn message(byte: u8) -> FrameMessage {
        let ts = fixture_wall_start() + TimeDelta::seconds(i64::from(byte));
        FrameMessage::build(vec![byte; 8], ts).unwrap()
    }

    #[tokio::test]
    async fn handler_receives_verified_messages() {
        let bus = Arc::new(MemoryBus::new());
        let received: Arc<Mutex<Vec<FrameMessage>>> = Arc::default();
        let sink = Arc::clone(&received);
        let subscriber =
            FrameSubscriber::subscribe(&*bus, &config(3), move |m| sink.lock().unwrap().push(m))
                .unwrap();

        let publisher = FramePublisher::new(Arc::clone(&bus), "frames", Qos::default()).unwrap();
        publisher.publish(&message(1)).await.unwrap();
        publisher.publish(&message(2)).await.unwrap();

        assert_eq!(*received.lock().unwrap(), vec![message(1), message(2)]);
        assert_eq!(subscriber.stats().decoded, 2);
        assert!(!subscriber.is_faulted());
    }

    #[tokio::test]
    async fn mismatches_never_reach_handler_and_eventually_fault() {
        let bus = MemoryBus::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let subscriber = FrameSubscriber::subscribe(&bus, &config(2), move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();

        let payload = codec::serialize(&message(1)).unwrap();
        let wrong = tag(b"other bytes").to_attachment();
        for _ in 0..2 {
            bus.deliver(Sample {
                topic: Arc::from("frames"),
                payload: payload.clone().into(),
                attachment: Some(wrong.clone().into()),
            });
        }

        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(subscriber.stats().mismatched, 2);
        assert!(subscriber.is_faulted());
        tokio::time::timeout(std::time::Duration::from_secs(1), subscriber.faulted())
            .await
            .expect("fault signal should already be set");
    }

    #[tokio::test]
    async fn stream_yields_messages_until_unsubscribed() {
        let bus = Arc::new(MemoryBus::new());
        let (subscriber, mut frames) = FrameSubscriber::stream(&*bus, &config(3)).unwrap();
        let publisher = FramePublisher::new(Arc::clone(&bus), "frames", Qos::default()).unwrap();

        publisher.publish(&message(7)).await.unwrap();
        assert_eq!(frames.next().await, Some(message(7)));

        subscriber.unsubscribe();
        assert_eq!(bus.subscriber_count("frames"), 0);
        assert_eq!(frames.next().await, None);
    }

    #[test]
    fn invalid_config_is_rejected_before_subscribing() {
        let bus = MemoryBus::new();
        let empty_topic = SubscriberConfig { topic: String::new(), ..config(3) };
        let result = FrameSubscriber::subscribe(&bus, &empty_topic, |_| {});
        assert!(matches!(result, Err(FrameError::Config { .. })));

        let no_buffer = SubscriberConfig { channel_capacity: 0, ..config(3) };
        let result = FrameSubscriber::stream(&bus, &no_buffer);
        assert!(matches!(result, Err(FrameError::Config { .. })));
        assert_eq!(bus.subscriber_count(""), 0);
        assert_eq!(bus.subscriber_count("frames"), 0);
    }
}
