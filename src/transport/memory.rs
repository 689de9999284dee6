//! In-process transport

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use tracing::{debug, trace};

use super::{Sample, SampleCallback, Subscription, Transport, TransportCapabilities};
use crate::types::Qos;
use crate::Result;

type Registry = HashMap<Arc<str>, Vec<(u64, SampleCallback)>>;

/// In-process bus delivering samples synchronously to subscribers
///
/// Payload and attachment travel in one [`Sample`], so delivery is atomic.
/// Topics match exactly. Cloning shares the same bus.
#[derive(Clone, Default)]
pub struct MemoryBus {
    inner: Arc<Inner>,
}

#[derive(Default)]
struct Inner {
    subscribers: RwLock<Registry>,
    next_id: AtomicU64,
    published: AtomicU64,
    last_qos: Mutex<Option<Qos>>,
}

impl MemoryBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Samples published so far, across all topics
    pub fn published(&self) -> u64 {
        self.inner.published.load(Ordering::Relaxed)
    }

    /// QoS of the most recent publish
    pub fn last_qos(&self) -> Option<Qos> {
        *self.inner.last_qos.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Active subscriptions on `topic`
    pub fn subscriber_count(&self, topic: &str) -> usize {
        let registry = self.inner.subscribers.read().unwrap_or_else(|e| e.into_inner());
        registry.get(topic).map_or(0, Vec::len)
    }

    /// Deliver a sample as-is, bypassing [`Transport::publish`].
    ///
    /// Lets callers inject arbitrary payload/attachment pairs, e.g. to check
    /// how subscribers handle corrupted units.
    pub fn deliver(&self, sample: Sample) -> usize {
        let callbacks: Vec<SampleCallback> = {
            let registry = self.inner.subscribers.read().unwrap_or_else(|e| e.into_inner());
            registry
                .get(&*sample.topic)
                .map(|subs| subs.iter().map(|(_, cb)| Arc::clone(cb)).collect())
                .unwrap_or_default()
        };

        // Lock released before dispatch so callbacks may unsubscribe
        for callback in &callbacks {
            callback(sample.clone());
        }
        callbacks.len()
    }
}

#[async_trait::async_trait]
impl Transport for MemoryBus {
    fn capabilities(&self) -> TransportCapabilities {
        TransportCapabilities { atomic_attachment: true, ordered_per_publisher: true }
    }

    async fn publish(
        &self,
        topic: &str,
        payload: Vec<u8>,
        attachment: Vec<u8>,
        qos: Qos,
    ) -> Result<()> {
        self.inner.published.fetch_add(1, Ordering::Relaxed);
        *self.inner.last_qos.lock().unwrap_or_else(|e| e.into_inner()) = Some(qos);

        let sample = Sample {
            topic: Arc::from(topic),
            payload: payload.into(),
            attachment: Some(attachment.into()),
        };
        let delivered = self.deliver(sample);
        trace!(topic, delivered, "Memory bus publish");
        Ok(())
    }

    fn subscribe(&self, topic: &str, callback: SampleCallback) -> Result<Subscription> {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let topic: Arc<str> = Arc::from(topic);

        self.inner
            .subscribers
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .entry(Arc::clone(&topic))
            .or_default()
            .push((id, callback));
        debug!(topic = %topic, id, "Memory bus subscriber declared");

        let inner = Arc::downgrade(&self.inner);
        let key = Arc::clone(&topic);
        Ok(Subscription::new(topic, move || {
            let Some(inner) = inner.upgrade() else { return };
            let mut registry = inner.subscribers.write().unwrap_or_else(|e| e.into_inner());
            if let Some(subs) = registry.get_mut(&key) {
                subs.retain(|(sub_id, _)| *sub_id != id);
                if subs.is_empty() {
                    registry.remove(&key);
                }
            }
            debug!(topic = %key, id, "Memory bus subscriber undeclared");
        }))
    }
}
