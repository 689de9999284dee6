//! Driver spawns and manages the publishing session tasks
//!
//! Two tasks connected by a bounded queue:
//!
//! - **acquisition** owns the [`FrameSource`] and the [`StreamClock`]. It pulls
//!   frames as fast as the source delivers them and stamps each with its
//!   absolute time. Decode failures are logged and skipped.
//! - **publishing** owns the encoder and the publisher:
//!   image → message → tag → send.
//!
//! Blocking in the transport therefore never stalls frame acquisition; what
//! happens when publishing falls behind is set by the queue's
//! [`BackpressurePolicy`](crate::stream::BackpressurePolicy).

use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use crate::clock::StreamClock;
use crate::config::PublisherConfig;
use crate::provider::{FrameSource, ImageEncoder, SourceOpener, StreamResolver};
use crate::publisher::{FramePublisher, PublishReceipt};
use crate::stream::{QueueReceiver, QueueSender, frame_queue};
use crate::transport::Transport;
use crate::types::{FrameMessage, RawFrame, select_format};
use crate::{FrameError, Result};

/// Snapshot of publishing session counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PublisherStats {
    /// Frames pulled from the source
    pub acquired: u64,
    /// Frames discarded by drop-oldest backpressure
    pub dropped: u64,
    /// Messages handed to the transport
    pub published: u64,
    /// Frames skipped on per-message errors (decode, encode, build, send)
    pub skipped: u64,
}

#[derive(Debug, Default)]
struct Counters {
    acquired: AtomicU64,
    dropped: AtomicU64,
    published: AtomicU64,
    skipped: AtomicU64,
}

impl Counters {
    fn snapshot(&self) -> PublisherStats {
        PublisherStats {
            acquired: self.acquired.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            published: self.published.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
        }
    }
}

/// Running publishing session
///
/// Dropping the session cancels both tasks.
pub struct PublishingSession {
    topic: String,
    counters: Arc<Counters>,
    cancel: CancellationToken,
    acquisition: Option<JoinHandle<Result<()>>>,
    publishing: Option<JoinHandle<Result<()>>>,
}

impl PublishingSession {
    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn stats(&self) -> PublisherStats {
        self.counters.snapshot()
    }

    /// Token that stops the session when cancelled
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Ask both tasks to stop after their current frame
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Wait for the session to end and return its final counters.
    ///
    /// The session ends when the source closes, on cancellation, or on a
    /// startup-class error in either task.
    ///
    /// # Errors
    ///
    /// Returns the first fatal error from acquisition or publishing, or
    /// [`FrameError::Worker`] if a task panicked.
    pub async fn join(mut self) -> Result<PublisherStats> {
        let acquisition = join_task("acquisition", self.acquisition.take()).await;
        let publishing = join_task("publishing", self.publishing.take()).await;
        acquisition?;
        publishing?;
        Ok(self.counters.snapshot())
    }
}

impl Drop for PublishingSession {
    fn drop(&mut self) {
        if self.acquisition.is_some() || self.publishing.is_some() {
            debug!(topic = %self.topic, "Dropping publishing session");
            self.cancel.cancel();
        }
    }
}

async fn join_task(name: &str, handle: Option<JoinHandle<Result<()>>>) -> Result<()> {
    match handle {
        Some(handle) => handle
            .await
            .map_err(|e| FrameError::Worker { details: format!("{} task: {}", name, e) })?,
        None => Ok(()),
    }
}

/// Driver spawns and manages publishing session tasks
pub struct Driver;

impl Driver {
    /// Resolve, open and start publishing a stream.
    ///
    /// Startup-class failures are returned here and nothing is spawned:
    /// invalid configuration, no acceptable format
    /// ([`FrameError::StreamUnavailable`]), a source that fails to open, or a
    /// transport that cannot carry attachments atomically.
    pub async fn start<R, O, E, T>(
        resolver: &R,
        opener: &O,
        source_id: &str,
        encoder: E,
        transport: Arc<T>,
        config: &PublisherConfig,
    ) -> Result<PublishingSession>
    where
        R: StreamResolver + ?Sized,
        O: SourceOpener + ?Sized,
        E: ImageEncoder,
        T: Transport + ?Sized,
    {
        config.validate()?;
        info!(source_id, resolution = %config.resolution, "Resolving stream");

        let formats = resolver.formats(source_id).await?;
        let format = select_format(&formats, config.resolution)?;
        info!(format = %format.id, height = ?format.height, "Selected stream format");

        let publisher = FramePublisher::new(transport, config.topic.clone(), config.qos)?;
        let source = opener.open(format, config.start_offset()).await?;

        Ok(Self::spawn(source, encoder, publisher, StreamClock::new(), config))
    }

    /// Spawn acquisition and publishing tasks for an already open source.
    ///
    /// `clock` may be pre-anchored to pin the session's wall start. Otherwise
    /// it anchors on the first frame the source delivers, at the moment it is
    /// acquired, so neither queueing delay nor drop-oldest backpressure moves
    /// the anchor.
    pub fn spawn<S, E, T>(
        source: S,
        encoder: E,
        publisher: FramePublisher<T>,
        clock: StreamClock,
        config: &PublisherConfig,
    ) -> PublishingSession
    where
        S: FrameSource,
        E: ImageEncoder,
        T: Transport + ?Sized,
    {
        let (tx, rx) = frame_queue(config.queue_capacity, config.backpressure);
        let counters = Arc::new(Counters::default());
        let cancel = CancellationToken::new();
        let topic: Arc<str> = Arc::from(publisher.topic());

        info!(
            topic = %topic,
            media_type = encoder.media_type(),
            queue_capacity = config.queue_capacity,
            backpressure = ?config.backpressure,
            "Starting publishing session"
        );

        let acquisition = tokio::spawn(Self::acquisition_task(
            Arc::clone(&topic),
            source,
            clock,
            tx,
            Arc::clone(&counters),
            cancel.clone(),
        ));
        let publishing = tokio::spawn(Self::publishing_task(
            Arc::clone(&topic),
            rx,
            encoder,
            publisher,
            Arc::clone(&counters),
            cancel.clone(),
        ));

        PublishingSession {
            topic: topic.to_string(),
            counters,
            cancel,
            acquisition: Some(acquisition),
            publishing: Some(publishing),
        }
    }

    /// Acquisition task - pulls frames, timestamps them and hands them on
    async fn acquisition_task<S: FrameSource>(
        topic: Arc<str>,
        mut source: S,
        mut clock: StreamClock,
        tx: QueueSender<TimedFrame>,
        counters: Arc<Counters>,
        cancel: CancellationToken,
    ) -> Result<()> {
        info!(topic = %topic, "Frame acquisition started");
        // Every pull from the source, including failed ones
        let mut seq = 0u64;

        let outcome = loop {
            let result = tokio::select! {
                _ = cancel.cancelled() => {
                    info!(topic = %topic, seq, "Frame acquisition cancelled");
                    break Ok(());
                }
                result = source.next_frame() => result,
            };
            seq += 1;

            let timed = match result {
                Ok(Some(frame)) => {
                    counters.acquired.fetch_add(1, Ordering::Relaxed);
                    clock.observe(frame.relative_time).map(|timestamp| TimedFrame {
                        seq,
                        frame,
                        timestamp,
                    })
                }
                Ok(None) => {
                    let acquired = counters.acquired.load(Ordering::Relaxed);
                    info!(topic = %topic, seq, acquired, "Source closed");
                    break Ok(());
                }
                Err(e) => Err(e),
            };

            match timed {
                Ok(timed) => {
                    trace!(
                        topic = %topic,
                        seq,
                        relative_time = timed.frame.relative_time,
                        "Frame acquired"
                    );
                    if tx.push(timed).await.is_err() {
                        debug!(topic = %topic, "Publishing stage gone, stopping acquisition");
                        break Ok(());
                    }
                }
                Err(e) if e.is_per_message() => {
                    counters.skipped.fetch_add(1, Ordering::Relaxed);
                    warn!(topic = %topic, seq, kind = e.kind(), "Skipping frame: {}", e);
                }
                Err(e) => {
                    error!(topic = %topic, seq, kind = e.kind(), "Frame source failed: {}", e);
                    cancel.cancel();
                    break Err(e);
                }
            }
        };

        // Releases the decode session on every exit path
        drop(source);
        debug!(topic = %topic, "Frame source released");
        outcome
    }

    /// Publishing task - encodes, tags and sends timestamped frames
    async fn publishing_task<E, T>(
        topic: Arc<str>,
        mut rx: QueueReceiver<TimedFrame>,
        encoder: E,
        publisher: FramePublisher<T>,
        counters: Arc<Counters>,
        cancel: CancellationToken,
    ) -> Result<()>
    where
        E: ImageEncoder,
        T: Transport + ?Sized,
    {
        loop {
            let timed = tokio::select! {
                _ = cancel.cancelled() => {
                    info!(topic = %topic, "Publishing cancelled");
                    break;
                }
                timed = rx.pop() => timed,
            };
            counters.dropped.store(rx.dropped(), Ordering::Relaxed);

            let Some(timed) = timed else {
                info!(topic = %topic, "Frame queue drained");
                break;
            };
            let seq = timed.seq;

            match Self::publish_frame(&encoder, &publisher, &timed.frame, timed.timestamp).await {
                Ok(receipt) => {
                    counters.published.fetch_add(1, Ordering::Relaxed);
                    trace!(topic = %topic, seq, tag = %receipt.tag, "Frame published");
                }
                Err(e) if e.is_per_message() => {
                    counters.skipped.fetch_add(1, Ordering::Relaxed);
                    warn!(
                        topic = %topic,
                        seq,
                        relative_time = timed.frame.relative_time,
                        kind = e.kind(),
                        "Dropping frame: {}",
                        e
                    );
                }
                Err(e) => {
                    error!(topic = %topic, seq, kind = e.kind(), "Publishing failed: {}", e);
                    cancel.cancel();
                    return Err(e);
                }
            }
        }

        let stats = counters.snapshot();
        info!(
            topic = %topic,
            published = stats.published,
            dropped = stats.dropped,
            skipped = stats.skipped,
            "Publishing task ended"
        );
        Ok(())
    }

    async fn publish_frame<E, T>(
        encoder: &E,
        publisher: &FramePublisher<T>,
        frame: &RawFrame,
        timestamp: DateTime<Utc>,
    ) -> Result<PublishReceipt>
    where
        E: ImageEncoder,
        T: Transport + ?Sized,
    {
        let image = encoder.encode(&frame.pixels)?;
        let message = FrameMessage::build(image, timestamp)?;
        publisher.publish(&message).await
    }
}

/// Frame with its absolute timestamp, as queued between the two tasks
#[derive(Debug, Clone)]
struct TimedFrame {
    seq: u64,
    frame: RawFrame,
    timestamp: DateTime<Utc>,
}
