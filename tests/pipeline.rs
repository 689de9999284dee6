//! End-to-end publishing and verified subscription over the in-memory bus.

use chrono::{DateTime, TimeDelta, TimeZone, Utc};
use framewire::config::{PublisherConfig, SubscriberConfig};
use framewire::providers::{JpegEncoder, RawPixelEncoder, ScriptedSource};
use framewire::stream::BackpressurePolicy;
use framewire::transport::SampleCallback;
use framewire::{
    Driver, FrameError, FrameMessage, FramePublisher, FrameSubscriber, MemoryBus, PixelBuffer, Qos,
    RawFrame, Result, SourceOpener, StreamClock, StreamFormat, StreamResolver, Subscription,
    Transport, TransportCapabilities,
};
use futures::StreamExt;
use std::sync::Arc;
use std::time::Duration;

fn wall_start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
}

fn publisher_config(topic: &str) -> PublisherConfig {
    PublisherConfig {
        topic: topic.to_string(),
        backpressure: BackpressurePolicy::Block,
        ..PublisherConfig::default()
    }
}

fn subscriber_config(topic: &str) -> SubscriberConfig {
    SubscriberConfig { topic: topic.to_string(), ..SubscriberConfig::default() }
}

fn frame(relative_time: f64, fill: u8) -> RawFrame {
    RawFrame::new(relative_time, PixelBuffer::new(vec![fill; 4 * 4 * 3], 4, 4, 3))
}

#[tokio::test]
async fn three_frames_arrive_with_anchored_timestamps() {
    let bus = Arc::new(MemoryBus::new());
    let (subscriber, frames) = FrameSubscriber::stream(&*bus, &subscriber_config("topic")).unwrap();

    let config = publisher_config("topic");
    let publisher =
        FramePublisher::new(Arc::clone(&bus), config.topic.clone(), config.qos).unwrap();
    let mut clock = StreamClock::new();
    clock.anchor_at(wall_start(), 0.0).unwrap();

    let source = ScriptedSource::new([frame(0.0, 10), frame(1.0, 11), frame(2.0, 12)]);
    let stats = Driver::spawn(source, RawPixelEncoder, publisher, clock, &config)
        .join()
        .await
        .unwrap();
    assert_eq!(stats.published, 3);
    assert_eq!(stats.skipped, 0);

    let verified = subscriber.stats();
    assert_eq!(verified.received, 3);
    assert_eq!(verified.decoded, 3);
    assert_eq!(verified.mismatched, 0);

    subscriber.unsubscribe();
    let received: Vec<FrameMessage> = frames.collect().await;
    let timestamps: Vec<String> = received.iter().map(|m| m.timestamp().to_rfc3339()).collect();
    assert_eq!(
        timestamps,
        vec!["2024-01-01T00:00:00+00:00", "2024-01-01T00:00:01+00:00", "2024-01-01T00:00:02+00:00"]
    );
    assert_eq!(received[1].image(), &[11; 48][..]);
}

#[tokio::test]
async fn clock_anchors_on_first_frame_when_not_preset() {
    let bus = Arc::new(MemoryBus::new());
    let (subscriber, frames) = FrameSubscriber::stream(&*bus, &subscriber_config("topic")).unwrap();
    let config = publisher_config("topic");
    let publisher = FramePublisher::new(Arc::clone(&bus), "topic", Qos::default()).unwrap();

    let before = Utc::now();
    let source = ScriptedSource::new([frame(180.0, 1), frame(180.2, 2)]);
    Driver::spawn(source, RawPixelEncoder, publisher, StreamClock::new(), &config)
        .join()
        .await
        .unwrap();
    let after = Utc::now();

    subscriber.unsubscribe();
    let received: Vec<FrameMessage> = frames.collect().await;
    assert_eq!(received.len(), 2);
    let first = received[0].timestamp();
    assert!(first >= before && first <= after);
    assert_eq!(received[1].timestamp() - first, TimeDelta::milliseconds(200));
}

#[tokio::test]
async fn decode_errors_do_not_stop_the_stream() {
    let bus = Arc::new(MemoryBus::new());
    let config = publisher_config("topic");
    let publisher = FramePublisher::new(Arc::clone(&bus), "topic", Qos::default()).unwrap();

    let mut source = ScriptedSource::new([frame(0.0, 1)]);
    source.push_decode_error("missing reference frame");
    source.push_decode_error("corrupt macroblock");
    source.push_frame(frame(0.1, 2));

    let stats = Driver::spawn(source, RawPixelEncoder, publisher, StreamClock::new(), &config)
        .join()
        .await
        .unwrap();

    assert_eq!(stats.acquired, 2);
    assert_eq!(stats.skipped, 2);
    assert_eq!(stats.published, 2);
    assert_eq!(bus.published(), 2);
}

#[tokio::test]
async fn jpeg_frames_survive_verification() {
    let bus = Arc::new(MemoryBus::new());
    let (subscriber, frames) = FrameSubscriber::stream(&*bus, &subscriber_config("topic")).unwrap();
    let config = publisher_config("topic");
    let publisher = FramePublisher::new(Arc::clone(&bus), "topic", Qos::default()).unwrap();

    let source = ScriptedSource::test_pattern(3, 0.0, 30.0, 32, 24);
    let encoder = JpegEncoder::default();
    let stats = Driver::spawn(source, encoder, publisher, StreamClock::new(), &config)
        .join()
        .await
        .unwrap();
    assert_eq!(stats.published, 3);

    subscriber.unsubscribe();
    let received: Vec<FrameMessage> = frames.collect().await;
    assert_eq!(received.len(), 3);
    for message in &received {
        let image = image::load_from_memory(message.image()).unwrap();
        assert_eq!((image.width(), image.height()), (32, 24));
    }
}

#[tokio::test]
async fn subscribers_on_other_topics_see_nothing() {
    let bus = Arc::new(MemoryBus::new());
    let (other, _frames) = FrameSubscriber::stream(&*bus, &subscriber_config("elsewhere")).unwrap();
    let config = publisher_config("topic");
    let publisher = FramePublisher::new(Arc::clone(&bus), "topic", Qos::default()).unwrap();

    let source = ScriptedSource::test_pattern(4, 0.0, 25.0, 2, 2);
    Driver::spawn(source, RawPixelEncoder, publisher, StreamClock::new(), &config)
        .join()
        .await
        .unwrap();

    assert_eq!(bus.published(), 4);
    assert_eq!(other.stats().received, 0);
}

/// Transport that flips one payload bit in transit
struct BitFlipBus {
    inner: MemoryBus,
}

#[async_trait::async_trait]
impl Transport for BitFlipBus {
    fn capabilities(&self) -> TransportCapabilities {
        self.inner.capabilities()
    }

    async fn publish(
        &self,
        topic: &str,
        mut payload: Vec<u8>,
        attachment: Vec<u8>,
        qos: Qos,
    ) -> Result<()> {
        if let Some(last) = payload.last_mut() {
            *last ^= 0x01;
        }
        self.inner.publish(topic, payload, attachment, qos).await
    }

    fn subscribe(&self, topic: &str, callback: SampleCallback) -> Result<Subscription> {
        self.inner.subscribe(topic, callback)
    }
}

#[tokio::test]
async fn tampered_payloads_are_rejected_and_fault_the_subscription() {
    let bus = Arc::new(BitFlipBus { inner: MemoryBus::new() });
    let sub_config =
        SubscriberConfig { max_consecutive_mismatches: 3, ..subscriber_config("topic") };
    let (subscriber, frames) = FrameSubscriber::stream(&*bus, &sub_config).unwrap();

    let config = publisher_config("topic");
    let publisher = FramePublisher::new(Arc::clone(&bus), "topic", Qos::default()).unwrap();
    let source = ScriptedSource::test_pattern(3, 0.0, 30.0, 2, 2);
    let stats = Driver::spawn(source, RawPixelEncoder, publisher, StreamClock::new(), &config)
        .join()
        .await
        .unwrap();
    assert_eq!(stats.published, 3);

    let verified = subscriber.stats();
    assert_eq!(verified.mismatched, 3);
    assert_eq!(verified.decoded, 0);
    tokio::time::timeout(Duration::from_secs(1), subscriber.faulted())
        .await
        .expect("subscription should fault after persistent mismatches");

    subscriber.unsubscribe();
    assert_eq!(frames.count().await, 0);
}

struct Catalog(Vec<StreamFormat>);

#[async_trait::async_trait]
impl StreamResolver for Catalog {
    async fn formats(&self, _source_id: &str) -> Result<Vec<StreamFormat>> {
        Ok(self.0.clone())
    }
}

struct PatternOpener;

#[async_trait::async_trait]
impl SourceOpener for PatternOpener {
    type Source = ScriptedSource;

    async fn open(&self, format: &StreamFormat, start_offset: Duration) -> Result<ScriptedSource> {
        let height = format.height.unwrap_or(1);
        Ok(ScriptedSource::test_pattern(5, start_offset.as_secs_f64(), 30.0, 2, height))
    }
}

fn format(id: &str, height: Option<u32>, has_video: bool) -> StreamFormat {
    StreamFormat { id: id.into(), url: format!("https://cdn.example/{id}"), height, has_video }
}

#[tokio::test]
async fn start_picks_closest_format_and_publishes() {
    let catalog = Catalog(vec![
        format("audio", None, false),
        format("1440p", Some(1440), true),
        format("720p", Some(720), true),
        format("480p", Some(480), true),
    ]);
    let bus = Arc::new(MemoryBus::new());
    let (subscriber, frames) = FrameSubscriber::stream(&*bus, &subscriber_config("topic")).unwrap();

    let session = Driver::start(
        &catalog,
        &PatternOpener,
        "faUNhaRLpMc",
        RawPixelEncoder,
        Arc::clone(&bus),
        &publisher_config("topic"),
    )
    .await
    .unwrap();
    let stats = session.join().await.unwrap();
    assert_eq!(stats.published, 5);

    subscriber.unsubscribe();
    let received: Vec<FrameMessage> = frames.collect().await;
    // No 1080p offered; first format below it in host order is 720p: 2 x 720 x 3 bytes per image
    assert_eq!(received.len(), 5);
    assert!(received.iter().all(|m| m.image().len() == 2 * 720 * 3));
}

#[tokio::test]
async fn start_without_video_formats_is_stream_unavailable() {
    let catalog = Catalog(vec![format("audio", None, false), format("4k", Some(2160), true)]);
    let result = Driver::start(
        &catalog,
        &PatternOpener,
        "faUNhaRLpMc",
        RawPixelEncoder,
        Arc::new(MemoryBus::new()),
        &publisher_config("topic"),
    )
    .await;

    match result {
        Err(FrameError::StreamUnavailable { .. }) => {}
        Err(other) => panic!("expected StreamUnavailable, got {other:?}"),
        Ok(_) => panic!("expected StreamUnavailable, got a running session"),
    }
}

#[tokio::test]
async fn invalid_config_is_rejected_before_resolving() {
    let catalog = Catalog(vec![format("720p", Some(720), true)]);
    let config = PublisherConfig { queue_capacity: 0, ..publisher_config("topic") };
    let result = Driver::start(
        &catalog,
        &PatternOpener,
        "faUNhaRLpMc",
        RawPixelEncoder,
        Arc::new(MemoryBus::new()),
        &config,
    )
    .await;

    assert!(matches!(result, Err(FrameError::Config { .. })));
}
