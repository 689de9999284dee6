//! Loopback demo: publish a synthetic stream as JPEG and verify it in-process
//!
//! ```sh
//! RUST_LOG=framewire=debug cargo run --example loopback -- [config.yaml]
//! ```

use anyhow::{Context, Result};
use framewire::providers::{JpegEncoder, ScriptedSource};
use framewire::{Driver, FramePublisher, FrameSubscriber, FramewireConfig, MemoryBus, StreamClock};
use futures::StreamExt;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

const FRAMES: usize = 90;
const FPS: f64 = 30.0;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = match std::env::args().nth(1) {
        Some(path) => FramewireConfig::from_path(&path)
            .with_context(|| format!("loading configuration from {path}"))?,
        None => FramewireConfig::default(),
    };

    let bus = Arc::new(MemoryBus::new());
    let (subscriber, mut frames) = FrameSubscriber::stream(&*bus, &config.subscriber)
        .context("declaring verified subscription")?;

    let consumer = tokio::spawn(async move {
        let mut count = 0usize;
        while let Some(frame) = frames.next().await {
            count += 1;
            info!(
                n = count,
                bytes = frame.image().len(),
                timestamp = %frame.timestamp(),
                "Verified frame"
            );
        }
        count
    });

    let publisher =
        FramePublisher::new(Arc::clone(&bus), config.publisher.topic.clone(), config.publisher.qos)
            .context("declaring publisher")?;
    let resolution = config.publisher.resolution;
    let source = ScriptedSource::test_pattern(
        FRAMES,
        config.publisher.start_offset_secs,
        FPS,
        resolution.width / 10,
        resolution.height / 10,
    )
    .with_fps(FPS);

    let encoder = JpegEncoder::default();
    let session = Driver::spawn(source, encoder, publisher, StreamClock::new(), &config.publisher);
    let published = session.join().await.context("publishing session failed")?;
    let verified = subscriber.stats();
    subscriber.unsubscribe();
    let received = consumer.await.context("consumer task")?;

    info!(?published, ?verified, received, "Loopback finished");
    Ok(())
}
