//! Timestamped, integrity-tagged video frames over publish/subscribe.
//!
//! Framewire pulls decoded frames from a video source, converts each frame's
//! stream-relative time into an absolute UTC timestamp, and publishes the
//! encoded image with a SHA-256 tag of the exact bytes sent. Subscribers
//! recompute the tag and only decode messages that match.
//!
//! # Features
//!
//! - **Stable timestamps**: one wall-clock anchor per session, no drift
//! - **Integrity**: every payload travels with its digest as attachment
//! - **Non-blocking acquisition**: a bounded queue decouples decode from send
//! - **Pluggable collaborators**: sources, encoders and transports are traits
//!
//! # Example (loopback)
//!
//! ```rust,no_run
//! use framewire::providers::{RawPixelEncoder, ScriptedSource};
//! use framewire::{Driver, FramePublisher, FrameSubscriber, MemoryBus, StreamClock};
//! use framewire::config::{PublisherConfig, SubscriberConfig};
//! use futures::StreamExt;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let bus = Arc::new(MemoryBus::new());
//!     let subscriber_config = SubscriberConfig::default();
//!     let (subscriber, mut frames) = FrameSubscriber::stream(&*bus, &subscriber_config)?;
//!
//!     let config = PublisherConfig::default();
//!     let publisher = FramePublisher::new(Arc::clone(&bus), config.topic.clone(), config.qos)?;
//!     let source = ScriptedSource::test_pattern(10, 180.0, 30.0, 64, 36);
//!     let stats = Driver::spawn(source, RawPixelEncoder, publisher, StreamClock::new(), &config)
//!         .join()
//!         .await?;
//!     println!("published {} frames", stats.published);
//!
//!     // Stream ends once the subscription is gone
//!     subscriber.unsubscribe();
//!     while let Some(frame) = frames.next().await {
//!         println!("{} bytes at {}", frame.image().len(), frame.timestamp());
//!     }
//!     Ok(())
//! }
//! ```

// Core types and error handling
mod error;
#[cfg(any(test, feature = "benchmark"))]
pub mod test_utils;
pub mod types;

// Message pipeline
pub mod clock;
pub mod codec;
pub mod config;
pub mod integrity;
pub mod publisher;
pub mod subscriber;
pub mod verifier;

// Session orchestration
pub mod driver;
pub mod provider;
pub mod providers;
pub mod stream;
pub mod transport;

// Core exports
pub use error::*;
pub use types::*;

pub use clock::{ClockAnchor, StreamClock};
pub use config::{FramewireConfig, PublisherConfig, SubscriberConfig};
pub use driver::{Driver, PublisherStats, PublishingSession};
pub use integrity::IntegrityTag;
pub use provider::{FrameSource, ImageEncoder, SourceOpener, StreamResolver};
pub use publisher::{FramePublisher, PublishReceipt};
pub use subscriber::FrameSubscriber;
pub use transport::{MemoryBus, Sample, Subscription, Transport, TransportCapabilities};
pub use verifier::{Verdict, VerificationState, Verifier, VerifierStats};
