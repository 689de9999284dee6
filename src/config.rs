//! Runtime configuration
//!
//! Everything tunable that is not core logic: topic names, QoS hints, target
//! resolution, where in the stream to start, queue sizing and the mismatch
//! escalation threshold. Loaded from YAML or built in code; every field has a
//! default so partial files work.
//!
//! ```yaml
//! publisher:
//!   topic: camera/front
//!   qos:
//!     priority: real_time
//!     express: true
//!   resolution: 1280x720
//!   start_offset_secs: 180.0
//!   queue_capacity: 32
//!   backpressure: drop_oldest
//! subscriber:
//!   topic: camera/front
//!   max_consecutive_mismatches: 5
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::debug;

use crate::stream::BackpressurePolicy;
use crate::types::{Qos, Resolution};
use crate::{FrameError, Result};

/// Default topic for frame messages
pub const DEFAULT_TOPIC: &str = "topic";

/// Top-level configuration file
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FramewireConfig {
    pub publisher: PublisherConfig,
    pub subscriber: SubscriberConfig,
}

impl FramewireConfig {
    /// Parse and validate YAML configuration
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: Self = serde_yaml_ng::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a YAML configuration file
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let yaml = std::fs::read_to_string(path)
            .map_err(|e| FrameError::io_error(path.to_path_buf(), e))?;
        debug!("Loaded configuration from {}", path.display());
        Self::from_yaml_str(&yaml)
    }

    pub fn validate(&self) -> Result<()> {
        self.publisher.validate()?;
        self.subscriber.validate()
    }
}

/// Publishing session settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PublisherConfig {
    /// Topic frames are published on
    pub topic: String,

    /// Delivery hints for every publish
    pub qos: Qos,

    /// Preferred stream resolution
    pub resolution: Resolution,

    /// Seconds into the source stream to start reading
    pub start_offset_secs: f64,

    /// Frames buffered between acquisition and publishing
    pub queue_capacity: usize,

    /// What acquisition does when the queue is full
    pub backpressure: BackpressurePolicy,
}

impl Default for PublisherConfig {
    fn default() -> Self {
        Self {
            topic: DEFAULT_TOPIC.to_string(),
            qos: Qos::default(),
            resolution: Resolution::FULL_HD,
            start_offset_secs: 180.0,
            queue_capacity: 32,
            backpressure: BackpressurePolicy::DropOldest,
        }
    }
}

impl PublisherConfig {
    /// Start offset as a duration
    pub fn start_offset(&self) -> Duration {
        Duration::from_secs_f64(self.start_offset_secs.max(0.0))
    }

    pub fn validate(&self) -> Result<()> {
        validate_topic(&self.topic)?;
        if !self.start_offset_secs.is_finite() || self.start_offset_secs < 0.0 {
            return Err(FrameError::config(format!(
                "start_offset_secs must be a non-negative number, got {}",
                self.start_offset_secs
            )));
        }
        if self.queue_capacity == 0 {
            return Err(FrameError::config("queue_capacity must be at least 1"));
        }
        Ok(())
    }
}

/// Verified subscription settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SubscriberConfig {
    /// Topic to subscribe to
    pub topic: String,

    /// Consecutive mismatches before the subscription faults (0 = never)
    pub max_consecutive_mismatches: u32,

    /// Buffered messages when consuming as a stream
    pub channel_capacity: usize,
}

impl Default for SubscriberConfig {
    fn default() -> Self {
        Self {
            topic: DEFAULT_TOPIC.to_string(),
            max_consecutive_mismatches: 5,
            channel_capacity: 64,
        }
    }
}

impl SubscriberConfig {
    pub fn validate(&self) -> Result<()> {
        validate_topic(&self.topic)?;
        if self.channel_capacity == 0 {
            return Err(FrameError::config("channel_capacity must be at least 1"));
        }
        Ok(())
    }
}

fn validate_topic(topic: &str) -> Result<()> {
    if topic.trim().is_empty() {
        return Err(FrameError::config("topic must not be empty"));
    }
    Ok(())
}
