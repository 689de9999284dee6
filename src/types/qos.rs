//! Transport delivery hints for published frames

use serde::{Deserialize, Serialize};

/// Delivery priority requested from the transport
///
/// Ordered from most to least urgent. Live video frames default to
/// [`Priority::RealTime`].
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    #[default]
    RealTime,
    InteractiveHigh,
    InteractiveLow,
    DataHigh,
    Data,
    DataLow,
    Background,
}

impl Priority {
    /// Numeric level, 1 (most urgent) through 7
    pub fn level(self) -> u8 {
        match self {
            Priority::RealTime => 1,
            Priority::InteractiveHigh => 2,
            Priority::InteractiveLow => 3,
            Priority::DataHigh => 4,
            Priority::Data => 5,
            Priority::DataLow => 6,
            Priority::Background => 7,
        }
    }
}

/// Quality-of-service hints passed with every publish call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Qos {
    /// Delivery priority
    pub priority: Priority,

    /// Skip transport-side batching for lower latency
    pub express: bool,
}

impl Default for Qos {
    fn default() -> Self {
        Self { priority: Priority::RealTime, express: true }
    }
}
