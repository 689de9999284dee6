//! The frame message published on the bus

use chrono::{DateTime, Utc};
use std::sync::Arc;

use crate::{FrameError, Result};

/// An encoded image stamped with its absolute capture time
///
/// Immutable once built. The publisher consumes one per decoded frame; the
/// subscriber reconstructs a fresh value from the wire bytes rather than
/// mutating anything.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameMessage {
    image: Arc<[u8]>,
    timestamp: DateTime<Utc>,
}

impl FrameMessage {
    /// Build a frame message.
    ///
    /// # Errors
    ///
    /// Returns [`FrameError::InvalidFrame`] if `image` is empty, or if the
    /// timestamp cannot be expressed as nanoseconds since the Unix epoch
    /// (roughly years 1677 to 2262), which the wire format requires.
    pub fn build(image: impl Into<Arc<[u8]>>, timestamp: DateTime<Utc>) -> Result<Self> {
        let image = image.into();
        if image.is_empty() {
            return Err(FrameError::invalid_frame("image payload is empty"));
        }
        if timestamp.timestamp_nanos_opt().is_none() {
            return Err(FrameError::invalid_frame(format!(
                "timestamp {} is outside the nanosecond epoch range",
                timestamp
            )));
        }
        Ok(Self { image, timestamp })
    }

    /// Encoded image bytes
    pub fn image(&self) -> &[u8] {
        &self.image
    }

    /// Shared handle to the image bytes
    pub fn image_arc(&self) -> Arc<[u8]> {
        Arc::clone(&self.image)
    }

    /// Absolute capture time
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Capture time as nanoseconds since the Unix epoch.
    pub fn timestamp_nanos(&self) -> i64 {
        // Range checked in build()
        self.timestamp.timestamp_nanos_opt().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::fixture_wall_start;
    use chrono::TimeZone;

    #[test]
    fn build_rejects_empty_image() {
        let err = FrameMessage::build(Vec::new(), fixture_wall_start()).unwrap_err();
        assert!(matches!(err, FrameError::InvalidFrame { .. }));
    }

    #[test]
    fn build_rejects_out_of_range_timestamp() {
        let ts = Utc.with_ymd_and_hms(2300, 1, 1, 0, 0, 0).unwrap();
        let err = FrameMessage::build(vec![1, 2, 3], ts).unwrap_err();
        assert!(matches!(err, FrameError::InvalidFrame { .. }));
    }

    #[test]
    fn accessors_return_built_values() {
        let ts = fixture_wall_start();
        let msg = FrameMessage::build(vec![0xFF, 0xD8], ts).unwrap();
        assert_eq!(msg.image(), &[0xFF, 0xD8]);
        assert_eq!(msg.timestamp(), ts);
        assert_eq!(msg.timestamp_nanos(), 1_704_067_200_000_000_000);
    }
}
