//! Identity image encoder

use crate::provider::ImageEncoder;
use crate::types::PixelBuffer;
use crate::{FrameError, Result};

/// Passes pixel bytes through unchanged
///
/// Useful when subscribers want raw frames, and for exercising the pipeline
/// without an image codec.
#[derive(Debug, Clone, Copy, Default)]
pub struct RawPixelEncoder;

impl ImageEncoder for RawPixelEncoder {
    fn encode(&self, pixels: &PixelBuffer) -> Result<Vec<u8>> {
        if !pixels.is_consistent() {
            return Err(FrameError::decode(format!(
                "pixel buffer holds {} bytes, {}x{}x{} needs {}",
                pixels.data.len(),
                pixels.width,
                pixels.height,
                pixels.channels,
                pixels.expected_len()
            )));
        }
        Ok(pixels.data.to_vec())
    }

    fn media_type(&self) -> &'static str {
        "application/octet-stream"
    }
}
