//! JPEG image encoder backed by the `image` crate

use image::ExtendedColorType;
use image::codecs::jpeg;

use crate::provider::ImageEncoder;
use crate::types::PixelBuffer;
use crate::{FrameError, Result};

/// Quality used by [`JpegEncoder::default`]
pub const DEFAULT_QUALITY: u8 = 90;

/// Compresses decoded frames to baseline JPEG
///
/// Accepts the layouts decoders hand over: BGR24 (3 channels), BGRA (4
/// channels, alpha discarded) and 8-bit grayscale (1 channel).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JpegEncoder {
    quality: u8,
}

impl JpegEncoder {
    /// Create an encoder; `quality` is clamped to 1..=100.
    pub fn new(quality: u8) -> Self {
        Self { quality: quality.clamp(1, 100) }
    }

    pub fn quality(&self) -> u8 {
        self.quality
    }
}

impl Default for JpegEncoder {
    fn default() -> Self {
        Self::new(DEFAULT_QUALITY)
    }
}

impl ImageEncoder for JpegEncoder {
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

        let (samples, color) = match pixels.channels {
            1 => (pixels.data.to_vec(), ExtendedColorType::L8),
            3 | 4 => {
                let rgb = bgr_to_rgb(&pixels.data, usize::from(pixels.channels));
                (rgb, ExtendedColorType::Rgb8)
            }
            other => {
                return Err(FrameError::encode(format!(
                    "JPEG needs 1, 3 or 4 channels per pixel, got {other}"
                )));
            }
        };

        let mut out = Vec::with_capacity(samples.len() / 8);
        jpeg::JpegEncoder::new_with_quality(&mut out, self.quality)
            .encode(&samples, pixels.width, pixels.height, color)
            .map_err(|e| FrameError::encode(e.to_string()))?;
        Ok(out)
    }

    fn media_type(&self) -> &'static str {
        "image/jpeg"
    }
}

/// Reorder interleaved BGR or BGRA samples to packed RGB
fn bgr_to_rgb(data: &[u8], stride: usize) -> Vec<u8> {
    let mut rgb = Vec::with_capacity(data.len() / stride * 3);
    for pixel in data.chunks_exact(stride) {
        rgb.extend_from_slice(&[pixel[2], pixel[1], pixel[0]]);
    }
    rgb
}
