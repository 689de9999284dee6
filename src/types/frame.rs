//! Decoded frame types handed over by frame sources

use std::sync::Arc;

/// Raw pixel data of one decoded frame
///
/// Pixels are packed row-major with `channels` interleaved bytes per pixel
/// (3 for BGR24, the layout most decoders emit).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelBuffer {
    /// Pixel bytes (zero-copy via Arc)
    pub data: Arc<[u8]>,

    /// Width in pixels
    pub width: u32,

    /// Height in pixels
    pub height: u32,

    /// Bytes per pixel
    pub channels: u8,
}

impl PixelBuffer {
    /// Create a new pixel buffer
    pub fn new(data: Vec<u8>, width: u32, height: u32, channels: u8) -> Self {
        Self { data: data.into(), width, height, channels }
    }

    /// Number of bytes a buffer with these dimensions must hold
    pub fn expected_len(&self) -> usize {
        self.width as usize * self.height as usize * self.channels as usize
    }

    /// Whether the data length agrees with the declared dimensions
    pub fn is_consistent(&self) -> bool {
        !self.data.is_empty() && self.data.len() == self.expected_len()
    }
}

/// One decoded frame as produced by a [`FrameSource`](crate::FrameSource)
///
/// This is the fundamental unit that flows from acquisition into the
/// publishing stage.
#[derive(Debug, Clone, PartialEq)]
pub struct RawFrame {
    /// Seconds since the media stream began (presentation time)
    pub relative_time: f64,

    /// Decoded pixels
    pub pixels: PixelBuffer,
}

impl RawFrame {
    /// Create a new raw frame
    pub fn new(relative_time: f64, pixels: PixelBuffer) -> Self {
        Self { relative_time, pixels }
    }
}
