//! Collaborator traits for frame acquisition
//!
//! Stream resolution, container demuxing and image compression live outside
//! this crate. They are consumed through the narrow traits below.

use std::time::Duration;

use crate::types::{PixelBuffer, RawFrame, StreamFormat};
use crate::Result;

/// Source of decoded frames
///
/// A live source is unbounded: it only ends when the underlying stream closes.
/// A source is not restartable; reopen the stream to read it again. Dropping
/// the source must release the underlying decode session.
#[async_trait::async_trait]
pub trait FrameSource: Send + 'static {
    /// Get the next decoded frame
    ///
    /// Returns:
    /// - `Ok(Some(frame))` - New frame available
    /// - `Ok(None)` - Stream closed (normal termination)
    /// - `Err(e)` - A frame could not be decoded; the source may continue
    ///
    /// May wait on network data between frames.
    async fn next_frame(&mut self) -> Result<Option<RawFrame>>;
}

/// Compresses raw pixels into an image payload
///
/// Implementations are pure: the same pixels always encode the same way and
/// no state carries over between calls.
pub trait ImageEncoder: Send + Sync + 'static {
    fn encode(&self, pixels: &PixelBuffer) -> Result<Vec<u8>>;

    /// Media type of the encoded payload, for logging
    fn media_type(&self) -> &'static str;
}

/// Lists the formats a stream host offers for a source identifier
#[async_trait::async_trait]
pub trait StreamResolver: Send + Sync {
    async fn formats(&self, source_id: &str) -> Result<Vec<StreamFormat>>;
}

/// Opens a decode session on a chosen stream format
#[async_trait::async_trait]
pub trait SourceOpener: Send + Sync {
    type Source: FrameSource;

    /// Open `format`, positioned at `start_offset` into the stream.
    async fn open(&self, format: &StreamFormat, start_offset: Duration) -> Result<Self::Source>;
}

#[async_trait::async_trait]
impl<S: FrameSource + ?Sized> FrameSource for Box<S> {
    async fn next_frame(&mut self) -> Result<Option<RawFrame>> {
        (**self).next_frame().await
    }
}
