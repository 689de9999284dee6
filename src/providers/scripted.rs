//! Scripted frame source for replays and tests

use std::collections::VecDeque;
use tokio::time::{Duration, Interval, MissedTickBehavior, interval};
use tracing::{debug, trace};

use crate::provider::FrameSource;
use crate::types::{PixelBuffer, RawFrame};
use crate::{FrameError, Result};

/// Finite frame source that replays a prepared sequence
///
/// Each entry is either a frame or a decode failure, so the skip-and-continue
/// behavior of the publishing loop can be exercised without a real decoder.
pub struct ScriptedSource {
    /// Remaining entries
    entries: VecDeque<Result<RawFrame>>,

    /// Optional frame pacing
    pacing: Option<Interval>,

    /// Entries handed out so far
    position: usize,
}

impl ScriptedSource {
    /// Create a source that yields `frames` as fast as they are pulled
    pub fn new(frames: impl IntoIterator<Item = RawFrame>) -> Self {
        Self { entries: frames.into_iter().map(Ok).collect(), pacing: None, position: 0 }
    }

    /// Create a source from frames and decode failures in order
    pub fn from_entries(entries: impl IntoIterator<Item = Result<RawFrame>>) -> Self {
        Self { entries: entries.into_iter().collect(), pacing: None, position: 0 }
    }

    /// Pace output at `fps` frames per second
    pub fn with_fps(mut self, fps: f64) -> Self {
        let fps = fps.clamp(0.1, 1000.0);
        let mut pacing = interval(Duration::from_secs_f64(1.0 / fps));
        pacing.set_missed_tick_behavior(MissedTickBehavior::Delay);
        self.pacing = Some(pacing);
        self
    }

    /// Append a decode failure
    pub fn push_decode_error(&mut self, details: impl Into<String>) {
        self.entries.push_back(Err(FrameError::decode(details)));
    }

    /// Append a frame
    pub fn push_frame(&mut self, frame: RawFrame) {
        self.entries.push_back(Ok(frame));
    }

    /// Entries not yet handed out
    pub fn remaining(&self) -> usize {
        self.entries.len()
    }

    /// Synthetic test pattern: `count` solid frames at `fps`, starting at `start`
    ///
    /// Frame `i` has relative time `start + i / fps` and every pixel set to `i`.
    pub fn test_pattern(count: usize, start: f64, fps: f64, width: u32, height: u32) -> Self {
        let frames = (0..count).map(|i| {
            let len = width as usize * height as usize * 3;
            let pixels = PixelBuffer::new(vec![i as u8; len], width, height, 3);
            RawFrame::new(start + i as f64 / fps, pixels)
        });
        Self::new(frames)
    }
}

#[async_trait::async_trait]
impl FrameSource for ScriptedSource {
    async fn next_frame(&mut self) -> Result<Option<RawFrame>> {
        let Some(entry) = self.entries.pop_front() else {
            debug!("Scripted source exhausted after {} entries", self.position);
            return Ok(None);
        };

        if let Some(pacing) = self.pacing.as_mut() {
            pacing.tick().await;
        }

        self.position += 1;
        trace!("Scripted entry {} ({} remaining)", self.position, self.entries.len());
        entry.map(Some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn yields_entries_in_order_then_ends() {
        let mut source = ScriptedSource::test_pattern(2, 10.0, 2.0, 2, 2);
        source.push_decode_error("corrupt slice");

        let first = source.next_frame().await.unwrap().unwrap();
        assert_eq!(first.relative_time, 10.0);
        let second = source.next_frame().await.unwrap().unwrap();
        assert_eq!(second.relative_time, 10.5);
        assert_eq!(second.pixels.data[0], 1);

        assert!(matches!(source.next_frame().await, Err(FrameError::Decode { .. })));
        assert!(source.next_frame().await.unwrap().is_none());
        assert!(source.next_frame().await.unwrap().is_none());
    }
}
