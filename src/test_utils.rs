//! Test utilities for building frames, messages and tagged payloads
//!
//! Shared by unit tests and benchmarks so fixtures stay identical across both.

#![cfg(any(test, feature = "benchmark"))]

use chrono::{DateTime, TimeDelta, TimeZone, Utc};
use std::io;
use std::sync::{Arc, Mutex};
use tracing::subscriber::DefaultGuard;

use crate::clock::StreamClock;
use crate::codec;
use crate::integrity::IntegrityTag;
use crate::types::{FrameMessage, PixelBuffer, RawFrame};

/// Wall-clock start used by fixtures: 2024-01-01T00:00:00Z
pub fn fixture_wall_start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).single().unwrap_or_default()
}

/// Clock anchored at [`fixture_wall_start`] for relative time `stream_time`.
pub fn anchored_clock(stream_time: f64) -> StreamClock {
    let mut clock = StreamClock::new();
    if let Err(e) = clock.anchor_at(fixture_wall_start(), stream_time) {
        panic!("fixture clock failed to anchor: {e}");
    }
    clock
}

/// RGB frame of `width` x `height` with every byte set to `fill`.
pub fn solid_frame(relative_time: f64, width: u32, height: u32, fill: u8) -> RawFrame {
    let len = width as usize * height as usize * 3;
    RawFrame::new(relative_time, PixelBuffer::new(vec![fill; len], width, height, 3))
}

/// Message with an `image_len` byte image, `offset_ms` after the fixture start.
pub fn sample_message(image_len: usize, offset_ms: i64) -> FrameMessage {
    let image: Vec<u8> = (0..image_len.max(1)).map(|i| (i % 251) as u8).collect();
    let timestamp = fixture_wall_start() + TimeDelta::milliseconds(offset_ms);
    match FrameMessage::build(image, timestamp) {
        Ok(message) => message,
        Err(e) => panic!("fixture message is invalid: {e}"),
    }
}

/// Serialized payload plus its attachment, as a publisher would send them.
pub fn tagged_payload(message: &FrameMessage) -> (Vec<u8>, Vec<u8>) {
    let payload = match codec::serialize(message) {
        Ok(payload) => payload,
        Err(e) => panic!("fixture message failed to serialize: {e}"),
    };
    let attachment = IntegrityTag::compute(&payload).to_attachment();
    (payload, attachment)
}

/// In-memory sink for formatted log output
#[derive(Debug, Clone, Default)]
pub struct LogCapture {
    buffer: Arc<Mutex<Vec<u8>>>,
}

impl LogCapture {
    /// Captured output, one entry per log line
    pub fn lines(&self) -> Vec<String> {
        let buffer = self.buffer.lock().unwrap_or_else(|e| e.into_inner());
        String::from_utf8_lossy(&buffer).lines().map(str::to_owned).collect()
    }
}

impl io::Write for LogCapture {
    fn write(&mut self, bytes: &[u8]) -> io::Result<usize> {
        self.buffer.lock().unwrap_or_else(|e| e.into_inner()).extend_from_slice(bytes);
        Ok(bytes.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Capture every event on the current thread until the guard is dropped.
///
/// With the current-thread test runtime this includes spawned tasks.
pub fn capture_logs() -> (DefaultGuard, LogCapture) {
    let capture = LogCapture::default();
    let writer = capture.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::TRACE)
        .with_ansi(false)
        .with_writer(move || writer.clone())
        .finish();
    (tracing::subscriber::set_default(subscriber), capture)
}
