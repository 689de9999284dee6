//! Core data types for frame publishing.
//!
//! - [`RawFrame`] / [`PixelBuffer`] are what a frame source hands over
//! - [`FrameMessage`] is the immutable image + absolute timestamp unit put on the bus
//! - [`Qos`] / [`Priority`] are transport delivery hints
//! - [`Resolution`] / [`StreamFormat`] drive stream format selection at startup

mod format;
mod frame;
mod message;
mod qos;

pub use format::{Resolution, StreamFormat, select_format};
pub use frame::{PixelBuffer, RawFrame};
pub use message::FrameMessage;
pub use qos::{Priority, Qos};
