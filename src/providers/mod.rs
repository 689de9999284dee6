//! Built-in frame sources and encoders

pub mod jpeg;
pub mod raw;
pub mod scripted;

pub use jpeg::JpegEncoder;
pub use raw::RawPixelEncoder;
pub use scripted::ScriptedSource;
