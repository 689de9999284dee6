//! Error types for frame publishing and verification.
//!
//! Errors fall into two classes:
//!
//! - **Startup errors** abort a publishing or subscribing run: no usable stream
//!   format, a clock used before anchoring, a transport that cannot deliver
//!   payload and attachment together, or unreadable configuration.
//! - **Per-message errors** are contained to a single frame: a malformed frame
//!   from the source, a schema violation, or an integrity tag mismatch. These
//!   are logged and the message is dropped; the stream keeps running.
//!
//! ```rust
//! use framewire::FrameError;
//!
//! let error = FrameError::hash_mismatch("abc", "def");
//! assert!(error.is_per_message());
//! for suggestion in error.recovery_suggestions() {
//!     println!("  - {}", suggestion);
//! }
//! ```

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for framewire operations.
pub type Result<T, E = FrameError> = std::result::Result<T, E>;

/// Main error type for frame publishing and verification.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum FrameError {
    #[error("No acceptable stream format: {reason}")]
    StreamUnavailable { reason: String },

    #[error("Frame decode failed: {details}")]
    Decode { details: String },

    #[error("Image encode failed: {details}")]
    Encode { details: String },

    #[error("Stream clock queried before it was anchored")]
    NotAnchored,

    #[error("Stream clock already anchored at relative time {anchor_stream_time}s")]
    AlreadyAnchored { anchor_stream_time: f64 },

    #[error("Invalid frame: {reason}")]
    InvalidFrame { reason: String },

    #[error("Malformed message at byte {offset}: {details}")]
    MalformedMessage { offset: usize, details: String },

    #[error("Malformed integrity attachment: {details}")]
    MalformedAttachment { details: String },

    #[error("Integrity tag mismatch: computed {computed}, carried {carried}")]
    HashMismatch { computed: String, carried: String },

    #[error("{consecutive} consecutive integrity mismatches on '{topic}'")]
    PersistentMismatch { topic: String, consecutive: u32 },

    #[error("Transport cannot be used: {requirement}")]
    TransportCapability { requirement: String },

    #[error("Transport error on '{topic}': {reason}")]
    Transport {
        topic: String,
        reason: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Pipeline task failed: {details}")]
    Worker { details: String },

    #[error("Configuration error: {details}")]
    Config { details: String },

    #[error("I/O error: {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl FrameError {
    /// Returns whether this error is contained to a single message.
    ///
    /// Per-message errors drop the offending frame and let the stream continue.
    /// Everything else ends the run.
    pub fn is_per_message(&self) -> bool {
        match self {
            FrameError::Decode { .. } => true,
            FrameError::Encode { .. } => true,
            FrameError::InvalidFrame { .. } => true,
            FrameError::MalformedMessage { .. } => true,
            FrameError::MalformedAttachment { .. } => true,
            FrameError::HashMismatch { .. } => true,
            FrameError::Transport { .. } => true,
            FrameError::StreamUnavailable { .. } => false,
            FrameError::NotAnchored => false,
            FrameError::AlreadyAnchored { .. } => false,
            FrameError::PersistentMismatch { .. } => false,
            FrameError::TransportCapability { .. } => false,
            FrameError::Worker { .. } => false,
            FrameError::Config { .. } => false,
            FrameError::Io { .. } => false,
        }
    }

    /// Short, stable name for the error kind, used as a structured log field.
    pub fn kind(&self) -> &'static str {
        match self {
            FrameError::StreamUnavailable { .. } => "stream_unavailable",
            FrameError::Decode { .. } => "decode",
            FrameError::Encode { .. } => "encode",
            FrameError::NotAnchored => "not_anchored",
            FrameError::AlreadyAnchored { .. } => "already_anchored",
            FrameError::InvalidFrame { .. } => "invalid_frame",
            FrameError::MalformedMessage { .. } => "malformed_message",
            FrameError::MalformedAttachment { .. } => "malformed_attachment",
            FrameError::HashMismatch { .. } => "hash_mismatch",
            FrameError::PersistentMismatch { .. } => "persistent_mismatch",
            FrameError::TransportCapability { .. } => "transport_capability",
            FrameError::Transport { .. } => "transport",
            FrameError::Worker { .. } => "worker",
            FrameError::Config { .. } => "config",
            FrameError::Io { .. } => "io",
        }
    }

    /// Returns suggested recovery actions for this error.
    pub fn recovery_suggestions(&self) -> Vec<&'static str> {
        match self {
            FrameError::StreamUnavailable { .. } => vec![
                "Lower the target resolution",
                "Check that the source identifier points at a live video",
                "Verify network access to the stream host",
            ],
            FrameError::Decode { .. } => vec![
                "Transient source glitches are skipped automatically",
                "Reopen the stream if decode errors persist",
            ],
            FrameError::Encode { .. } => vec![
                "Check the pixel layout matches what the encoder accepts",
                "Use the raw pixel encoder to rule out codec problems",
            ],
            FrameError::NotAnchored | FrameError::AlreadyAnchored { .. } => vec![
                "Create one StreamClock per session",
                "Anchor the clock exactly once, at the first frame",
            ],
            FrameError::InvalidFrame { .. } => vec![
                "Check the image encoder output",
                "Verify source timestamps are within the supported range",
            ],
            FrameError::MalformedMessage { .. } => vec![
                "Check that publisher and subscriber use the same wire version",
                "Verify the transport does not alter payload bytes",
            ],
            FrameError::MalformedAttachment { .. } => vec![
                "Check that the publisher sends the integrity tag as attachment",
                "Verify the transport preserves attachments",
            ],
            FrameError::HashMismatch { .. } => vec![
                "Isolated mismatches are dropped automatically",
                "Check transport integrity if mismatches recur",
            ],
            FrameError::PersistentMismatch { .. } => vec![
                "Check that the subscriber is wired to the intended topic",
                "Verify publisher and subscriber use the same digest algorithm",
                "Inspect the transport for payload or attachment rewriting",
            ],
            FrameError::TransportCapability { .. } => vec![
                "Use a transport that sends payload and attachment in one unit",
            ],
            FrameError::Transport { .. } => vec![
                "Check the transport session is open",
                "Retry policy belongs to the transport configuration",
            ],
            FrameError::Worker { .. } => vec![
                "Check logs for a panic in the acquisition or publishing task",
                "Restart the publishing session",
            ],
            FrameError::Config { .. } => vec![
                "Check configuration field names and types",
                "Compare against the documented defaults",
            ],
            FrameError::Io { .. } => {
                vec!["Check file exists and is readable", "Check file permissions"]
            }
        }
    }

    /// Helper constructor for stream availability errors.
    pub fn stream_unavailable(reason: impl Into<String>) -> Self {
        FrameError::StreamUnavailable { reason: reason.into() }
    }

    /// Helper constructor for decode errors.
    pub fn decode(details: impl Into<String>) -> Self {
        FrameError::Decode { details: details.into() }
    }

    /// Helper constructor for encode errors.
    pub fn encode(details: impl Into<String>) -> Self {
        FrameError::Encode { details: details.into() }
    }

    /// Helper constructor for invalid frame errors.
    pub fn invalid_frame(reason: impl Into<String>) -> Self {
        FrameError::InvalidFrame { reason: reason.into() }
    }

    /// Helper constructor for malformed message errors.
    pub fn malformed(offset: usize, details: impl Into<String>) -> Self {
        FrameError::MalformedMessage { offset, details: details.into() }
    }

    /// Helper constructor for malformed attachment errors.
    pub fn malformed_attachment(details: impl Into<String>) -> Self {
        FrameError::MalformedAttachment { details: details.into() }
    }

    /// Helper constructor for integrity mismatches.
    pub fn hash_mismatch(computed: impl Into<String>, carried: impl Into<String>) -> Self {
        FrameError::HashMismatch { computed: computed.into(), carried: carried.into() }
    }

    /// Helper constructor for transport failures.
    pub fn transport(topic: impl Into<String>, reason: impl Into<String>) -> Self {
        FrameError::Transport { topic: topic.into(), reason: reason.into(), source: None }
    }

    /// Helper constructor for transport failures with source.
    pub fn transport_with_source(
        topic: impl Into<String>,
        reason: impl Into<String>,
        source: Box<dyn std::error::Error + Send + Sync>,
    ) -> Self {
        FrameError::Transport { topic: topic.into(), reason: reason.into(), source: Some(source) }
    }

    /// Helper constructor for configuration errors.
    pub fn config(details: impl Into<String>) -> Self {
        FrameError::Config { details: details.into() }
    }

    /// Helper constructor for I/O errors with path context.
    pub fn io_error(path: PathBuf, source: std::io::Error) -> Self {
        FrameError::Io { path, source }
    }
}

impl From<std::io::Error> for FrameError {
    fn from(err: std::io::Error) -> Self {
        FrameError::Io { path: PathBuf::from("<unknown>"), source: err }
    }
}

impl From<serde_yaml_ng::Error> for FrameError {
    fn from(err: serde_yaml_ng::Error) -> Self {
        FrameError::Config { details: err.to_string() }
    }
}
