//! Content digests carried alongside published payloads
//!
//! The tag is an **unkeyed** SHA-256 over the exact serialized bytes. It
//! catches accidental corruption and wiring defects (wrong topic, a transport
//! that rewrites payloads, a serializer that drifted). Anyone can recompute
//! it, so it says nothing about who produced a message.
//!
//! On the wire the tag travels as the transport attachment: 64 lowercase hex
//! characters, never inside the payload itself.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

use crate::{FrameError, Result};

/// Digest length in bytes
pub const DIGEST_LEN: usize = 32;

/// Supported digest algorithms
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[non_exhaustive]
pub enum DigestAlgorithm {
    #[default]
    Sha256,
}

impl DigestAlgorithm {
    pub fn name(self) -> &'static str {
        match self {
            DigestAlgorithm::Sha256 => "sha256",
        }
    }
}

/// Fixed-size digest of one serialized message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IntegrityTag {
    algorithm: DigestAlgorithm,
    digest: [u8; DIGEST_LEN],
}

impl IntegrityTag {
    /// Compute the tag over exactly `bytes`.
    pub fn compute(bytes: &[u8]) -> Self {
        Self { algorithm: DigestAlgorithm::Sha256, digest: Sha256::digest(bytes).into() }
    }

    pub fn algorithm(&self) -> DigestAlgorithm {
        self.algorithm
    }

    pub fn digest(&self) -> &[u8; DIGEST_LEN] {
        &self.digest
    }

    /// Lowercase hex form of the digest
    pub fn to_hex(&self) -> String {
        hex::encode(self.digest)
    }

    /// Encode as a transport attachment
    pub fn to_attachment(&self) -> Vec<u8> {
        self.to_hex().into_bytes()
    }

    /// Parse a tag carried as a transport attachment.
    ///
    /// Accepts exactly 64 hex characters, in either case.
    ///
    /// # Errors
    ///
    /// Returns [`FrameError::MalformedAttachment`] for anything else.
    pub fn from_attachment(attachment: &[u8]) -> Result<Self> {
        if attachment.len() != DIGEST_LEN * 2 {
            return Err(FrameError::malformed_attachment(format!(
                "expected {} hex characters, found {} bytes",
                DIGEST_LEN * 2,
                attachment.len()
            )));
        }

        let mut digest = [0u8; DIGEST_LEN];
        hex::decode_to_slice(attachment, &mut digest)
            .map_err(|e| FrameError::malformed_attachment(e.to_string()))?;

        Ok(Self { algorithm: DigestAlgorithm::Sha256, digest })
    }

    /// Whether this tag was computed over exactly `bytes`
    pub fn matches(&self, bytes: &[u8]) -> bool {
        *self == Self::compute(bytes)
    }
}

impl fmt::Display for IntegrityTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.algorithm.name(), self.to_hex())
    }
}

/// Compute the integrity tag of `bytes`.
pub fn tag(bytes: &[u8]) -> IntegrityTag {
    IntegrityTag::compute(bytes)
}
