//! Subscriber-side integrity verification
//!
//! Every received unit moves through
//! `Received → {HashVerified, HashMismatch} → {Decoded, Rejected}`.
//! Deserialization only happens after the recomputed digest matches the
//! carried one.
//!
//! A mismatch is a per-message condition: the unit is logged and dropped. An
//! isolated mismatch looks the same as a one-off bit error, but a run of them
//! points at systemic miswiring, so once `max_consecutive_mismatches` are seen
//! in a row the verdict escalates to [`FrameError::PersistentMismatch`].

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{error, trace, warn};

use crate::codec;
use crate::integrity::IntegrityTag;
use crate::{FrameError, FrameMessage, Result};

/// Stage of a received unit in the verification state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerificationState {
    Received,
    HashVerified,
    HashMismatch,
    Decoded,
    Rejected,
}

/// Final outcome for one received unit
#[derive(Debug)]
pub enum Verdict {
    /// Digest matched and the payload deserialized
    Decoded(FrameMessage),

    /// Dropped; the error says why
    Rejected(FrameError),
}

impl Verdict {
    /// Terminal state this verdict represents
    pub fn state(&self) -> VerificationState {
        match self {
            Verdict::Decoded(_) => VerificationState::Decoded,
            Verdict::Rejected(_) => VerificationState::Rejected,
        }
    }

    pub fn is_decoded(&self) -> bool {
        matches!(self, Verdict::Decoded(_))
    }

    /// Whether this rejection should end the subscription
    pub fn is_escalation(&self) -> bool {
        matches!(self, Verdict::Rejected(FrameError::PersistentMismatch { .. }))
    }

    /// Convert into a `Result`
    pub fn into_result(self) -> Result<FrameMessage> {
        match self {
            Verdict::Decoded(message) => Ok(message),
            Verdict::Rejected(err) => Err(err),
        }
    }
}

/// Snapshot of verifier counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VerifierStats {
    /// Units seen
    pub received: u64,
    /// Units whose digest matched
    pub verified: u64,
    /// Units whose digest did not match, or whose tag was unreadable
    pub mismatched: u64,
    /// Verified units that failed to deserialize
    pub malformed: u64,
    /// Units handed downstream
    pub decoded: u64,
}

/// Verifies received units for one topic
///
/// Safe to share between concurrently running transport callbacks; all state
/// is atomic counters.
#[derive(Debug)]
pub struct Verifier {
    topic: Arc<str>,
    max_consecutive_mismatches: u32,
    consecutive: AtomicU32,
    received: AtomicU64,
    verified: AtomicU64,
    mismatched: AtomicU64,
    malformed: AtomicU64,
    decoded: AtomicU64,
}

impl Verifier {
    /// Create a verifier for `topic`.
    ///
    /// `max_consecutive_mismatches` of 0 disables escalation.
    pub fn new(topic: impl Into<Arc<str>>, max_consecutive_mismatches: u32) -> Self {
        Self {
            topic: topic.into(),
            max_consecutive_mismatches,
            consecutive: AtomicU32::new(0),
            received: AtomicU64::new(0),
            verified: AtomicU64::new(0),
            mismatched: AtomicU64::new(0),
            malformed: AtomicU64::new(0),
            decoded: AtomicU64::new(0),
        }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Check one received unit and, if its digest matches, decode it.
    pub fn verify(&self, payload: &[u8], attachment: Option<&[u8]>) -> Verdict {
        let seq = self.received.fetch_add(1, Ordering::Relaxed) + 1;
        trace!(
            topic = %self.topic,
            seq,
            state = ?VerificationState::Received,
            bytes = payload.len()
        );

        let carried = match attachment {
            Some(raw) => IntegrityTag::from_attachment(raw),
            None => Err(FrameError::malformed_attachment("no integrity attachment")),
        };
        let carried = match carried {
            Ok(tag) => tag,
            Err(err) => return self.reject_mismatch(seq, err),
        };

        let computed = IntegrityTag::compute(payload);
        if computed != carried {
            let err = FrameError::hash_mismatch(computed.to_hex(), carried.to_hex());
            return self.reject_mismatch(seq, err);
        }

        self.verified.fetch_add(1, Ordering::Relaxed);
        self.consecutive.store(0, Ordering::Relaxed);
        trace!(topic = %self.topic, seq, state = ?VerificationState::HashVerified);

        match codec::deserialize(payload) {
            Ok(message) => {
                self.decoded.fetch_add(1, Ordering::Relaxed);
                trace!(
                    topic = %self.topic,
                    seq,
                    state = ?VerificationState::Decoded,
                    timestamp = %message.timestamp()
                );
                Verdict::Decoded(message)
            }
            Err(err) => {
                self.malformed.fetch_add(1, Ordering::Relaxed);
                warn!(
                    topic = %self.topic,
                    seq,
                    kind = err.kind(),
                    "Dropping verified but malformed message: {}",
                    err
                );
                Verdict::Rejected(err)
            }
        }
    }

    fn reject_mismatch(&self, seq: u64, err: FrameError) -> Verdict {
        self.mismatched.fetch_add(1, Ordering::Relaxed);
        // Saturates; with escalation disabled the run is unbounded
        let run = self
            .consecutive
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| Some(n.saturating_add(1)))
            .unwrap_or_else(|n| n)
            .saturating_add(1);
        trace!(topic = %self.topic, seq, state = ?VerificationState::HashMismatch, run);

        if self.max_consecutive_mismatches > 0 && run >= self.max_consecutive_mismatches {
            error!(
                topic = %self.topic,
                seq,
                kind = "persistent_mismatch",
                run,
                "Integrity mismatches persist, last: {}",
                err
            );
            return Verdict::Rejected(FrameError::PersistentMismatch {
                topic: self.topic.to_string(),
                consecutive: run,
            });
        }

        warn!(topic = %self.topic, seq, kind = err.kind(), run, "Dropping message: {}", err);
        Verdict::Rejected(err)
    }

    /// Current run of consecutive mismatches
    pub fn consecutive_mismatches(&self) -> u32 {
        self.consecutive.load(Ordering::Relaxed)
    }

    pub fn stats(&self) -> VerifierStats {
        VerifierStats {
            received: self.received.load(Ordering::Relaxed),
            verified: self.verified.load(Ordering::Relaxed),
            mismatched: self.mismatched.load(Ordering::Relaxed),
            malformed: self.malformed.load(Ordering::Relaxed),
            decoded: self.decoded.load(Ordering::Relaxed),
        }
    }
}
