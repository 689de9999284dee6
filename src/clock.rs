//! Relative stream time to absolute wall-clock mapping
//!
//! A [`StreamClock`] belongs to exactly one publishing session. It is anchored
//! once, at the first frame observed, and every later frame is placed at
//! `anchor_wall_time + (relative_time - anchor_stream_time)`.
//!
//! No reordering or clamping happens here: if the source seeks backwards or
//! delivers out of order, the computed timestamps go backwards too.

use chrono::{DateTime, TimeDelta, Utc};
use tracing::debug;

use crate::{FrameError, Result};

/// Fixed point pairing a wall-clock instant with a stream presentation time
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClockAnchor {
    /// Wall-clock time the first frame was observed
    pub wall_time: DateTime<Utc>,

    /// Relative stream time of that first frame, in seconds
    pub stream_time: f64,
}

/// Per-session clock mapping relative presentation time to absolute time
#[derive(Debug, Clone, Default)]
pub struct StreamClock {
    anchor: Option<ClockAnchor>,
}

impl StreamClock {
    /// Create an unanchored clock
    pub fn new() -> Self {
        Self::default()
    }

    /// Anchor the clock at the current wall time.
    ///
    /// # Errors
    ///
    /// Returns [`FrameError::AlreadyAnchored`] if the clock was anchored before,
    /// and [`FrameError::Decode`] if `relative_time` is not finite.
    pub fn anchor(&mut self, relative_time: f64) -> Result<ClockAnchor> {
        self.anchor_at(Utc::now(), relative_time)
    }

    /// Anchor the clock at an explicit wall time.
    pub fn anchor_at(
        &mut self,
        wall_time: DateTime<Utc>,
        relative_time: f64,
    ) -> Result<ClockAnchor> {
        if let Some(existing) = self.anchor {
            return Err(FrameError::AlreadyAnchored { anchor_stream_time: existing.stream_time });
        }
        check_finite(relative_time)?;

        let anchor = ClockAnchor { wall_time, stream_time: relative_time };
        debug!(wall_time = %wall_time, stream_time = relative_time, "Stream clock anchored");
        self.anchor = Some(anchor);
        Ok(anchor)
    }

    /// The anchor, once set
    pub fn anchor_point(&self) -> Option<ClockAnchor> {
        self.anchor
    }

    pub fn is_anchored(&self) -> bool {
        self.anchor.is_some()
    }

    /// Convert a relative stream time to an absolute timestamp.
    ///
    /// # Errors
    ///
    /// - [`FrameError::NotAnchored`] before [`anchor`](Self::anchor) was called
    /// - [`FrameError::Decode`] if `relative_time` is not finite or the result
    ///   does not fit in a timestamp
    pub fn to_absolute(&self, relative_time: f64) -> Result<DateTime<Utc>> {
        let anchor = self.anchor.ok_or(FrameError::NotAnchored)?;
        check_finite(relative_time)?;

        let delta_nanos = ((relative_time - anchor.stream_time) * 1e9).round();
        if !(i64::MIN as f64..=i64::MAX as f64).contains(&delta_nanos) {
            return Err(FrameError::decode(format!(
                "relative time {}s is too far from anchor {}s",
                relative_time, anchor.stream_time
            )));
        }

        anchor.wall_time.checked_add_signed(TimeDelta::nanoseconds(delta_nanos as i64)).ok_or_else(
            || {
                FrameError::decode(format!(
                    "relative time {}s maps outside the representable time range",
                    relative_time
                ))
            },
        )
    }

    /// Anchor on the first call, then convert.
    ///
    /// This is what the publishing loop uses: the first frame of a session
    /// fixes the anchor and maps to the anchor wall time itself.
    pub fn observe(&mut self, relative_time: f64) -> Result<DateTime<Utc>> {
        if self.anchor.is_none() {
            self.anchor(relative_time)?;
        }
        self.to_absolute(relative_time)
    }
}

fn check_finite(relative_time: f64) -> Result<()> {
    if relative_time.is_finite() {
        Ok(())
    } else {
        Err(FrameError::decode(format!("relative time {} is not finite", relative_time)))
    }
}
