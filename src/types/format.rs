//! Stream format description and resolution selection

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::{FrameError, Result};

/// Target frame resolution, written as `WIDTHxHEIGHT` in configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    pub const FULL_HD: Resolution = Resolution { width: 1920, height: 1080 };

    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl Default for Resolution {
    fn default() -> Self {
        Self::FULL_HD
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

impl FromStr for Resolution {
    type Err = FrameError;

    fn from_str(s: &str) -> Result<Self> {
        let (w, h) = s
            .split_once(['x', 'X'])
            .ok_or_else(|| FrameError::config(format!("resolution '{}' is not WIDTHxHEIGHT", s)))?;
        let width = w
            .trim()
            .parse::<u32>()
            .map_err(|e| FrameError::config(format!("resolution width '{}': {}", w, e)))?;
        let height = h
            .trim()
            .parse::<u32>()
            .map_err(|e| FrameError::config(format!("resolution height '{}': {}", h, e)))?;
        if width == 0 || height == 0 {
            return Err(FrameError::config(format!("resolution '{}' has a zero dimension", s)));
        }
        Ok(Self { width, height })
    }
}

impl TryFrom<String> for Resolution {
    type Error = FrameError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<Resolution> for String {
    fn from(value: Resolution) -> Self {
        value.to_string()
    }
}

/// One format offered by a stream host for a given source
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamFormat {
    /// Host-specific format identifier
    pub id: String,

    /// Playable URL for this format
    pub url: String,

    /// Frame height, when the host reports one
    pub height: Option<u32>,

    /// Whether this format carries a video track
    pub has_video: bool,
}

/// Pick the stream format to open for a target resolution.
///
/// Prefers a video format whose height equals the target height. Otherwise
/// falls back to the first video format, in host order, whose height is at or
/// below the target. Formats without video or without a reported height are
/// never chosen.
///
/// # Errors
///
/// Returns [`FrameError::StreamUnavailable`] when no format qualifies.
pub fn select_format(formats: &[StreamFormat], target: Resolution) -> Result<&StreamFormat> {
    let video = || formats.iter().filter(|f| f.has_video);

    video()
        .find(|f| f.height == Some(target.height))
        .or_else(|| video().find(|f| f.height.is_some_and(|h| h <= target.height)))
        .ok_or_else(|| {
            FrameError::stream_unavailable(format!(
                "no video format at or below {} among {} offered",
                target,
                formats.len()
            ))
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn format(id: &str, height: Option<u32>, has_video: bool) -> StreamFormat {
        StreamFormat { id: id.to_string(), url: format!("https://cdn/{}", id), height, has_video }
    }

    #[test]
    fn exact_height_wins_over_earlier_lower_format() {
        let formats = vec![
            format("360p", Some(360), true),
            format("audio", None, false),
            format("1080p", Some(1080), true),
        ];
        let chosen = select_format(&formats, Resolution::FULL_HD).unwrap();
        assert_eq!(chosen.id, "1080p");
    }

    #[test]
    fn falls_back_to_first_format_below_target() {
        let formats = vec![
            format("2160p", Some(2160), true),
            format("720p", Some(720), true),
            format("480p", Some(480), true),
        ];
        let chosen = select_format(&formats, Resolution::FULL_HD).unwrap();
        assert_eq!(chosen.id, "720p");
    }

    #[test]
    fn audio_only_formats_are_never_chosen() {
        let formats = vec![format("audio-1080", Some(1080), false), format("nohint", None, true)];
        let err = select_format(&formats, Resolution::FULL_HD).unwrap_err();
        assert!(matches!(err, FrameError::StreamUnavailable { .. }));
    }

    #[test]
    fn resolution_parses_and_displays() {
        let res: Resolution = "1280x720".parse().unwrap();
        assert_eq!(res, Resolution::new(1280, 720));
        assert_eq!(res.to_string(), "1280x720");

        assert!("1280".parse::<Resolution>().is_err());
        assert!("0x720".parse::<Resolution>().is_err());
        assert!("widexhigh".parse::<Resolution>().is_err());
    }
}
