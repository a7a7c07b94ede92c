use serde::{Deserialize, Serialize};
use std::str::FromStr;
use crate::error::SubmitError;

/// Requested quality tier. Fixed enumerated set; the selector maps to
/// a height ceiling for the fetch tool's format expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Quality {
    P360,
    P480,
    P720,
}

impl Quality {
    /// All supported tiers, lowest first
    pub const ALL: [Quality; 3] = [Quality::P360, Quality::P480, Quality::P720];

    /// Height ceiling in pixels
    pub fn height(&self) -> u32 {
        match self {
            Quality::P360 => 360,
            Quality::P480 => 480,
            Quality::P720 => 720,
        }
    }

    /// Format-selection expression understood by yt-dlp.
    ///
    /// Preference order, not a hard filter: best video at or below the
    /// height ceiling plus best audio, falling back to the best combined
    /// stream at or below the ceiling. The tool's own fallback picks the
    /// closest available quality when nothing matches exactly.
    pub fn format_selector(&self) -> String {
        let h = self.height();
        format!("bestvideo[height<={h}]+bestaudio/best[height<={h}]")
    }

    /// Human-readable label, e.g. "480p"
    pub fn label(&self) -> String {
        format!("{}p", self.height())
    }
}

impl FromStr for Quality {
    type Err = SubmitError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().trim_end_matches('p') {
            "360" => Ok(Quality::P360),
            "480" => Ok(Quality::P480),
            "720" => Ok(Quality::P720),
            other => Err(SubmitError::InvalidQuality(other.to_string())),
        }
    }
}

impl std::fmt::Display for Quality {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.label())
    }
}
