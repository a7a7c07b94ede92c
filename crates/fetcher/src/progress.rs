use regex::Regex;
use std::sync::OnceLock;

/// A point-in-time progress reading parsed from one line of fetch-tool
/// output. Transient, never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressSample {
    /// Percent complete, floored to an integer (0-100)
    pub percent: u8,
    /// Transfer speed text, "?" if the line carried none
    pub speed: String,
    /// ETA text as printed by the tool
    pub eta: String,
}

fn percent_eta_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(\d{1,3}(?:\.\d+)?)%.*?ETA\s+([0-9:]+)").unwrap())
}

fn speed_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"at\s+([0-9.]+[KMGT]?i?B/s)").unwrap())
}

/// Parse one line of fetch-tool output into a progress sample.
///
/// Matches the newline-flushed progress format of yt-dlp and its
/// delegated aria2c downloader: a percentage (optional fractional
/// part) followed somewhere by an `ETA` token, with an optional
/// `at <speed>` transfer rate. Lines without the percentage signal
/// yield `None` and are ignored, not errored.
pub fn parse_fetch_line(line: &str) -> Option<ProgressSample> {
    let caps = percent_eta_re().captures(line)?;
    let raw: f64 = caps.get(1)?.as_str().parse().ok()?;
    // Floor before reporting; downstream bucketing works on integers
    let percent = raw.floor().clamp(0.0, 100.0) as u8;
    let eta = caps.get(2)?.as_str().to_string();
    let speed = speed_re()
        .captures(line)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
        .unwrap_or_else(|| "?".to_string());
    Some(ProgressSample { percent, speed, eta })
}

/// Edge-triggered throttle on coarse percent buckets.
///
/// Reports only exact multiples of 5 that differ from the last value
/// reported, bounding status traffic to at most 21 updates per stage.
/// Values are not assumed monotonic; a backward jump to a different
/// multiple of 5 still reports.
pub fn should_report(new_percent: u8, last_reported: Option<u8>) -> bool {
    new_percent % 5 == 0 && Some(new_percent) != last_reported
}
