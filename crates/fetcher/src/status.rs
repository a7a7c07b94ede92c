use humansize::{format_size, BINARY};

const BAR_WIDTH: usize = 20;

/// Render a fixed-width progress bar like `[████████░░░░░░░░░░░░] 42%`
pub fn progress_bar(percent: u8) -> String {
    let pct = percent.min(100) as usize;
    let filled = (BAR_WIDTH * pct + 50) / 100;
    let empty = BAR_WIDTH - filled;
    format!("[{}{}] {}%", "█".repeat(filled), "░".repeat(empty), pct)
}

/// Humanized byte count ("0 B" for zero/unknown)
pub fn format_bytes(bytes: u64) -> String {
    format_size(bytes, BINARY)
}

/// `H:MM:SS` when hours are present, `M:SS` otherwise
pub fn format_duration(total_secs: u64) -> String {
    let h = total_secs / 3600;
    let m = (total_secs % 3600) / 60;
    let s = total_secs % 60;
    if h > 0 {
        format!("{h}:{m:02}:{s:02}")
    } else {
        format!("{m}:{s:02}")
    }
}

/// Per-stage status text shown while a stage is in flight
pub fn stage_line(title: &str, detail: &str) -> String {
    format!("{title}\n{detail}")
}

/// Throttled fetch-progress status text
pub fn fetch_progress(title: &str, percent: u8, speed: &str, eta: &str) -> String {
    format!("{title}\n{}\n{speed} ETA {eta}", progress_bar(percent))
}

/// Throttled upload-progress status text
pub fn upload_progress(title: &str, percent: u8, current: u64, total: u64) -> String {
    format!(
        "Uploading: {title}\n{}\n{}/{}",
        progress_bar(percent),
        format_bytes(current),
        format_bytes(total)
    )
}

/// Caption attached to the delivered file
pub fn delivery_caption(title: &str, duration_secs: u64, size_bytes: u64, quality_label: &str) -> String {
    format!(
        "{title}\nDuration: {}\nSize: {}\nQuality: {quality_label}",
        format_duration(duration_secs),
        format_bytes(size_bytes)
    )
}
