use serde::Deserialize;
use crate::commands::CommandBuilder;
use crate::config::FetcherConfig;
use crate::error::{RunnerError, StageError};
use crate::job::CancelToken;
use crate::runner;

/// Fields we need from the fetch tool's info JSON; everything else in
/// the dump is ignored
#[derive(Debug, Clone, Deserialize)]
pub struct MediaInfo {
    #[serde(default = "default_title")]
    pub title: String,
    #[serde(default)]
    pub duration: Option<f64>,
}

fn default_title() -> String {
    "video".to_string()
}

impl MediaInfo {
    /// Duration floored to whole seconds, zero when the source omits it
    pub fn duration_secs(&self) -> u64 {
        self.duration.map(|d| d.max(0.0) as u64).unwrap_or(0)
    }
}

/// Look up title and duration for a URL without downloading anything.
///
/// Runs the fetch tool's JSON dump and parses the result. Failures are
/// reported as `InfoExtraction` with the tool's own error text so the
/// requester sees why the job never started fetching.
pub async fn extract_info(cfg: &FetcherConfig, url: &str, cancel: &CancelToken) -> Result<MediaInfo, StageError> {
    let spec = CommandBuilder::new(cfg).build_info_command(url);

    let output = runner::run_capture(&spec, cancel).await.map_err(|e| match e {
        RunnerError::Cancelled => StageError::Cancelled,
        other => StageError::InfoExtraction(other.to_string()),
    })?;

    if !output.success() {
        let detail = output.stderr.trim();
        let detail = if detail.is_empty() {
            format!("info lookup exited with code {}", output.code)
        } else {
            detail.to_string()
        };
        return Err(StageError::InfoExtraction(detail));
    }

    serde_json::from_str(&output.stdout)
        .map_err(|e| StageError::InfoExtraction(format!("unparseable info JSON: {e}")))
}
