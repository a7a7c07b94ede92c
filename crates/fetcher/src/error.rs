use thiserror::Error;

/// Rejection reasons reported before any process is spawned
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SubmitError {
    #[error("a job is already active for this requester")]
    AlreadyActive,
    #[error("invalid URL: {0}")]
    InvalidUrl(String),
    #[error("unrecognized quality selector: {0}")]
    InvalidQuality(String),
}

/// Pipeline stage for error attribution
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Fetch,
    Transcode,
    Thumbnail,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Stage::Fetch => "fetch",
            Stage::Transcode => "transcode",
            Stage::Thumbnail => "thumbnail",
        };
        f.write_str(name)
    }
}

/// Errors from a single external process invocation
#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("failed to launch {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("process timed out after {secs} s")]
    Timeout { secs: u64 },
    #[error("process exited with code {code}")]
    Failed { code: i32 },
    #[error("cancelled")]
    Cancelled,
    #[error("i/o error on process stream: {0}")]
    Io(#[from] std::io::Error),
}

/// Stage-level errors caught at the job-task boundary and translated
/// into a terminal state plus a final status message
#[derive(Debug, Error)]
pub enum StageError {
    #[error("failed to extract media info: {0}")]
    InfoExtraction(String),
    #[error("{stage} timed out")]
    Timeout { stage: Stage },
    #[error("{stage} failed (exit code {code})")]
    Process { stage: Stage, code: i32 },
    #[error("cancelled by requester")]
    Cancelled,
    #[error("upload failed after {attempts} attempts")]
    UploadExhausted { attempts: u32 },
    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl StageError {
    /// Map a runner failure to a stage error for the given stage
    pub fn from_runner(stage: Stage, err: RunnerError) -> Self {
        match err {
            RunnerError::Timeout { .. } => StageError::Timeout { stage },
            RunnerError::Failed { code } => StageError::Process { stage, code },
            RunnerError::Cancelled => StageError::Cancelled,
            other => StageError::Other(anyhow::Error::new(other).context(format!("{stage} stage"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_runner_attributes_the_stage() {
        let err = StageError::from_runner(Stage::Thumbnail, RunnerError::Timeout { secs: 30 });
        assert_eq!(err.to_string(), "thumbnail timed out");

        let err = StageError::from_runner(Stage::Fetch, RunnerError::Failed { code: 2 });
        assert_eq!(err.to_string(), "fetch failed (exit code 2)");

        assert!(matches!(
            StageError::from_runner(Stage::Transcode, RunnerError::Cancelled),
            StageError::Cancelled
        ));
    }
}
