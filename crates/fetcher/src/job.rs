use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use chrono::{DateTime, Utc};
use tokio::sync::Notify;
use url::Url;
use uuid::Uuid;
use crate::artifacts::ArtifactPaths;
use crate::quality::Quality;

/// Identity of the party that submitted a job. One active job per
/// requester is enforced by the manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RequesterId(pub u64);

impl std::fmt::Display for RequesterId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An accepted job request. Immutable once accepted.
#[derive(Debug, Clone)]
pub struct JobRequest {
    pub requester: RequesterId,
    pub url: Url,
    pub quality: Quality,
}

/// Lifecycle states of a job
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Fetching,
    Transcoding,
    ThumbnailExtraction,
    Uploading,
    Done,
    Failed,
    Cancelled,
}

impl JobState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Done | JobState::Failed | JobState::Cancelled)
    }
}

impl std::fmt::Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            JobState::Fetching => "Fetching",
            JobState::Transcoding => "Transcoding",
            JobState::ThumbnailExtraction => "ThumbnailExtraction",
            JobState::Uploading => "Uploading",
            JobState::Done => "Done",
            JobState::Failed => "Failed",
            JobState::Cancelled => "Cancelled",
        };
        f.write_str(name)
    }
}

/// Mutable per-job record, owned exclusively by the running job task.
/// Created once metadata extraction has produced a title, destroyed
/// when the task exits a terminal state.
#[derive(Debug)]
pub struct Job {
    pub id: Uuid,
    pub request: JobRequest,
    pub title: String,
    pub duration_secs: u64,
    pub paths: ArtifactPaths,
    pub state: JobState,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl Job {
    pub fn new(request: JobRequest, title: String, duration_secs: u64, paths: ArtifactPaths) -> Self {
        Job {
            id: Uuid::new_v4(),
            request,
            title,
            duration_secs,
            paths,
            state: JobState::Fetching,
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    /// Advance the job to a new state, stamping the finish time on
    /// terminal entry
    pub fn transition(&mut self, next: JobState) {
        log::info!("Job {} [{}]: {} -> {}", self.id, self.request.requester, self.state, next);
        self.state = next;
        if next.is_terminal() {
            self.finished_at = Some(Utc::now());
        }
    }
}

/// Final result of a job task, for callers that await completion
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    Done,
    Failed(String),
    Cancelled,
}

/// Cooperative cancellation flag shared between the manager and a job
/// task. Checked before each stage, inside the process runner's select
/// loop, and during retry delays.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    inner: Arc<CancelInner>,
}

#[derive(Debug, Default)]
struct CancelInner {
    flag: AtomicBool,
    notify: Notify,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation and wake every waiter
    pub fn cancel(&self) {
        self.inner.flag.store(true, Ordering::SeqCst);
        self.inner.notify.notify_waiters();
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.flag.load(Ordering::SeqCst)
    }

    /// Resolve once cancellation has been requested
    pub async fn cancelled(&self) {
        loop {
            // Register interest before the flag check to close the
            // set-then-notify race
            let notified = self.inner.notify.notified();
            if self.is_cancelled() {
                return;
            }
            notified.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_states() {
        assert!(JobState::Done.is_terminal());
        assert!(JobState::Failed.is_terminal());
        assert!(JobState::Cancelled.is_terminal());
        assert!(!JobState::Fetching.is_terminal());
        assert!(!JobState::Uploading.is_terminal());
    }

    #[tokio::test]
    async fn test_cancel_token_wakes_waiter() {
        let token = CancelToken::new();
        let waiter = token.clone();
        let handle = tokio::spawn(async move {
            waiter.cancelled().await;
        });
        assert!(!token.is_cancelled());
        token.cancel();
        handle.await.unwrap();
        assert!(token.is_cancelled());
    }

    #[tokio::test]
    async fn test_cancel_before_wait_resolves_immediately() {
        let token = CancelToken::new();
        token.cancel();
        // Must not hang
        token.cancelled().await;
    }
}
