use std::path::PathBuf;
use std::sync::Arc;
use async_trait::async_trait;
use crate::job::RequesterId;

/// Upload progress callback: (bytes sent, total bytes). The core wraps
/// the raw callback with the same %5 throttle used for fetch progress.
pub type UploadProgressFn = Arc<dyn Fn(u64, u64) + Send + Sync>;

/// Everything the transport needs to hand a finished file to the
/// requester
#[derive(Debug, Clone)]
pub struct Delivery {
    pub file_path: PathBuf,
    pub caption: String,
    /// Missing thumbnail is fine; delivery proceeds without one
    pub thumbnail: Option<PathBuf>,
    pub duration_secs: u64,
}

/// External collaborator that renders status to the requester and
/// performs delivery attempts. Implemented by the chat transport; the
/// core only ever asks for one attempt at a time — the retry loop is
/// owned by the job pipeline.
#[async_trait]
pub trait StatusSink: Send + Sync {
    /// Show one rendered status text for the requester's job
    async fn report(&self, requester: RequesterId, text: &str);

    /// Perform exactly one upload attempt
    async fn deliver_file(
        &self,
        requester: RequesterId,
        delivery: &Delivery,
        progress: UploadProgressFn,
    ) -> anyhow::Result<()>;
}
