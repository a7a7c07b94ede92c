use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use log::{info, warn};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use url::Url;
use crate::artifacts::ArtifactStore;
use crate::commands::CommandBuilder;
use crate::config::FetcherConfig;
use crate::error::{RunnerError, Stage, StageError, SubmitError};
use crate::job::{CancelToken, Job, JobOutcome, JobRequest, JobState, RequesterId};
use crate::metadata;
use crate::progress::{self, ProgressSample};
use crate::quality::Quality;
use crate::retry::{self, RetryOutcome};
use crate::runner;
use crate::sink::{Delivery, StatusSink, UploadProgressFn};
use crate::status;

/// Capacity of the per-job progress channel. Samples beyond it are
/// dropped; only intermediate percentages are lost and the throttle
/// re-reports on the next multiple of five.
const PROGRESS_CHANNEL_CAPACITY: usize = 32;

/// Acknowledgement for a cancellation request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelAck {
    /// An active job was told to stop
    Requested,
    /// No job was active for the requester; nothing to do
    NothingToCancel,
}

struct ActiveJob {
    cancel: CancelToken,
}

/// Handle returned from a successful submit, for callers that want to
/// await the job's terminal outcome
#[derive(Debug)]
pub struct JobHandle {
    pub requester: RequesterId,
    handle: JoinHandle<JobOutcome>,
}

impl JobHandle {
    pub async fn outcome(self) -> JobOutcome {
        match self.handle.await {
            Ok(outcome) => outcome,
            Err(e) => JobOutcome::Failed(format!("job task aborted: {e}")),
        }
    }
}

/// Owner of the job lifecycle: at most one active job per requester,
/// pipeline task per accepted job, cooperative cancellation, and the
/// cleanup obligation on every terminal transition.
#[derive(Clone)]
pub struct JobManager {
    cfg: Arc<FetcherConfig>,
    store: ArtifactStore,
    sink: Arc<dyn StatusSink>,
    active: Arc<Mutex<HashMap<RequesterId, ActiveJob>>>,
}

impl JobManager {
    pub fn new(cfg: FetcherConfig, sink: Arc<dyn StatusSink>) -> Self {
        let store = ArtifactStore::new(cfg.staging_dir.clone());
        JobManager {
            cfg: Arc::new(cfg),
            store,
            sink,
            active: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn artifact_store(&self) -> &ArtifactStore {
        &self.store
    }

    fn lock_active(&self) -> MutexGuard<'_, HashMap<RequesterId, ActiveJob>> {
        self.active.lock().expect("active-jobs map poisoned")
    }

    /// Accept a job request: validate, register atomically against
    /// concurrent submits for the same requester, and spawn the
    /// pipeline task. Rejections happen before any process spawns.
    pub fn submit(&self, requester: RequesterId, url: &str, quality: &str) -> Result<JobHandle, SubmitError> {
        let url = validate_url(url)?;
        let quality: Quality = quality.parse()?;
        let request = JobRequest { requester, url, quality };

        // Accept-and-register is atomic under this lock: two concurrent
        // submits cannot both observe "no active job"
        let mut active = self.lock_active();
        if active.contains_key(&requester) {
            return Err(SubmitError::AlreadyActive);
        }

        let cancel = CancelToken::new();
        let manager = self.clone();
        let task_cancel = cancel.clone();
        let handle = tokio::spawn(async move { manager.run_job(request, task_cancel).await });
        active.insert(requester, ActiveJob { cancel });

        Ok(JobHandle { requester, handle })
    }

    /// Request cancellation of the requester's active job, if any
    pub fn cancel(&self, requester: RequesterId) -> CancelAck {
        let active = self.lock_active();
        match active.get(&requester) {
            Some(job) => {
                info!("Cancellation requested for {}", requester);
                job.cancel.cancel();
                CancelAck::Requested
            }
            None => CancelAck::NothingToCancel,
        }
    }

    async fn run_job(self, request: JobRequest, cancel: CancelToken) -> JobOutcome {
        let requester = request.requester;
        let outcome = self.run_pipeline(request, &cancel).await;
        // Destroy the active-job registration on terminal exit
        self.lock_active().remove(&requester);
        outcome
    }

    async fn run_pipeline(&self, request: JobRequest, cancel: &CancelToken) -> JobOutcome {
        let requester = request.requester;

        self.sink
            .report(requester, &format!("Selected {}. Extracting media info...", request.quality))
            .await;

        // Info lookup happens before Fetching; a failure here reports the
        // tool's error text and the job never enters the state machine
        let media_info = match metadata::extract_info(&self.cfg, request.url.as_str(), cancel).await {
            Ok(info) => info,
            Err(StageError::Cancelled) => {
                self.sink.report(requester, "❌ Cancelled.").await;
                return JobOutcome::Cancelled;
            }
            Err(e) => {
                self.sink.report(requester, &format!("❌ {e}")).await;
                return JobOutcome::Failed(e.to_string());
            }
        };

        if let Err(e) = self.store.ensure_staging() {
            self.sink.report(requester, &format!("❌ {e}")).await;
            return JobOutcome::Failed(e.to_string());
        }

        let paths = self.store.paths_for(&media_info.title);
        let mut job = Job::new(request, media_info.title.clone(), media_info.duration_secs(), paths);
        info!("Job {} accepted for {}: \"{}\"", job.id, requester, job.title);

        let result = self.run_stages(&mut job, cancel).await;

        // Terminal transitions all run their cleanup obligation, and each
        // produces exactly one final status message
        match result {
            Ok(()) => {
                if let Err(e) = self.store.remove_all(&job.paths) {
                    warn!("Job {}: post-delivery cleanup incomplete: {e}", job.id);
                }
                job.transition(JobState::Done);
                self.sink
                    .report(requester, &format!("✅ Done: \"{}\" delivered, local copies removed.", job.title))
                    .await;
                JobOutcome::Done
            }
            Err(StageError::Cancelled) => {
                if let Err(e) = self.store.remove_all(&job.paths) {
                    warn!("Job {}: cleanup after cancel incomplete: {e}", job.id);
                }
                job.transition(JobState::Cancelled);
                self.sink.report(requester, "❌ Cancelled. Partial files removed.").await;
                JobOutcome::Cancelled
            }
            Err(err @ StageError::UploadExhausted { .. }) => {
                // Keep the final file for manual recovery; the temp
                // intermediate and thumbnail still go
                if let Err(e) = self.store.remove_keeping_final(&job.paths) {
                    warn!("Job {}: cleanup after upload failure incomplete: {e}", job.id);
                }
                job.transition(JobState::Failed);
                self.sink
                    .report(
                        requester,
                        &format!("❌ {err}. Kept local file: {}", job.paths.final_file.display()),
                    )
                    .await;
                JobOutcome::Failed(err.to_string())
            }
            Err(err) => {
                if let Err(e) = self.store.remove_all(&job.paths) {
                    warn!("Job {}: cleanup after failure incomplete: {e}", job.id);
                }
                job.transition(JobState::Failed);
                self.sink.report(requester, &format!("❌ {err}")).await;
                JobOutcome::Failed(err.to_string())
            }
        }
    }

    async fn run_stages(&self, job: &mut Job, cancel: &CancelToken) -> Result<(), StageError> {
        let requester = job.request.requester;
        let builder = CommandBuilder::new(&self.cfg);

        // ---- Fetching ----
        if cancel.is_cancelled() {
            return Err(StageError::Cancelled);
        }
        self.sink
            .report(
                requester,
                &status::stage_line(&job.title, &format!("⏳ Fetching at {}...", job.request.quality)),
            )
            .await;

        {
            let spec = builder.build_fetch_command(job.request.url.as_str(), job.request.quality, &job.paths.temp);
            let (tx, rx) = mpsc::channel::<ProgressSample>(PROGRESS_CHANNEL_CAPACITY);
            let consumer = tokio::spawn(forward_fetch_progress(self.sink.clone(), requester, job.title.clone(), rx));

            let run = runner::run_streaming(&spec, cancel, |line| {
                if let Some(sample) = progress::parse_fetch_line(line) {
                    // Never block the stream; drop when the consumer lags
                    let _ = tx.try_send(sample);
                }
            })
            .await;

            // Close the channel and drain the consumer before any later
            // status text, so Fetching updates never trail the next stage
            drop(tx);
            let _ = consumer.await;
            run.map_err(|e| StageError::from_runner(Stage::Fetch, e))?;
        }

        // ---- Transcoding ----
        job.transition(JobState::Transcoding);
        if cancel.is_cancelled() {
            return Err(StageError::Cancelled);
        }
        self.sink
            .report(requester, &status::stage_line(&job.title, "🎞 Transcoding..."))
            .await;

        let spec = builder.build_transcode_command(&job.paths.temp, &job.paths.final_file);
        runner::run_streaming(&spec, cancel, |line| log::trace!("ffmpeg: {line}"))
            .await
            .map_err(|e| StageError::from_runner(Stage::Transcode, e))?;

        // ---- ThumbnailExtraction ----
        job.transition(JobState::ThumbnailExtraction);
        self.sink
            .report(requester, &status::stage_line(&job.title, "🖼 Extracting thumbnail..."))
            .await;

        let spec = builder.build_thumbnail_command(&job.paths.final_file, &job.paths.thumbnail);
        let thumbnail = match runner::run_streaming(&spec, cancel, |_| {}).await {
            Ok(()) if job.paths.thumbnail.exists() => Some(job.paths.thumbnail.clone()),
            Ok(()) => None,
            Err(RunnerError::Cancelled) => return Err(StageError::Cancelled),
            // Timeout or failure here degrades to "no thumbnail"
            Err(e) => {
                let err = StageError::from_runner(Stage::Thumbnail, e);
                warn!("Job {}: {err}, continuing without a thumbnail", job.id);
                None
            }
        };

        // ---- Uploading ----
        job.transition(JobState::Uploading);
        if cancel.is_cancelled() {
            return Err(StageError::Cancelled);
        }

        let size_bytes = std::fs::metadata(&job.paths.final_file).map(|m| m.len()).unwrap_or(0);
        let delivery = Delivery {
            file_path: job.paths.final_file.clone(),
            caption: status::delivery_caption(&job.title, job.duration_secs, size_bytes, &job.request.quality.label()),
            thumbnail,
            duration_secs: job.duration_secs,
        };
        self.sink
            .report(requester, &status::stage_line(&job.title, "📤 Uploading..."))
            .await;

        let (tx, rx) = mpsc::channel::<(u64, u64)>(PROGRESS_CHANNEL_CAPACITY);
        let consumer = tokio::spawn(forward_upload_progress(self.sink.clone(), requester, job.title.clone(), rx));
        let progress_cb: UploadProgressFn = Arc::new(move |current, total| {
            let _ = tx.try_send((current, total));
        });

        let outcome = retry::with_fixed_delay(
            self.cfg.upload_attempts,
            self.cfg.upload_retry_delay(),
            cancel,
            |attempt| {
                let sink = self.sink.clone();
                let delivery = delivery.clone();
                let progress = progress_cb.clone();
                async move {
                    info!("Upload attempt {attempt} for {requester}");
                    sink.deliver_file(requester, &delivery, progress).await
                }
            },
        )
        .await;

        drop(progress_cb);
        let _ = consumer.await;

        match outcome {
            RetryOutcome::Succeeded { attempts, .. } => {
                info!("Job {}: upload succeeded on attempt {attempts}", job.id);
                Ok(())
            }
            RetryOutcome::Exhausted { attempts, last_error } => {
                warn!("Job {}: upload exhausted after {attempts} attempts: {last_error}", job.id);
                Err(StageError::UploadExhausted { attempts })
            }
            RetryOutcome::Cancelled => Err(StageError::Cancelled),
        }
    }
}

fn validate_url(raw: &str) -> Result<Url, SubmitError> {
    let url = Url::parse(raw.trim()).map_err(|e| SubmitError::InvalidUrl(e.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(SubmitError::InvalidUrl(format!("unsupported scheme: {}", url.scheme())));
    }
    if url.host_str().is_none() {
        return Err(SubmitError::InvalidUrl("missing host".to_string()));
    }
    Ok(url)
}

/// Single consumer of a job's fetch progress channel: applies the %5
/// throttle and performs the actual sends, so line callbacks never spawn
/// unbounded concurrent status edits.
async fn forward_fetch_progress(
    sink: Arc<dyn StatusSink>,
    requester: RequesterId,
    title: String,
    mut rx: mpsc::Receiver<ProgressSample>,
) {
    let mut last_reported: Option<u8> = None;
    while let Some(sample) = rx.recv().await {
        if progress::should_report(sample.percent, last_reported) {
            last_reported = Some(sample.percent);
            sink.report(requester, &status::fetch_progress(&title, sample.percent, &sample.speed, &sample.eta))
                .await;
        }
    }
}

/// Same policy for upload progress, fed by the sink's byte callback
async fn forward_upload_progress(
    sink: Arc<dyn StatusSink>,
    requester: RequesterId,
    title: String,
    mut rx: mpsc::Receiver<(u64, u64)>,
) {
    let mut last_reported: Option<u8> = None;
    while let Some((current, total)) = rx.recv().await {
        if total == 0 {
            continue;
        }
        let percent = ((current.min(total) * 100) / total) as u8;
        if progress::should_report(percent, last_reported) {
            last_reported = Some(percent);
            sink.report(requester, &status::upload_progress(&title, percent, current, total))
                .await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Records every status text and counts delivery attempts; can be
    /// told to fail the first N attempts.
    struct RecordingSink {
        reports: Mutex<Vec<String>>,
        deliver_calls: AtomicU32,
        fail_first: u32,
    }

    impl RecordingSink {
        fn new(fail_first: u32) -> Arc<Self> {
            Arc::new(RecordingSink {
                reports: Mutex::new(Vec::new()),
                deliver_calls: AtomicU32::new(0),
                fail_first,
            })
        }

        fn reports(&self) -> Vec<String> {
            self.reports.lock().unwrap().clone()
        }

        fn first_index_containing(&self, needle: &str) -> Option<usize> {
            self.reports().iter().position(|r| r.contains(needle))
        }
    }

    #[async_trait]
    impl StatusSink for RecordingSink {
        async fn report(&self, _requester: RequesterId, text: &str) {
            self.reports.lock().unwrap().push(text.to_string());
        }

        async fn deliver_file(
            &self,
            _requester: RequesterId,
            delivery: &Delivery,
            progress: UploadProgressFn,
        ) -> anyhow::Result<()> {
            let call = self.deliver_calls.fetch_add(1, Ordering::SeqCst) + 1;
            if call <= self.fail_first {
                anyhow::bail!("transport unavailable");
            }
            anyhow::ensure!(delivery.file_path.exists(), "final file missing at delivery time");
            let total = std::fs::metadata(&delivery.file_path)?.len().max(1);
            progress(total / 2, total);
            progress(total, total);
            Ok(())
        }
    }

    #[cfg(unix)]
    mod stubs {
        use std::path::{Path, PathBuf};

        /// Write an executable shell script standing in for an external
        /// tool, so pipeline tests run without yt-dlp/ffmpeg installed.
        pub fn write_stub(dir: &Path, name: &str, script: &str) -> PathBuf {
            use std::os::unix::fs::PermissionsExt;
            let path = dir.join(name);
            std::fs::write(&path, script).unwrap();
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
            path
        }

        /// yt-dlp stand-in: answers -J with info JSON, otherwise emits a
        /// short progress stream and creates the -o output file.
        pub const YTDLP_OK: &str = r#"#!/bin/sh
if [ "$1" = "-J" ]; then
    echo '{"title": "Stub: Video/One", "duration": 61.0}'
    exit 0
fi
out=""
prev=""
for a in "$@"; do
    if [ "$prev" = "-o" ]; then out="$a"; fi
    prev="$a"
done
echo "[download]   0.0% of 10.00MiB at 1.00MiB/s ETA 00:10"
echo "[download]  42.7% of 10.00MiB at 1.23MiB/s ETA 00:30"
echo "[download]  55.0% of 10.00MiB at 1.23MiB/s ETA 00:20"
echo "[download] 100.0% of 10.00MiB at 2.00MiB/s ETA 00:00"
printf 'payload' > "$out"
exit 0
"#;

        /// yt-dlp stand-in that starts a download and then hangs, for
        /// cancellation tests.
        pub const YTDLP_HANGING: &str = r#"#!/bin/sh
if [ "$1" = "-J" ]; then
    echo '{"title": "Hanging Video", "duration": 10.0}'
    exit 0
fi
out=""
prev=""
for a in "$@"; do
    if [ "$prev" = "-o" ]; then out="$a"; fi
    prev="$a"
done
printf 'partial' > "$out"
echo "[download]   5.0% of 10.00MiB at 1.00MiB/s ETA 09:59"
sleep 30
exit 0
"#;

        /// ffmpeg stand-in: copies the -i input to the last argument, so
        /// both transcode and thumbnail stages produce their outputs.
        pub const FFMPEG_OK: &str = r#"#!/bin/sh
in=""
prev=""
out=""
for a in "$@"; do
    if [ "$prev" = "-i" ]; then in="$a"; fi
    prev="$a"
    out="$a"
done
cp "$in" "$out"
exit 0
"#;
    }

    #[cfg(unix)]
    fn stub_manager(dir: &std::path::Path, sink: Arc<RecordingSink>, ytdlp_script: &str) -> JobManager {
        let cfg = FetcherConfig {
            staging_dir: dir.join("stage"),
            ytdlp_bin: stubs::write_stub(dir, "yt-dlp", ytdlp_script),
            ffmpeg_bin: stubs::write_stub(dir, "ffmpeg", stubs::FFMPEG_OK),
            process_timeout_secs: 30,
            thumbnail_timeout_secs: 10,
            upload_retry_delay_secs: 0,
            ..FetcherConfig::default()
        };
        JobManager::new(cfg, sink)
    }

    #[tokio::test]
    async fn test_submit_rejects_invalid_url() {
        let sink = RecordingSink::new(0);
        let manager = JobManager::new(FetcherConfig::default(), sink);
        let err = manager.submit(RequesterId(1), "not a url", "480").unwrap_err();
        assert!(matches!(err, SubmitError::InvalidUrl(_)));
        let err = manager.submit(RequesterId(1), "ftp://example.com/x", "480").unwrap_err();
        assert!(matches!(err, SubmitError::InvalidUrl(_)));
    }

    #[tokio::test]
    async fn test_submit_rejects_unknown_quality() {
        let sink = RecordingSink::new(0);
        let manager = JobManager::new(FetcherConfig::default(), sink);
        let err = manager.submit(RequesterId(1), "https://example.com/v", "1080").unwrap_err();
        assert_eq!(err, SubmitError::InvalidQuality("1080".to_string()));
    }

    #[tokio::test]
    async fn test_cancel_with_no_active_job() {
        let sink = RecordingSink::new(0);
        let manager = JobManager::new(FetcherConfig::default(), sink);
        assert_eq!(manager.cancel(RequesterId(9)), CancelAck::NothingToCancel);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_end_to_end_success() {
        let dir = tempfile::tempdir().unwrap();
        let sink = RecordingSink::new(0);
        let manager = stub_manager(dir.path(), sink.clone(), stubs::YTDLP_OK);

        let handle = manager.submit(RequesterId(1), "https://example.com/watch?v=x", "480").unwrap();
        assert_eq!(handle.outcome().await, JobOutcome::Done);

        // All quality tiers are acceptable selectors
        for q in ["360", "720"] {
            let handle = manager.submit(RequesterId(1), "https://example.com/watch?v=x", q).unwrap();
            assert_eq!(handle.outcome().await, JobOutcome::Done);
        }

        // No artifacts remain after Done
        let store = manager.artifact_store();
        let paths = store.paths_for("Stub: Video/One");
        assert!(!paths.temp.exists());
        assert!(!paths.final_file.exists());
        assert!(!paths.thumbnail.exists());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_status_progression_order() {
        let dir = tempfile::tempdir().unwrap();
        let sink = RecordingSink::new(0);
        let manager = stub_manager(dir.path(), sink.clone(), stubs::YTDLP_OK);

        let handle = manager.submit(RequesterId(1), "https://example.com/watch?v=x", "480").unwrap();
        assert_eq!(handle.outcome().await, JobOutcome::Done);

        let fetching = sink.first_index_containing("Fetching").unwrap();
        let transcoding = sink.first_index_containing("Transcoding").unwrap();
        let thumbnail = sink.first_index_containing("thumbnail").unwrap();
        let uploading = sink.first_index_containing("Uploading").unwrap();
        let done = sink.first_index_containing("Done").unwrap();
        assert!(fetching < transcoding);
        assert!(transcoding < thumbnail);
        assert!(thumbnail < uploading);
        assert!(uploading < done);

        // Throttled fetch progress: 0, 55 and 100 pass, 42 does not
        let reports = sink.reports();
        assert!(reports.iter().any(|r| r.contains("55%")));
        assert!(reports.iter().any(|r| r.contains("100%")));
        assert!(!reports.iter().any(|r| r.contains("42%")));

        // Exactly one terminal message, and it is the last one
        assert_eq!(done, reports.len() - 1);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_second_submit_rejected_while_active() {
        let dir = tempfile::tempdir().unwrap();
        let sink = RecordingSink::new(0);
        let manager = stub_manager(dir.path(), sink.clone(), stubs::YTDLP_HANGING);

        let handle = manager.submit(RequesterId(1), "https://example.com/watch?v=x", "360").unwrap();
        let err = manager.submit(RequesterId(1), "https://example.com/other", "480").unwrap_err();
        assert_eq!(err, SubmitError::AlreadyActive);

        // A different requester is unaffected
        assert_eq!(manager.cancel(RequesterId(2)), CancelAck::NothingToCancel);

        assert_eq!(manager.cancel(RequesterId(1)), CancelAck::Requested);
        assert_eq!(handle.outcome().await, JobOutcome::Cancelled);

        // Slot is free again after the terminal state
        let handle = manager.submit(RequesterId(1), "https://example.com/watch?v=x", "480").unwrap();
        manager.cancel(RequesterId(1));
        handle.outcome().await;
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_cancel_during_fetch_removes_partial_temp() {
        let dir = tempfile::tempdir().unwrap();
        let sink = RecordingSink::new(0);
        let manager = stub_manager(dir.path(), sink.clone(), stubs::YTDLP_HANGING);

        let handle = manager.submit(RequesterId(1), "https://example.com/watch?v=x", "480").unwrap();

        // Wait until the fetch stage has produced its partial file
        let temp = manager.artifact_store().paths_for("Hanging Video").temp;
        for _ in 0..100 {
            if temp.exists() {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        }
        assert!(temp.exists(), "stub fetch never started");

        assert_eq!(manager.cancel(RequesterId(1)), CancelAck::Requested);
        assert_eq!(handle.outcome().await, JobOutcome::Cancelled);
        assert!(!temp.exists(), "partial temp file survived cancellation");

        let reports = sink.reports();
        assert!(reports.last().unwrap().contains("Cancelled"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_upload_retries_then_succeeds() {
        let dir = tempfile::tempdir().unwrap();
        let sink = RecordingSink::new(2);
        let manager = stub_manager(dir.path(), sink.clone(), stubs::YTDLP_OK);

        let handle = manager.submit(RequesterId(1), "https://example.com/watch?v=x", "480").unwrap();
        assert_eq!(handle.outcome().await, JobOutcome::Done);
        assert_eq!(sink.deliver_calls.load(Ordering::SeqCst), 3);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_upload_exhaustion_keeps_final_file() {
        let dir = tempfile::tempdir().unwrap();
        let sink = RecordingSink::new(u32::MAX);
        let manager = stub_manager(dir.path(), sink.clone(), stubs::YTDLP_OK);

        let handle = manager.submit(RequesterId(1), "https://example.com/watch?v=x", "480").unwrap();
        match handle.outcome().await {
            JobOutcome::Failed(reason) => assert!(reason.contains("3 attempts")),
            other => panic!("expected failure, got {other:?}"),
        }
        assert_eq!(sink.deliver_calls.load(Ordering::SeqCst), 3);

        // Temp and thumbnail cleaned, final retained for manual recovery
        let paths = manager.artifact_store().paths_for("Stub: Video/One");
        assert!(!paths.temp.exists());
        assert!(!paths.thumbnail.exists());
        assert!(paths.final_file.exists());
        assert!(sink.reports().last().unwrap().contains("Kept local file"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_info_failure_reports_tool_error() {
        let dir = tempfile::tempdir().unwrap();
        let sink = RecordingSink::new(0);
        let bad_info = "#!/bin/sh\necho 'ERROR: video unavailable' 1>&2\nexit 1\n";
        let manager = stub_manager(dir.path(), sink.clone(), bad_info);

        let handle = manager.submit(RequesterId(1), "https://example.com/watch?v=x", "480").unwrap();
        match handle.outcome().await {
            JobOutcome::Failed(reason) => assert!(reason.contains("video unavailable")),
            other => panic!("expected failure, got {other:?}"),
        }
        // Exactly one terminal message and no stage messages after it
        let reports = sink.reports();
        assert!(reports.last().unwrap().contains("video unavailable"));
        assert!(!reports.iter().any(|r| r.contains("Fetching")));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_missing_thumbnail_is_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let sink = RecordingSink::new(0);
        let manager = {
            // ffmpeg stub that fails for thumbnail extraction (-ss present)
            // but succeeds for the transcode
            let script = r#"#!/bin/sh
case "$*" in
    *-ss*) exit 1 ;;
esac
in=""
prev=""
out=""
for a in "$@"; do
    if [ "$prev" = "-i" ]; then in="$a"; fi
    prev="$a"
    out="$a"
done
cp "$in" "$out"
exit 0
"#;
            let cfg = FetcherConfig {
                staging_dir: dir.path().join("stage"),
                ytdlp_bin: stubs::write_stub(dir.path(), "yt-dlp", stubs::YTDLP_OK),
                ffmpeg_bin: stubs::write_stub(dir.path(), "ffmpeg", script),
                process_timeout_secs: 30,
                thumbnail_timeout_secs: 5,
                upload_retry_delay_secs: 0,
                ..FetcherConfig::default()
            };
            JobManager::new(cfg, sink.clone())
        };

        let handle = manager.submit(RequesterId(1), "https://example.com/watch?v=x", "480").unwrap();
        assert_eq!(handle.outcome().await, JobOutcome::Done);
    }
}
