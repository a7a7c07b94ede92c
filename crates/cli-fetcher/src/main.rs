use anyhow::{Context, Result};
use async_trait::async_trait;
use clap::Parser;
use fetcher::{
    config::FetcherConfig,
    job::{JobOutcome, RequesterId},
    manager::{CancelAck, JobManager},
    sink::{Delivery, StatusSink, UploadProgressFn},
};
use log::{info, warn};
use std::path::PathBuf;
use std::sync::Arc;

/// Remote media fetch-and-transcode pipeline
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Media URL to fetch
    url: String,

    /// Quality tier: 360, 480 or 720
    #[arg(short, long, default_value = "480")]
    quality: String,

    /// Path to configuration file (JSON or TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Move the finished file here instead of leaving it in the staging directory
    #[arg(short, long)]
    output_dir: Option<PathBuf>,
}

/// Terminal-backed status sink: progress goes to stdout, delivery is a
/// move into the output directory.
struct ConsoleSink {
    output_dir: Option<PathBuf>,
}

#[async_trait]
impl StatusSink for ConsoleSink {
    async fn report(&self, _requester: RequesterId, text: &str) {
        // Status texts are multi-line; print them as one block
        println!("{text}\n");
    }

    async fn deliver_file(
        &self,
        _requester: RequesterId,
        delivery: &Delivery,
        progress: UploadProgressFn,
    ) -> Result<()> {
        let total = std::fs::metadata(&delivery.file_path)
            .with_context(|| format!("Missing finished file: {}", delivery.file_path.display()))?
            .len();

        if let Some(dir) = &self.output_dir {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create output directory: {}", dir.display()))?;
            let file_name = delivery
                .file_path
                .file_name()
                .context("Finished file has no file name")?;
            let dest = dir.join(file_name);
            std::fs::copy(&delivery.file_path, &dest)
                .with_context(|| format!("Failed to copy finished file to {}", dest.display()))?;
            if let Some(thumb) = &delivery.thumbnail {
                if let Some(name) = thumb.file_name() {
                    let _ = std::fs::copy(thumb, dir.join(name));
                }
            }
            info!("Delivered {} -> {}", delivery.file_path.display(), dest.display());
        } else {
            info!("Finished file ready: {}", delivery.file_path.display());
        }

        progress(total, total);
        println!("{}", delivery.caption);
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logger - use RUST_LOG env var or default to info level
    env_logger::Builder::from_default_env()
        .format_timestamp_secs()
        .init();

    let args = Args::parse();

    let cfg = FetcherConfig::load_config(args.config.as_deref()).context("Failed to load configuration")?;

    info!("fetchd starting");
    info!("  Staging dir: {}", cfg.staging_dir.display());
    info!("  Fetch tool: {}", cfg.ytdlp_bin.display());
    info!("  Transcode tool: {}", cfg.ffmpeg_bin.display());
    info!("  Process timeout: {}s", cfg.process_timeout_secs);

    let sink = Arc::new(ConsoleSink {
        output_dir: args.output_dir.clone(),
    });
    let manager = JobManager::new(cfg, sink);

    // Startup recovery: drop intermediates a previous run left behind
    let cleaned = manager
        .artifact_store()
        .sweep_orphaned_temp_files()
        .context("Failed to sweep orphaned temp files on startup")?;
    if cleaned > 0 {
        info!("Startup sweep removed {cleaned} orphaned temp file(s)");
    }

    let requester = RequesterId(0);
    let handle = manager
        .submit(requester, &args.url, &args.quality)
        .context("Job rejected")?;
    info!("Job accepted for {}", args.url);

    // Ctrl-C requests cooperative cancellation; the pipeline cleans up
    // its partial files before exiting
    let cancel_manager = manager.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, cancelling active job");
            if cancel_manager.cancel(requester) == CancelAck::NothingToCancel {
                std::process::exit(130);
            }
        }
    });

    match handle.outcome().await {
        JobOutcome::Done => Ok(()),
        JobOutcome::Cancelled => {
            warn!("Job cancelled");
            std::process::exit(130);
        }
        JobOutcome::Failed(reason) => {
            anyhow::bail!("Job failed: {reason}");
        }
    }
}
