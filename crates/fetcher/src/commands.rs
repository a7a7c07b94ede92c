use std::path::Path;
use crate::config::FetcherConfig;
use crate::quality::Quality;
use crate::runner::CommandSpec;

/// Builder for the external tool invocations of each stage
pub struct CommandBuilder<'a> {
    cfg: &'a FetcherConfig,
}

impl<'a> CommandBuilder<'a> {
    pub fn new(cfg: &'a FetcherConfig) -> Self {
        CommandBuilder { cfg }
    }

    /// Metadata lookup: dump the source's info JSON without downloading
    pub fn build_info_command(&self, url: &str) -> CommandSpec {
        let args = vec![
            "-J".to_string(),
            "--no-warnings".to_string(),
            "--no-playlist".to_string(),
            url.to_string(),
        ];
        CommandSpec::new(&self.cfg.ytdlp_bin, args, self.cfg.process_timeout())
    }

    /// Fetch stage: download into the temp path at the requested quality
    /// ceiling, playlist expansion disabled, mp4 container forced, the
    /// transfer delegated to aria2c with configured concurrency and
    /// chunk size, progress flushed line by line.
    pub fn build_fetch_command(&self, url: &str, quality: Quality, temp_path: &Path) -> CommandSpec {
        let args = vec![
            "-f".to_string(),
            quality.format_selector(),
            "-o".to_string(),
            temp_path.to_string_lossy().to_string(),
            "--no-warnings".to_string(),
            "--newline".to_string(),
            "--no-playlist".to_string(),
            "--merge-output-format".to_string(),
            "mp4".to_string(),
            "--external-downloader".to_string(),
            "aria2c".to_string(),
            "--external-downloader-args".to_string(),
            format!("-x {} -k {}", self.cfg.aria2c_connections, self.cfg.aria2c_chunk_size),
            url.to_string(),
        ];
        CommandSpec::new(&self.cfg.ytdlp_bin, args, self.cfg.process_timeout())
    }

    /// Transcode stage: re-encode to H.264 constant quality with the
    /// fast preset and the broadly compatible yuv420p pixel format,
    /// audio re-encoded to AAC at a fixed bitrate.
    pub fn build_transcode_command(&self, temp_path: &Path, final_path: &Path) -> CommandSpec {
        let args = vec![
            "-y".to_string(),
            "-i".to_string(),
            temp_path.to_string_lossy().to_string(),
            "-c:v".to_string(),
            "libx264".to_string(),
            "-crf".to_string(),
            "23".to_string(),
            "-preset".to_string(),
            "fast".to_string(),
            "-pix_fmt".to_string(),
            "yuv420p".to_string(),
            "-c:a".to_string(),
            "aac".to_string(),
            "-b:a".to_string(),
            "128k".to_string(),
            final_path.to_string_lossy().to_string(),
        ];
        CommandSpec::new(&self.cfg.ffmpeg_bin, args, self.cfg.process_timeout())
    }

    /// Thumbnail stage: a single frame one second into the final file
    pub fn build_thumbnail_command(&self, final_path: &Path, thumb_path: &Path) -> CommandSpec {
        let args = vec![
            "-y".to_string(),
            "-i".to_string(),
            final_path.to_string_lossy().to_string(),
            "-ss".to_string(),
            "00:00:01".to_string(),
            "-vframes".to_string(),
            "1".to_string(),
            thumb_path.to_string_lossy().to_string(),
        ];
        CommandSpec::new(&self.cfg.ffmpeg_bin, args, self.cfg.thumbnail_timeout())
    }
}
