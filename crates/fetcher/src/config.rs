use std::path::{Path, PathBuf};
use std::time::Duration;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Configuration for the fetch/transcode orchestrator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetcherConfig {
    /// Staging directory for temp/final/thumbnail artifacts
    pub staging_dir: PathBuf,
    /// Path to the yt-dlp binary
    pub ytdlp_bin: PathBuf,
    /// Path to the ffmpeg binary
    pub ffmpeg_bin: PathBuf,
    /// Wall-clock bound in seconds for fetch and transcode invocations
    pub process_timeout_secs: u64,
    /// Wall-clock bound in seconds for thumbnail extraction (non-fatal on expiry)
    pub thumbnail_timeout_secs: u64,
    /// Maximum number of upload attempts per job
    pub upload_attempts: u32,
    /// Fixed delay in seconds between failed upload attempts
    pub upload_retry_delay_secs: u64,
    /// Connection count passed to the external aria2c downloader (-x)
    pub aria2c_connections: u32,
    /// Chunk size passed to the external aria2c downloader (-k)
    pub aria2c_chunk_size: String,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self::default_config()
    }
}

impl FetcherConfig {
    /// Create a default configuration with sensible values
    pub fn default_config() -> Self {
        Self {
            staging_dir: PathBuf::from("downloads"),
            ytdlp_bin: PathBuf::from("yt-dlp"),
            ffmpeg_bin: PathBuf::from("ffmpeg"),
            process_timeout_secs: 6000,
            thumbnail_timeout_secs: 30,
            upload_attempts: 3,
            upload_retry_delay_secs: 5,
            aria2c_connections: 4,
            aria2c_chunk_size: "1M".to_string(),
        }
    }

    /// Load configuration from a file, or return defaults if path is None or file doesn't exist
    pub fn load_config(path: Option<&Path>) -> Result<Self> {
        let mut config = Self::default_config();

        if let Some(config_path) = path {
            if config_path.exists() {
                let content = std::fs::read_to_string(config_path)
                    .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

                // Try TOML by extension, JSON otherwise
                if config_path.extension().and_then(|s| s.to_str()) == Some("toml") {
                    let file_config: FetcherConfig = toml::from_str(&content)
                        .with_context(|| format!("Failed to parse TOML config: {}", config_path.display()))?;
                    config = file_config;
                } else {
                    let file_config: FetcherConfig = serde_json::from_str(&content)
                        .with_context(|| format!("Failed to parse JSON config: {}", config_path.display()))?;
                    config = file_config;
                }
            }
        }

        Ok(config)
    }

    /// Wall-clock bound for fetch/transcode process invocations
    pub fn process_timeout(&self) -> Duration {
        Duration::from_secs(self.process_timeout_secs)
    }

    /// Wall-clock bound for thumbnail extraction
    pub fn thumbnail_timeout(&self) -> Duration {
        Duration::from_secs(self.thumbnail_timeout_secs)
    }

    /// Fixed delay between failed upload attempts
    pub fn upload_retry_delay(&self) -> Duration {
        Duration::from_secs(self.upload_retry_delay_secs)
    }
}
