use std::path::{Path, PathBuf};
use anyhow::{Context, Result};
use log::{debug, info, warn};
use walkdir::WalkDir;

/// Characters that are unsafe in filenames on the filesystems we stage to
const UNSAFE_CHARS: &[char] = &['\\', '/', ':', '"', '*', '?', '<', '>', '|'];

/// Suffix used for in-flight download intermediates
const TEMP_SUFFIX: &str = "_temp.mp4";

/// Sanitize a media title for use as a file stem.
///
/// Runs of filesystem-unsafe characters collapse to a single underscore,
/// so `a/b\c` and `a//b` both stay unambiguous single-component names.
pub fn sanitize_title(title: &str) -> String {
    let mut out = String::with_capacity(title.len());
    let mut last_was_sub = false;
    for ch in title.chars() {
        if UNSAFE_CHARS.contains(&ch) {
            if !last_was_sub {
                out.push('_');
                last_was_sub = true;
            }
        } else {
            out.push(ch);
            last_was_sub = false;
        }
    }
    out
}

/// Derived filesystem locations for one job's artifacts.
/// Temp and final paths are distinct by construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactPaths {
    pub temp: PathBuf,
    pub final_file: PathBuf,
    pub thumbnail: PathBuf,
}

/// Filesystem staging area shared by all jobs.
///
/// Paths are derived deterministically from the sanitized title, so two
/// jobs only collide if their sanitized titles are identical (accepted
/// out-of-scope risk). The directory itself is created lazily.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    staging_dir: PathBuf,
}

impl ArtifactStore {
    pub fn new(staging_dir: PathBuf) -> Self {
        ArtifactStore { staging_dir }
    }

    pub fn staging_dir(&self) -> &Path {
        &self.staging_dir
    }

    /// Create the staging directory if it does not exist yet
    pub fn ensure_staging(&self) -> Result<()> {
        std::fs::create_dir_all(&self.staging_dir)
            .with_context(|| format!("Failed to create staging directory: {}", self.staging_dir.display()))
    }

    /// Derive the temp/final/thumbnail paths for a job title
    pub fn paths_for(&self, title: &str) -> ArtifactPaths {
        let stem = sanitize_title(title);
        ArtifactPaths {
            temp: self.staging_dir.join(format!("{stem}{TEMP_SUFFIX}")),
            final_file: self.staging_dir.join(format!("{stem}.mp4")),
            thumbnail: self.staging_dir.join(format!("{stem}_thumb.jpg")),
        }
    }

    /// Remove a file if present. Absence is a no-op, not an error.
    pub fn remove_if_exists(&self, path: &Path) -> Result<()> {
        match std::fs::remove_file(path) {
            Ok(()) => {
                debug!("Removed artifact: {}", path.display());
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).with_context(|| format!("Failed to remove artifact: {}", path.display())),
        }
    }

    /// Remove every artifact of a job. Idempotent.
    pub fn remove_all(&self, paths: &ArtifactPaths) -> Result<()> {
        self.remove_if_exists(&paths.temp)?;
        self.remove_if_exists(&paths.final_file)?;
        self.remove_if_exists(&paths.thumbnail)?;
        Ok(())
    }

    /// Remove the intermediate and thumbnail but keep the final file.
    /// Used when the upload retry budget is exhausted, so the delivered
    /// content survives locally for manual recovery.
    pub fn remove_keeping_final(&self, paths: &ArtifactPaths) -> Result<()> {
        self.remove_if_exists(&paths.temp)?;
        self.remove_if_exists(&paths.thumbnail)?;
        Ok(())
    }

    /// Startup sweep: delete `*_temp.mp4` intermediates left behind by a
    /// previous run that died mid-job. Returns the number removed.
    pub fn sweep_orphaned_temp_files(&self) -> Result<usize> {
        if !self.staging_dir.exists() {
            return Ok(0);
        }

        let mut removed = 0;
        for entry in WalkDir::new(&self.staging_dir).max_depth(1).follow_links(false) {
            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    warn!("Error reading staging entry: {}", e);
                    continue;
                }
            };
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            let is_temp = path
                .file_name()
                .and_then(|n| n.to_str())
                .map(|n| n.ends_with(TEMP_SUFFIX))
                .unwrap_or(false);
            if is_temp {
                info!("Removing orphaned temp file: {}", path.display());
                self.remove_if_exists(path)?;
                removed += 1;
            }
        }
        Ok(removed)
    }
}
