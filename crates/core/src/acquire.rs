use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::{fs, process::Command};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{CoachError, Result};

/// Keep downloads small enough to upload quickly.
pub const DEFAULT_FETCH_FORMAT: &str = "mp4[height<=480]/best[height<=480]";

/// Downloads a video from a URL to a local path.
#[async_trait]
pub trait MediaFetcher: Send + Sync {
    /// Fetch `url` to `target` and return the file actually written. On
    /// failure nothing is left at `target`.
    async fn fetch(&self, url: &str, target: &Path) -> Result<PathBuf>;
}

pub struct YtDlpFetcher {
    binary: PathBuf,
    format: String,
}

impl Default for YtDlpFetcher {
    fn default() -> Self {
        Self::new("yt-dlp", DEFAULT_FETCH_FORMAT)
    }
}

impl YtDlpFetcher {
    pub fn new(binary: impl Into<PathBuf>, format: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
            format: format.into(),
        }
    }
}

#[async_trait]
impl MediaFetcher for YtDlpFetcher {
    async fn fetch(&self, url: &str, target: &Path) -> Result<PathBuf> {
        info!(url, target = %target.display(), "downloading video");
        let output = Command::new(&self.binary)
            .arg(url)
            .arg("--no-playlist")
            .arg("--force-overwrites")
            .arg("--no-part")
            .arg("--print")
            .arg("after_move:filepath")
            .arg("-f")
            .arg(&self.format)
            .arg("-o")
            .arg(target)
            .output()
            .await
            .map_err(|e| CoachError::DownloadFailed {
                url: url.to_string(),
                reason: format!("could not start {}: {}", self.binary.display(), e),
            })?;

        if !output.status.success() {
            let _ = fs::remove_file(target).await;
            return Err(CoachError::DownloadFailed {
                url: url.to_string(),
                reason: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let stdout_str = String::from_utf8_lossy(output.stdout.as_slice());
        let printed = stdout_str.lines().last().map(str::trim).unwrap_or_default();
        let path = if printed.is_empty() {
            target.to_path_buf()
        } else {
            PathBuf::from(printed)
        };

        match fs::metadata(&path).await {
            Ok(meta) if meta.is_file() && meta.len() > 0 => {
                debug!(path = %path.display(), size = meta.len(), "download verified");
                Ok(path)
            }
            _ => {
                let _ = fs::remove_file(&path).await;
                Err(CoachError::DownloadFailed {
                    url: url.to_string(),
                    reason: "downloader reported success but produced no file".to_string(),
                })
            }
        }
    }
}

/// Create a fresh directory for one acquired video under `root`.
pub async fn create_work_dir(root: &Path) -> Result<PathBuf> {
    let dir = root.join(Uuid::new_v4().to_string());
    fs::create_dir_all(&dir).await?;
    Ok(dir)
}

/// File name for an uploaded video, keeping a known extension.
pub fn upload_file_name(original: Option<&str>) -> String {
    let ext = original
        .and_then(|name| Path::new(name).extension())
        .map(|e| e.to_string_lossy().to_lowercase())
        .filter(|e| matches!(e.as_str(), "mp4" | "mov" | "avi" | "mkv" | "webm"))
        .unwrap_or_else(|| "mp4".to_string());
    format!("upload.{}", ext)
}
