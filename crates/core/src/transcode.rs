use std::{
    path::{Path, PathBuf},
    process::Stdio,
};

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{info, warn};

use crate::{
    config::CompressionProfile,
    error::{CoachError, Result},
};

/// Subtitle style handed to ffmpeg's `force_style`.
pub const SUBTITLE_STYLE: &str =
    "FontSize=24,PrimaryColour=&H00FFFFFF,BackColour=&H80000000,BorderStyle=3";

/// Result of a best-effort compression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Compression {
    /// File to use downstream: the compressed output, or the untouched input.
    pub path: PathBuf,
    /// Set when compression was skipped and the original file is used.
    pub warning: Option<String>,
}

impl Compression {
    pub fn is_degraded(&self) -> bool {
        self.warning.is_some()
    }
}

#[async_trait]
pub trait Transcoder: Send + Sync {
    /// Never fails: on any error the input path comes back with a warning.
    async fn compress(&self, input: &Path, output: &Path) -> Compression;

    async fn burn_subtitles(&self, video: &Path, subtitles: &Path, output: &Path) -> Result<()>;
}

pub struct FfmpegTranscoder {
    binary: PathBuf,
    profile: CompressionProfile,
}

/// Find ffmpeg on PATH, falling back to the bare name.
pub fn find_ffmpeg() -> PathBuf {
    which::which("ffmpeg").unwrap_or_else(|_| PathBuf::from("ffmpeg"))
}

/// Escape a path for use inside an ffmpeg filter argument.
pub fn escape_filter_path(path: &Path) -> String {
    let mut escaped = String::new();
    for c in path.to_string_lossy().chars() {
        match c {
            '\\' => escaped.push_str("\\\\"),
            ':' => escaped.push_str("\\:"),
            '\'' => escaped.push_str("\\'"),
            c => escaped.push(c),
        }
    }
    escaped
}

impl FfmpegTranscoder {
    pub fn new(profile: CompressionProfile) -> Self {
        Self::with_binary(find_ffmpeg(), profile)
    }

    pub fn with_binary(binary: impl Into<PathBuf>, profile: CompressionProfile) -> Self {
        Self {
            binary: binary.into(),
            profile,
        }
    }

    async fn run(&self, input: &Path, args: &[String]) -> Result<()> {
        let output = Command::new(&self.binary)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .output()
            .await
            .map_err(|e| CoachError::TranscodeFailed {
                input: input.to_path_buf(),
                reason: format!("could not start {}: {}", self.binary.display(), e),
            })?;

        if !output.status.success() {
            return Err(CoachError::TranscodeFailed {
                input: input.to_path_buf(),
                reason: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(())
    }

    pub fn compress_args(&self, input: &Path, output: &Path) -> Vec<String> {
        vec![
            "-y".to_string(),
            "-i".to_string(),
            input.to_string_lossy().to_string(),
            "-vf".to_string(),
            format!("scale=-2:{}", self.profile.height),
            "-b:v".to_string(),
            self.profile.video_bitrate.clone(),
            "-c:a".to_string(),
            self.profile.audio_codec.clone(),
            "-b:a".to_string(),
            self.profile.audio_bitrate.clone(),
            output.to_string_lossy().to_string(),
        ]
    }

    pub fn burn_args(&self, video: &Path, subtitles: &Path, output: &Path) -> Vec<String> {
        vec![
            "-y".to_string(),
            "-i".to_string(),
            video.to_string_lossy().to_string(),
            "-vf".to_string(),
            format!(
                "subtitles='{}':force_style='{}'",
                escape_filter_path(subtitles),
                SUBTITLE_STYLE
            ),
            "-c:a".to_string(),
            "copy".to_string(),
            output.to_string_lossy().to_string(),
        ]
    }
}

#[async_trait]
impl Transcoder for FfmpegTranscoder {
    async fn compress(&self, input: &Path, output: &Path) -> Compression {
        match self.run(input, &self.compress_args(input, output)).await {
            Ok(()) => {
                info!(input = %input.display(), output = %output.display(), "compressed video");
                Compression {
                    path: output.to_path_buf(),
                    warning: None,
                }
            }
            Err(e) => {
                warn!(input = %input.display(), error = %e, "compression skipped");
                Compression {
                    path: input.to_path_buf(),
                    warning: Some(format!(
                        "Video compression was skipped ({e}). Using original video."
                    )),
                }
            }
        }
    }

    async fn burn_subtitles(&self, video: &Path, subtitles: &Path, output: &Path) -> Result<()> {
        self.run(video, &self.burn_args(video, subtitles, output))
            .await?;
        info!(output = %output.display(), "burned captions into video");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_binary_falls_back_to_input() {
        let transcoder = FfmpegTranscoder::with_binary(
            "/nonexistent/ffmpeg-for-tests",
            CompressionProfile::default(),
        );
        let input = Path::new("/tmp/in.mp4");

        let result = transcoder
            .compress(input, Path::new("/tmp/out.mp4"))
            .await;

        assert_eq!(result.path, input);
        assert!(result.is_degraded());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn non_zero_exit_falls_back_to_input() {
        let transcoder = FfmpegTranscoder::with_binary("false", CompressionProfile::default());
        let input = Path::new("/tmp/in.mp4");

        let result = transcoder
            .compress(input, Path::new("/tmp/out.mp4"))
            .await;

        assert_eq!(result.path, input);
        assert!(result.warning.is_some());
    }

    #[test]
    fn compress_args_follow_profile() {
        let transcoder = FfmpegTranscoder::with_binary("ffmpeg", CompressionProfile::default());
        let args = transcoder.compress_args(Path::new("in.mp4"), Path::new("out.mp4"));
        assert_eq!(
            args,
            [
                "-y", "-i", "in.mp4", "-vf", "scale=-2:480", "-b:v", "800k", "-c:a", "aac",
                "-b:a", "64k", "out.mp4"
            ]
        );
    }

    #[test]
    fn subtitle_path_colons_are_escaped() {
        assert_eq!(
            escape_filter_path(Path::new("C:/work/caps.srt")),
            "C\\:/work/caps.srt"
        );

        let transcoder = FfmpegTranscoder::with_binary("ffmpeg", CompressionProfile::default());
        let args = transcoder.burn_args(
            Path::new("v.mp4"),
            Path::new("/a:b/c.srt"),
            Path::new("o.mp4"),
        );
        assert!(args[4].starts_with("subtitles='/a\\:b/c.srt':force_style='FontSize=24"));
    }
}
