use std::{path::PathBuf, time::Duration};

use crate::error::{CoachError, Result};

pub const DEFAULT_MODEL: &str = "gemini-2.5-pro";
pub const POLL_INTERVAL: Duration = Duration::from_secs(2);
pub const PROCESSING_TIMEOUT: Duration = Duration::from_secs(300);
pub const HISTORY_CAP: usize = 50;
pub const CHAT_WINDOW: usize = 10;
pub const CAPTION_DURATION_SECS: f64 = 4.0;

/// Which shape of output the analysis request asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReportMode {
    /// Free-form markdown report.
    #[default]
    Plain,
    /// JSON with a caption list and a report string; captions get burned in.
    Captioned,
}

/// Target profile for the pre-upload transcode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompressionProfile {
    pub height: u32,
    pub video_bitrate: String,
    pub audio_codec: String,
    pub audio_bitrate: String,
}

impl Default for CompressionProfile {
    fn default() -> Self {
        Self {
            height: 480,
            video_bitrate: "800k".to_string(),
            audio_codec: "aac".to_string(),
            audio_bitrate: "64k".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CoachConfig {
    pub model: String,
    pub poll_interval: Duration,
    pub processing_timeout: Duration,
    pub history_cap: usize,
    pub chat_window: usize,
    pub caption_duration_secs: f64,
    pub compression: CompressionProfile,
    pub report_mode: ReportMode,
    pub work_root: PathBuf,
}

impl Default for CoachConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            poll_interval: POLL_INTERVAL,
            processing_timeout: PROCESSING_TIMEOUT,
            history_cap: HISTORY_CAP,
            chat_window: CHAT_WINDOW,
            caption_duration_secs: CAPTION_DURATION_SECS,
            compression: CompressionProfile::default(),
            report_mode: ReportMode::default(),
            work_root: get_root_work_dir(),
        }
    }
}

impl CoachConfig {
    pub fn validate(&self) -> Result<()> {
        let invalid = |reason: &str| {
            Err(CoachError::InvalidConfig {
                reason: reason.to_string(),
            })
        };

        if self.model.trim().is_empty() {
            return invalid("model id must not be empty");
        }
        if self.poll_interval.is_zero() {
            return invalid("poll interval must be > 0");
        }
        if self.processing_timeout.is_zero() {
            return invalid("processing timeout must be > 0");
        }
        if self.history_cap == 0 {
            return invalid("history cap must be > 0");
        }
        if self.chat_window == 0 {
            return invalid("chat window must be > 0");
        }
        if self.caption_duration_secs <= 0.0 {
            return invalid("caption duration must be > 0");
        }
        if self.compression.height == 0 {
            return invalid("compression height must be > 0");
        }
        Ok(())
    }
}

/// Root directory under which every session keeps its scratch files.
pub fn get_root_work_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from("/tmp"))
        .join("rollcoach")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let cfg = CoachConfig::default();
        cfg.validate().unwrap();
        assert_eq!(cfg.poll_interval, Duration::from_secs(2));
        assert_eq!(cfg.compression.height, 480);
        assert!(cfg.work_root.ends_with("rollcoach"));
    }

    #[test]
    fn zero_window_is_rejected() {
        let cfg = CoachConfig {
            chat_window: 0,
            ..CoachConfig::default()
        };
        assert!(matches!(
            cfg.validate(),
            Err(CoachError::InvalidConfig { .. })
        ));
    }
}
