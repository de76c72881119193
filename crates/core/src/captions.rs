//! Timestamped captions: parsing, SRT rendering and burning into the video.

use std::path::{Path, PathBuf};

use tracing::warn;

use crate::{tracker::LocalResourceTracker, transcode::Transcoder, types::CaptionEntry};

/// Parse `MM:SS` or `H:MM:SS` into seconds. Anything else is 0.
pub fn parse_timestamp(ts: &str) -> f64 {
    let parts: Vec<&str> = ts.trim().split(':').collect();
    let numbers: Option<Vec<f64>> = parts
        .iter()
        .map(|p| p.trim().parse::<f64>().ok().filter(|v| v.is_finite() && *v >= 0.0))
        .collect();

    match numbers.as_deref() {
        Some([m, s]) => m * 60.0 + s,
        Some([h, m, s]) => h * 3600.0 + m * 60.0 + s,
        _ => 0.0,
    }
}

impl CaptionEntry {
    pub fn from_raw(
        timestamp: impl Into<String>,
        text: impl Into<String>,
        duration_secs: f64,
    ) -> Self {
        let timestamp = timestamp.into();
        Self {
            start_secs: parse_timestamp(&timestamp),
            timestamp,
            duration_secs,
            text: text.into(),
        }
    }
}

/// Format seconds as an SRT cue time, `HH:MM:SS,mmm`.
pub fn format_srt_time(seconds: f64) -> String {
    let total_ms = (seconds.max(0.0) * 1000.0).round() as u64;
    let hours = total_ms / 3_600_000;
    let mins = (total_ms % 3_600_000) / 60_000;
    let secs = (total_ms % 60_000) / 1000;
    let ms = total_ms % 1000;
    format!("{:02}:{:02}:{:02},{:03}", hours, mins, secs, ms)
}

/// Render captions as an SRT document, in the order given.
pub fn to_srt(captions: &[CaptionEntry]) -> String {
    let mut output = String::new();
    for (i, caption) in captions.iter().enumerate() {
        output.push_str(&format!("{}\n", i + 1));
        output.push_str(&format!(
            "{} --> {}\n",
            format_srt_time(caption.start_secs),
            format_srt_time(caption.end_secs())
        ));
        output.push_str(caption.text.trim());
        output.push_str("\n\n");
    }
    output
}

/// Outcome of the caption step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptionOutcome {
    Burned(PathBuf),
    Skipped { warning: String },
}

/// Write the subtitle track next to `video` and burn it in.
///
/// Every file written is tracked. A failed burn leaves the video without
/// captions and reports a warning instead of an error.
pub async fn burn_captions<T>(
    transcoder: &T,
    tracker: &mut LocalResourceTracker,
    video: &Path,
    captions: &[CaptionEntry],
    work_dir: &Path,
) -> CaptionOutcome
where
    T: Transcoder + ?Sized,
{
    if captions.is_empty() {
        return CaptionOutcome::Skipped {
            warning: "The analysis returned no captions.".to_string(),
        };
    }

    if captions
        .windows(2)
        .any(|pair| pair[1].start_secs < pair[0].start_secs)
    {
        warn!(count = captions.len(), "captions are not in timestamp order");
    }

    let srt_path = work_dir.join("captions.srt");
    tracker.track(&srt_path);
    if let Err(e) = tokio::fs::write(&srt_path, to_srt(captions)).await {
        warn!(path = %srt_path.display(), error = %e, "could not write subtitle file");
        return CaptionOutcome::Skipped {
            warning: format!("Captions were skipped: {e}"),
        };
    }

    let output = work_dir.join("captioned.mp4");
    tracker.track(&output);
    match transcoder.burn_subtitles(video, &srt_path, &output).await {
        Ok(()) => CaptionOutcome::Burned(output),
        Err(e) => {
            warn!(video = %video.display(), error = %e, "caption burn failed");
            CaptionOutcome::Skipped {
                warning: format!("Captions could not be burned into the video: {e}"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::{
        error::{CoachError, Result},
        transcode::Compression,
    };

    #[test]
    fn parses_minutes_and_hours() {
        assert_eq!(parse_timestamp("01:30"), 90.0);
        assert_eq!(parse_timestamp("00:01:30"), 90.0);
        assert_eq!(parse_timestamp("1:02:03"), 3723.0);
        assert_eq!(parse_timestamp(" 2:05 "), 125.0);
    }

    #[test]
    fn malformed_timestamps_are_zero() {
        assert_eq!(parse_timestamp("bad"), 0.0);
        assert_eq!(parse_timestamp(""), 0.0);
        assert_eq!(parse_timestamp("90"), 0.0);
        assert_eq!(parse_timestamp("1:2:3:4"), 0.0);
        assert_eq!(parse_timestamp("-1:30"), 0.0);
    }

    #[test]
    fn srt_uses_fixed_duration_and_keeps_bad_cues() {
        let captions = vec![
            CaptionEntry::from_raw("00:05", "Guard pull", 4.0),
            CaptionEntry::from_raw("oops", "Still rendered", 4.0),
        ];

        let srt = to_srt(&captions);
        assert_eq!(
            srt,
            "1\n00:00:05,000 --> 00:00:09,000\nGuard pull\n\n\
             2\n00:00:00,000 --> 00:00:04,000\nStill rendered\n\n"
        );
    }

    #[test]
    fn srt_time_rolls_into_hours() {
        assert_eq!(format_srt_time(3723.5), "01:02:03,500");
    }

    struct FailingBurn;

    #[async_trait]
    impl Transcoder for FailingBurn {
        async fn compress(&self, input: &Path, _output: &Path) -> Compression {
            Compression {
                path: input.to_path_buf(),
                warning: None,
            }
        }

        async fn burn_subtitles(&self, video: &Path, _subs: &Path, _out: &Path) -> Result<()> {
            Err(CoachError::TranscodeFailed {
                input: video.to_path_buf(),
                reason: "exit 1".into(),
            })
        }
    }

    #[tokio::test]
    async fn burn_failure_is_a_warning_and_files_stay_tracked() {
        let dir = tempfile::tempdir().unwrap();
        let mut tracker = LocalResourceTracker::new();
        let captions = vec![CaptionEntry::from_raw("00:01", "Frame", 4.0)];

        let outcome = burn_captions(
            &FailingBurn,
            &mut tracker,
            &dir.path().join("v.mp4"),
            &captions,
            dir.path(),
        )
        .await;

        assert!(matches!(outcome, CaptionOutcome::Skipped { .. }));
        assert!(tracker.contains(&dir.path().join("captions.srt")));
        assert!(dir.path().join("captions.srt").exists());
    }
}
