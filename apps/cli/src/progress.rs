use std::{
    sync::Mutex,
    time::{Duration, Instant},
};

use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use rollcoach_core::{ProgressSink, Stage};

pub fn format_duration(d: Duration) -> String {
    let secs = d.as_secs_f64();
    if secs < 60.0 {
        format!("{:.1}s", secs)
    } else {
        format!("{:.0}m {:.0}s", (secs / 60.0).floor(), secs % 60.0)
    }
}

pub fn create_spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .tick_chars("⠁⠂⠄⡀⢀⠠⠐⠈ ")
            .template("{spinner:.cyan} {msg}")
            .unwrap(),
    );
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(Duration::from_millis(80));
    pb
}

struct ActiveStage {
    spinner: ProgressBar,
    stage: Stage,
    started: Instant,
}

/// One spinner per analysis stage; the previous stage is ticked off when
/// the next one starts.
#[derive(Default)]
pub struct SpinnerProgress {
    active: Mutex<Option<ActiveStage>>,
}

impl SpinnerProgress {
    pub fn new() -> Self {
        Self::default()
    }

    fn take(&self) -> Option<ActiveStage> {
        self.active.lock().ok().and_then(|mut active| active.take())
    }

    /// Tick off the last stage.
    pub fn finish(&self) {
        if let Some(active) = self.take() {
            active.spinner.finish_with_message(format!(
                "{} {} {}",
                style("✓").green().bold(),
                active.stage.description().trim_end_matches("..."),
                style(format!("[{}]", format_duration(active.started.elapsed()))).dim()
            ));
        }
    }

    /// Mark the last stage as the one that failed.
    pub fn fail(&self) {
        if let Some(active) = self.take() {
            active.spinner.finish_with_message(format!(
                "{} {}",
                style("✗").red().bold(),
                active.stage.description().trim_end_matches("...")
            ));
        }
    }
}

impl ProgressSink for SpinnerProgress {
    fn stage(&self, stage: Stage) {
        self.finish();
        if let Ok(mut active) = self.active.lock() {
            *active = Some(ActiveStage {
                spinner: create_spinner(stage.description()),
                stage,
                started: Instant::now(),
            });
        }
    }

    fn warning(&self, message: &str) {
        let line = format!("{} {}", style("!").yellow().bold(), style(message).yellow());
        let active = self.active.lock().ok();
        match active.as_ref().and_then(|guard| guard.as_ref()) {
            Some(active) => active.spinner.println(line),
            None => eprintln!("{}", line),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn durations_switch_to_minutes() {
        assert_eq!(format_duration(Duration::from_millis(4200)), "4.2s");
        assert_eq!(format_duration(Duration::from_secs(125)), "2m 5s");
    }
}
