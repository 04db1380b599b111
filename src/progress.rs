use std::time::Duration;

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

const SPINNER_TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];

pub struct ProgressTracker {
    bar: ProgressBar,
    total: Option<u64>,
}

impl ProgressTracker {
    pub fn bar(message: &str, total: u64) -> Self {
        let bar = ProgressBar::with_draw_target(Some(total), ProgressDrawTarget::stderr_with_hz(10));
        if let Ok(style) =
            ProgressStyle::with_template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} {msg}")
        {
            bar.set_style(style.progress_chars("=>-"));
        }
        bar.set_message(message.to_string());
        Self {
            bar,
            total: Some(total),
        }
    }

    pub fn spinner(message: &str, unit: &str) -> Self {
        let bar = ProgressBar::with_draw_target(None, ProgressDrawTarget::stderr_with_hz(20));
        let template = format!("{{spinner:.cyan}} {{msg}} ({{pos}} {unit})");
        if let Ok(style) = ProgressStyle::with_template(&template) {
            bar.set_style(style.tick_strings(SPINNER_TICKS));
        }
        bar.set_message(message.to_string());
        bar.enable_steady_tick(Duration::from_millis(80));
        Self { bar, total: None }
    }

    // Clones share state, so worker threads can tick the same bar.
    pub fn handle(&self) -> ProgressBar {
        self.bar.clone()
    }

    pub fn inc(&self, delta: u64) {
        self.bar.inc(delta);
    }

    pub fn position(&self) -> u64 {
        self.bar.position()
    }

    pub fn finish(self) {
        if let Some(total) = self.total {
            self.bar.set_position(total);
        }
        self.bar.finish_and_clear();
    }
}

// `total` picks a bar; `None` is for phases of unknown length.
pub fn progress_for_phase(
    message: &str,
    unit: &str,
    total: Option<u64>,
    no_progress: bool,
) -> Option<ProgressTracker> {
    if no_progress {
        return None;
    }
    Some(match total {
        Some(total) if total > 0 => ProgressTracker::bar(message, total),
        _ => ProgressTracker::spinner(message, unit),
    })
}
