//! Progress reporting while a round runs

use chorus_domain::{DiscussionEvent, StreamFrame};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

/// Spinner shown while members are answering.
///
/// Printing goes through [`RoundProgress::println`] so output lines are
/// never torn by the spinner redraw.
pub struct RoundProgress {
    bar: Option<ProgressBar>,
    replies: u64,
    failures: u64,
}

impl RoundProgress {
    /// A spinner when `enabled`, otherwise a pass-through printer.
    pub fn new(enabled: bool, label: &str) -> Self {
        let bar = enabled.then(|| {
            let bar = ProgressBar::new_spinner();
            bar.set_style(Self::spinner_style());
            bar.set_prefix(label.to_string());
            bar.set_message("waiting for members...");
            bar.enable_steady_tick(Duration::from_millis(120));
            bar
        });
        Self {
            bar,
            replies: 0,
            failures: 0,
        }
    }

    /// A printer without spinner.
    pub fn hidden() -> Self {
        Self::new(false, "")
    }

    fn spinner_style() -> ProgressStyle {
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {prefix:.bold.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
    }

    /// Update counters from a frame.
    pub fn on_frame(&mut self, frame: &StreamFrame) {
        match &frame.event {
            DiscussionEvent::Message { .. } => self.replies += 1,
            DiscussionEvent::Error { .. } => self.failures += 1,
            DiscussionEvent::Stats { .. } => return,
        }
        if let Some(bar) = &self.bar {
            let mut status = format!("{} {}", self.replies, "received".green());
            if self.failures > 0 {
                status.push_str(&format!(", {} {}", self.failures, "failed".red()));
            }
            bar.set_message(status);
        }
    }

    pub fn println(&self, text: &str) {
        match &self.bar {
            Some(bar) => bar.suspend(|| print!("{}", text)),
            None => print!("{}", text),
        }
    }

    pub fn set_message(&self, message: &str) {
        if let Some(bar) = &self.bar {
            bar.set_message(message.to_string());
        }
    }

    pub fn replies(&self) -> u64 {
        self.replies
    }

    pub fn failures(&self) -> u64 {
        self.failures
    }

    pub fn finish(&self) {
        if let Some(bar) = &self.bar {
            bar.finish_and_clear();
        }
    }
}

impl Drop for RoundProgress {
    fn drop(&mut self) {
        self.finish();
    }
}
