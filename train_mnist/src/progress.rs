//! Console reporting for training runs.
//!
//! Messages go to the `log` facade; finished epochs advance an `indicatif`
//! progress bar when the run has an epoch limit.

use indicatif::{ProgressBar, ProgressStyle};
use log::Level;
use std::fmt;
use training::{Channel, Diagnostics, LogDiagnostics};

/// Forwards messages to [`LogDiagnostics`] and shows epoch progress.
pub struct ProgressDiagnostics {
    log: LogDiagnostics,
    epochs: ProgressBar,
}

impl ProgressDiagnostics {
    pub fn new() -> Self {
        Self::with_bar(ProgressBar::new(0))
    }

    pub fn with_bar(epochs: ProgressBar) -> Self {
        epochs.set_style(create_progress_style(
            "{spinner:.green} [{elapsed_precise}] {bar:40.cyan/blue} {pos:>4}/{len:4} Epoch {msg}",
        ));
        Self {
            log: LogDiagnostics,
            epochs,
        }
    }

    pub fn finish(&self) {
        self.epochs.finish_and_clear();
    }
}

impl Default for ProgressDiagnostics {
    fn default() -> Self {
        Self::new()
    }
}

impl Diagnostics for ProgressDiagnostics {
    fn emit(&self, channel: Channel, level: Level, args: fmt::Arguments<'_>) {
        // keep log lines from tearing through the bar
        self.epochs.suspend(|| self.log.emit(channel, level, args));
    }

    fn epoch_finished(&self, epoch: usize, max_epochs: Option<usize>) {
        let Some(max) = max_epochs else {
            return;
        };
        // a new run restarts the bar
        if epoch == 1 {
            self.epochs.reset();
            self.epochs.set_length(max as u64);
        }
        self.epochs.set_position(epoch as u64);
    }
}

fn create_progress_style(template: &str) -> ProgressStyle {
    ProgressStyle::with_template(template)
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("##-")
}
