use crate::hyper_parameter::{HyperParameter, LearningScheduleType};
use crate::series::sum_delta;

/// Outcome of the end-of-epoch schedule check.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ScheduleStep {
    Continue,
    /// The learning rate was halved.
    Reduced { eta: f64 },
    /// The learning rate was halved and is now below the stopping threshold.
    Exhausted { eta: f64 },
}

/// Halves the learning rate whenever the watched accuracy series shows no net
/// improvement over the last `patience` epochs.
///
/// The check only runs once `patience` epochs have passed since the last
/// reduction (or the start of the run).
#[derive(Clone, Debug, PartialEq)]
pub struct LearningSchedule {
    active: bool,
    patience: usize,
    init_eta: f64,
    stop_eta_fraction: Option<f64>,
    eta: f64,
    epochs_since_reduction: usize,
}

impl LearningSchedule {
    pub fn new(
        active: bool,
        patience: usize,
        init_eta: f64,
        stop_eta_fraction: Option<f64>,
    ) -> Self {
        Self {
            active,
            patience,
            init_eta,
            stop_eta_fraction,
            eta: init_eta,
            epochs_since_reduction: 0,
        }
    }

    pub fn for_run(hy: &HyperParameter<'_>) -> Self {
        Self::new(
            hy.learning_schedule_type != LearningScheduleType::None,
            hy.no_improvement_in.unwrap_or(0),
            hy.init_eta,
            hy.stop_eta_fraction,
        )
    }

    /// Learning rate for the next epoch.
    pub fn eta(&self) -> f64 {
        self.eta
    }

    pub fn epochs_since_reduction(&self) -> usize {
        self.epochs_since_reduction
    }

    /// Runs the check for the epoch that just finished. `series` holds the watched
    /// accuracies up to and including that epoch.
    pub fn end_epoch(&mut self, series: &[f64]) -> ScheduleStep {
        let mut step = ScheduleStep::Continue;
        if self.active && self.epochs_since_reduction >= self.patience {
            let window = &series[series.len().saturating_sub(self.patience)..];
            if sum_delta(window) <= 0.0 {
                self.eta /= 2.0;
                self.epochs_since_reduction = 0;
                step = if self.is_exhausted() {
                    ScheduleStep::Exhausted { eta: self.eta }
                } else {
                    ScheduleStep::Reduced { eta: self.eta }
                };
            }
        }
        self.epochs_since_reduction += 1;
        step
    }

    fn is_exhausted(&self) -> bool {
        self.stop_eta_fraction
            .is_some_and(|fraction| self.eta < self.init_eta / fraction)
    }
}
