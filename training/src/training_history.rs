use crate::series::sum_delta;
use crate::training::Termination;
use serde::Serialize;
use std::fmt;
use std::time::Duration;

/// Metrics recorded during one training run, one value per epoch for every
/// monitored quantity.
///
/// Accuracies are counts of correctly evaluated examples.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct TrainingHistory {
    pub test_costs: Vec<f64>,
    pub test_accuracies: Vec<f64>,
    pub eval_costs: Vec<f64>,
    pub eval_accuracies: Vec<f64>,
    pub train_costs: Vec<f64>,
    pub train_accuracies: Vec<f64>,
    /// Learning rate used in each epoch
    pub etas: Vec<f64>,
    /// Wall-clock time of the run
    pub learn_time: Duration,
    pub termination: Option<Termination>,
}

impl TrainingHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of completed epochs.
    pub fn epochs(&self) -> usize {
        self.etas.len()
    }

    pub fn learn_time_seconds(&self) -> f64 {
        self.learn_time.as_secs_f64()
    }

    /// Improvement of the eval accuracy over the run.
    pub fn eval_improvement(&self) -> f64 {
        sum_delta(&self.eval_accuracies)
    }

    /// Highest value of `series` and the 1-based epoch it was first reached in.
    pub fn best(series: &[f64]) -> Option<(usize, f64)> {
        series
            .iter()
            .copied()
            .enumerate()
            .fold(None, |best, (i, value)| match best {
                Some((_, b)) if b >= value => best,
                _ => Some((i + 1, value)),
            })
    }
}

impl fmt::Display for TrainingHistory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Training History Summary:")?;
        writeln!(f, "------------------------")?;
        writeln!(
            f,
            "Epochs: {} in {:.2}s",
            self.epochs(),
            self.learn_time_seconds()
        )?;
        if let Some(termination) = &self.termination {
            writeln!(f, "Stopped: {termination}")?;
        }

        let accuracies = [
            ("test", &self.test_accuracies),
            ("eval", &self.eval_accuracies),
            ("train", &self.train_accuracies),
        ];
        for (name, series) in accuracies {
            if let (Some((epoch, best)), Some(last)) = (Self::best(series), series.last()) {
                writeln!(
                    f,
                    "Best {name} accuracy: {best} (epoch {epoch}), final: {last}"
                )?;
            }
        }

        let costs = [
            ("test", &self.test_costs),
            ("eval", &self.eval_costs),
            ("train", &self.train_costs),
        ];
        for (name, series) in costs {
            if let Some(last) = series.last() {
                writeln!(f, "Final {name} cost: {last:.4}")?;
            }
        }
        Ok(())
    }
}
