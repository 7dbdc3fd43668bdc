use crate::error::{Result, TrainingError};
use crate::evaluation::Evaluator;
use crate::training_history::TrainingHistory;
use derive_builder::Builder;
use neural_network::Dataset;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Which accuracy series drives the learning-rate schedule.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum LearningScheduleType {
    #[default]
    None,
    TestAccuracy,
    EvalAccuracy,
}

/// Settings of a training run together with the metrics it produced.
///
/// The datasets are borrowed, so one set of data can back many runs (the hyper
/// surfer trains hundreds of short ones).
///
/// # Examples
///
/// ```
/// use neural_network::Dataset;
/// use training::HyperParameterBuilder;
///
/// let data = Dataset::from_examples(&[vec![0.0], vec![1.0]], &[vec![1.0], vec![0.0]]).unwrap();
/// let hy = HyperParameterBuilder::default()
///     .mini_batch_size(2)
///     .init_eta(0.5)
///     .training_data(&data)
///     .monitor_train_cost(true)
///     .build()
///     .unwrap();
///
/// assert_eq!(hy.max_epochs, Some(200));
/// assert!(hy.is_valid().is_ok());
/// ```
#[derive(Builder, Clone, Debug)]
pub struct HyperParameter<'a> {
    pub mini_batch_size: usize,
    /// Learning rate at the start of every run; the schedule lowers a working copy.
    pub init_eta: f64,
    pub training_data: &'a Dataset,

    #[builder(default = "Some(200)")]
    pub max_epochs: Option<usize>,
    /// Patience of the learning-rate schedule, in epochs.
    #[builder(default, setter(strip_option))]
    pub no_improvement_in: Option<usize>,
    /// Stop once the learning rate falls below `init_eta / stop_eta_fraction`.
    #[builder(default, setter(strip_option))]
    pub stop_eta_fraction: Option<f64>,
    /// Momentum coefficient
    #[builder(default)]
    pub mu: f64,
    #[builder(default)]
    pub lambda_l1: f64,
    #[builder(default)]
    pub lambda_l2: f64,
    #[builder(default)]
    pub learning_schedule_type: LearningScheduleType,

    #[builder(default, setter(strip_option))]
    pub test_data: Option<&'a Dataset>,
    #[builder(default, setter(strip_option))]
    pub eval_data: Option<&'a Dataset>,

    #[builder(default)]
    pub monitor_test_cost: bool,
    #[builder(default)]
    pub monitor_test_accuracy: bool,
    #[builder(default)]
    pub monitor_eval_cost: bool,
    #[builder(default)]
    pub monitor_eval_accuracy: bool,
    #[builder(default)]
    pub monitor_train_cost: bool,
    #[builder(default)]
    pub monitor_train_accuracy: bool,
    #[builder(default)]
    pub evaluator: Evaluator,

    #[builder(setter(skip))]
    pub results: TrainingHistory,
}

impl HyperParameter<'_> {
    /// Checks that a run with these settings can start and will end.
    ///
    /// # Errors
    ///
    /// Returns [`TrainingError::InvalidConfiguration`] describing the first problem found.
    pub fn is_valid(&self) -> Result<()> {
        self.validate(false)
    }

    /// Like [`is_valid`](Self::is_valid); `cancellable` runs may have no stopping rule.
    pub(crate) fn validate(&self, cancellable: bool) -> Result<()> {
        if self.mini_batch_size == 0 {
            return invalid("mini_batch_size must be greater than zero");
        }
        if self.init_eta == 0.0 || !self.init_eta.is_finite() {
            return invalid("init_eta must be finite and non-zero");
        }
        if self.training_data.is_empty() {
            return invalid("training_data is empty");
        }
        if (self.monitor_test_cost || self.monitor_test_accuracy) && self.test_data.is_none() {
            return invalid("test monitoring requires test_data");
        }
        if (self.monitor_eval_cost || self.monitor_eval_accuracy) && self.eval_data.is_none() {
            return invalid("eval monitoring requires eval_data");
        }

        match self.learning_schedule_type {
            LearningScheduleType::None => {}
            LearningScheduleType::TestAccuracy => {
                if self.test_data.is_none() || !self.monitor_test_accuracy {
                    return invalid("a test accuracy schedule requires test_data and monitor_test_accuracy");
                }
            }
            LearningScheduleType::EvalAccuracy => {
                if self.eval_data.is_none() || !self.monitor_eval_accuracy {
                    return invalid("an eval accuracy schedule requires eval_data and monitor_eval_accuracy");
                }
            }
        }
        if self.learning_schedule_type != LearningScheduleType::None
            && self.no_improvement_in.is_none_or(|patience| patience < 2)
        {
            return invalid("no_improvement_in must be at least 2 when a schedule is active");
        }
        if self.stop_eta_fraction.is_some_and(|fraction| fraction <= 0.0) {
            return invalid("stop_eta_fraction must be positive");
        }

        let scheduled_stop = self.learning_schedule_type != LearningScheduleType::None
            && self.stop_eta_fraction.is_some();
        if self.max_epochs.is_none() && !scheduled_stop && !cancellable {
            return invalid("the run never stops: set max_epochs or a schedule with stop_eta_fraction");
        }
        Ok(())
    }

    /// Clears the metrics of the previous run.
    pub fn reset_results(&mut self) {
        self.results = TrainingHistory::default();
    }

    /// Turns all six monitoring flags off.
    pub fn reset_monitor(&mut self) {
        self.monitor_test_cost = false;
        self.monitor_test_accuracy = false;
        self.monitor_eval_cost = false;
        self.monitor_eval_accuracy = false;
        self.monitor_train_cost = false;
        self.monitor_train_accuracy = false;
    }

    /// Accuracy series the schedule watches, empty when no schedule is active.
    pub fn schedule_series(&self) -> &[f64] {
        match self.learning_schedule_type {
            LearningScheduleType::None => &[],
            LearningScheduleType::TestAccuracy => &self.results.test_accuracies,
            LearningScheduleType::EvalAccuracy => &self.results.eval_accuracies,
        }
    }

    pub(crate) fn monitors(&self) -> [bool; 6] {
        [
            self.monitor_test_cost,
            self.monitor_test_accuracy,
            self.monitor_eval_cost,
            self.monitor_eval_accuracy,
            self.monitor_train_cost,
            self.monitor_train_accuracy,
        ]
    }

    pub(crate) fn set_monitors(&mut self, monitors: [bool; 6]) {
        [
            self.monitor_test_cost,
            self.monitor_test_accuracy,
            self.monitor_eval_cost,
            self.monitor_eval_accuracy,
            self.monitor_train_cost,
            self.monitor_train_accuracy,
        ] = monitors;
    }
}

fn invalid(reason: &str) -> Result<()> {
    Err(TrainingError::InvalidConfiguration(reason.to_string()))
}

fn optional<T: fmt::Display>(value: Option<T>) -> String {
    value.map_or_else(|| "-".to_string(), |v| v.to_string())
}

impl fmt::Display for HyperParameter<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "mini batch size: {}, eta: {}, mu: {}, lambda l1: {}, lambda l2: {}",
            self.mini_batch_size, self.init_eta, self.mu, self.lambda_l1, self.lambda_l2
        )?;
        writeln!(
            f,
            "max epochs: {}, schedule: {:?}, no improvement in: {}, stop eta fraction: {}",
            optional(self.max_epochs),
            self.learning_schedule_type,
            optional(self.no_improvement_in),
            optional(self.stop_eta_fraction)
        )?;
        writeln!(
            f,
            "examples: {} training, {} test, {} eval; evaluator: {:?}",
            self.training_data.len(),
            optional(self.test_data.map(Dataset::len)),
            optional(self.eval_data.map(Dataset::len)),
            self.evaluator
        )?;

        let names = [
            "test cost",
            "test accuracy",
            "eval cost",
            "eval accuracy",
            "train cost",
            "train accuracy",
        ];
        let monitored: Vec<&str> = names
            .iter()
            .zip(self.monitors())
            .filter_map(|(name, on)| on.then_some(*name))
            .collect();
        if monitored.is_empty() {
            write!(f, "monitoring: nothing")
        } else {
            write!(f, "monitoring: {}", monitored.join(", "))
        }
    }
}
