//! Mini-batch stochastic gradient descent.
//!
//! The [`Trainer`] runs epochs over a shuffled copy of the training data, records
//! the monitored metrics in the [`HyperParameter`] results and adapts the learning
//! rate through a [`LearningSchedule`].

use crate::diagnostics::{Channel, Diagnostics};
use crate::error::{Result, TrainingError};
use crate::evaluation::{total_accuracy, total_cost};
use crate::hyper_parameter::HyperParameter;
use crate::schedule::{LearningSchedule, ScheduleStep};
use neural_network::{Dataset, Gradients, Network, StepParameters};
use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::Serialize;
use std::fmt;
use std::fmt::Write;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

/// Why a training run stopped.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub enum Termination {
    MaxEpochsExceeded { epochs: usize },
    LearningRateBelowThreshold { epoch: usize, eta: f64 },
    Cancelled { epoch: usize },
}

impl fmt::Display for Termination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Termination::MaxEpochsExceeded { epochs } => {
                write!(f, "reached the maximum of {epochs} epochs")
            }
            Termination::LearningRateBelowThreshold { epoch, eta } => {
                write!(f, "learning rate {eta} fell below the threshold in epoch {epoch}")
            }
            Termination::Cancelled { epoch } => write!(f, "cancelled after epoch {epoch}"),
        }
    }
}

/// Trainer drives SGD runs.
///
/// The trainer owns the random source used to shuffle the training data, so two
/// trainers created with [`Trainer::seeded`] and the same seed produce identical
/// runs on identical networks.
pub struct Trainer {
    rng: StdRng,
    diagnostics: Arc<dyn Diagnostics>,
    stop_flag: Option<Arc<AtomicBool>>,
}

impl Trainer {
    /// Creates a trainer seeded from the operating system.
    pub fn new(diagnostics: Arc<dyn Diagnostics>) -> Self {
        Self::with_rng(StdRng::from_os_rng(), diagnostics)
    }

    pub fn seeded(seed: u64, diagnostics: Arc<dyn Diagnostics>) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed), diagnostics)
    }

    pub fn with_rng(rng: StdRng, diagnostics: Arc<dyn Diagnostics>) -> Self {
        Self {
            rng,
            diagnostics,
            stop_flag: None,
        }
    }

    /// Stops runs at the next epoch boundary once `flag` is set.
    pub fn with_stop_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.stop_flag = Some(flag);
        self
    }

    pub fn diagnostics(&self) -> &Arc<dyn Diagnostics> {
        &self.diagnostics
    }

    fn cancelled(&self) -> bool {
        self.stop_flag
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::Relaxed))
    }

    /// Trains `network` with the settings in `hy`, appending one value per epoch to
    /// every monitored series in `hy.results`.
    ///
    /// # Arguments
    ///
    /// * `network` - The network to train, updated in place
    /// * `hy` - Settings of the run; `init_eta` is left untouched
    ///
    /// # Returns
    ///
    /// * `Result<Termination>` - Why the run stopped
    ///
    /// # Errors
    ///
    /// Returns [`TrainingError::InvalidConfiguration`] if `hy` fails validation or a
    /// dataset does not fit the network.
    pub fn sgd(&mut self, network: &mut Network, hy: &mut HyperParameter<'_>) -> Result<Termination> {
        hy.validate(self.stop_flag.is_some())?;
        check_fits("training", network, hy.training_data)?;
        if let Some(test) = hy.test_data {
            check_fits("test", network, test)?;
        }
        if let Some(eval) = hy.eval_data {
            check_fits("eval", network, eval)?;
        }

        self.diagnostics
            .general(Channel::Learn, format_args!("Starting training run\n{hy}"));

        let start = Instant::now();
        let training = hy.training_data;
        let batch_size = hy.mini_batch_size;
        let mut schedule = LearningSchedule::for_run(hy);
        let mut gradients = Gradients::zeros_for(network);
        let mut epoch = 0;

        let termination = loop {
            if hy.max_epochs.is_some_and(|max| epoch >= max) {
                break Termination::MaxEpochsExceeded { epochs: epoch };
            }
            if self.cancelled() {
                break Termination::Cancelled { epoch };
            }
            epoch += 1;

            let step = StepParameters {
                eta: schedule.eta(),
                mu: hy.mu,
                lambda_l1: hy.lambda_l1,
                lambda_l2: hy.lambda_l2,
                n: training.len(),
            };
            let shuffled = training.shuffled(&mut self.rng);
            for offset in (0..shuffled.len()).step_by(batch_size) {
                let batch = shuffled.mini_batch(offset, batch_size);
                gradients.clear();
                network.backprop(batch.inputs(), batch.targets(), &mut gradients)?;
                network.apply_gradients(&gradients, batch.len(), &step);
            }
            hy.results.etas.push(step.eta);

            let report = self.monitor(network, hy)?;
            self.diagnostics.general(
                Channel::Learn,
                format_args!("Epoch {epoch}: eta {}{report}", step.eta),
            );
            self.diagnostics.epoch_finished(epoch, hy.max_epochs);

            match schedule.end_epoch(hy.schedule_series()) {
                ScheduleStep::Continue => {}
                ScheduleStep::Reduced { eta } => self.diagnostics.general(
                    Channel::Learn,
                    format_args!("No improvement, reducing eta to {eta}"),
                ),
                ScheduleStep::Exhausted { eta } => {
                    break Termination::LearningRateBelowThreshold { epoch, eta };
                }
            }
        };

        hy.results.learn_time = start.elapsed();
        hy.results.termination = Some(termination);
        self.diagnostics.general(
            Channel::Learn,
            format_args!(
                "Training stopped: {termination}; learning took {:.3}s",
                hy.results.learn_time_seconds()
            ),
        );
        Ok(termination)
    }

    /// Evaluates every monitored quantity and returns them as a log fragment.
    fn monitor(&self, network: &Network, hy: &mut HyperParameter<'_>) -> Result<String> {
        let mut report = String::new();
        let (l1, l2) = (hy.lambda_l1, hy.lambda_l2);
        let evaluator = hy.evaluator;
        let results = &mut hy.results;
        let sets = [
            (
                "test",
                hy.test_data,
                hy.monitor_test_cost.then_some(&mut results.test_costs),
                hy.monitor_test_accuracy.then_some(&mut results.test_accuracies),
            ),
            (
                "eval",
                hy.eval_data,
                hy.monitor_eval_cost.then_some(&mut results.eval_costs),
                hy.monitor_eval_accuracy.then_some(&mut results.eval_accuracies),
            ),
            (
                "train",
                Some(hy.training_data),
                hy.monitor_train_cost.then_some(&mut results.train_costs),
                hy.monitor_train_accuracy.then_some(&mut results.train_accuracies),
            ),
        ];

        for (name, data, costs, accuracies) in sets {
            let Some(data) = data else { continue };
            if let Some(costs) = costs {
                let cost = total_cost(network, data, l1, l2)?;
                costs.push(cost);
                let _ = write!(report, ", {name} cost {cost:.6}");
            }
            if let Some(accuracies) = accuracies {
                let accuracy = total_accuracy(network, data, evaluator)?;
                accuracies.push(accuracy);
                let _ = write!(report, ", {name} accuracy {accuracy}/{}", data.len());
            }
        }
        Ok(report)
    }
}

fn check_fits(name: &str, network: &Network, data: &Dataset) -> Result<()> {
    if data.input_size() != network.input_size() || data.target_size() != network.output_size() {
        return Err(TrainingError::InvalidConfiguration(format!(
            "{name} data has {} inputs and {} targets, the network expects {} and {}",
            data.input_size(),
            data.target_size(),
            network.input_size(),
            network.output_size()
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::{MemoryDiagnostics, NullDiagnostics};
    use crate::evaluation::Evaluator;
    use crate::hyper_parameter::{HyperParameterBuilder, LearningScheduleType};
    use matrix::Matrix;
    use neural_network::Cost;

    fn xor() -> std::result::Result<Dataset, neural_network::NetworkError> {
        Dataset::from_examples(
            &[vec![0.0, 0.0], vec![0.0, 1.0], vec![1.0, 0.0], vec![1.0, 1.0]],
            &[vec![0.0], vec![1.0], vec![1.0], vec![0.0]],
        )
    }

    fn network(seed: u64) -> Result<Network> {
        Ok(Network::new(
            vec![2, 3, 1],
            Cost::CrossEntropy,
            &mut StdRng::seed_from_u64(seed),
        )?)
    }

    #[test]
    fn test_runs_exactly_max_epochs() -> Result<()> {
        let data = xor()?;
        let mut hy = HyperParameterBuilder::default()
            .mini_batch_size(3)
            .init_eta(0.5)
            .training_data(&data)
            .max_epochs(Some(7))
            .monitor_train_cost(true)
            .monitor_train_accuracy(true)
            .build()?;
        let diagnostics = Arc::new(MemoryDiagnostics::default());
        let mut trainer = Trainer::seeded(1, diagnostics.clone());

        let termination = trainer.sgd(&mut network(1)?, &mut hy)?;

        assert_eq!(termination, Termination::MaxEpochsExceeded { epochs: 7 });
        assert_eq!(hy.results.termination, Some(termination));
        assert_eq!(hy.results.etas, vec![0.5; 7]);
        assert_eq!(hy.results.train_costs.len(), 7);
        assert_eq!(hy.results.train_accuracies.len(), 7);
        assert!(hy.results.eval_costs.is_empty());
        assert_eq!(hy.init_eta, 0.5);
        assert_eq!(diagnostics.epochs(), 7);
        assert!(
            diagnostics
                .messages_on(Channel::Learn)
                .iter()
                .any(|m| m.starts_with("Epoch 7: eta 0.5, train cost"))
        );
        Ok(())
    }

    #[test]
    fn test_constant_accuracy_triggers_schedule() -> Result<()> {
        let data = xor()?;
        // a single output is always the argmax, so eval accuracy never changes
        let mut hy = HyperParameterBuilder::default()
            .mini_batch_size(4)
            .init_eta(1.0)
            .training_data(&data)
            .eval_data(&data)
            .max_epochs(None)
            .learning_schedule_type(LearningScheduleType::EvalAccuracy)
            .no_improvement_in(2)
            .stop_eta_fraction(3.0)
            .monitor_eval_accuracy(true)
            .build()?;
        let mut trainer = Trainer::seeded(2, Arc::new(NullDiagnostics));

        let termination = trainer.sgd(&mut network(2)?, &mut hy)?;

        assert_eq!(hy.results.eval_accuracies, vec![4.0; 5]);
        assert_eq!(hy.results.etas, vec![1.0, 1.0, 1.0, 0.5, 0.5]);
        assert_eq!(
            termination,
            Termination::LearningRateBelowThreshold { epoch: 5, eta: 0.25 }
        );
        Ok(())
    }

    #[test]
    fn test_stop_flag_cancels_at_epoch_boundary() -> Result<()> {
        let data = xor()?;
        let mut hy = HyperParameterBuilder::default()
            .mini_batch_size(1)
            .init_eta(0.5)
            .training_data(&data)
            .max_epochs(None)
            .build()?;
        let flag = Arc::new(AtomicBool::new(true));
        let mut trainer = Trainer::seeded(3, Arc::new(NullDiagnostics)).with_stop_flag(flag);

        let termination = trainer.sgd(&mut network(3)?, &mut hy)?;
        assert_eq!(termination, Termination::Cancelled { epoch: 0 });
        assert!(hy.results.etas.is_empty());

        // without the flag the same settings never stop
        let mut plain = Trainer::seeded(3, Arc::new(NullDiagnostics));
        assert!(matches!(
            plain.sgd(&mut network(3)?, &mut hy),
            Err(TrainingError::InvalidConfiguration(_))
        ));
        Ok(())
    }

    #[test]
    fn test_mismatched_data_is_rejected() -> Result<()> {
        let data = Dataset::new(Matrix::zeros(3, 2), Matrix::zeros(1, 2))?;
        let mut hy = HyperParameterBuilder::default()
            .mini_batch_size(1)
            .init_eta(0.5)
            .training_data(&data)
            .build()?;

        let result = Trainer::seeded(4, Arc::new(NullDiagnostics)).sgd(&mut network(4)?, &mut hy);
        assert!(matches!(result, Err(TrainingError::InvalidConfiguration(_))));
        Ok(())
    }

    #[test]
    fn test_same_seeds_give_identical_weights() -> Result<()> {
        let data = xor()?;
        let run = |seed: u64| -> Result<Network> {
            let mut hy = HyperParameterBuilder::default()
                .mini_batch_size(2)
                .init_eta(0.3)
                .mu(0.5)
                .lambda_l2(0.1)
                .training_data(&data)
                .max_epochs(Some(20))
                .evaluator(Evaluator::AllRoundCorrect)
                .build()?;
            let mut net = network(seed)?;
            Trainer::seeded(seed, Arc::new(NullDiagnostics)).sgd(&mut net, &mut hy)?;
            Ok(net)
        };

        let first = run(11)?;
        assert_eq!(first.weights(), run(11)?.weights());
        assert_eq!(first.biases(), run(11)?.biases());
        assert_ne!(first.weights(), run(12)?.weights());
        Ok(())
    }
}
