//! Automated hyper parameter search.
//!
//! Every search treats short training runs as an oracle. Each probe trains a
//! clone of the caller's network, so the network passed in is never modified.
//! Coarse searches move by orders of magnitude, the fine search bisects a
//! bracket around the current value.

use crate::diagnostics::{Channel, Diagnostics};
use crate::error::{Result, TrainingError};
use crate::hyper_parameter::{HyperParameter, LearningScheduleType};
use crate::series::strictly_monotone_decrease;
use crate::training::Trainer;
use neural_network::{Network, WeightInit};
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::fmt;
use std::sync::Arc;

/// A scalar hyper parameter the surfer can tune.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SurfParameter {
    InitEta,
    Mu,
    LambdaL1,
    LambdaL2,
}

impl SurfParameter {
    pub fn get(&self, hy: &HyperParameter<'_>) -> f64 {
        match self {
            SurfParameter::InitEta => hy.init_eta,
            SurfParameter::Mu => hy.mu,
            SurfParameter::LambdaL1 => hy.lambda_l1,
            SurfParameter::LambdaL2 => hy.lambda_l2,
        }
    }

    pub fn set(&self, hy: &mut HyperParameter<'_>, value: f64) {
        match self {
            SurfParameter::InitEta => hy.init_eta = value,
            SurfParameter::Mu => hy.mu = value,
            SurfParameter::LambdaL1 => hy.lambda_l1 = value,
            SurfParameter::LambdaL2 => hy.lambda_l2 = value,
        }
    }
}

impl fmt::Display for SurfParameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SurfParameter::InitEta => "init_eta",
            SurfParameter::Mu => "mu",
            SurfParameter::LambdaL1 => "lambda_l1",
            SurfParameter::LambdaL2 => "lambda_l2",
        })
    }
}

/// Budgets and seeds of the searches.
#[derive(Clone, Debug, PartialEq)]
pub struct SurfSettings {
    /// Learning rate the eta search starts from
    pub start_eta: f64,
    /// Epochs of every probe run
    pub first_epochs: usize,
    /// Order-of-magnitude steps before a coarse search gives up
    pub coarse_max_tries: usize,
    /// Bisection rounds of the batch size search
    pub batch_depth: usize,
    /// Rounds of [`HyperSurfer::bounce_hyper_surf`]
    pub fine_surfs: usize,
    /// Bisection rounds of one fine search
    pub fine_depth: usize,
    /// Freshly initialised networks trained per coarse probe
    pub trials: usize,
    pub lambda_seed: f64,
    pub mu_seed: f64,
    /// Batch size the batch size search pivots on at first
    pub initial_batch_size: usize,
    /// Fine brackets span `[value / factor, value * factor]`
    pub fine_bracket_factor: f64,
}

impl Default for SurfSettings {
    fn default() -> Self {
        Self {
            start_eta: 0.01,
            first_epochs: 10,
            coarse_max_tries: 35,
            batch_depth: 15,
            fine_surfs: 3,
            fine_depth: 5,
            trials: 1,
            lambda_seed: 1.0,
            mu_seed: 0.5,
            initial_batch_size: 50,
            fine_bracket_factor: 2.0,
        }
    }
}

/// The settings a search overrides while probing, restored afterwards.
struct RunSettings {
    max_epochs: Option<usize>,
    learning_schedule_type: LearningScheduleType,
    monitors: [bool; 6],
}

impl RunSettings {
    fn save(hy: &HyperParameter<'_>) -> Self {
        Self {
            max_epochs: hy.max_epochs,
            learning_schedule_type: hy.learning_schedule_type,
            monitors: hy.monitors(),
        }
    }

    fn restore(self, hy: &mut HyperParameter<'_>) {
        hy.max_epochs = self.max_epochs;
        hy.learning_schedule_type = self.learning_schedule_type;
        hy.set_monitors(self.monitors);
        hy.reset_results();
    }
}

pub struct HyperSurfer {
    trainer: Trainer,
    rng: StdRng,
    settings: SurfSettings,
    diagnostics: Arc<dyn Diagnostics>,
}

impl HyperSurfer {
    /// Creates a surfer that trains with `trainer` and draws probe initialisations
    /// from `rng`.
    pub fn new(trainer: Trainer, rng: StdRng, settings: SurfSettings) -> Self {
        let diagnostics = trainer.diagnostics().clone();
        Self {
            trainer,
            rng,
            settings,
            diagnostics,
        }
    }

    pub fn seeded(seed: u64, settings: SurfSettings, diagnostics: Arc<dyn Diagnostics>) -> Self {
        Self::new(
            Trainer::seeded(seed, diagnostics),
            StdRng::seed_from_u64(seed.wrapping_add(1)),
            settings,
        )
    }

    pub fn settings(&self) -> &SurfSettings {
        &self.settings
    }

    /// Trains a clone of `network`, re-initialised first when `reinitialize` is set,
    /// and leaves the metrics in `hy.results`.
    fn probe(&mut self, network: &Network, hy: &mut HyperParameter<'_>, reinitialize: bool) -> Result<()> {
        let mut net = network.clone();
        if reinitialize {
            net.reinitialize(WeightInit::Default, &mut self.rng);
        }
        hy.reset_results();
        self.trainer.sgd(&mut net, hy)?;
        Ok(())
    }

    /// Eval accuracy improvement summed over `trials` fresh networks.
    fn eval_improvement(&mut self, network: &Network, hy: &mut HyperParameter<'_>) -> Result<f64> {
        let mut total = 0.0;
        for _ in 0..self.settings.trials.max(1) {
            self.probe(network, hy, true)?;
            total += hy.results.eval_improvement();
        }
        Ok(total)
    }

    /// Eval accuracy improvement per second of training, summed over `trials` fresh networks.
    fn eval_improvement_rate(&mut self, network: &Network, hy: &mut HyperParameter<'_>) -> Result<f64> {
        let mut total = 0.0;
        for _ in 0..self.settings.trials.max(1) {
            self.probe(network, hy, true)?;
            let seconds = hy.results.learn_time_seconds().max(f64::EPSILON);
            total += hy.results.eval_improvement() / seconds;
        }
        Ok(total)
    }

    /// Whether most of `trials` fresh networks have a strictly decreasing training cost.
    fn train_costs_decrease(&mut self, network: &Network, hy: &mut HyperParameter<'_>) -> Result<bool> {
        let trials = self.settings.trials.max(1);
        let mut decreasing = 0;
        for _ in 0..trials {
            self.probe(network, hy, true)?;
            if strictly_monotone_decrease(&hy.results.train_costs) {
                decreasing += 1;
            }
        }
        Ok(2 * decreasing > trials)
    }

    /// Runs `search` with the schedule disabled and the run settings restored afterwards,
    /// whether it succeeds or not.
    fn isolated<F>(&mut self, hy: &mut HyperParameter<'_>, search: F) -> Result<()>
    where
        F: FnOnce(&mut Self, &mut HyperParameter<'_>) -> Result<()>,
    {
        let saved = RunSettings::save(hy);
        hy.learning_schedule_type = LearningScheduleType::None;
        hy.max_epochs = Some(self.settings.first_epochs);
        let outcome = search(self, hy);
        saved.restore(hy);
        outcome
    }

    /// Finds the order of magnitude of the largest learning rate for which the
    /// training cost still decreases strictly in every epoch.
    ///
    /// Starting from `start_eta` the rate is multiplied by 10 while the cost keeps
    /// decreasing and divided by 10 while it does not. The search stops at the
    /// first change; when the change is from decreasing to not decreasing, the last
    /// working rate is kept.
    ///
    /// # Errors
    ///
    /// Returns [`TrainingError::SearchExhausted`] if no change happens within
    /// `coarse_max_tries` probes.
    pub fn coarse_eta_surf(&mut self, network: &Network, hy: &mut HyperParameter<'_>) -> Result<()> {
        self.isolated(hy, |surfer, hy| {
            hy.reset_monitor();
            hy.monitor_train_cost = true;

            let (start, tries) = (surfer.settings.start_eta, surfer.settings.coarse_max_tries);
            let eta = coarse_eta_search(start, tries, |eta| {
                hy.init_eta = eta;
                let decreased = surfer.train_costs_decrease(network, hy)?;
                surfer.extra(format_args!("Train cost decreasing with eta {eta}: {decreased}"));
                Ok(decreased)
            })?;
            hy.init_eta = eta;
            surfer.extra(format_args!("Coarse eta found: {eta}"));
            Ok(())
        })
    }

    /// Finds the order of magnitude of `parameter` that gives the largest eval
    /// accuracy improvement.
    ///
    /// Probes a tenth and ten times the current value, then keeps stepping by a
    /// factor of 10 in the better direction until the improvement falls below that
    /// of the previous step, and steps back once.
    ///
    /// # Errors
    ///
    /// Returns [`TrainingError::SearchExhausted`] if the improvement never falls
    /// within `coarse_max_tries` steps.
    pub fn default_coarse_surf(
        &mut self,
        network: &Network,
        hy: &mut HyperParameter<'_>,
        parameter: SurfParameter,
    ) -> Result<()> {
        self.isolated(hy, |surfer, hy| {
            hy.reset_monitor();
            hy.monitor_eval_accuracy = true;

            let (value, tries) = (parameter.get(hy), surfer.settings.coarse_max_tries);
            let best = coarse_order_search(value, tries, |candidate| {
                parameter.set(hy, candidate);
                surfer.extra(format_args!("Trying {parameter} = {candidate}"));
                surfer.eval_improvement(network, hy)
            })?;
            parameter.set(hy, best);
            surfer.extra(format_args!("Best coarse value for {parameter}: {best}"));
            Ok(())
        })
    }

    /// Bisects the batch size over `[1, training examples]` for the best eval
    /// accuracy improvement per second of training.
    ///
    /// `init_eta` is rescaled by `old size / new size` whenever the batch size
    /// changes, which keeps the step per example constant.
    ///
    /// # Errors
    ///
    /// Returns [`TrainingError::InvalidConfiguration`] if there is no training data.
    pub fn mini_batch_size_surf(&mut self, network: &Network, hy: &mut HyperParameter<'_>) -> Result<()> {
        if hy.training_data.is_empty() {
            return Err(TrainingError::InvalidConfiguration(
                "training data is empty, there is no batch size to search".to_string(),
            ));
        }
        self.isolated(hy, |surfer, hy| {
            hy.reset_monitor();
            hy.monitor_eval_accuracy = true;

            let (max, depth) = (hy.training_data.len(), surfer.settings.batch_depth);
            let start = hy.mini_batch_size;
            let size = bisect_batch_size(max, start, depth, |size| {
                set_batch_size(hy, size);
                surfer.eval_improvement_rate(network, hy)
            })?;
            set_batch_size(hy, size);
            surfer.extra(format_args!(
                "Mini batch size set to {}, eta rescaled to {}",
                hy.mini_batch_size, hy.init_eta
            ));
            Ok(())
        })
    }

    /// Bisects `[min, max]` for the value of `parameter` with the largest eval
    /// accuracy improvement, starting from its current value.
    ///
    /// Every round probes the midpoints between the pivot and either end, keeps the
    /// better half and moves the pivot to its centre. Probes train `network` as
    /// given, without re-initialisation.
    pub fn default_fine_surf(
        &mut self,
        network: &Network,
        hy: &mut HyperParameter<'_>,
        parameter: SurfParameter,
        min: f64,
        max: f64,
    ) -> Result<()> {
        self.isolated(hy, |surfer, hy| {
            hy.monitor_eval_accuracy = true;
            let (mut min, mut max) = (min, max);

            for _ in 0..surfer.settings.fine_depth {
                let middle = parameter.get(hy);
                let left = middle - (middle - min) / 2.0;
                let right = middle + (max - middle) / 2.0;

                parameter.set(hy, left);
                surfer.probe(network, hy, false)?;
                let left_improvement = hy.results.eval_improvement();

                parameter.set(hy, right);
                surfer.probe(network, hy, false)?;
                let right_improvement = hy.results.eval_improvement();

                if left_improvement > right_improvement {
                    max = middle;
                    surfer.extra(format_args!("Smaller side [{min}; {max}] is better for {parameter}"));
                } else {
                    min = middle;
                    surfer.extra(format_args!("Bigger side [{min}; {max}] is better for {parameter}"));
                }
                parameter.set(hy, min + (max - min) / 2.0);
            }
            Ok(())
        })
    }

    /// Coarse settings for learning rate, L2 strength and batch size.
    pub fn coarse_hyper_surf(&mut self, network: &Network, hy: &mut HyperParameter<'_>) -> Result<()> {
        self.general(format_args!("Coarse hyper surfing..."));

        self.general(format_args!("Finding the order of magnitude of the eta threshold..."));
        self.coarse_eta_surf(network, hy)?;

        self.general(format_args!("Coarse lambda surf..."));
        hy.lambda_l2 = self.settings.lambda_seed;
        self.default_coarse_surf(network, hy, SurfParameter::LambdaL2)?;

        self.general(format_args!("Surfing mini batch size..."));
        set_batch_size(hy, self.settings.initial_batch_size.max(1));
        self.mini_batch_size_surf(network, hy)?;

        self.general(format_args!(
            "Coarse hyper surf complete: init_eta {}, lambda_l2 {}, mini_batch_size {}",
            hy.init_eta, hy.lambda_l2, hy.mini_batch_size
        ));
        Ok(())
    }

    /// Refines momentum, learning rate and L2 strength in turn, `fine_surfs` times,
    /// each round on a freshly initialised copy of `network`.
    pub fn bounce_hyper_surf(&mut self, network: &Network, hy: &mut HyperParameter<'_>) -> Result<()> {
        self.general(format_args!("Bounce hyper surfing..."));
        let factor = self.settings.fine_bracket_factor;
        hy.mu = self.settings.mu_seed;

        for round in 1..=self.settings.fine_surfs {
            let mut net = network.clone();
            net.reinitialize(WeightInit::Default, &mut self.rng);

            self.default_fine_surf(&net, hy, SurfParameter::Mu, 0.0, 1.0)?;
            self.general(format_args!("Round {round}: mu set to {}", hy.mu));

            let eta = hy.init_eta;
            self.default_fine_surf(&net, hy, SurfParameter::InitEta, eta / factor, eta * factor)?;
            self.general(format_args!("Round {round}: init_eta set to {}", hy.init_eta));

            let lambda = hy.lambda_l2;
            self.default_fine_surf(&net, hy, SurfParameter::LambdaL2, lambda / factor, lambda * factor)?;
            self.general(format_args!("Round {round}: lambda_l2 set to {}", hy.lambda_l2));
        }

        self.general(format_args!(
            "Bounce hyper surf complete: mu {}, init_eta {}, lambda_l2 {}",
            hy.mu, hy.init_eta, hy.lambda_l2
        ));
        Ok(())
    }

    /// Coarse search followed by the fine rounds.
    pub fn hyper_surf(&mut self, network: &Network, hy: &mut HyperParameter<'_>) -> Result<()> {
        self.coarse_hyper_surf(network, hy)?;
        self.bounce_hyper_surf(network, hy)?;
        self.general(format_args!(
            "Hyper surf complete: init_eta {}, mu {}, lambda_l2 {}, mini_batch_size {}",
            hy.init_eta, hy.mu, hy.lambda_l2, hy.mini_batch_size
        ));
        Ok(())
    }

    fn general(&self, args: fmt::Arguments<'_>) {
        self.diagnostics.general(Channel::Hyper, args);
    }

    fn extra(&self, args: fmt::Arguments<'_>) {
        self.diagnostics.extra(Channel::Hyper, args);
    }
}

/// Eta search over powers of ten around `start`, driven by whether the training
/// cost keeps decreasing at a given rate.
///
/// The first answer fixes the direction: up while decreasing, down while not.
/// The first change of answer ends the search. Coming down, the rate that made the
/// cost decrease is the result; going up, it is the last rate before the change.
fn coarse_eta_search<F>(start: f64, max_tries: usize, mut decreases: F) -> Result<f64>
where
    F: FnMut(f64) -> Result<bool>,
{
    let mut eta = start;
    let mut direction = None;
    for _ in 0..max_tries {
        let decreased = decreases(eta)?;
        match (*direction.get_or_insert(decreased), decreased) {
            (true, true) => eta *= 10.0,
            (false, true) => return Ok(eta),
            (true, false) => return Ok(eta / 10.0),
            (false, false) => eta /= 10.0,
        }
    }
    Err(TrainingError::SearchExhausted {
        search: "eta",
        tries: max_tries,
    })
}

/// Order of magnitude search for the value with the largest `improvement`.
///
/// A tenth and ten times `value` pick the direction, with the smaller side winning
/// only when strictly better. The search then keeps stepping by a factor of 10
/// and returns the last value before the improvement drops.
fn coarse_order_search<F>(value: f64, max_tries: usize, mut improvement: F) -> Result<f64>
where
    F: FnMut(f64) -> Result<f64>,
{
    let left = improvement(value / 10.0)?;
    let right = improvement(value * 10.0)?;
    let (factor, mut current, mut last) = if left > right {
        (0.1, value / 10.0, left)
    } else {
        (10.0, value * 10.0, right)
    };

    for _ in 0..max_tries {
        let next = current * factor;
        let score = improvement(next)?;
        if score < last {
            return Ok(current);
        }
        current = next;
        last = score;
    }
    Err(TrainingError::SearchExhausted {
        search: "order of magnitude",
        tries: max_tries,
    })
}

/// Bisects `[1, max]` for the batch size with the highest `rate`, pivoting on
/// `start` first. `max` must be at least 1.
fn bisect_batch_size<F>(max: usize, start: usize, depth: usize, mut rate: F) -> Result<usize>
where
    F: FnMut(usize) -> Result<f64>,
{
    let (mut min, mut max) = (1, max);
    let mut middle = start.clamp(min, max);
    for _ in 0..depth {
        if max - min < 2 {
            break;
        }
        let left_rate = rate(middle - (middle - min) / 2)?;
        let right_rate = rate(middle + (max - middle) / 2)?;
        if left_rate > right_rate {
            max = middle;
        } else {
            min = middle;
        }
        middle = min + (max - min) / 2;
    }
    Ok(middle)
}

/// Changes the batch size, scaling the learning rate inversely.
fn set_batch_size(hy: &mut HyperParameter<'_>, size: usize) {
    if size != hy.mini_batch_size {
        hy.init_eta *= hy.mini_batch_size as f64 / size as f64;
        hy.mini_batch_size = size;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::{MemoryDiagnostics, NullDiagnostics};
    use crate::hyper_parameter::HyperParameterBuilder;
    use approx::assert_relative_eq;
    use matrix::Matrix;
    use neural_network::{Cost, Dataset};

    fn and_data() -> std::result::Result<Dataset, neural_network::NetworkError> {
        Dataset::from_examples(
            &[vec![0.0, 0.0], vec![0.0, 1.0], vec![1.0, 0.0], vec![1.0, 1.0]],
            &[vec![1.0, 0.0], vec![1.0, 0.0], vec![1.0, 0.0], vec![0.0, 1.0]],
        )
    }

    fn network() -> Result<Network> {
        Ok(Network::new(
            vec![2, 3, 2],
            Cost::CrossEntropy,
            &mut StdRng::seed_from_u64(5),
        )?)
    }

    fn quick_settings() -> SurfSettings {
        SurfSettings {
            first_epochs: 3,
            coarse_max_tries: 4,
            batch_depth: 2,
            fine_surfs: 1,
            fine_depth: 2,
            ..SurfSettings::default()
        }
    }

    #[test]
    fn test_settings_defaults() {
        let settings = SurfSettings::default();
        assert_eq!(settings.start_eta, 0.01);
        assert_eq!(settings.first_epochs, 10);
        assert_eq!(settings.coarse_max_tries, 35);
        assert_eq!(settings.trials, 1);
        assert_eq!(settings.initial_batch_size, 50);
    }

    #[test]
    fn test_parameter_access() -> Result<()> {
        let data = and_data()?;
        let mut hy = HyperParameterBuilder::default()
            .mini_batch_size(1)
            .init_eta(0.1)
            .training_data(&data)
            .build()?;

        for (i, parameter) in [
            SurfParameter::InitEta,
            SurfParameter::Mu,
            SurfParameter::LambdaL1,
            SurfParameter::LambdaL2,
        ]
        .into_iter()
        .enumerate()
        {
            parameter.set(&mut hy, i as f64 + 0.5);
            assert_eq!(parameter.get(&hy), i as f64 + 0.5);
        }
        assert_eq!(hy.lambda_l1, 2.5);
        assert_eq!(SurfParameter::LambdaL2.to_string(), "lambda_l2");
        Ok(())
    }

    #[test]
    fn test_batch_size_rescales_eta() -> Result<()> {
        let data = and_data()?;
        let mut hy = HyperParameterBuilder::default()
            .mini_batch_size(10)
            .init_eta(1.0)
            .training_data(&data)
            .build()?;

        set_batch_size(&mut hy, 40);
        assert_eq!(hy.init_eta, 0.25);
        set_batch_size(&mut hy, 20);
        assert_eq!(hy.init_eta, 0.5);
        Ok(())
    }

    #[test]
    fn test_eta_surf_with_single_try_is_exhausted() -> Result<()> {
        let data = and_data()?;
        let mut hy = HyperParameterBuilder::default()
            .mini_batch_size(2)
            .init_eta(0.3)
            .training_data(&data)
            .build()?;
        let settings = SurfSettings {
            coarse_max_tries: 1,
            ..quick_settings()
        };
        let mut surfer = HyperSurfer::seeded(1, settings, Arc::new(NullDiagnostics));

        // one probe can only fix the direction, never observe a change
        let result = surfer.coarse_eta_surf(&network()?, &mut hy);
        assert!(matches!(
            result,
            Err(TrainingError::SearchExhausted { search: "eta", tries: 1 })
        ));
        assert_eq!(hy.max_epochs, Some(200));
        assert!(!hy.monitor_train_cost);
        Ok(())
    }

    #[test]
    fn test_coarse_surf_with_no_tries_is_exhausted() -> Result<()> {
        let data = and_data()?;
        let mut hy = HyperParameterBuilder::default()
            .mini_batch_size(2)
            .init_eta(0.3)
            .lambda_l2(1.0)
            .training_data(&data)
            .eval_data(&data)
            .build()?;
        let settings = SurfSettings {
            coarse_max_tries: 0,
            ..quick_settings()
        };
        let mut surfer = HyperSurfer::seeded(2, settings, Arc::new(NullDiagnostics));

        let result = surfer.default_coarse_surf(&network()?, &mut hy, SurfParameter::LambdaL2);
        assert!(matches!(result, Err(TrainingError::SearchExhausted { tries: 0, .. })));
        assert!(!hy.monitor_eval_accuracy);
        Ok(())
    }

    #[test]
    fn test_coarse_surf_needs_eval_data() -> Result<()> {
        let data = and_data()?;
        let mut hy = HyperParameterBuilder::default()
            .mini_batch_size(2)
            .init_eta(0.3)
            .training_data(&data)
            .build()?;
        let mut surfer = HyperSurfer::seeded(3, quick_settings(), Arc::new(NullDiagnostics));

        let result = surfer.default_coarse_surf(&network()?, &mut hy, SurfParameter::Mu);
        assert!(matches!(result, Err(TrainingError::InvalidConfiguration(_))));
        Ok(())
    }

    #[test]
    fn test_batch_size_search_stays_in_range() -> Result<()> {
        let data = and_data()?;
        let mut hy = HyperParameterBuilder::default()
            .mini_batch_size(50)
            .init_eta(1.0)
            .training_data(&data)
            .eval_data(&data)
            .build()?;
        let mut surfer = HyperSurfer::seeded(4, quick_settings(), Arc::new(NullDiagnostics));

        surfer.mini_batch_size_surf(&network()?, &mut hy)?;

        assert!((1..=4).contains(&hy.mini_batch_size));
        // eta always scales with 50 / batch size
        let expected_eta = 50.0 / hy.mini_batch_size as f64;
        assert!((hy.init_eta - expected_eta).abs() < 1e-9 * expected_eta);
        assert_eq!(hy.max_epochs, Some(200));
        Ok(())
    }

    #[test]
    fn test_fine_surf_stays_in_bracket() -> Result<()> {
        let data = and_data()?;
        let mut hy = HyperParameterBuilder::default()
            .mini_batch_size(2)
            .init_eta(0.5)
            .mu(0.5)
            .training_data(&data)
            .eval_data(&data)
            .build()?;
        let network = network()?;
        let before = network.clone();
        let mut surfer = HyperSurfer::seeded(5, quick_settings(), Arc::new(NullDiagnostics));

        surfer.default_fine_surf(&network, &mut hy, SurfParameter::Mu, 0.0, 1.0)?;

        // after two halvings the pivot sits on a quarter-width grid point
        assert!([0.125, 0.375, 0.625, 0.875].contains(&hy.mu));
        assert_eq!(network, before);
        assert!(hy.results.etas.is_empty());
        Ok(())
    }

    #[test]
    fn test_hyper_surf_reports_on_hyper_channel() -> Result<()> {
        let data = and_data()?;
        let mut hy = HyperParameterBuilder::default()
            .mini_batch_size(2)
            .init_eta(0.3)
            .training_data(&data)
            .eval_data(&data)
            .monitor_train_accuracy(true)
            .build()?;
        let diagnostics = Arc::new(MemoryDiagnostics::default());
        let settings = SurfSettings {
            coarse_max_tries: 35,
            ..quick_settings()
        };
        let mut surfer = HyperSurfer::seeded(6, settings, diagnostics.clone());

        surfer.hyper_surf(&network()?, &mut hy)?;

        let messages = diagnostics.messages_on(Channel::Hyper);
        assert!(messages.iter().any(|m| m.starts_with("Hyper surf complete")));
        assert!(hy.init_eta.is_finite() && hy.init_eta > 0.0);
        assert!([0.125, 0.375, 0.625, 0.875].contains(&hy.mu));
        assert!((1..=4).contains(&hy.mini_batch_size));
        assert!(hy.monitor_train_accuracy);
        assert!(!hy.monitor_eval_accuracy);
        assert_eq!(hy.max_epochs, Some(200));
        assert_eq!(hy.learning_schedule_type, LearningScheduleType::None);
        Ok(())
    }

    #[test]
    fn test_eta_surf_lands_on_power_of_ten() -> Result<()> {
        let data = and_data()?;
        let mut hy = HyperParameterBuilder::default()
            .mini_batch_size(2)
            .init_eta(0.3)
            .training_data(&data)
            .eval_data(&data)
            .monitor_train_accuracy(true)
            .build()?;
        let settings = SurfSettings {
            coarse_max_tries: 35,
            ..quick_settings()
        };
        let mut surfer = HyperSurfer::seeded(6, settings, Arc::new(NullDiagnostics));

        surfer.coarse_eta_surf(&network()?, &mut hy)?;

        let exponent = (hy.init_eta / 0.01).log10();
        assert!((exponent - exponent.round()).abs() < 1e-9);
        assert!(hy.monitor_train_accuracy);
        assert!(!hy.monitor_train_cost);
        Ok(())
    }

    #[test]
    fn test_coarse_surf_pivots_on_initial_batch_size() -> Result<()> {
        let data = and_data()?;
        let mut hy = HyperParameterBuilder::default()
            .mini_batch_size(2)
            .init_eta(0.3)
            .training_data(&data)
            .eval_data(&data)
            .monitor_train_accuracy(true)
            .build()?;
        let settings = SurfSettings {
            coarse_max_tries: 35,
            batch_depth: 0,
            initial_batch_size: 3,
            ..quick_settings()
        };
        let mut surfer = HyperSurfer::seeded(6, settings, Arc::new(NullDiagnostics));

        surfer.coarse_hyper_surf(&network()?, &mut hy)?;

        // no bisection rounds, so the pivot is the result
        assert_eq!(hy.mini_batch_size, 3);
        Ok(())
    }

    #[test]
    fn test_batch_size_search_needs_training_data() -> Result<()> {
        let empty = Dataset::new(Matrix::zeros(2, 0), Matrix::zeros(2, 0))?;
        let mut hy = HyperParameterBuilder::default()
            .mini_batch_size(10)
            .init_eta(0.3)
            .training_data(&empty)
            .eval_data(&empty)
            .build()?;
        let mut surfer = HyperSurfer::seeded(7, quick_settings(), Arc::new(NullDiagnostics));

        let result = surfer.mini_batch_size_surf(&network()?, &mut hy);
        assert!(matches!(result, Err(TrainingError::InvalidConfiguration(_))));
        assert_eq!(hy.mini_batch_size, 10);
        assert_eq!(hy.init_eta, 0.3);
        Ok(())
    }

    #[test]
    fn test_eta_search_backs_off_when_cost_stops_decreasing() -> Result<()> {
        let mut probed = Vec::new();
        let eta = coarse_eta_search(0.01, 35, |eta| {
            probed.push(eta);
            Ok(eta < 0.5)
        })?;

        assert_eq!(probed.len(), 3);
        assert_relative_eq!(eta, 0.1, max_relative = 1e-12);
        Ok(())
    }

    #[test]
    fn test_eta_search_stops_at_first_decrease() -> Result<()> {
        let mut probed = 0;
        let eta = coarse_eta_search(10.0, 35, |eta| {
            probed += 1;
            Ok(eta < 0.5)
        })?;

        // 10 and 1 fail, 0.1 is kept as is
        assert_eq!(probed, 3);
        assert_relative_eq!(eta, 0.1, max_relative = 1e-12);
        Ok(())
    }

    #[test]
    fn test_eta_search_without_change_is_exhausted() {
        let result = coarse_eta_search(0.01, 5, |_| Ok(true));
        assert!(matches!(
            result,
            Err(TrainingError::SearchExhausted { search: "eta", tries: 5 })
        ));
    }

    /// Improvement peaking at `peak`, falling off with the distance in orders of magnitude.
    fn peaked_at(peak: f64) -> impl FnMut(f64) -> Result<f64> {
        move |value: f64| Ok(-(value.log10() - peak.log10()).powi(2))
    }

    #[test]
    fn test_order_search_steps_back_after_the_drop() -> Result<()> {
        assert_eq!(coarse_order_search(1.0, 35, peaked_at(100.0))?, 100.0);
        assert_relative_eq!(
            coarse_order_search(1.0, 35, peaked_at(0.01))?,
            0.01,
            max_relative = 1e-9
        );
        Ok(())
    }

    #[test]
    fn test_order_search_prefers_bigger_side_on_ties() -> Result<()> {
        let mut probed = Vec::new();
        let result = coarse_order_search(1.0, 2, |value| {
            probed.push(value);
            Ok(0.0)
        });

        assert!(matches!(result, Err(TrainingError::SearchExhausted { tries: 2, .. })));
        assert_eq!(probed, vec![0.1, 10.0, 100.0, 1000.0]);
        Ok(())
    }

    #[test]
    fn test_batch_bisection_finds_best_size() -> Result<()> {
        let size = bisect_batch_size(100, 50, 15, |size| Ok(-(size as f64 - 30.0).abs()))?;
        assert_eq!(size, 30);
        Ok(())
    }

    #[test]
    fn test_batch_bisection_keeps_bigger_half_on_ties() -> Result<()> {
        assert_eq!(bisect_batch_size(100, 50, 15, |_| Ok(1.0))?, 99);
        // the pivot is clamped into range and kept without rounds
        assert_eq!(bisect_batch_size(4, 50, 0, |_| Ok(1.0))?, 4);
        assert_eq!(bisect_batch_size(1, 7, 15, |_| Ok(1.0))?, 1);
        Ok(())
    }
}
