mod progress;

use crate::progress::ProgressDiagnostics;
use anyhow::{Context, Result, bail};
use clap::{Parser, ValueEnum};
use log::LevelFilter;
use mnist::{MnistSet, load_dataset};
use neural_network::{Cost, Network};
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use training::{
    Channel, Diagnostics, HyperParameterBuilder, HyperSurfer, LearningScheduleType, SurfSettings,
    Trainer,
};

/// Trains a sigmoid network on MNIST with mini-batch gradient descent
#[derive(Debug, Parser)]
#[command(name = "train_mnist", about, long_about = None)]
struct Args {
    /// Directory holding the four MNIST IDX files
    data_dir: PathBuf,

    /// Log verbosity: d (debug), i (info) or c (errors only)
    #[arg(value_enum, default_value_t = Verbosity::Info)]
    verbosity: Verbosity,

    /// Hidden layer sizes, comma separated
    #[arg(long, value_delimiter = ',', default_value = "30")]
    hidden: Vec<usize>,

    /// quadratic or cross_entropy
    #[arg(long, default_value = "cross_entropy")]
    cost: Cost,

    #[arg(long, default_value_t = 30)]
    epochs: usize,

    #[arg(long, default_value_t = 10)]
    batch: usize,

    #[arg(long, default_value_t = 0.5)]
    eta: f64,

    /// Momentum coefficient
    #[arg(long, default_value_t = 0.0)]
    mu: f64,

    #[arg(long, default_value_t = 0.0)]
    lambda_l1: f64,

    #[arg(long, default_value_t = 0.0)]
    lambda_l2: f64,

    /// Accuracy series that drives the learning rate schedule
    #[arg(long, value_enum, default_value_t = Schedule::None)]
    schedule: Schedule,

    /// Epochs without improvement before the learning rate is halved
    #[arg(long, default_value_t = 10)]
    patience: usize,

    /// Stop once the learning rate falls below eta / FRACTION
    #[arg(long, value_name = "FRACTION")]
    stop_fraction: Option<f64>,

    /// Training examples held back for evaluation
    #[arg(long, default_value_t = 10_000)]
    eval_size: usize,

    /// Seed for reproducible runs
    #[arg(long)]
    seed: Option<u64>,

    /// Search hyper parameters before training
    #[arg(long)]
    surf: bool,

    #[arg(long, default_value = "trained_network.json")]
    network_out: PathBuf,

    /// Write the training history as JSON
    #[arg(long)]
    history_out: Option<PathBuf>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Verbosity {
    #[value(name = "d")]
    Debug,
    #[value(name = "i")]
    Info,
    #[value(name = "c")]
    Critical,
}

impl From<Verbosity> for LevelFilter {
    fn from(verbosity: Verbosity) -> Self {
        match verbosity {
            Verbosity::Debug => LevelFilter::Debug,
            Verbosity::Info => LevelFilter::Info,
            Verbosity::Critical => LevelFilter::Error,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Schedule {
    None,
    Test,
    Eval,
}

impl From<Schedule> for LearningScheduleType {
    fn from(schedule: Schedule) -> Self {
        match schedule {
            Schedule::None => LearningScheduleType::None,
            Schedule::Test => LearningScheduleType::TestAccuracy,
            Schedule::Eval => LearningScheduleType::EvalAccuracy,
        }
    }
}

fn main() -> ExitCode {
    let args = Args::parse();
    env_logger::Builder::new()
        .filter_level(args.verbosity.into())
        .format_target(true)
        .init();

    let diagnostics = Arc::new(ProgressDiagnostics::new());
    match run(&args, diagnostics.clone()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            diagnostics.finish();
            diagnostics.error(format_args!("{e:#}"));
            ExitCode::FAILURE
        }
    }
}

fn rng(seed: Option<u64>) -> StdRng {
    seed.map_or_else(StdRng::from_os_rng, StdRng::seed_from_u64)
}

fn run(args: &Args, diagnostics: Arc<ProgressDiagnostics>) -> Result<()> {
    let client = Channel::Client;
    diagnostics.general(
        client,
        format_args!("Loading MNIST data from {}", args.data_dir.display()),
    );
    let full = load_dataset(&args.data_dir, MnistSet::Training)
        .context("Failed to load the MNIST training set")?;
    let test = load_dataset(&args.data_dir, MnistSet::Test)
        .context("Failed to load the MNIST test set")?;
    if args.eval_size >= full.len() {
        bail!(
            "eval size {} leaves no training examples out of {}",
            args.eval_size,
            full.len()
        );
    }
    let train_len = full.len() - args.eval_size;
    let training = full.subset(0, train_len)?;
    let eval = full.subset(train_len, args.eval_size)?;
    drop(full);
    diagnostics.general(
        client,
        format_args!(
            "{} training, {} eval and {} test examples",
            training.len(),
            eval.len(),
            test.len()
        ),
    );

    let mut sizes = vec![training.input_size()];
    sizes.extend(&args.hidden);
    sizes.push(training.target_size());
    let mut network = Network::new(sizes, args.cost, &mut rng(args.seed))
        .context("Failed to create the network")?;

    let mut builder = HyperParameterBuilder::default();
    builder
        .mini_batch_size(args.batch)
        .init_eta(args.eta)
        .mu(args.mu)
        .lambda_l1(args.lambda_l1)
        .lambda_l2(args.lambda_l2)
        .training_data(&training)
        .test_data(&test)
        .eval_data(&eval)
        .max_epochs(Some(args.epochs))
        .learning_schedule_type(args.schedule.into())
        .no_improvement_in(args.patience)
        .monitor_train_cost(true)
        .monitor_eval_accuracy(true)
        .monitor_test_accuracy(true);
    if let Some(fraction) = args.stop_fraction {
        builder.stop_eta_fraction(fraction);
    }
    let mut hy = builder.build()?;
    hy.is_valid().context("Invalid training settings")?;

    if args.surf {
        let mut surfer = match args.seed {
            Some(seed) => HyperSurfer::seeded(seed, SurfSettings::default(), diagnostics.clone()),
            None => HyperSurfer::new(
                Trainer::new(diagnostics.clone()),
                StdRng::from_os_rng(),
                SurfSettings::default(),
            ),
        };
        surfer
            .hyper_surf(&network, &mut hy)
            .context("Hyper parameter surfing failed")?;
        diagnostics.general(client, format_args!("Surfed settings:\n{hy}"));
    }

    let mut trainer = match args.seed {
        Some(seed) => Trainer::seeded(seed, diagnostics.clone()),
        None => Trainer::new(diagnostics.clone()),
    };
    trainer.sgd(&mut network, &mut hy).context("Training failed")?;
    diagnostics.finish();
    diagnostics.general(client, format_args!("{}", hy.results));

    network
        .save(&args.network_out)
        .with_context(|| format!("Failed to save the network to {}", args.network_out.display()))?;
    diagnostics.general(
        client,
        format_args!("Network saved to {}", args.network_out.display()),
    );

    if let Some(path) = &args.history_out {
        let json = serde_json::to_string_pretty(&hy.results)?;
        fs::write(path, json)
            .with_context(|| format!("Failed to write the training history to {}", path.display()))?;
        diagnostics.general(client, format_args!("Training history saved to {}", path.display()));
    }
    Ok(())
}
