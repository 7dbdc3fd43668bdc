use anyhow::{Context, Result};
use clap::Parser;
use matrix::Matrix;
use mnist::{MnistSet, OUTPUT_NODES, load_dataset};
use neural_network::Network;
use std::fmt;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Instant;
use training::{Evaluator, total_accuracy};

/// Reports the accuracy of a saved network on the MNIST test set
#[derive(Debug, Parser)]
#[command(name = "test_mnist", about, long_about = None)]
struct Args {
    /// Directory holding the MNIST IDX files
    data_dir: PathBuf,

    /// Network saved by train_mnist
    #[arg(long, default_value = "trained_network.json")]
    network: PathBuf,
}

/// Counts of actual digits (rows) against predicted digits (columns).
#[derive(Debug, Default, PartialEq)]
struct ConfusionMatrix {
    counts: [[usize; OUTPUT_NODES]; OUTPUT_NODES],
}

impl ConfusionMatrix {
    fn from_outputs(outputs: &Matrix, targets: &Matrix) -> Self {
        let mut matrix = Self::default();
        for col in 0..outputs.cols() {
            matrix.counts[targets.argmax_column(col)][outputs.argmax_column(col)] += 1;
        }
        matrix
    }

    fn correct(&self, digit: usize) -> usize {
        self.counts[digit][digit]
    }

    /// Examples of `digit` in the test set.
    fn actual(&self, digit: usize) -> usize {
        self.counts[digit].iter().sum()
    }

    /// Examples predicted as `digit`.
    fn predicted(&self, digit: usize) -> usize {
        self.counts.iter().map(|row| row[digit]).sum()
    }

    /// Precision, recall and F1 score of one digit.
    fn scores(&self, digit: usize) -> (f64, f64, f64) {
        let ratio = |part: usize, whole: usize| match whole {
            0 => 0.0,
            _ => part as f64 / whole as f64,
        };
        let precision = ratio(self.correct(digit), self.predicted(digit));
        let recall = ratio(self.correct(digit), self.actual(digit));
        let f1 = match precision + recall {
            sum if sum > 0.0 => 2.0 * precision * recall / sum,
            _ => 0.0,
        };
        (precision, recall, f1)
    }
}

impl fmt::Display for ConfusionMatrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Digit | Correct | Total | Precision | Recall | F1 Score")?;
        writeln!(f, "------|---------|-------|-----------|--------|---------")?;
        for digit in 0..OUTPUT_NODES {
            let (precision, recall, f1) = self.scores(digit);
            writeln!(
                f,
                "   {digit}  |  {:>5}  | {:>5} |  {:>6.2}%  | {:>5.2}% | {:>6.2}%",
                self.correct(digit),
                self.actual(digit),
                precision * 100.0,
                recall * 100.0,
                f1 * 100.0
            )?;
        }

        writeln!(f, "\nConfusion Matrix:")?;
        writeln!(f, "      Predicted →")?;
        write!(f, "Actual ")?;
        for digit in 0..OUTPUT_NODES {
            write!(f, " {digit:4}")?;
        }
        writeln!(f)?;
        for (digit, row) in self.counts.iter().enumerate() {
            write!(f, "  {digit}   |")?;
            for count in row {
                write!(f, " {count:4}")?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

fn run(args: &Args) -> Result<()> {
    let start = Instant::now();
    let network = Network::load(&args.network)
        .with_context(|| format!("Failed to load the network from {}", args.network.display()))?;
    let test = load_dataset(&args.data_dir, MnistSet::Test).context("Failed to load the MNIST test set")?;
    log::info!("Network and {} test examples loaded in {:.2?}", test.len(), start.elapsed());

    let correct = total_accuracy(&network, &test, Evaluator::Classifier)?;
    let outputs = network.feedforward(test.inputs())?;
    let confusion = ConfusionMatrix::from_outputs(&outputs, test.targets());

    println!("\nTest Results:");
    println!("Total test examples: {}", test.len());
    println!("Correct predictions: {correct}");
    println!("Overall accuracy: {:.2}%", 100.0 * correct / test.len().max(1) as f64);
    println!("\n{confusion}");
    Ok(())
}

fn main() -> ExitCode {
    let args = Args::parse();
    env_logger::Builder::new()
        .filter_level(log::LevelFilter::Info)
        .init();

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!(target: "error", "{e:#}");
            ExitCode::FAILURE
        }
    }
}
