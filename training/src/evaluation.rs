use matrix::Matrix;
use neural_network::{Dataset, Network, NetworkError};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Decides whether the network output for one example counts as correct.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Evaluator {
    /// The highest output is at the same index as the highest target.
    #[default]
    Classifier,
    /// Every output rounded to the nearest integer equals its target.
    AllRoundCorrect,
}

impl Evaluator {
    pub fn is_correct(&self, outputs: &Matrix, targets: &Matrix, col: usize) -> bool {
        match self {
            Evaluator::Classifier => outputs.argmax_column(col) == targets.argmax_column(col),
            Evaluator::AllRoundCorrect => (0..outputs.rows())
                .all(|row| outputs.get(row, col).round() == targets.get(row, col)),
        }
    }
}

/// Number of examples in `data` the network gets right.
pub fn total_accuracy(
    network: &Network,
    data: &Dataset,
    evaluator: Evaluator,
) -> Result<f64, NetworkError> {
    let outputs = network.feedforward(data.inputs())?;
    let targets = data.targets();
    let correct = (0..data.len())
        .into_par_iter()
        .filter(|&col| evaluator.is_correct(&outputs, targets, col))
        .count();
    Ok(correct as f64)
}

/// Mean cost per example plus the regularization penalty for a dataset of this size.
///
/// An empty dataset has zero cost.
pub fn total_cost(
    network: &Network,
    data: &Dataset,
    lambda_l1: f64,
    lambda_l2: f64,
) -> Result<f64, NetworkError> {
    if data.is_empty() {
        return Ok(0.0);
    }
    let n = data.len();
    let outputs = network.feedforward(data.inputs())?;
    let cost = network.cost().cost(&outputs, data.targets()) / n as f64;
    Ok(cost + network.regularization_penalty(lambda_l1, lambda_l2, n))
}
