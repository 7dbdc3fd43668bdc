use crate::costs::Cost;
use crate::error::{NetworkError, Result};
use crate::network::Network;
use matrix::Matrix;
use serde::{Deserialize, Serialize};

/// On-disk form of a [`Network`].
///
/// Each weight matrix is stored column-major: `weights[i][col][row]`. Velocities
/// are not part of the record.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NetworkRecord {
    pub sizes: Vec<usize>,
    pub weights: Vec<Vec<Vec<f64>>>,
    pub biases: Vec<Vec<f64>>,
    pub cost: String,
}

impl From<&Network> for NetworkRecord {
    fn from(network: &Network) -> Self {
        NetworkRecord {
            sizes: network.sizes().to_vec(),
            weights: network.weights().iter().map(Matrix::to_columns).collect(),
            biases: network
                .biases()
                .iter()
                .map(|b| b.iter().copied().collect())
                .collect(),
            cost: network.cost().name().to_string(),
        }
    }
}

impl TryFrom<NetworkRecord> for Network {
    type Error = NetworkError;

    fn try_from(record: NetworkRecord) -> Result<Self> {
        let cost: Cost = record.cost.parse()?;
        let weights = record
            .weights
            .iter()
            .zip(record.sizes.iter().skip(1))
            .enumerate()
            .map(|(i, (columns, &rows))| {
                Matrix::from_columns(rows, columns).ok_or_else(|| NetworkError::InvalidShape {
                    what: format!("weights[{i}]"),
                    expected: (rows, columns.len()),
                    actual: (columns.first().map_or(0, Vec::len), columns.len()),
                })
            })
            .collect::<Result<Vec<_>>>()?;
        let biases = record.biases.into_iter().map(Matrix::from).collect();
        Network::from_parameters(record.sizes, weights, biases, cost)
    }
}
