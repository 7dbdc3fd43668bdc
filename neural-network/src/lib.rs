// Modules
pub mod activations;
mod costs;
mod dataset;
mod error;
mod network;
mod record;
pub mod regularization;

pub use activations::{Activation, SIGMOID, sigmoid, sigmoid_prime};
pub use costs::Cost;
pub use dataset::Dataset;
pub use error::NetworkError;
pub use matrix::Matrix;
pub use network::{Gradients, Network, StepParameters, WeightInit};
pub use record::NetworkRecord;
