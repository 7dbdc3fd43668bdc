use crate::hyper_parameter::HyperParameterBuilderError;
use neural_network::NetworkError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TrainingError {
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Incomplete hyper parameters: {0}")]
    Builder(#[from] HyperParameterBuilderError),

    #[error(transparent)]
    Network(#[from] NetworkError),

    #[error("{search} search found no transition within {tries} tries")]
    SearchExhausted { search: &'static str, tries: usize },
}

pub type Result<T> = std::result::Result<T, TrainingError>;
