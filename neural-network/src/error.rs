use thiserror::Error;

#[derive(Debug, Error)]
pub enum NetworkError {
    #[error("Unknown cost function '{0}', expected 'quadratic' or 'cross_entropy'")]
    UnknownCost(String),

    #[error("Invalid input: expected {expected} rows, got {actual}")]
    InvalidInput { expected: usize, actual: usize },

    #[error("Invalid layer sizes {0:?}: need at least two layers, none of them empty")]
    InvalidSizes(Vec<usize>),

    #[error("Invalid shape for {what}: expected {expected:?}, got {actual:?}")]
    InvalidShape {
        what: String,
        expected: (usize, usize),
        actual: (usize, usize),
    },

    #[error("Dataset mismatch: {inputs} input columns but {targets} target columns")]
    DatasetMismatch { inputs: usize, targets: usize },

    #[error("Subset of {length} examples at offset {offset} is out of range for {len} examples")]
    SubsetOutOfRange {
        offset: usize,
        length: usize,
        len: usize,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, NetworkError>;
