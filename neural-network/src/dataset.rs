use crate::error::{NetworkError, Result};
use matrix::Matrix;
use rand::Rng;
use rand::seq::SliceRandom;

/// Paired input and target examples, one example per column.
#[derive(Clone, Debug, PartialEq)]
pub struct Dataset {
    inputs: Matrix,
    targets: Matrix,
}

impl Dataset {
    /// Pairs `inputs` with `targets`.
    ///
    /// # Errors
    ///
    /// Returns [`NetworkError::DatasetMismatch`] if the two matrices do not have the
    /// same number of columns.
    pub fn new(inputs: Matrix, targets: Matrix) -> Result<Self> {
        if inputs.cols() != targets.cols() {
            return Err(NetworkError::DatasetMismatch {
                inputs: inputs.cols(),
                targets: targets.cols(),
            });
        }
        Ok(Self { inputs, targets })
    }

    /// Builds a dataset from per-example vectors.
    ///
    /// # Examples
    ///
    /// ```
    /// use neural_network::Dataset;
    ///
    /// let xor = Dataset::from_examples(
    ///     &[vec![0.0, 0.0], vec![0.0, 1.0], vec![1.0, 0.0], vec![1.0, 1.0]],
    ///     &[vec![0.0], vec![1.0], vec![1.0], vec![0.0]],
    /// )
    /// .unwrap();
    /// assert_eq!(xor.len(), 4);
    /// assert_eq!(xor.input_size(), 2);
    /// ```
    pub fn from_examples(inputs: &[Vec<f64>], targets: &[Vec<f64>]) -> Result<Self> {
        let inputs = columns_to_matrix("inputs", inputs)?;
        let targets = columns_to_matrix("targets", targets)?;
        Self::new(inputs, targets)
    }

    pub fn inputs(&self) -> &Matrix {
        &self.inputs
    }

    pub fn targets(&self) -> &Matrix {
        &self.targets
    }

    pub fn len(&self) -> usize {
        self.inputs.cols()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn input_size(&self) -> usize {
        self.inputs.rows()
    }

    pub fn target_size(&self) -> usize {
        self.targets.rows()
    }

    /// Copy with the columns permuted; inputs and targets stay paired.
    pub fn shuffled<R: Rng + ?Sized>(&self, rng: &mut R) -> Dataset {
        let mut order: Vec<usize> = (0..self.len()).collect();
        order.shuffle(rng);
        Dataset {
            inputs: self.inputs.select_columns(&order),
            targets: self.targets.select_columns(&order),
        }
    }

    /// Contiguous batch of at most `length` examples starting at `offset`.
    ///
    /// The batch is shortened when it runs past the end of the dataset.
    pub fn mini_batch(&self, offset: usize, length: usize) -> Dataset {
        let start = offset.min(self.len());
        let length = length.min(self.len() - start);
        Dataset {
            inputs: self.inputs.columns(start, length),
            targets: self.targets.columns(start, length),
        }
    }

    /// Exactly `length` examples starting at `offset`.
    ///
    /// # Errors
    ///
    /// Returns [`NetworkError::SubsetOutOfRange`] if the range does not fit.
    pub fn subset(&self, offset: usize, length: usize) -> Result<Dataset> {
        match offset.checked_add(length) {
            Some(end) if end <= self.len() => Ok(self.mini_batch(offset, length)),
            _ => Err(NetworkError::SubsetOutOfRange {
                offset,
                length,
                len: self.len(),
            }),
        }
    }

    /// Dataset with inputs and targets exchanged.
    pub fn switched(&self) -> Dataset {
        Dataset {
            inputs: self.targets.clone(),
            targets: self.inputs.clone(),
        }
    }
}

fn columns_to_matrix(what: &str, columns: &[Vec<f64>]) -> Result<Matrix> {
    let rows = columns.first().map_or(0, Vec::len);
    Matrix::from_columns(rows, columns).ok_or_else(|| {
        let bad = columns.iter().find(|c| c.len() != rows).map_or(0, Vec::len);
        NetworkError::InvalidShape {
            what: what.to_string(),
            expected: (rows, 1),
            actual: (bad, 1),
        }
    })
}
