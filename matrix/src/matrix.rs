use approx::{AbsDiffEq, RelativeEq};
use ndarray::{Array2, Axis, s};
use rand::Rng;
use rand_distr::StandardNormal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{AddAssign, Mul, MulAssign, SubAssign};

/// Dense `f64` matrix backed by an [`ndarray::Array2`].
///
/// Network code keeps one example per column, so a batch of `k` examples fed to a
/// layer of width `n` is an `n x k` matrix and a bias vector is an `n x 1` matrix.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Matrix {
    pub(crate) data: Array2<f64>,
}

/// Builds a matrix from a flat, row-major buffer.
pub trait IntoMatrix {
    fn into_matrix(self, rows: usize, cols: usize) -> Matrix;
}

impl IntoMatrix for Vec<f64> {
    fn into_matrix(self, rows: usize, cols: usize) -> Matrix {
        Matrix::new(rows, cols, self)
    }
}

impl Matrix {
    /// Creates a matrix from row-major `data`.
    ///
    /// # Panics
    ///
    /// Panics if `data.len() != rows * cols`.
    #[must_use]
    pub fn new(rows: usize, cols: usize, data: Vec<f64>) -> Self {
        assert_eq!(
            data.len(),
            rows * cols,
            "Data length must match rows * cols"
        );
        let data = Array2::from_shape_fn((rows, cols), |(row, col)| data[row * cols + col]);
        Self { data }
    }

    #[must_use]
    pub fn from_array(data: Array2<f64>) -> Self {
        Self { data }
    }

    /// Creates a matrix from column-major nested vectors: `columns[j][i]` is the entry
    /// at row `i`, column `j`.
    ///
    /// Returns `None` when a column does not have exactly `rows` entries.
    #[must_use]
    pub fn from_columns(rows: usize, columns: &[Vec<f64>]) -> Option<Self> {
        if columns.iter().any(|column| column.len() != rows) {
            return None;
        }
        let data = Array2::from_shape_fn((rows, columns.len()), |(row, col)| columns[col][row]);
        Some(Self { data })
    }

    /// Draws every entry from the standard normal distribution.
    #[must_use]
    pub fn random_normal<R: Rng + ?Sized>(rows: usize, cols: usize, rng: &mut R) -> Self {
        let data = Array2::from_shape_simple_fn((rows, cols), || {
            rng.sample::<f64, _>(StandardNormal)
        });
        Self { data }
    }

    #[must_use]
    pub fn zeros(rows: usize, cols: usize) -> Self {
        Self {
            data: Array2::zeros((rows, cols)),
        }
    }

    #[inline(always)]
    #[must_use]
    pub fn rows(&self) -> usize {
        self.data.nrows()
    }

    #[inline(always)]
    #[must_use]
    pub fn cols(&self) -> usize {
        self.data.ncols()
    }

    #[inline(always)]
    #[must_use]
    pub fn shape(&self) -> (usize, usize) {
        self.data.dim()
    }

    #[inline(always)]
    #[must_use]
    pub fn data(&self) -> &Array2<f64> {
        &self.data
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Returns the entry at (`row`, `col`).
    ///
    /// # Panics
    ///
    /// Panics if the index is out of bounds.
    #[must_use]
    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.data[[row, col]]
    }

    pub fn iter(&self) -> impl Iterator<Item = &f64> {
        self.data.iter()
    }

    #[must_use]
    pub fn elementwise_multiply(&self, other: &Matrix) -> Matrix {
        assert_eq!(self.rows(), other.rows(), "Matrix rows must match");
        assert_eq!(self.cols(), other.cols(), "Matrix columns must match");

        Matrix {
            data: &self.data * &other.data,
        }
    }

    #[must_use]
    pub fn dot_multiply(&self, other: &Matrix) -> Matrix {
        assert_eq!(
            self.cols(),
            other.rows(),
            "Invalid matrix dimensions for multiplication"
        );

        Matrix {
            data: self.data.dot(&other.data),
        }
    }

    #[must_use]
    pub fn transpose(&self) -> Self {
        Matrix {
            data: self.data.t().to_owned(),
        }
    }

    #[must_use]
    pub fn map<F>(&self, f: F) -> Self
    where
        F: Fn(f64) -> f64,
    {
        Matrix {
            data: self.data.mapv(f),
        }
    }

    /// Like [`Matrix::map`], but spreads the work over the rayon thread pool.
    #[must_use]
    pub fn par_map<F>(&self, f: F) -> Self
    where
        F: Fn(f64) -> f64 + Sync + Send,
    {
        let mut data = self.data.clone();
        data.par_mapv_inplace(f);
        Matrix { data }
    }

    #[must_use]
    pub fn add(&self, other: &Matrix) -> Matrix {
        assert_eq!(self.rows(), other.rows(), "Matrix rows must match");
        assert_eq!(self.cols(), other.cols(), "Matrix columns must match");

        Matrix {
            data: &self.data + &other.data,
        }
    }

    #[must_use]
    pub fn subtract(&self, other: &Matrix) -> Matrix {
        assert_eq!(self.rows(), other.rows(), "Matrix rows must match");
        assert_eq!(self.cols(), other.cols(), "Matrix columns must match");

        Matrix {
            data: &self.data - &other.data,
        }
    }

    /// Adds the column vector `column` to every column of `self`.
    #[must_use]
    pub fn add_column(&self, column: &Matrix) -> Matrix {
        assert_eq!(self.rows(), column.rows(), "Matrix rows must match");
        assert_eq!(column.cols(), 1, "Broadcast operand must be a column vector");

        let mut data = self.data.clone();
        data += &column.data;
        Matrix { data }
    }

    /// Sums each row across all columns, returning a column vector.
    #[must_use]
    pub fn sum_columns(&self) -> Matrix {
        Matrix {
            data: self.data.sum_axis(Axis(1)).insert_axis(Axis(1)),
        }
    }

    /// `self += alpha * other`, in place.
    pub fn scaled_add(&mut self, alpha: f64, other: &Matrix) {
        assert_eq!(self.rows(), other.rows(), "Matrix rows must match");
        assert_eq!(self.cols(), other.cols(), "Matrix columns must match");

        self.data.scaled_add(alpha, &other.data);
    }

    /// Elementwise sign; zero maps to zero.
    #[must_use]
    pub fn signum(&self) -> Matrix {
        self.map(|x| if x == 0.0 { 0.0 } else { x.signum() })
    }

    #[must_use]
    pub fn sum(&self) -> f64 {
        self.data.sum()
    }

    #[must_use]
    pub fn sum_abs(&self) -> f64 {
        self.data.iter().map(|x| x.abs()).sum()
    }

    /// Sum of squared entries, i.e. the squared Frobenius norm.
    #[must_use]
    pub fn sum_squares(&self) -> f64 {
        self.data.iter().map(|x| x * x).sum()
    }

    #[must_use]
    pub fn column(&self, col: usize) -> Matrix {
        self.columns(col, 1)
    }

    /// Copies the contiguous block of `len` columns starting at `offset`.
    ///
    /// # Panics
    ///
    /// Panics if `offset + len > self.cols()`.
    #[must_use]
    pub fn columns(&self, offset: usize, len: usize) -> Matrix {
        Matrix {
            data: self.data.slice(s![.., offset..offset + len]).to_owned(),
        }
    }

    /// Gathers the columns at `indices`, in that order.
    #[must_use]
    pub fn select_columns(&self, indices: &[usize]) -> Matrix {
        Matrix {
            data: self.data.select(Axis(1), indices),
        }
    }

    /// Row index of the largest entry in column `col`. Ties go to the lowest index.
    #[must_use]
    pub fn argmax_column(&self, col: usize) -> usize {
        let mut best = 0;
        let mut best_value = f64::NEG_INFINITY;
        for (row, &value) in self.data.column(col).iter().enumerate() {
            if row == 0 || value > best_value {
                best = row;
                best_value = value;
            }
        }
        best
    }

    /// Column-major nested copy; inverse of [`Matrix::from_columns`].
    #[must_use]
    pub fn to_columns(&self) -> Vec<Vec<f64>> {
        self.data
            .columns()
            .into_iter()
            .map(|column| column.to_vec())
            .collect()
    }
}

impl Default for Matrix {
    fn default() -> Self {
        Self::zeros(0, 0)
    }
}

impl From<Vec<f64>> for Matrix {
    fn from(vec: Vec<f64>) -> Self {
        let rows = vec.len();
        Matrix::new(rows, 1, vec)
    }
}

impl From<Array2<f64>> for Matrix {
    fn from(data: Array2<f64>) -> Self {
        Matrix { data }
    }
}

impl AddAssign<&Matrix> for Matrix {
    fn add_assign(&mut self, other: &Matrix) {
        assert_eq!(self.shape(), other.shape(), "Matrix shapes must match");
        self.data += &other.data;
    }
}

impl SubAssign<&Matrix> for Matrix {
    fn sub_assign(&mut self, other: &Matrix) {
        assert_eq!(self.shape(), other.shape(), "Matrix shapes must match");
        self.data -= &other.data;
    }
}

impl MulAssign<f64> for Matrix {
    fn mul_assign(&mut self, factor: f64) {
        self.data *= factor;
    }
}

impl Mul<f64> for &Matrix {
    type Output = Matrix;

    fn mul(self, factor: f64) -> Matrix {
        Matrix {
            data: &self.data * factor,
        }
    }
}

impl AbsDiffEq for Matrix {
    type Epsilon = f64;

    fn default_epsilon() -> f64 {
        f64::default_epsilon()
    }

    fn abs_diff_eq(&self, other: &Self, epsilon: f64) -> bool {
        self.shape() == other.shape()
            && self
                .data
                .iter()
                .zip(other.data.iter())
                .all(|(a, b)| a.abs_diff_eq(b, epsilon))
    }
}

impl RelativeEq for Matrix {
    fn default_max_relative() -> f64 {
        f64::default_max_relative()
    }

    fn relative_eq(&self, other: &Self, epsilon: f64, max_relative: f64) -> bool {
        self.shape() == other.shape()
            && self
                .data
                .iter()
                .zip(other.data.iter())
                .all(|(a, b)| a.relative_eq(b, epsilon, max_relative))
    }
}

impl fmt::Display for Matrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for row in self.data.rows() {
            for value in row {
                write!(f, "{:8.4}", value)?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}
