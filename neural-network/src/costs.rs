use crate::activations::SIGMOID;
use crate::error::NetworkError;
use matrix::Matrix;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Cost function of the output layer.
///
/// The cost value itself is only used for monitoring; training is driven by
/// [`Cost::error`], the derivative of the cost with respect to the output
/// pre-activation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Cost {
    Quadratic,
    #[default]
    CrossEntropy,
}

impl Cost {
    /// Total cost of the outputs `a` against the targets `y`, summed over all columns.
    ///
    /// # Examples
    ///
    /// ```
    /// use matrix::Matrix;
    /// use neural_network::Cost;
    ///
    /// let a = Matrix::from(vec![0.5, 1.0]);
    /// let y = Matrix::from(vec![1.0, 1.0]);
    /// assert_eq!(Cost::Quadratic.cost(&a, &y), 0.125);
    /// ```
    pub fn cost(&self, a: &Matrix, y: &Matrix) -> f64 {
        match self {
            Cost::Quadratic => 0.5 * a.subtract(y).sum_squares(),
            Cost::CrossEntropy => a
                .iter()
                .zip(y.iter())
                .map(|(&a, &y)| {
                    let term = -y * a.ln() - (1.0 - y) * (1.0 - a).ln();
                    if term.is_nan() { 0.0 } else { term }
                })
                .sum(),
        }
    }

    /// Output-layer error `dC/dz` for pre-activations `z`, activations `a` and targets `y`.
    pub fn error(&self, z: &Matrix, a: &Matrix, y: &Matrix) -> Matrix {
        match self {
            Cost::Quadratic => a.subtract(y).elementwise_multiply(&SIGMOID.prime(z)),
            Cost::CrossEntropy => a.subtract(y),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Cost::Quadratic => "quadratic",
            Cost::CrossEntropy => "cross_entropy",
        }
    }
}

impl FromStr for Cost {
    type Err = NetworkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "quadratic" => Ok(Cost::Quadratic),
            "cross_entropy" => Ok(Cost::CrossEntropy),
            other => Err(NetworkError::UnknownCost(other.to_string())),
        }
    }
}

impl fmt::Display for Cost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activations::sigmoid_prime;
    use approx::assert_relative_eq;
    use matrix::matrix;

    #[test]
    fn test_quadratic_cost_is_half_sum_of_squares() {
        let a = matrix![
            0.2, 0.9;
            0.6, 0.1
        ];
        let y = matrix![
            0.0, 1.0;
            1.0, 0.0
        ];

        // 0.5 * (0.04 + 0.01 + 0.16 + 0.01)
        assert_relative_eq!(Cost::Quadratic.cost(&a, &y), 0.11, epsilon = 1e-12);
    }

    #[test]
    fn test_cross_entropy_cost_ignores_nan_terms() {
        let a = Matrix::from(vec![1.0, 0.0, 0.5]);
        let y = Matrix::from(vec![1.0, 0.0, 1.0]);

        let cost = Cost::CrossEntropy.cost(&a, &y);
        assert!(cost.is_finite());
        assert_relative_eq!(cost, 2.0_f64.ln(), epsilon = 1e-12);
    }

    #[test]
    fn test_cross_entropy_error_is_output_minus_target() {
        let z = matrix![
            0.3, -1.2;
            2.0, 0.0
        ];
        let a = z.map(crate::activations::sigmoid);
        let y = matrix![
            1.0, 0.0;
            0.0, 1.0
        ];

        assert_eq!(Cost::CrossEntropy.error(&z, &a, &y), a.subtract(&y));
    }

    #[test]
    fn test_quadratic_error_includes_sigmoid_prime() {
        let z = Matrix::from(vec![0.0, 1.0]);
        let a = Matrix::from(vec![0.5, 0.75]);
        let y = Matrix::from(vec![1.0, 0.0]);

        let error = Cost::Quadratic.error(&z, &a, &y);
        assert_relative_eq!(error.get(0, 0), -0.5 * 0.25, epsilon = 1e-12);
        assert_relative_eq!(error.get(1, 0), 0.75 * sigmoid_prime(1.0), epsilon = 1e-12);
    }

    #[test]
    fn test_cost_names() -> Result<(), NetworkError> {
        assert_eq!("quadratic".parse::<Cost>()?, Cost::Quadratic);
        assert_eq!("cross_entropy".parse::<Cost>()?, Cost::CrossEntropy);
        assert_eq!(Cost::CrossEntropy.to_string(), "cross_entropy");
        assert!(matches!(
            "hinge".parse::<Cost>(),
            Err(NetworkError::UnknownCost(name)) if name == "hinge"
        ));
        Ok(())
    }

    #[test]
    fn test_cost_serializes_as_name() -> Result<(), serde_json::Error> {
        assert_eq!(serde_json::to_string(&Cost::Quadratic)?, r#""quadratic""#);
        let cost: Cost = serde_json::from_str(r#""cross_entropy""#)?;
        assert_eq!(cost, Cost::CrossEntropy);
        Ok(())
    }
}
