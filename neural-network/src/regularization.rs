use matrix::Matrix;

/// Weight penalty applied during training and added to monitored costs.
///
/// Both operations are scaled by the number of examples `n` in the dataset the
/// network is trained on (or, for [`penalty`](RegularizationFunction::penalty),
/// evaluated on). A zero `lambda` is a no-op.
pub trait RegularizationFunction: Send + Sync {
    /// Penalty term added to the cost of a dataset of `n` examples.
    fn penalty(&self, weights: &[Matrix], lambda: f64, n: usize) -> f64;

    /// Applies one step of weight decay to the velocity of `weights`.
    fn decay(&self, velocity: &mut Matrix, weights: &Matrix, eta: f64, lambda: f64, n: usize);
}

/// L1 regularization (Lasso)
///
/// Penalty `(lambda/n) * sum(|w|)`; decay subtracts `eta * (lambda/n) * sign(w)`
/// from the velocity.
#[derive(Debug, Clone, Copy)]
pub struct L1;

impl RegularizationFunction for L1 {
    fn penalty(&self, weights: &[Matrix], lambda: f64, n: usize) -> f64 {
        if lambda == 0.0 {
            return 0.0;
        }
        weights.iter().map(Matrix::sum_abs).sum::<f64>() * lambda / n as f64
    }

    fn decay(&self, velocity: &mut Matrix, weights: &Matrix, eta: f64, lambda: f64, n: usize) {
        if lambda == 0.0 {
            return;
        }
        velocity.scaled_add(-eta * lambda / n as f64, &weights.signum());
    }
}

/// L2 regularization (Ridge)
///
/// Penalty `0.5 * (lambda/n) * sum(w^2)`; decay shrinks the velocity by
/// `1 - eta * lambda/n`.
#[derive(Debug, Clone, Copy)]
pub struct L2;

impl RegularizationFunction for L2 {
    fn penalty(&self, weights: &[Matrix], lambda: f64, n: usize) -> f64 {
        if lambda == 0.0 {
            return 0.0;
        }
        weights.iter().map(Matrix::sum_squares).sum::<f64>() * 0.5 * lambda / n as f64
    }

    fn decay(&self, velocity: &mut Matrix, _weights: &Matrix, eta: f64, lambda: f64, n: usize) {
        if lambda == 0.0 {
            return;
        }
        *velocity *= 1.0 - eta * lambda / n as f64;
    }
}

/// Global instances of regularization functions
pub const L1_REG: L1 = L1;
pub const L2_REG: L2 = L2;

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use matrix::IntoMatrix;

    #[test]
    fn test_l1_penalty() {
        let weights = vec![
            vec![1.0, -2.0, 3.0, -4.0].into_matrix(2, 2),
            vec![5.0, -6.0, 7.0, -8.0, 9.0, -10.0].into_matrix(2, 3),
        ];

        // Sum of absolute values: 10 + 45 = 55, scaled by 1.1 / 10
        let penalty = L1_REG.penalty(&weights, 1.1, 10);
        assert_relative_eq!(penalty, 6.05, epsilon = 1e-10);
    }

    #[test]
    fn test_l2_penalty() {
        let weights = vec![
            vec![1.0, 2.0, 3.0, 4.0].into_matrix(2, 2),
            vec![5.0, 6.0, 7.0, 8.0, 9.0, 10.0].into_matrix(2, 3),
        ];

        // Sum of squares: 30 + 355 = 385, times 0.5 * 0.2 / 5
        let penalty = L2_REG.penalty(&weights, 0.2, 5);
        assert_relative_eq!(penalty, 7.7, epsilon = 1e-10);
    }

    #[test]
    fn test_zero_lambda_is_a_no_op() {
        let weights = vec![vec![1.0, -2.0].into_matrix(1, 2)];
        let mut velocity = vec![0.5, 0.5].into_matrix(1, 2);

        assert_eq!(L1_REG.penalty(&weights, 0.0, 0), 0.0);
        assert_eq!(L2_REG.penalty(&weights, 0.0, 0), 0.0);

        L1_REG.decay(&mut velocity, &weights[0], 0.1, 0.0, 0);
        L2_REG.decay(&mut velocity, &weights[0], 0.1, 0.0, 0);
        assert_eq!(velocity, vec![0.5, 0.5].into_matrix(1, 2));
    }

    #[test]
    fn test_l1_decay_follows_weight_sign() {
        let weights = vec![1.0, -2.0, 0.0, 4.0].into_matrix(2, 2);
        let mut velocity = vec![0.0; 4].into_matrix(2, 2);

        L1_REG.decay(&mut velocity, &weights, 0.5, 0.2, 10);

        // eta * lambda / n = 0.01
        assert_relative_eq!(velocity.get(0, 0), -0.01, epsilon = 1e-12);
        assert_relative_eq!(velocity.get(0, 1), 0.01, epsilon = 1e-12);
        assert_eq!(velocity.get(1, 0), 0.0);
        assert_relative_eq!(velocity.get(1, 1), -0.01, epsilon = 1e-12);
    }

    #[test]
    fn test_l2_decay_shrinks_velocity() {
        let weights = vec![1.0, 2.0].into_matrix(1, 2);
        let mut velocity = vec![1.0, -2.0].into_matrix(1, 2);

        L2_REG.decay(&mut velocity, &weights, 0.5, 2.0, 10);

        assert_relative_eq!(velocity.get(0, 0), 0.9, epsilon = 1e-12);
        assert_relative_eq!(velocity.get(0, 1), -1.8, epsilon = 1e-12);
    }
}
