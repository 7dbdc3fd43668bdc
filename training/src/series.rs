//! Helpers over per-epoch metric series.

/// `true` if every value is strictly smaller than the one before it.
///
/// Empty and single-value series count as decreasing.
pub fn strictly_monotone_decrease(values: &[f64]) -> bool {
    values.windows(2).all(|pair| pair[1] < pair[0])
}

/// Sum of consecutive differences, which is `last - first` up to rounding.
///
/// Positive means the series improved overall. Fewer than two values give `0.0`.
pub fn sum_delta(values: &[f64]) -> f64 {
    values.windows(2).map(|pair| pair[1] - pair[0]).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strictly_monotone_decrease() {
        assert!(strictly_monotone_decrease(&[5.0, 4.0, 3.0, 2.0, 1.0]));
        assert!(!strictly_monotone_decrease(&[5.0, 4.0, 4.0, 3.0]));
        assert!(!strictly_monotone_decrease(&[1.0, 2.0]));
        assert!(strictly_monotone_decrease(&[5.0]));
        assert!(strictly_monotone_decrease(&[]));
    }

    #[test]
    fn test_sum_delta() {
        assert_eq!(sum_delta(&[10.0, 20.0, 30.0, 30.0]), 20.0);
        assert_eq!(sum_delta(&[30.0, 30.0, 30.0]), 0.0);
        assert_eq!(sum_delta(&[3.0, 1.0, 2.0]), -1.0);
        assert_eq!(sum_delta(&[7.0]), 0.0);
        assert_eq!(sum_delta(&[]), 0.0);
    }
}
