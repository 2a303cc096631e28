//! Comparison metrics between a federated result and a reference.
//!
//! Set metrics treat labels as unordered sets.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::hash::Hash;

/// Fraction of predicted labels that are in the reference set.
pub fn precision<T: Eq + Hash>(truth: &[T], predicted: &[T]) -> f64 {
    let truth: HashSet<&T> = truth.iter().collect();
    let predicted: HashSet<&T> = predicted.iter().collect();
    if predicted.is_empty() {
        return 0.0;
    }
    truth.intersection(&predicted).count() as f64 / predicted.len() as f64
}

/// Fraction of reference labels that were predicted.
pub fn recall<T: Eq + Hash>(truth: &[T], predicted: &[T]) -> f64 {
    let truth: HashSet<&T> = truth.iter().collect();
    let predicted: HashSet<&T> = predicted.iter().collect();
    if truth.is_empty() {
        return 0.0;
    }
    truth.intersection(&predicted).count() as f64 / truth.len() as f64
}

/// Harmonic mean of precision and recall.
pub fn f1_score<T: Eq + Hash>(truth: &[T], predicted: &[T]) -> f64 {
    let p = precision(truth, predicted);
    let r = recall(truth, predicted);
    if p + r == 0.0 {
        return 0.0;
    }
    2.0 * p * r / (p + r)
}

/// Share of a signal at or above one threshold.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LeakagePoint {
    pub threshold: f64,
    /// Values at or above the threshold over the number of values.
    pub positive_rate: f64,
    /// Values at or above the threshold over the signal's sum.
    pub discovery_rate: f64,
}

/// Positive and discovery rates of `signal` at each threshold.
pub fn threshold_leakage(signal: &[f64], thresholds: &[f64]) -> Vec<LeakagePoint> {
    let total: f64 = signal.iter().sum();

    thresholds
        .iter()
        .map(|&threshold| {
            let above = signal.iter().filter(|&&v| v >= threshold).count() as f64;
            LeakagePoint {
                threshold,
                positive_rate: if signal.is_empty() {
                    0.0
                } else {
                    above / signal.len() as f64
                },
                discovery_rate: if total == 0.0 { 0.0 } else { above / total },
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-6
    }

    #[test]
    fn test_precision() {
        assert!(close(precision(&[1, 2, 3], &[1, 2, 4]), 2.0 / 3.0));
        assert!(close(precision(&[1, 2, 3], &[4, 5, 6]), 0.0));
        assert!(close(precision(&[], &[1, 2, 3]), 0.0));
        assert!(close(precision::<i32>(&[1], &[]), 0.0));
    }

    #[test]
    fn test_recall() {
        assert!(close(recall(&[1, 2, 3], &[1, 2, 4]), 2.0 / 3.0));
        assert!(close(recall(&[1, 2, 3], &[4, 5, 6]), 0.0));
        assert!(close(recall(&[1, 2, 3], &[1, 2, 3]), 1.0));
    }

    #[test]
    fn test_f1_score() {
        let expected = 2.0 * (2.0 / 3.0) * (2.0 / 3.0) / (4.0 / 3.0);
        assert!(close(f1_score(&[1, 2, 3], &[1, 2, 4]), expected));
        assert!(close(f1_score(&[1, 2, 3], &[4, 5, 6]), 0.0));
        assert!(close(f1_score(&[1, 2, 3], &[1, 2, 3]), 1.0));
    }

    #[test]
    fn test_labels_as_strings() {
        let truth = vec!["a".to_string(), "b".to_string()];
        let predicted = vec!["b".to_string(), "c".to_string()];
        assert!(close(precision(&truth, &predicted), 0.5));
        assert!(close(recall(&truth, &predicted), 0.5));
    }

    #[test]
    fn test_threshold_leakage() {
        let signal = [1.0, 2.0, 2.0, 3.0, 3.0, 3.0, 4.0, 4.0, 4.0, 4.0];
        let points = threshold_leakage(&signal, &[1.5, 2.5, 3.5]);

        let positive: Vec<_> = points.iter().map(|p| p.positive_rate).collect();
        let discovery: Vec<_> = points.iter().map(|p| p.discovery_rate).collect();

        for (got, want) in positive.iter().zip([0.9, 0.7, 0.4]) {
            assert!(close(*got, want));
        }
        for (got, want) in discovery.iter().zip([0.3, 7.0 / 30.0, 4.0 / 30.0]) {
            assert!(close(*got, want));
        }
    }

    #[test]
    fn test_threshold_leakage_empty_signal() {
        let points = threshold_leakage(&[], &[1.0]);
        assert_eq!(points[0].positive_rate, 0.0);
        assert_eq!(points[0].discovery_rate, 0.0);
    }
}
