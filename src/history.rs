//! Bounded history of recent eye metrics for inspection while capturing.

use crate::{constants::NUM_EYE_METRICS, features::EyeMetrics};
use ndarray::Array2;
use std::collections::VecDeque;

/// Fixed-capacity ring buffer of eye metrics, oldest first
#[derive(Debug, Clone)]
pub struct FeatureHistory {
    capacity: usize,
    rows: VecDeque<EyeMetrics>,
}

impl FeatureHistory {
    /// Create an empty history holding at most `capacity` rows
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            rows: VecDeque::with_capacity(capacity),
        }
    }

    /// Append a row, evicting the oldest once full
    pub fn push(&mut self, metrics: EyeMetrics) {
        if self.capacity == 0 {
            return;
        }
        if self.rows.len() >= self.capacity {
            self.rows.pop_front();
        }
        self.rows.push_back(metrics);
    }

    /// Number of rows held
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the history is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Maximum number of rows
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Most recent row
    #[must_use]
    pub fn latest(&self) -> Option<&EyeMetrics> {
        self.rows.back()
    }

    /// Rows stacked into an `len x 33` matrix
    #[must_use]
    pub fn as_matrix(&self) -> Array2<f64> {
        let mut matrix = Array2::zeros((self.rows.len(), NUM_EYE_METRICS));
        for (mut row, metrics) in matrix.rows_mut().into_iter().zip(&self.rows) {
            row.assign(&metrics.to_array());
        }
        matrix
    }

    /// Per-column mean, `None` while empty
    #[must_use]
    pub fn column_means(&self) -> Option<Vec<f64>> {
        if self.rows.is_empty() {
            return None;
        }
        #[allow(clippy::cast_precision_loss)]
        let n = self.rows.len() as f64;

        let mut means = vec![0.0; NUM_EYE_METRICS];
        for metrics in &self.rows {
            for (mean, value) in means.iter_mut().zip(metrics.as_slice()) {
                *mean += value / n;
            }
        }
        Some(means)
    }

    /// Drop all rows
    pub fn clear(&mut self) {
        self.rows.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metrics(value: f64) -> EyeMetrics {
        EyeMetrics::from_slice(&[value; NUM_EYE_METRICS]).unwrap()
    }

    #[test]
    fn test_history_is_bounded() {
        let mut history = FeatureHistory::new(3);
        for i in 0..5 {
            history.push(metrics(f64::from(i)));
        }

        assert_eq!(history.len(), 3);
        assert_eq!(history.latest().unwrap().inter_eye(), 4.0);

        let matrix = history.as_matrix();
        assert_eq!(matrix.dim(), (3, NUM_EYE_METRICS));
        assert_eq!(matrix[[0, 0]], 2.0);
        assert_eq!(matrix[[2, 32]], 4.0);
    }

    #[test]
    fn test_column_means() {
        let mut history = FeatureHistory::new(10);
        assert!(history.column_means().is_none());

        history.push(metrics(1.0));
        history.push(metrics(3.0));

        let means = history.column_means().unwrap();
        assert_eq!(means.len(), NUM_EYE_METRICS);
        assert!(means.iter().all(|&m| (m - 2.0).abs() < 1e-12));
    }

    #[test]
    fn test_zero_capacity_and_clear() {
        let mut history = FeatureHistory::new(0);
        history.push(metrics(1.0));
        assert!(history.is_empty());

        let mut history = FeatureHistory::new(2);
        history.push(metrics(1.0));
        history.clear();
        assert!(history.is_empty());
        assert_eq!(history.capacity(), 2);
    }
}
