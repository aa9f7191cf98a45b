//! Pairwise-complete Pearson correlation over the metrics store
//!
//! Only snapshots carrying both metrics contribute to a pair's statistic.
//! Fewer than three complete pairs, or zero variance in either series,
//! yields a coefficient of 0 rather than an error: early in the store's
//! lifecycle correlations are meaningless, and callers still need a usable
//! numeric weight.

use std::sync::Arc;

use crate::store::MetricsStore;

/// Minimum complete pairs before a coefficient is considered computable
const MIN_PAIRED_SAMPLES: usize = 3;

/// Computes correlations across the historical metrics store
#[derive(Debug, Clone)]
pub struct CorrelationEngine {
    store: Arc<MetricsStore>,
}

impl CorrelationEngine {
    pub fn new(store: Arc<MetricsStore>) -> Self {
        Self { store }
    }

    /// Pearson correlation coefficient for two metrics, in [-1, 1].
    pub fn correlate(&self, metric_a: &str, metric_b: &str) -> f64 {
        let pairs = self.complete_pairs(metric_a, metric_b);
        if pairs.len() < MIN_PAIRED_SAMPLES {
            return 0.0;
        }

        let n = pairs.len() as f64;
        let mean_a = pairs.iter().map(|(a, _)| a).sum::<f64>() / n;
        let mean_b = pairs.iter().map(|(_, b)| b).sum::<f64>() / n;

        let mut numerator = 0.0;
        let mut sum_sq_a = 0.0;
        let mut sum_sq_b = 0.0;
        for (a, b) in &pairs {
            let da = a - mean_a;
            let db = b - mean_b;
            numerator += da * db;
            sum_sq_a += da * da;
            sum_sq_b += db * db;
        }

        let denominator = (sum_sq_a * sum_sq_b).sqrt();
        if denominator == 0.0 {
            0.0
        } else {
            numerator / denominator
        }
    }

    /// Number of snapshots carrying both metrics
    pub fn paired_samples(&self, metric_a: &str, metric_b: &str) -> usize {
        self.complete_pairs(metric_a, metric_b).len()
    }

    fn complete_pairs(&self, metric_a: &str, metric_b: &str) -> Vec<(f64, f64)> {
        self.store
            .snapshots()
            .iter()
            .filter_map(|snapshot| {
                Some((snapshot.get(metric_a)?, snapshot.get(metric_b)?))
            })
            .collect()
    }
}
