//! Statistics Output
//!
//! Run-wide statistics accumulated epoch by epoch, and the Gini coefficient.

use bevy_ecs::prelude::*;
use trust_events::PopulationMetrics;

/// Gini coefficient of a set of balances.
///
/// `Σ|xi − xj| / (2·n²·mean)`; 0 for an empty set or when every balance is 0.
pub fn gini(values: &[f64]) -> f64 {
    let n = values.len();
    if n == 0 {
        return 0.0;
    }
    let total: f64 = values.iter().sum();
    if total <= 0.0 || !total.is_finite() {
        return 0.0;
    }
    let mut diff_sum = 0.0;
    for x in values {
        for y in values {
            diff_sum += (x - y).abs();
        }
    }
    let mean = total / n as f64;
    diff_sum / (2.0 * (n * n) as f64 * mean)
}

/// Resource to accumulate statistics during a run
#[derive(Resource, Debug, Default)]
pub struct StatsCollector {
    pub history: Vec<PopulationMetrics>,
    pub total_burned: f64,
    pub total_interactions: usize,
}

impl StatsCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a settled epoch
    pub fn record(&mut self, metrics: &PopulationMetrics) {
        self.total_burned += metrics.fees_burned;
        self.total_interactions += metrics.interactions;
        self.history.push(metrics.clone());
    }

    pub fn epochs_recorded(&self) -> usize {
        self.history.len()
    }

    pub fn latest(&self) -> Option<&PopulationMetrics> {
        self.history.last()
    }

    /// Mean cooperation rate over every recorded epoch
    pub fn mean_cooperation_rate(&self) -> f64 {
        if self.history.is_empty() {
            return 0.0;
        }
        self.history.iter().map(|m| m.cooperation_rate).sum::<f64>() / self.history.len() as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gini_bounds() {
        assert_eq!(gini(&[]), 0.0);
        assert_eq!(gini(&[0.0, 0.0]), 0.0);
        assert_eq!(gini(&[5.0, 5.0, 5.0]), 0.0);
        // One agent holds everything
        assert!((gini(&[0.0, 0.0, 0.0, 10.0]) - 0.75).abs() < 1e-12);
        assert!((gini(&[1.0, 3.0]) - 0.25).abs() < 1e-12);
    }

    #[test]
    fn test_collector_totals() {
        let mut collector = StatsCollector::new();
        assert!(collector.latest().is_none());
        collector.record(&PopulationMetrics {
            epoch: 0,
            cooperation_rate: 0.5,
            interactions: 4,
            fees_burned: 0.8,
            ..PopulationMetrics::default()
        });
        collector.record(&PopulationMetrics {
            epoch: 1,
            cooperation_rate: 1.0,
            interactions: 6,
            fees_burned: 1.2,
            ..PopulationMetrics::default()
        });
        assert_eq!(collector.epochs_recorded(), 2);
        assert_eq!(collector.total_interactions, 10);
        assert!((collector.total_burned - 2.0).abs() < 1e-12);
        assert_eq!(collector.mean_cooperation_rate(), 0.75);
        assert_eq!(collector.latest().map(|m| m.epoch), Some(1));
    }
}
