//! Latency statistics

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Summary of a set of latency samples, in milliseconds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LatencySummary {
    /// Number of samples summarized
    pub count: usize,
    pub min_ms: f64,
    pub max_ms: f64,
    /// Arithmetic mean
    pub mean_ms: f64,
    /// Population standard deviation
    pub std_dev_ms: f64,
}

impl LatencySummary {
    /// Summarize `samples`. Returns `None` when there is nothing to summarize.
    pub fn from_samples(samples: &[Duration]) -> Option<Self> {
        if samples.is_empty() {
            return None;
        }

        let values: Vec<f64> = samples.iter().map(|d| d.as_nanos() as f64 / 1_000_000.0).collect();
        let count = values.len();
        let mean = values.iter().sum::<f64>() / count as f64;
        let min = values.iter().cloned().fold(f64::INFINITY, f64::min);
        let max = values.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        let variance = values.iter().map(|&v| (v - mean).powi(2)).sum::<f64>() / count as f64;

        Some(Self {
            count,
            min_ms: min,
            max_ms: max,
            // Rounding in the sum can push the mean a hair outside [min, max]
            mean_ms: mean.clamp(min, max),
            std_dev_ms: variance.sqrt(),
        })
    }
}
