use serde::{Deserialize, Serialize};

/// Summary of a sampled distribution.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DistributionSummary {
    /// Number of samples.
    pub count: usize,
    /// Arithmetic mean.
    pub mean: f64,
    /// Sample standard deviation (n - 1 denominator).
    pub std: f64,
    /// 16th percentile (lower one-sigma bound).
    pub q16: f64,
    /// Median.
    pub q50: f64,
    /// 84th percentile (upper one-sigma bound).
    pub q84: f64,
}

impl DistributionSummary {
    /// Summarizes `values`; every statistic is NaN for an empty slice.
    pub fn from_values(values: &[f64]) -> Self {
        let sorted = sorted_finite(values);
        if sorted.is_empty() {
            return Self {
                count: 0,
                mean: f64::NAN,
                std: f64::NAN,
                q16: f64::NAN,
                q50: f64::NAN,
                q84: f64::NAN,
            };
        }
        let count = sorted.len();
        let mean = sorted.iter().sum::<f64>() / count as f64;
        let std = if count > 1 {
            let var = sorted.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>()
                / (count - 1) as f64;
            var.sqrt()
        } else {
            0.0
        };
        Self {
            count,
            mean,
            std,
            q16: percentile(&sorted, 0.16),
            q50: percentile(&sorted, 0.5),
            q84: percentile(&sorted, 0.84),
        }
    }
}

/// Linear-interpolation percentile of unsorted `values`; `quantile` in [0, 1].
pub fn percentile_of(values: &[f64], quantile: f64) -> f64 {
    percentile(&sorted_finite(values), quantile)
}

/// Largest finite value.
pub fn max_of(values: &[f64]) -> Option<f64> {
    values
        .iter()
        .copied()
        .filter(|v| v.is_finite())
        .fold(None, |acc, v| Some(acc.map_or(v, |a: f64| a.max(v))))
}

fn sorted_finite(values: &[f64]) -> Vec<f64> {
    let mut sorted: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    sorted.sort_by(f64::total_cmp);
    sorted
}

fn percentile(values: &[f64], quantile: f64) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    let position = quantile.clamp(0.0, 1.0) * (values.len() - 1) as f64;
    let lower = position.floor() as usize;
    let upper = position.ceil() as usize;
    if lower == upper {
        values[lower]
    } else {
        let weight = position - lower as f64;
        values[lower] * (1.0 - weight) + values[upper] * weight
    }
}
