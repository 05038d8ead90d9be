//! Robust location and dispersion statistics.
//!
//! Implements the "two-sigma edit" outlier rule: values are standardized
//! with the median and the normalized median absolute deviation (MADN)
//! instead of the mean and standard deviation, so a minority of extreme
//! values cannot drag the reference point towards themselves.

use std::cmp::Ordering;

use crate::error::FedGuardError;

/// MAD of a standard normal distribution; `MAD / 0.6745` estimates sigma.
pub const MAD_NORMAL_CONSISTENCY: f64 = 0.6745;

/// Default cut-off on the absolute robust z-score.
pub const DEFAULT_SIGMA_THRESHOLD: f64 = 2.0;

/// Median of `values` (mean of the two middle values for even counts).
///
/// Returns `None` for an empty slice.
pub fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));

    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        Some((sorted[mid - 1] + sorted[mid]) / 2.0)
    } else {
        Some(sorted[mid])
    }
}

/// Median and median absolute deviation from the median.
pub fn median_abs_deviation(values: &[f64]) -> Option<(f64, f64)> {
    let med = median(values)?;
    let deviations: Vec<f64> = values.iter().map(|v| (v - med).abs()).collect();
    let mad = median(&deviations)?;
    Some((med, mad))
}

/// Robust z-scores of a set of values under the two-sigma edit rule.
#[derive(Clone, Debug, PartialEq)]
pub struct TwoSigmaEdit {
    /// Median of the input values.
    pub median: f64,
    /// Normalized MAD (`MAD / 0.6745`).
    pub madn: f64,
    /// `(value - median) / madn` per input value.
    ///
    /// When `madn` is zero, values equal to the median score `0.0` and
    /// all others score `±inf`.
    pub scores: Vec<f64>,
}

impl TwoSigmaEdit {
    /// Standardize `values` against their median and MADN.
    ///
    /// Fails with [`FedGuardError::DegenerateStatistics`] when `values` is
    /// empty or contains a non-finite value.
    pub fn compute(values: &[f64]) -> Result<Self, FedGuardError> {
        if let Some(bad) = values.iter().find(|v| !v.is_finite()) {
            return Err(FedGuardError::DegenerateStatistics(format!(
                "non-finite score {}",
                bad
            )));
        }
        let (median, mad) = median_abs_deviation(values).ok_or_else(|| {
            FedGuardError::DegenerateStatistics("no scores to standardize".to_string())
        })?;
        let madn = mad / MAD_NORMAL_CONSISTENCY;

        let scores = values
            .iter()
            .map(|&v| {
                let dev = v - median;
                if madn > 0.0 {
                    dev / madn
                } else if dev == 0.0 {
                    0.0
                } else {
                    dev.signum() * f64::INFINITY
                }
            })
            .collect();

        Ok(Self {
            median,
            madn,
            scores,
        })
    }

    /// Whether the dispersion collapsed to zero.
    pub fn is_degenerate(&self) -> bool {
        self.madn == 0.0
    }

    /// Split indices into `(kept, rejected)`: kept when `|score| < threshold`.
    pub fn partition(&self, threshold: f64) -> (Vec<usize>, Vec<usize>) {
        (0..self.scores.len()).partition(|&i| self.scores[i].abs() < threshold)
    }
}
