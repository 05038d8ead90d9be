//! Output correlation and the Gaussian mutual-information proxy.

use ndarray::Array2;
use tracing::warn;

use crate::error::FedGuardError;

/// Smallest argument passed to `ln` when the correlation saturates at ±1.
pub const MI_LOG_FLOOR: f64 = 1e-300;

/// Mean Pearson correlation between matching rows of two output matrices.
///
/// Each row is one probe sample (`[batch, output_dim]` layout). Both rows
/// are centred on their own mean across the output dimension, correlated,
/// and the per-sample correlations are averaged over the batch. Rows
/// where either model produces a constant output carry no correlation
/// information and are skipped.
pub fn mean_row_correlation(a: &Array2<f32>, b: &Array2<f32>) -> Result<f64, FedGuardError> {
    if a.dim() != b.dim() {
        return Err(FedGuardError::ShapeError(format!(
            "probe outputs {:?} and {:?} differ",
            a.dim(),
            b.dim()
        )));
    }

    let mut total = 0.0f64;
    let mut counted = 0usize;

    for (row_a, row_b) in a.outer_iter().zip(b.outer_iter()) {
        let n = row_a.len() as f64;
        if n == 0.0 {
            continue;
        }
        let mean_a = row_a.iter().map(|&x| x as f64).sum::<f64>() / n;
        let mean_b = row_b.iter().map(|&x| x as f64).sum::<f64>() / n;

        let (mut cov, mut var_a, mut var_b) = (0.0f64, 0.0f64, 0.0f64);
        for (&x, &y) in row_a.iter().zip(row_b.iter()) {
            let dx = x as f64 - mean_a;
            let dy = y as f64 - mean_b;
            cov += dx * dy;
            var_a += dx * dx;
            var_b += dy * dy;
        }

        let denom = (var_a * var_b).sqrt();
        if denom > 0.0 && denom.is_finite() {
            total += cov / denom;
            counted += 1;
        }
    }

    if counted == 0 {
        return Err(FedGuardError::DegenerateStatistics(
            "no probe sample with non-constant outputs".to_string(),
        ));
    }
    Ok(total / counted as f64)
}

/// Mutual information of a bivariate Gaussian with correlation `rho`:
/// `-0.5 * ln(1 - rho^2)`.
///
/// `rho` is clamped to `[-1, 1]` and the log argument floored at
/// [`MI_LOG_FLOOR`], so perfectly correlated models yield a large finite
/// value instead of infinity.
pub fn gaussian_mutual_information(rho: f64) -> f64 {
    let rho = rho.clamp(-1.0, 1.0);
    let arg = 1.0 - rho * rho;
    if arg < MI_LOG_FLOOR {
        warn!(rho, arg, "correlation saturated, flooring log argument");
    }
    -0.5 * arg.max(MI_LOG_FLOOR).ln()
}
