//! Mathematical primitives for fedguard.
//!
//! - [`norms`] — L2 norms and distances
//! - [`robust`] — median, MAD and the two-sigma edit rule
//! - [`correlation`] — output correlation and the Gaussian MI proxy

pub mod correlation;
pub mod norms;
pub mod robust;

pub use correlation::{gaussian_mutual_information, mean_row_correlation, MI_LOG_FLOOR};
pub use norms::{l2_distance, l2_norm, l2_norm_sq};
pub use robust::{median, median_abs_deviation, TwoSigmaEdit, MAD_NORMAL_CONSISTENCY};
