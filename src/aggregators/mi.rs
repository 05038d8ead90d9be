//! Mutual-information filtering with Nesterov momentum.
//!
//! Each client's update is turned back into a full model
//! (`global - update`) and run on a shared unlabeled probe batch. Clients
//! whose outputs behave like everybody else's share a lot of (Gaussian
//! proxy) mutual information with the rest of the population; a client
//! whose average MI sits far from the median, in either direction, is
//! dropped by the two-sigma edit rule before averaging.

use ndarray::{Array2, Axis};
use tracing::{debug, warn};

use super::{average_selected, validate_updates, RoundOutcome, ServerAggregator};
use crate::error::FedGuardError;
use crate::math::correlation::{gaussian_mutual_information, mean_row_correlation};
use crate::math::robust::{TwoSigmaEdit, DEFAULT_SIGMA_THRESHOLD};
use crate::model::ModelParams;
use crate::probe::ProbeModel;
use crate::state::ServerState;

/// Symmetric pairwise MI matrix from per-client probe outputs.
///
/// The diagonal is left at zero.
pub fn mutual_information_matrix(outputs: &[Array2<f32>]) -> Result<Array2<f64>, FedGuardError> {
    let n = outputs.len();
    let mut mi = Array2::<f64>::zeros((n, n));
    for i in 0..n {
        for j in (i + 1)..n {
            let rho = mean_row_correlation(&outputs[i], &outputs[j])?;
            let value = gaussian_mutual_information(rho);
            mi[[i, j]] = value;
            mi[[j, i]] = value;
        }
    }
    Ok(mi)
}

/// Per-client score: the mean of its row, zero diagonal included.
pub fn client_scores(mi: &Array2<f64>) -> Vec<f64> {
    let n = mi.ncols() as f64;
    mi.axis_iter(Axis(0))
        .map(|row| row.iter().sum::<f64>() / n)
        .collect()
}

/// One Nesterov momentum step.
///
/// ```text
/// m'      = beta * m - lr * round_agg
/// global' = global - beta * m + (1 + beta) * m'
/// ```
pub fn nesterov_step(
    state: &ServerState,
    round_agg: &ModelParams,
    beta: f32,
    lr: f32,
) -> Result<ServerState, FedGuardError> {
    let mut momentum = state.momentum.scale(beta);
    momentum.axpy(-lr, round_agg)?;

    let mut global = state.global.clone();
    global.axpy(-beta, &state.momentum)?;
    global.axpy(1.0 + beta, &momentum)?;

    Ok(ServerState { global, momentum })
}

/// Mutual-information filtering aggregator.
pub struct MutualInformation<P: ProbeModel> {
    probe: P,
    probe_data: Array2<f32>,
    server_lr: f32,
    beta: f32,
    sigma_threshold: f64,
    strict_statistics: bool,
}

impl<P: ProbeModel> MutualInformation<P> {
    /// Create an MI aggregator.
    ///
    /// # Arguments
    ///
    /// * `probe` - Model used to evaluate reconstructed client parameters
    /// * `probe_data` - Unlabeled probe batch, `[batch, input_dim]`
    /// * `server_lr` - Server learning rate
    /// * `beta` - Nesterov momentum coefficient
    pub fn new(probe: P, probe_data: Array2<f32>, server_lr: f32, beta: f32) -> Self {
        Self {
            probe,
            probe_data,
            server_lr,
            beta,
            sigma_threshold: DEFAULT_SIGMA_THRESHOLD,
            strict_statistics: false,
        }
    }

    /// Override the robust z-score cut-off (default 2.0).
    pub fn with_sigma_threshold(mut self, threshold: f64) -> Self {
        self.sigma_threshold = threshold;
        self
    }

    /// Fail the round instead of guarding when the MI scores have zero
    /// dispersion.
    pub fn with_strict_statistics(mut self, strict: bool) -> Self {
        self.strict_statistics = strict;
        self
    }

    /// Load each model into the probe and collect its outputs on the probe batch.
    pub fn probe_outputs(&mut self, models: &[ModelParams]) -> Result<Vec<Array2<f32>>, FedGuardError> {
        models
            .iter()
            .map(|model| {
                self.probe.set_params(model)?;
                self.probe.forward(&self.probe_data)
            })
            .collect()
    }

    /// MI matrix between the models reconstructed from `updates`.
    pub fn client_mutual_information(
        &mut self,
        global: &ModelParams,
        updates: &[ModelParams],
    ) -> Result<Array2<f64>, FedGuardError> {
        let models = updates
            .iter()
            .map(|update| global.try_sub(update))
            .collect::<Result<Vec<_>, _>>()?;
        let outputs = self.probe_outputs(&models)?;
        mutual_information_matrix(&outputs)
    }
}

impl<P: ProbeModel> ServerAggregator for MutualInformation<P> {
    fn method(&self) -> &'static str {
        "mi"
    }

    fn apply_gradients(
        &mut self,
        state: &ServerState,
        updates: &[ModelParams],
    ) -> Result<RoundOutcome, FedGuardError> {
        validate_updates(&state.global, updates)?;

        let mi = self.client_mutual_information(&state.global, updates)?;
        let scores = client_scores(&mi);
        let edit = TwoSigmaEdit::compute(&scores)?;

        if edit.is_degenerate() {
            if self.strict_statistics {
                return Err(FedGuardError::DegenerateStatistics(format!(
                    "MI scores have zero median absolute deviation (median {:.6})",
                    edit.median
                )));
            }
            warn!(
                median = edit.median,
                "MI scores have zero dispersion, keeping clients at the median"
            );
        }

        let (selected, rejected) = edit.partition(self.sigma_threshold);
        debug!(
            clients = updates.len(),
            selected = selected.len(),
            median = edit.median,
            madn = edit.madn,
            "mi two-sigma edit"
        );
        if !rejected.is_empty() {
            warn!(rejected = ?rejected, "MI filter rejected client updates");
        }

        let round_agg = average_selected(updates, &selected)?;
        let next = nesterov_step(state, &round_agg, self.beta, self.server_lr)?;

        Ok(RoundOutcome {
            state: next,
            selected,
            rejected,
            scores: Some(scores),
        })
    }
}
