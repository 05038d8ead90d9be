//! FedAvg baseline aggregation (no Byzantine tolerance)
//!
//! Standard federated averaging as described by McMahan et al. (2017).
//! Vulnerable to even a single Byzantine client. Also provides the
//! averaging primitive the filtering aggregators reuse for their survivors.

use tracing::debug;

use super::{validate_updates, RoundOutcome, ServerAggregator};
use crate::error::FedGuardError;
use crate::model::ModelParams;
use crate::state::ServerState;

/// (Optionally weighted) arithmetic mean of client updates.
///
/// # Arguments
///
/// * `updates` - Client model updates, all with the same layout
/// * `weights` - Optional client weights (e.g., proportional to dataset size)
pub fn fedavg(updates: &[ModelParams], weights: Option<&[f32]>) -> Result<ModelParams, FedGuardError> {
    let first = updates.first().ok_or(FedGuardError::EmptyUpdates)?;
    for (client, update) in updates.iter().enumerate().skip(1) {
        if !update.same_shape(first) {
            return Err(FedGuardError::ShapeMismatch { client });
        }
    }

    match weights {
        Some(w) => {
            if w.len() != updates.len() {
                return Err(FedGuardError::ShapeError(format!(
                    "{} weights for {} updates",
                    w.len(),
                    updates.len()
                )));
            }
            let weight_sum: f32 = w.iter().sum();
            if weight_sum == 0.0 {
                return Err(FedGuardError::EmptySelection);
            }
            let mut acc = first.zeros_like();
            for (update, &weight) in updates.iter().zip(w) {
                acc.axpy(weight / weight_sum, update)?;
            }
            Ok(acc)
        }
        None => average_selected(updates, &(0..updates.len()).collect::<Vec<_>>()),
    }
}

/// Unweighted mean of `updates[i]` for every `i` in `indices`.
///
/// Fails with [`FedGuardError::EmptySelection`] when `indices` is empty.
pub fn average_selected(updates: &[ModelParams], indices: &[usize]) -> Result<ModelParams, FedGuardError> {
    let &first = indices.first().ok_or(FedGuardError::EmptySelection)?;
    let mut acc = updates[first].zeros_like();
    for &i in indices {
        acc.axpy(1.0, &updates[i])?;
    }
    Ok(acc.scale(1.0 / indices.len() as f32))
}

/// Plain federated averaging with a server learning rate.
///
/// `global' = global - server_lr * mean(updates)`. Momentum passes through
/// untouched.
#[derive(Clone, Debug, PartialEq)]
pub struct FedAvg {
    server_lr: f32,
    beta: f32,
}

impl FedAvg {
    /// Create a FedAvg aggregator.
    ///
    /// `beta` is recorded for configuration parity with the momentum
    /// aggregators but does not enter the update.
    pub fn new(server_lr: f32, beta: f32) -> Self {
        Self { server_lr, beta }
    }

    /// Server learning rate.
    pub fn server_lr(&self) -> f32 {
        self.server_lr
    }

    /// Momentum coefficient (unused by the update rule).
    pub fn beta(&self) -> f32 {
        self.beta
    }
}

impl ServerAggregator for FedAvg {
    fn method(&self) -> &'static str {
        "fedavg"
    }

    fn apply_gradients(
        &mut self,
        state: &ServerState,
        updates: &[ModelParams],
    ) -> Result<RoundOutcome, FedGuardError> {
        validate_updates(&state.global, updates)?;

        let round_agg = fedavg(updates, None)?;
        let mut global = state.global.clone();
        global.axpy(-self.server_lr, &round_agg)?;
        debug!(clients = updates.len(), "fedavg round aggregated");

        Ok(RoundOutcome {
            state: ServerState {
                global,
                momentum: state.momentum.clone(),
            },
            selected: (0..updates.len()).collect(),
            rejected: Vec::new(),
            scores: None,
        })
    }
}
