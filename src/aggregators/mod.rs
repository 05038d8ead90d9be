//! Server-side aggregation rules for federated learning.
//!
//! Every rule implements [`ServerAggregator`]: it takes the current
//! [`ServerState`] and one round of client updates, and returns the next
//! state together with which clients it kept.
//!
//! | Method | Filter | Momentum |
//! |--------|--------|----------|
//! | [`FedAvg`] | None (baseline) | No |
//! | [`MutualInformation`] | Two-sigma edit on probe-output MI | Nesterov |
//! | [`Bicotti`] | Lowest neighbour-distance scores | No |

pub mod bicotti;
pub mod fedavg;
pub mod mi;

pub use bicotti::{pairwise_distances, Bicotti};
pub use fedavg::{average_selected, fedavg, FedAvg};
pub use mi::{nesterov_step, MutualInformation};

use crate::error::FedGuardError;
use crate::model::ModelParams;
use crate::state::ServerState;

/// Result of aggregating one round.
#[derive(Clone, Debug, PartialEq)]
pub struct RoundOutcome {
    /// Global model and momentum for the next round.
    pub state: ServerState,
    /// Indices of client updates that entered the average.
    pub selected: Vec<usize>,
    /// Indices of client updates that were filtered out.
    pub rejected: Vec<usize>,
    /// Per-client filter scores, when the rule computes any.
    pub scores: Option<Vec<f64>>,
}

/// The shared "apply gradients" contract.
///
/// Implementations must not mutate the input state; the returned
/// [`RoundOutcome::state`] is the only place the next round's model lives.
pub trait ServerAggregator {
    /// Short method name used in logs and audit entries.
    fn method(&self) -> &'static str;

    /// Combine one round of client updates into the next server state.
    fn apply_gradients(
        &mut self,
        state: &ServerState,
        updates: &[ModelParams],
    ) -> Result<RoundOutcome, FedGuardError>;
}

impl<A: ServerAggregator + ?Sized> ServerAggregator for Box<A> {
    fn method(&self) -> &'static str {
        (**self).method()
    }

    fn apply_gradients(
        &mut self,
        state: &ServerState,
        updates: &[ModelParams],
    ) -> Result<RoundOutcome, FedGuardError> {
        (**self).apply_gradients(state, updates)
    }
}

/// Check that a round is non-empty and every update matches the global layout.
pub fn validate_updates(global: &ModelParams, updates: &[ModelParams]) -> Result<(), FedGuardError> {
    if updates.is_empty() {
        return Err(FedGuardError::EmptyUpdates);
    }
    match updates.iter().position(|u| !u.same_shape(global)) {
        Some(client) => Err(FedGuardError::ShapeMismatch { client }),
        None => Ok(()),
    }
}
