//! Multi-round driver around a [`ServerAggregator`].

use tracing::{info, warn};

use crate::aggregators::ServerAggregator;
use crate::audit::{AggregationAuditEntry, AuditLog};
use crate::error::FedGuardError;
use crate::model::ModelParams;
use crate::state::ServerState;

/// Federated server: one aggregation rule, the evolving server state and
/// an audit trail of every completed round.
///
/// # Example
///
/// ```rust
/// use fedguard::{Bicotti, FederatedServer, ModelParams, ServerState};
///
/// let global = ModelParams::from_flat(vec![0.0, 0.0]);
/// let mut server = FederatedServer::new(Box::new(Bicotti::new(1.0, 0.0)), ServerState::new(global));
///
/// let updates = vec![
///     ModelParams::from_flat(vec![1.0, 1.0]),
///     ModelParams::from_flat(vec![1.1, 0.9]),
///     ModelParams::from_flat(vec![0.9, 1.1]),
///     ModelParams::from_flat(vec![1.0, 1.0]),
///     ModelParams::from_flat(vec![1.0, 1.05]),
///     ModelParams::from_flat(vec![100.0, -100.0]), // Byzantine
/// ];
///
/// let global = server.run_round(&updates).unwrap();
/// assert!((global.flatten()[0] + 1.0).abs() < 0.1);
/// ```
pub struct FederatedServer {
    aggregator: Box<dyn ServerAggregator>,
    state: ServerState,
    round: usize,
    audit: AuditLog,
}

impl FederatedServer {
    /// Create a server starting from `state`.
    pub fn new(aggregator: Box<dyn ServerAggregator>, state: ServerState) -> Self {
        Self {
            aggregator,
            state,
            round: 0,
            audit: AuditLog::new(),
        }
    }

    /// Aggregate one round of client updates.
    ///
    /// On success the server state advances and the new global model is
    /// returned. On failure the state is left exactly as it was.
    pub fn run_round(&mut self, updates: &[ModelParams]) -> Result<&ModelParams, FedGuardError> {
        let outcome = match self.aggregator.apply_gradients(&self.state, updates) {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(round = self.round, method = self.aggregator.method(), error = %e, "aggregation round failed");
                return Err(e);
            }
        };

        info!(
            round = self.round,
            method = self.aggregator.method(),
            clients = updates.len(),
            selected = outcome.selected.len(),
            rejected = outcome.rejected.len(),
            "aggregation round complete"
        );

        self.audit.push(AggregationAuditEntry {
            round: self.round,
            n_clients: updates.len(),
            selected: outcome.selected,
            rejected: outcome.rejected,
            method: self.aggregator.method().to_string(),
        });
        self.state = outcome.state;
        self.round += 1;
        Ok(&self.state.global)
    }

    /// Current state.
    pub fn state(&self) -> &ServerState {
        &self.state
    }

    /// Current global model.
    pub fn global(&self) -> &ModelParams {
        &self.state.global
    }

    /// Current momentum.
    pub fn momentum(&self) -> &ModelParams {
        &self.state.momentum
    }

    /// Number of completed rounds.
    pub fn round(&self) -> usize {
        self.round
    }

    /// Audit trail of completed rounds.
    pub fn audit(&self) -> &AuditLog {
        &self.audit
    }

    /// Method name of the configured aggregator.
    pub fn method(&self) -> &'static str {
        self.aggregator.method()
    }

    /// Consume the server, returning the final state.
    pub fn into_state(self) -> ServerState {
        self.state
    }
}
