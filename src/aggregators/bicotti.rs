//! Distance-based filtering (Bicotti)
//!
//! A Krum-style rule (Blanchard et al., 2017) that keeps a majority
//! instead of a single winner: every client is scored by the summed L2
//! distance to its closest neighbours, and the `R - f` lowest-scoring
//! updates are averaged.
//!
//! Reference: "Machine Learning with Adversaries: Byzantine Tolerant Gradient Descent"

use std::cmp::Ordering;

use ndarray::Array2;
use rayon::prelude::*;
use tracing::{debug, warn};

use super::{average_selected, validate_updates, RoundOutcome, ServerAggregator};
use crate::error::FedGuardError;
use crate::model::ModelParams;
use crate::state::ServerState;

/// Symmetric matrix of pairwise L2 distances between updates (zero diagonal).
///
/// Rows of the upper triangle are computed in parallel.
pub fn pairwise_distances(updates: &[ModelParams]) -> Result<Array2<f64>, FedGuardError> {
    let n = updates.len();

    let upper: Vec<Vec<f64>> = (0..n)
        .into_par_iter()
        .map(|i| {
            ((i + 1)..n)
                .map(|j| updates[i].l2_distance(&updates[j]))
                .collect::<Result<Vec<f64>, FedGuardError>>()
        })
        .collect::<Result<Vec<_>, FedGuardError>>()?;

    let mut dists = Array2::<f64>::zeros((n, n));
    for (i, row) in upper.iter().enumerate() {
        for (offset, &d) in row.iter().enumerate() {
            let j = i + 1 + offset;
            dists[[i, j]] = d;
            dists[[j, i]] = d;
        }
    }
    Ok(dists)
}

/// Smallest round that leaves at least one neighbour under `floor(R / 3)`.
pub const MIN_CLIENTS_DEFAULT_BOUND: usize = 4;

/// Theoretical number of Byzantine clients assumed among `n`: `floor(n / 3)`.
pub fn byzantine_bound(n: usize) -> usize {
    n / 3
}

/// Neighbours scored per client, `n - f - 2`, or `None` when fewer than one.
pub fn neighbour_count(n: usize, f: usize) -> Option<usize> {
    f.checked_add(2)
        .and_then(|reserved| n.checked_sub(reserved))
        .filter(|&k| k >= 1)
}

/// Sum of the `neighbours + 1` smallest entries of each distance row.
///
/// The extra entry is the client's zero distance to itself.
pub fn neighbour_scores(dists: &Array2<f64>, neighbours: usize) -> Vec<f64> {
    dists
        .outer_iter()
        .map(|row| {
            let mut sorted = row.to_vec();
            sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
            sorted.iter().take(neighbours + 1).sum()
        })
        .collect()
}

/// Bicotti aggregator.
///
/// `global' = global - server_lr * mean(kept)`. The momentum coefficient is
/// stored but not applied; momentum passes through untouched.
#[derive(Clone, Debug, PartialEq)]
pub struct Bicotti {
    server_lr: f32,
    beta: f32,
    assumed_byzantine: Option<usize>,
}

impl Bicotti {
    /// Create a Bicotti aggregator assuming `floor(R / 3)` Byzantine clients.
    pub fn new(server_lr: f32, beta: f32) -> Self {
        Self {
            server_lr,
            beta,
            assumed_byzantine: None,
        }
    }

    /// Fix the assumed number of Byzantine clients instead of `floor(R / 3)`.
    pub fn with_assumed_byzantine(mut self, f: usize) -> Self {
        self.assumed_byzantine = Some(f);
        self
    }

    /// Momentum coefficient (unused by the update rule).
    pub fn beta(&self) -> f32 {
        self.beta
    }

    /// Indices of the `n - f` clients with the lowest neighbour scores,
    /// in ascending index order, plus the scores themselves.
    pub fn select(&self, updates: &[ModelParams]) -> Result<(Vec<usize>, Vec<f64>), FedGuardError> {
        let n = updates.len();
        let f = self.assumed_byzantine.unwrap_or_else(|| byzantine_bound(n));

        let needed = match self.assumed_byzantine {
            Some(f) => f.saturating_add(3),
            None => MIN_CLIENTS_DEFAULT_BOUND,
        };
        let neighbours =
            neighbour_count(n, f).ok_or(FedGuardError::InsufficientClients { needed, actual: n })?;
        if n < f.saturating_mul(2).saturating_add(3) {
            warn!(
                n,
                f,
                "Bicotti bound not met (n < 2f + 3), proceeding best-effort"
            );
        }

        let dists = pairwise_distances(updates)?;
        let scores = neighbour_scores(&dists, neighbours);

        let mut order: Vec<usize> = (0..n).collect();
        order.sort_by(|&a, &b| scores[a].partial_cmp(&scores[b]).unwrap_or(Ordering::Equal));

        let mut selected = order[..n - f].to_vec();
        selected.sort_unstable();
        Ok((selected, scores))
    }
}

impl ServerAggregator for Bicotti {
    fn method(&self) -> &'static str {
        "bicotti"
    }

    fn apply_gradients(
        &mut self,
        state: &ServerState,
        updates: &[ModelParams],
    ) -> Result<RoundOutcome, FedGuardError> {
        validate_updates(&state.global, updates)?;

        let (selected, scores) = self.select(updates)?;
        let rejected: Vec<usize> = (0..updates.len())
            .filter(|i| selected.binary_search(i).is_err())
            .collect();
        debug!(
            clients = updates.len(),
            selected = selected.len(),
            rejected = ?rejected,
            "bicotti selection"
        );

        let round_agg = average_selected(updates, &selected)?;
        let mut global = state.global.clone();
        global.axpy(-self.server_lr, &round_agg)?;

        Ok(RoundOutcome {
            state: ServerState {
                global,
                momentum: state.momentum.clone(),
            },
            selected,
            rejected,
            scores: Some(scores),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flat(v: &[f32]) -> ModelParams {
        ModelParams::from_flat(v.to_vec())
    }

    #[test]
    fn test_distances_symmetric_zero_diagonal() {
        let updates = vec![flat(&[0.0, 0.0]), flat(&[3.0, 4.0]), flat(&[1.0, 1.0])];
        let d = pairwise_distances(&updates).unwrap();
        assert!((d[[0, 1]] - 5.0).abs() < 1e-12);
        for i in 0..3 {
            assert_eq!(d[[i, i]], 0.0);
            for j in 0..3 {
                assert_eq!(d[[i, j]], d[[j, i]]);
            }
        }
    }

    #[test]
    fn test_neighbour_count() {
        assert_eq!(neighbour_count(6, 2), Some(2));
        assert_eq!(neighbour_count(4, 1), Some(1));
        assert_eq!(neighbour_count(3, 1), None);
        assert_eq!(neighbour_count(2, 0), None);
        assert_eq!(neighbour_count(1, 5), None);
        assert_eq!(neighbour_count(6, usize::MAX), None);
        assert_eq!(neighbour_count(usize::MAX, usize::MAX - 2), None);
    }

    #[test]
    fn test_neighbour_scores_include_self() {
        let d = Array2::from_shape_vec((3, 3), vec![0.0, 1.0, 4.0, 1.0, 0.0, 2.0, 4.0, 2.0, 0.0]).unwrap();
        // one neighbour + self
        assert_eq!(neighbour_scores(&d, 1), vec![1.0, 1.0, 2.0]);
    }

    #[test]
    fn test_outlier_excluded() {
        let mut updates = vec![
            flat(&[1.0, 1.0]),
            flat(&[1.1, 0.9]),
            flat(&[0.9, 1.1]),
            flat(&[1.05, 0.95]),
            flat(&[1.0, 1.02]),
        ];
        updates.push(flat(&[100.0, -100.0]));

        let mut agg = Bicotti::new(1.0, 0.0);
        let state = ServerState::new(flat(&[0.0, 0.0]));
        let outcome = agg.apply_gradients(&state, &updates).unwrap();

        // R = 6, f = 2: four kept
        assert_eq!(outcome.selected.len(), 4);
        assert!(!outcome.selected.contains(&5));
        assert!(outcome.rejected.contains(&5));
        let g = outcome.state.global.flatten();
        assert!((g[0] + 1.0).abs() < 0.1 && (g[1] + 1.0).abs() < 0.1);
    }

    #[test]
    fn test_too_few_clients() {
        let updates = vec![flat(&[1.0]), flat(&[1.0]), flat(&[1.0])];
        let mut agg = Bicotti::new(1.0, 0.0);
        let state = ServerState::new(flat(&[0.0]));
        assert!(matches!(
            agg.apply_gradients(&state, &updates),
            Err(FedGuardError::InsufficientClients { needed: 4, actual: 3 })
        ));
        assert!(matches!(
            agg.apply_gradients(&state, &updates[..2]),
            Err(FedGuardError::InsufficientClients { needed: 4, actual: 2 })
        ));
    }

    #[test]
    fn test_huge_assumed_byzantine_is_error() {
        let updates: Vec<ModelParams> = (0..6).map(|i| flat(&[i as f32])).collect();
        let mut agg = Bicotti::new(1.0, 0.0).with_assumed_byzantine(usize::MAX);
        let state = ServerState::new(flat(&[0.0]));
        assert!(matches!(
            agg.apply_gradients(&state, &updates),
            Err(FedGuardError::InsufficientClients { needed: usize::MAX, actual: 6 })
        ));
    }

    #[test]
    fn test_assumed_byzantine_override() {
        let updates: Vec<ModelParams> = (0..5).map(|i| flat(&[i as f32])).collect();
        let agg = Bicotti::new(1.0, 0.0).with_assumed_byzantine(0);
        let (selected, _) = agg.select(&updates).unwrap();
        assert_eq!(selected, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_momentum_untouched() {
        let updates: Vec<ModelParams> = (0..4).map(|_| flat(&[1.0])).collect();
        let state = ServerState::with_momentum(flat(&[0.0]), flat(&[7.0])).unwrap();
        let outcome = Bicotti::new(0.5, 0.9)
            .apply_gradients(&state, &updates)
            .unwrap();
        // all scores tie: stable order keeps the lowest indices
        assert_eq!(outcome.selected, vec![0, 1, 2]);
        assert_eq!(outcome.rejected, vec![3]);
        assert_eq!(outcome.state.momentum.flatten(), vec![7.0]);
        assert_eq!(outcome.state.global.flatten(), vec![-0.5]);
    }

    #[test]
    fn test_determinism() {
        let updates = vec![
            flat(&[1.0, 2.0]),
            flat(&[1.1, 2.1]),
            flat(&[0.9, 1.9]),
            flat(&[1.05, 2.05]),
            flat(&[50.0, 50.0]),
        ];
        let agg = Bicotti::new(1.0, 0.0);
        let first = agg.select(&updates).unwrap();
        for _ in 0..3 {
            assert_eq!(agg.select(&updates).unwrap(), first);
        }
    }
}
