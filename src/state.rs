//! Server-side state carried from one round to the next.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::FedGuardError;
use crate::model::ModelParams;

/// Global model plus momentum, the only state an aggregation round needs.
///
/// Aggregators take a `&ServerState` and return a new one, so a
/// multi-round simulation is just a fold over rounds. The state can be
/// checkpointed to JSON to carry momentum across processes.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ServerState {
    /// Current consensus parameters.
    pub global: ModelParams,
    /// Momentum accumulated by previous rounds (zeros when fresh).
    pub momentum: ModelParams,
}

impl ServerState {
    /// Fresh state with zero momentum.
    pub fn new(global: ModelParams) -> Self {
        let momentum = global.zeros_like();
        Self { global, momentum }
    }

    /// Resume from a previous round's momentum.
    pub fn with_momentum(global: ModelParams, momentum: ModelParams) -> Result<Self, FedGuardError> {
        if !global.same_shape(&momentum) {
            return Err(FedGuardError::ShapeError(
                "momentum layout does not match the global model".to_string(),
            ));
        }
        Ok(Self { global, momentum })
    }

    /// Serialize to a JSON string.
    pub fn to_json(&self) -> Result<String, FedGuardError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Restore from a JSON string produced by [`ServerState::to_json`].
    pub fn from_json(json: &str) -> Result<Self, FedGuardError> {
        let state: Self = serde_json::from_str(json)?;
        Self::with_momentum(state.global, state.momentum)
    }

    /// Write a JSON checkpoint to `path`.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), FedGuardError> {
        fs::write(path, self.to_json()?)?;
        Ok(())
    }

    /// Load a JSON checkpoint from `path`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, FedGuardError> {
        Self::from_json(&fs::read_to_string(path)?)
    }
}
