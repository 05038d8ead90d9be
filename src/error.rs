//! Error types for fedguard

use thiserror::Error;

/// All possible errors raised while aggregating a round
#[derive(Error, Debug)]
pub enum FedGuardError {
    /// No client updates were provided for aggregation
    #[error("Empty updates provided")]
    EmptyUpdates,

    /// A client update does not have the shape of the global model
    #[error("Shape mismatch: update from client {client} does not match the global model")]
    ShapeMismatch {
        /// Index of the offending client in the round's update list
        client: usize,
    },

    /// Filtering rejected every client, leaving nothing to average
    #[error("Empty selection: every client update was rejected")]
    EmptySelection,

    /// Statistics collapsed (zero dispersion, non-finite scores, constant outputs)
    #[error("Degenerate statistics: {0}")]
    DegenerateStatistics(String),

    /// Not enough clients for the aggregation rule to be well defined
    #[error("Insufficient clients: need {needed}, got {actual}")]
    InsufficientClients {
        /// Minimum required clients
        needed: usize,
        /// Clients actually received
        actual: usize,
    },

    /// Aggregator configuration is invalid
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Probe model failed to load parameters or run a forward pass
    #[error("Probe model error: {0}")]
    ProbeError(String),

    /// Array shape error
    #[error("Array shape error: {0}")]
    ShapeError(String),

    /// JSON (de)serialization failed
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Reading a configuration or checkpoint file failed
    #[error("I/O error: {0}")]
    Io(String),
}

impl From<ndarray::ShapeError> for FedGuardError {
    fn from(e: ndarray::ShapeError) -> Self {
        FedGuardError::ShapeError(e.to_string())
    }
}

impl From<serde_json::Error> for FedGuardError {
    fn from(e: serde_json::Error) -> Self {
        FedGuardError::Serialization(e.to_string())
    }
}

impl From<std::io::Error> for FedGuardError {
    fn from(e: std::io::Error) -> Self {
        FedGuardError::Io(e.to_string())
    }
}
