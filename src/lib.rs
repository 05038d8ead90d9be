//! # fedguard: Robust Server-Side Aggregation for Federated Learning
//!
//! fedguard combines per-client model updates into the next global model
//! while optionally filtering outlier or malicious updates.
//!
//! ## Aggregation Methods
//!
//! - [`FedAvg`] - Plain averaging scaled by a server learning rate (baseline)
//! - [`MutualInformation`] - Probe-output mutual information, two-sigma edit
//!   filtering and Nesterov momentum
//! - [`Bicotti`] - Pairwise-distance scoring, keeps the `R - floor(R/3)` most
//!   central updates
//!
//! All three implement [`ServerAggregator`] and are pure with respect to
//! server state: a [`ServerState`] goes in, a new one comes out.
//!
//! ## High-Level API
//!
//! Use [`FederatedServer`] to drive multiple rounds with an audit trail, and
//! [`AggregatorConfig`] to pick the rule from a JSON document.

#![deny(missing_docs)]

pub mod aggregators;
pub mod audit;
pub mod config;
pub mod error;
pub mod math;
pub mod model;
pub mod probe;
pub mod server;
pub mod state;

// Re-exports
pub use aggregators::{fedavg, Bicotti, FedAvg, MutualInformation, RoundOutcome, ServerAggregator};
pub use audit::{AggregationAuditEntry, AuditLog};
pub use config::{AggregationMethod, AggregatorConfig, ProbeSetup};
pub use error::FedGuardError;
pub use model::ModelParams;
pub use probe::{Activation, LinearProbe, ProbeModel};
pub use server::FederatedServer;
pub use state::ServerState;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// Python bindings via PyO3
#[cfg(feature = "python")]
mod python {
    use ndarray::Array1;
    use numpy::{IntoPyArray, PyArray1, PyReadonlyArray1};
    use pyo3::prelude::*;

    use crate::{AggregationMethod, AggregatorConfig, FedGuardError, ModelParams, ServerState};

    fn parse_method(method: &str) -> PyResult<AggregationMethod> {
        match method {
            "fedavg" => Ok(AggregationMethod::FedAvg),
            "bicotti" => Ok(AggregationMethod::Bicotti {
                assumed_byzantine: None,
            }),
            _ => Err(PyErr::new::<pyo3::exceptions::PyValueError, _>(format!(
                "Unknown method '{}'. Use 'fedavg' or 'bicotti'",
                method
            ))),
        }
    }

    fn fedguard_err(e: FedGuardError) -> PyErr {
        PyErr::new::<pyo3::exceptions::PyValueError, _>(format!("{}", e))
    }

    fn to_params(arr: &PyReadonlyArray1<'_, f32>) -> ModelParams {
        ModelParams::from_flat(arr.as_array().to_vec())
    }

    #[pyclass(name = "FederatedServer", unsendable)]
    struct PyFederatedServer {
        inner: crate::FederatedServer,
    }

    #[pymethods]
    impl PyFederatedServer {
        #[new]
        fn new(method: String, server_lr: f32, beta: f32, global: PyReadonlyArray1<'_, f32>) -> PyResult<Self> {
            let config = AggregatorConfig {
                method: parse_method(&method)?,
                server_lr,
                beta,
            };
            let aggregator = config.build(None).map_err(fedguard_err)?;
            Ok(Self {
                inner: crate::FederatedServer::new(aggregator, ServerState::new(to_params(&global))),
            })
        }

        fn aggregate<'py>(
            &mut self,
            py: Python<'py>,
            updates: Vec<PyReadonlyArray1<'py, f32>>,
        ) -> PyResult<&'py PyArray1<f32>> {
            let rust_updates: Vec<ModelParams> = updates.iter().map(to_params).collect();

            let global = self.inner.run_round(&rust_updates).map_err(fedguard_err)?;
            Ok(Array1::from(global.flatten()).into_pyarray(py))
        }

        fn round(&self) -> usize {
            self.inner.round()
        }

        fn method(&self) -> &'static str {
            self.inner.method()
        }
    }

    #[pymodule]
    fn _core(_py: Python, m: &PyModule) -> PyResult<()> {
        m.add_class::<PyFederatedServer>()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
