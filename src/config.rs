//! Aggregator configuration.
//!
//! A round's aggregation rule is described by a small serde document, so
//! orchestration code can switch rules without recompiling:
//!
//! ```json
//! { "method": { "mi": { "sigma_threshold": 2.0 } }, "server_lr": 1.0, "beta": 0.9 }
//! ```

use std::fs;
use std::path::Path;

use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::aggregators::{Bicotti, FedAvg, MutualInformation, ServerAggregator};
use crate::error::FedGuardError;
use crate::math::robust::DEFAULT_SIGMA_THRESHOLD;
use crate::probe::ProbeModel;

/// Largest `assumed_byzantine` a configuration may request.
pub const MAX_ASSUMED_BYZANTINE: usize = 1 << 20;

fn default_sigma_threshold() -> f64 {
    DEFAULT_SIGMA_THRESHOLD
}

fn default_server_lr() -> f32 {
    1.0
}

/// Aggregation rule selection.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregationMethod {
    /// Plain federated averaging (no Byzantine tolerance, baseline)
    FedAvg,
    /// Mutual-information filtering with Nesterov momentum
    Mi {
        /// Robust z-score cut-off
        #[serde(default = "default_sigma_threshold")]
        sigma_threshold: f64,
        /// Fail instead of guarding when MI scores have zero dispersion
        #[serde(default)]
        strict_statistics: bool,
    },
    /// Distance-based majority selection
    Bicotti {
        /// Assumed Byzantine clients (defaults to `floor(R / 3)` per round)
        #[serde(default)]
        assumed_byzantine: Option<usize>,
    },
}

/// Probe model and unlabeled probe batch needed by [`AggregationMethod::Mi`].
pub struct ProbeSetup {
    /// Forward-pass model the client parameters are loaded into
    pub model: Box<dyn ProbeModel>,
    /// Unlabeled probe batch, `[batch, input_dim]`
    pub data: Array2<f32>,
}

/// Full aggregator configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AggregatorConfig {
    /// Which rule to apply
    pub method: AggregationMethod,
    /// Server learning rate
    #[serde(default = "default_server_lr")]
    pub server_lr: f32,
    /// Momentum coefficient (only MI applies it)
    #[serde(default)]
    pub beta: f32,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            method: AggregationMethod::FedAvg,
            server_lr: default_server_lr(),
            beta: 0.0,
        }
    }
}

impl AggregatorConfig {
    /// Parse and validate a JSON configuration.
    pub fn from_json_str(json: &str) -> Result<Self, FedGuardError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a JSON configuration file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, FedGuardError> {
        Self::from_json_str(&fs::read_to_string(path)?)
    }

    /// Serialize to pretty JSON.
    pub fn to_json(&self) -> Result<String, FedGuardError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Check value ranges.
    pub fn validate(&self) -> Result<(), FedGuardError> {
        if !self.server_lr.is_finite() {
            return Err(FedGuardError::InvalidConfig(format!(
                "server_lr must be finite, got {}",
                self.server_lr
            )));
        }
        if !(0.0..1.0).contains(&self.beta) {
            return Err(FedGuardError::InvalidConfig(format!(
                "beta must be in [0, 1), got {}",
                self.beta
            )));
        }
        if let AggregationMethod::Mi {
            sigma_threshold, ..
        } = &self.method
        {
            let sigma_threshold = *sigma_threshold;
            if !(sigma_threshold > 0.0 && sigma_threshold.is_finite()) {
                return Err(FedGuardError::InvalidConfig(format!(
                    "sigma_threshold must be positive and finite, got {}",
                    sigma_threshold
                )));
            }
        }
        if let AggregationMethod::Bicotti {
            assumed_byzantine: Some(f),
        } = &self.method
        {
            if *f > MAX_ASSUMED_BYZANTINE {
                return Err(FedGuardError::InvalidConfig(format!(
                    "assumed_byzantine must be at most {}, got {}",
                    MAX_ASSUMED_BYZANTINE, f
                )));
            }
        }
        Ok(())
    }

    /// Short method name, as reported by the built aggregator.
    pub fn method_name(&self) -> &'static str {
        match self.method {
            AggregationMethod::FedAvg => "fedavg",
            AggregationMethod::Mi { .. } => "mi",
            AggregationMethod::Bicotti { .. } => "bicotti",
        }
    }

    /// Build the configured aggregator.
    ///
    /// `probe` is required for [`AggregationMethod::Mi`] and ignored otherwise.
    pub fn build(&self, probe: Option<ProbeSetup>) -> Result<Box<dyn ServerAggregator>, FedGuardError> {
        self.validate()?;
        let aggregator: Box<dyn ServerAggregator> = match &self.method {
            AggregationMethod::FedAvg => Box::new(FedAvg::new(self.server_lr, self.beta)),
            AggregationMethod::Bicotti { assumed_byzantine } => {
                let agg = Bicotti::new(self.server_lr, self.beta);
                match assumed_byzantine {
                    Some(f) => Box::new(agg.with_assumed_byzantine(*f)),
                    None => Box::new(agg),
                }
            }
            AggregationMethod::Mi {
                sigma_threshold,
                strict_statistics,
            } => {
                let setup = probe.ok_or_else(|| {
                    FedGuardError::InvalidConfig(
                        "mi aggregation requires a probe model and probe data".to_string(),
                    )
                })?;
                Box::new(
                    MutualInformation::new(setup.model, setup.data, self.server_lr, self.beta)
                        .with_sigma_threshold(*sigma_threshold)
                        .with_strict_statistics(*strict_statistics),
                )
            }
        };
        Ok(aggregator)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probe::{Activation, LinearProbe};

    #[test]
    fn test_parse_mi_with_defaults() {
        let config = AggregatorConfig::from_json_str(r#"{ "method": { "mi": {} }, "beta": 0.9 }"#).unwrap();
        assert_eq!(
            config.method,
            AggregationMethod::Mi {
                sigma_threshold: 2.0,
                strict_statistics: false
            }
        );
        assert_eq!(config.server_lr, 1.0);
        assert_eq!(config.beta, 0.9);
    }

    #[test]
    fn test_parse_unit_variant() {
        let config = AggregatorConfig::from_json_str(r#"{ "method": "fed_avg", "server_lr": 0.1 }"#).unwrap();
        assert_eq!(config.method, AggregationMethod::FedAvg);
        assert_eq!(config.method_name(), "fedavg");
    }

    #[test]
    fn test_json_round_trip() {
        let config = AggregatorConfig {
            method: AggregationMethod::Bicotti {
                assumed_byzantine: Some(2),
            },
            server_lr: 0.5,
            beta: 0.0,
        };
        let restored = AggregatorConfig::from_json_str(&config.to_json().unwrap()).unwrap();
        assert_eq!(restored, config);
    }

    #[test]
    fn test_invalid_values_rejected() {
        let bad_beta = AggregatorConfig {
            beta: 1.0,
            ..AggregatorConfig::default()
        };
        assert!(matches!(bad_beta.validate(), Err(FedGuardError::InvalidConfig(_))));

        let bad_lr = AggregatorConfig {
            server_lr: f32::NAN,
            ..AggregatorConfig::default()
        };
        assert!(bad_lr.validate().is_err());

        let bad_threshold = AggregatorConfig {
            method: AggregationMethod::Mi {
                sigma_threshold: 0.0,
                strict_statistics: false,
            },
            ..AggregatorConfig::default()
        };
        assert!(bad_threshold.validate().is_err());
    }

    #[test]
    fn test_huge_assumed_byzantine_rejected() {
        let json = r#"{ "method": { "bicotti": { "assumed_byzantine": 18446744073709551615 } } }"#;
        assert!(matches!(
            AggregatorConfig::from_json_str(json),
            Err(FedGuardError::InvalidConfig(_))
        ));

        let at_cap = AggregatorConfig {
            method: AggregationMethod::Bicotti {
                assumed_byzantine: Some(MAX_ASSUMED_BYZANTINE),
            },
            ..AggregatorConfig::default()
        };
        assert!(at_cap.validate().is_ok());
    }

    #[test]
    fn test_unknown_method_is_serialization_error() {
        assert!(matches!(
            AggregatorConfig::from_json_str(r#"{ "method": "krum" }"#),
            Err(FedGuardError::Serialization(_))
        ));
    }

    #[test]
    fn test_build_each_method() {
        for (config, name) in [
            (AggregatorConfig::default(), "fedavg"),
            (
                AggregatorConfig {
                    method: AggregationMethod::Bicotti {
                        assumed_byzantine: None,
                    },
                    ..AggregatorConfig::default()
                },
                "bicotti",
            ),
        ] {
            assert_eq!(config.build(None).unwrap().method(), name);
        }

        let mi = AggregatorConfig {
            method: AggregationMethod::Mi {
                sigma_threshold: 2.0,
                strict_statistics: true,
            },
            server_lr: 1.0,
            beta: 0.5,
        };
        assert!(matches!(mi.build(None), Err(FedGuardError::InvalidConfig(_))));

        let setup = ProbeSetup {
            model: Box::new(LinearProbe::new(2, 3, Activation::Softmax)),
            data: Array2::zeros((4, 2)),
        };
        assert_eq!(mi.build(Some(setup)).unwrap().method(), "mi");
    }
}
