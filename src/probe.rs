//! Probe models used by the mutual-information filter.
//!
//! The MI aggregator never trains anything; it only needs to load a
//! candidate parameter set and run it forward on an unlabeled probe
//! batch. [`ProbeModel`] is that capability. [`LinearProbe`] is a small
//! dense layer implementation for models whose parameters are a single
//! weight matrix and bias.

use ndarray::{Array1, Array2, Axis, Ix1, Ix2};

use crate::error::FedGuardError;
use crate::model::ModelParams;

/// Forward-pass capability over a parameter set.
pub trait ProbeModel {
    /// Load a candidate parameter set.
    fn set_params(&mut self, params: &ModelParams) -> Result<(), FedGuardError>;

    /// Run the loaded parameters on `inputs` (`[batch, input_dim]`),
    /// returning `[batch, output_dim]`.
    fn forward(&self, inputs: &Array2<f32>) -> Result<Array2<f32>, FedGuardError>;
}

impl<P: ProbeModel + ?Sized> ProbeModel for Box<P> {
    fn set_params(&mut self, params: &ModelParams) -> Result<(), FedGuardError> {
        (**self).set_params(params)
    }

    fn forward(&self, inputs: &Array2<f32>) -> Result<Array2<f32>, FedGuardError> {
        (**self).forward(inputs)
    }
}

/// Output non-linearity of a [`LinearProbe`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Activation {
    /// Raw logits.
    #[default]
    Identity,
    /// Row-wise softmax (class probabilities).
    Softmax,
}

/// Dense layer `x · W + b`.
///
/// Expects parameters laid out as `[W (input_dim x output_dim), b (output_dim)]`.
#[derive(Clone, Debug)]
pub struct LinearProbe {
    weights: Array2<f32>,
    bias: Array1<f32>,
    activation: Activation,
}

impl LinearProbe {
    /// Create a zero-initialised probe of the given dimensions.
    pub fn new(input_dim: usize, output_dim: usize, activation: Activation) -> Self {
        Self {
            weights: Array2::zeros((input_dim, output_dim)),
            bias: Array1::zeros(output_dim),
            activation,
        }
    }

    /// Input dimension.
    pub fn input_dim(&self) -> usize {
        self.weights.nrows()
    }

    /// Output dimension.
    pub fn output_dim(&self) -> usize {
        self.weights.ncols()
    }

    /// The parameters currently loaded, in the layout `set_params` expects.
    pub fn params(&self) -> ModelParams {
        ModelParams::new(vec![
            self.weights.clone().into_dyn(),
            self.bias.clone().into_dyn(),
        ])
    }
}

impl ProbeModel for LinearProbe {
    fn set_params(&mut self, params: &ModelParams) -> Result<(), FedGuardError> {
        let [w, b] = params.tensors() else {
            return Err(FedGuardError::ProbeError(format!(
                "linear probe expects 2 tensors (weights, bias), got {}",
                params.len()
            )));
        };
        let weights = w.clone().into_dimensionality::<Ix2>()?;
        let bias = b.clone().into_dimensionality::<Ix1>()?;
        if weights.dim() != self.weights.dim() || bias.len() != self.bias.len() {
            return Err(FedGuardError::ProbeError(format!(
                "expected weights {:?} and bias ({},), got {:?} and ({},)",
                self.weights.dim(),
                self.bias.len(),
                weights.dim(),
                bias.len()
            )));
        }
        self.weights = weights;
        self.bias = bias;
        Ok(())
    }

    fn forward(&self, inputs: &Array2<f32>) -> Result<Array2<f32>, FedGuardError> {
        if inputs.ncols() != self.input_dim() {
            return Err(FedGuardError::ProbeError(format!(
                "probe inputs have {} features, model expects {}",
                inputs.ncols(),
                self.input_dim()
            )));
        }
        let mut out = inputs.dot(&self.weights) + &self.bias;

        if self.activation == Activation::Softmax {
            for mut row in out.axis_iter_mut(Axis(0)) {
                let max = row.iter().copied().fold(f32::NEG_INFINITY, f32::max);
                row.mapv_inplace(|x| (x - max).exp());
                let sum = row.sum();
                row /= sum;
            }
        }
        Ok(out)
    }
}
