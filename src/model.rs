//! Model parameter container.
//!
//! [`ModelParams`] plays three roles in a round: the global model, a
//! client's update (gradient / delta) and the server momentum. All three
//! share the same layout: an ordered list of tensors, one per model
//! parameter.

use ndarray::{Array1, ArrayD};
use serde::{Deserialize, Serialize};

use crate::error::FedGuardError;
use crate::math::norms;

/// An ordered list of `f32` tensors, one per model parameter.
///
/// Arithmetic is elementwise and requires both operands to have the same
/// layout (same number of tensors, same shape per tensor). The fallible
/// operations return [`FedGuardError::ShapeError`] on mismatch instead of
/// panicking.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModelParams {
    tensors: Vec<ArrayD<f32>>,
}

impl ModelParams {
    /// Build from a sequence of raw arrays.
    pub fn new(tensors: Vec<ArrayD<f32>>) -> Self {
        Self { tensors }
    }

    /// Build a single one-dimensional tensor from a flat vector.
    pub fn from_flat(values: Vec<f32>) -> Self {
        Self {
            tensors: vec![Array1::from(values).into_dyn()],
        }
    }

    /// The parameter tensors, in order.
    pub fn tensors(&self) -> &[ArrayD<f32>] {
        &self.tensors
    }

    /// Consume the container and return its tensors.
    pub fn into_tensors(self) -> Vec<ArrayD<f32>> {
        self.tensors
    }

    /// Number of tensors.
    pub fn len(&self) -> usize {
        self.tensors.len()
    }

    /// Whether the container holds no tensors.
    pub fn is_empty(&self) -> bool {
        self.tensors.is_empty()
    }

    /// Total number of scalar parameters across all tensors.
    pub fn num_params(&self) -> usize {
        self.tensors.iter().map(|t| t.len()).sum()
    }

    /// Zeros with the same layout as `self`.
    pub fn zeros_like(&self) -> Self {
        Self {
            tensors: self
                .tensors
                .iter()
                .map(|t| ArrayD::zeros(t.raw_dim()))
                .collect(),
        }
    }

    /// Whether `other` has exactly the same layout.
    pub fn same_shape(&self, other: &Self) -> bool {
        self.tensors.len() == other.tensors.len()
            && self
                .tensors
                .iter()
                .zip(&other.tensors)
                .all(|(a, b)| a.shape() == b.shape())
    }

    fn ensure_same_shape(&self, other: &Self) -> Result<(), FedGuardError> {
        if self.same_shape(other) {
            Ok(())
        } else {
            Err(FedGuardError::ShapeError(format!(
                "layout {:?} does not match {:?}",
                self.shapes(),
                other.shapes()
            )))
        }
    }

    fn shapes(&self) -> Vec<Vec<usize>> {
        self.tensors.iter().map(|t| t.shape().to_vec()).collect()
    }

    /// Elementwise `self + other`.
    pub fn try_add(&self, other: &Self) -> Result<Self, FedGuardError> {
        let mut out = self.clone();
        out.axpy(1.0, other)?;
        Ok(out)
    }

    /// Elementwise `self - other`.
    pub fn try_sub(&self, other: &Self) -> Result<Self, FedGuardError> {
        let mut out = self.clone();
        out.axpy(-1.0, other)?;
        Ok(out)
    }

    /// Scalar multiple `alpha * self`.
    pub fn scale(&self, alpha: f32) -> Self {
        Self {
            tensors: self.tensors.iter().map(|t| t * alpha).collect(),
        }
    }

    /// In-place `self += alpha * other`.
    pub fn axpy(&mut self, alpha: f32, other: &Self) -> Result<(), FedGuardError> {
        self.ensure_same_shape(other)?;
        for (a, b) in self.tensors.iter_mut().zip(&other.tensors) {
            a.scaled_add(alpha, b);
        }
        Ok(())
    }

    /// L2 distance to `other`, summed across tensors.
    ///
    /// Each tensor contributes the Euclidean norm of its difference; the
    /// per-tensor norms are added together.
    pub fn l2_distance(&self, other: &Self) -> Result<f64, FedGuardError> {
        self.ensure_same_shape(other)?;
        Ok(self
            .tensors
            .iter()
            .zip(&other.tensors)
            .map(|(a, b)| norms::l2_distance(a.iter(), b.iter()))
            .sum())
    }

    /// Euclidean norm over all parameters.
    pub fn l2_norm(&self) -> f64 {
        norms::l2_norm_sq(self.tensors.iter().flat_map(|t| t.iter())).sqrt()
    }

    /// All parameters in tensor order, each tensor in logical (row-major) order.
    pub fn flatten(&self) -> Vec<f32> {
        self.tensors
            .iter()
            .flat_map(|t| t.iter().copied())
            .collect()
    }
}

impl From<Vec<ArrayD<f32>>> for ModelParams {
    fn from(tensors: Vec<ArrayD<f32>>) -> Self {
        Self::new(tensors)
    }
}
