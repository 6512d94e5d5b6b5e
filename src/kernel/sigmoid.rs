//! Sigmoid (Tanh) Kernel Implementation
//!
//! K(x, y) = tanh(γ * <x, y> + r)
//!
//! The sigmoid kernel is not positive semi-definite for every parameter
//! choice. The pairwise solvers handle the resulting non-negative curvature
//! by comparing the objective at both ends of the feasible segment.

use crate::core::{Result, SVMError, SparseVector};
use crate::kernel::{Kernel, KernelSpec};

/// Sigmoid (Hyperbolic Tangent) kernel
#[derive(Debug, Clone)]
pub struct SigmoidKernel {
    gamma: f64,
    coef0: f64,
}

impl SigmoidKernel {
    /// Creates a new Sigmoid kernel with specified parameters
    ///
    /// # Errors
    /// Returns [`SVMError::InvalidKernel`] if gamma is not positive
    /// or coef0 is not finite
    pub fn new(gamma: f64, coef0: f64) -> Result<Self> {
        if !gamma.is_finite() || gamma <= 0.0 {
            return Err(SVMError::InvalidKernel(format!(
                "Gamma must be positive, got: {gamma}"
            )));
        }
        if !coef0.is_finite() {
            return Err(SVMError::InvalidKernel(format!(
                "coef0 must be finite, got: {coef0}"
            )));
        }
        Ok(Self { gamma, coef0 })
    }

    pub fn gamma(&self) -> f64 {
        self.gamma
    }

    pub fn coef0(&self) -> f64 {
        self.coef0
    }
}

impl Kernel for SigmoidKernel {
    fn compute(&self, x: &SparseVector, y: &SparseVector) -> f64 {
        (self.gamma * x.dot(y) + self.coef0).tanh()
    }

    fn spec(&self) -> KernelSpec {
        KernelSpec::Sigmoid {
            gamma: self.gamma,
            coef0: self.coef0,
        }
    }
}
