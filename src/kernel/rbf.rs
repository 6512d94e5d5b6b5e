//! RBF (Radial Basis Function) kernel implementation
//!
//! The RBF kernel is defined as: K(x, y) = exp(-γ * ||x - y||²)
//! where γ (gamma) is a hyperparameter that controls the kernel width.

use crate::core::{Result, SVMError, SparseVector};
use crate::kernel::{Kernel, KernelSpec};

/// RBF (Radial Basis Function) kernel: K(x, y) = exp(-γ * ||x - y||²)
///
/// The gamma parameter controls the "reach" of each training example:
/// - High gamma: close points have high influence (potential overfitting)
/// - Low gamma: distant points have influence (potential underfitting)
///
/// K(x, x) = 1 for every x, so the kernel is already normalized.
#[derive(Debug, Clone, Copy)]
pub struct RBFKernel {
    gamma: f64,
}

impl RBFKernel {
    /// Create a new RBF kernel with specified gamma parameter
    ///
    /// # Errors
    /// Returns [`SVMError::InvalidKernel`] if gamma is not positive and finite
    pub fn new(gamma: f64) -> Result<Self> {
        if !gamma.is_finite() || gamma <= 0.0 {
            return Err(SVMError::InvalidKernel(format!(
                "Gamma must be positive, got: {gamma}"
            )));
        }
        Ok(Self { gamma })
    }

    /// Create RBF kernel with gamma = 1.0 / n_features
    pub fn with_auto_gamma(n_features: usize) -> Result<Self> {
        if n_features == 0 {
            return Err(SVMError::InvalidKernel(
                "Number of features must be positive".to_string(),
            ));
        }
        Self::new(1.0 / n_features as f64)
    }

    /// Create RBF kernel with gamma = 1.0 (unit gamma)
    pub fn unit_gamma() -> Self {
        Self { gamma: 1.0 }
    }

    /// Get the gamma parameter
    pub fn gamma(&self) -> f64 {
        self.gamma
    }
}

impl Default for RBFKernel {
    /// Default RBF kernel with gamma = 1.0
    fn default() -> Self {
        Self::unit_gamma()
    }
}

impl Kernel for RBFKernel {
    fn compute(&self, x: &SparseVector, y: &SparseVector) -> f64 {
        (-self.gamma * x.squared_distance(y)).exp()
    }

    fn compute_with_norms(
        &self,
        x: &SparseVector,
        y: &SparseVector,
        x_norm_sq: f64,
        y_norm_sq: f64,
    ) -> f64 {
        // ||x - y||² = ||x||² + ||y||² - 2*x^T*y, floored at 0 against rounding
        let squared_distance = (x_norm_sq + y_norm_sq - 2.0 * x.dot(y)).max(0.0);
        (-self.gamma * squared_distance).exp()
    }

    fn is_normalized(&self) -> bool {
        true
    }

    fn spec(&self) -> KernelSpec {
        KernelSpec::Rbf { gamma: self.gamma }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_rbf_kernel_creation() {
        let kernel = RBFKernel::new(0.5).unwrap();
        assert_eq!(kernel.gamma(), 0.5);

        let kernel_auto = RBFKernel::with_auto_gamma(10).unwrap();
        assert_eq!(kernel_auto.gamma(), 0.1);

        assert_eq!(RBFKernel::unit_gamma().gamma(), 1.0);
        assert_eq!(RBFKernel::default().gamma(), 1.0);
    }

    #[test]
    fn test_rbf_kernel_invalid_gamma() {
        assert!(matches!(
            RBFKernel::new(-0.5),
            Err(SVMError::InvalidKernel(_))
        ));
        assert!(RBFKernel::new(0.0).is_err());
        assert!(RBFKernel::new(f64::INFINITY).is_err());
        assert!(RBFKernel::with_auto_gamma(0).is_err());
    }

    #[test]
    fn test_rbf_kernel_values() {
        let kernel = RBFKernel::new(0.5).unwrap();
        let x = SparseVector::new(vec![0, 1], vec![1.0, 2.0]);
        let y = SparseVector::new(vec![0, 1], vec![2.0, 0.0]);

        assert_abs_diff_eq!(kernel.compute(&x, &x), 1.0);
        // ||x - y||² = 1 + 4 = 5
        assert_abs_diff_eq!(kernel.compute(&x, &y), (-2.5f64).exp(), epsilon = 1e-12);
    }

    #[test]
    fn test_rbf_with_norms_matches_direct() {
        let kernel = RBFKernel::new(0.3).unwrap();
        let x = SparseVector::new(vec![0, 3, 7], vec![1.0, -2.0, 0.5]);
        let y = SparseVector::new(vec![1, 3], vec![0.7, 1.5]);

        let direct = kernel.compute(&x, &y);
        let with_norms = kernel.compute_with_norms(&x, &y, x.norm_squared(), y.norm_squared());
        assert_abs_diff_eq!(direct, with_norms, epsilon = 1e-12);
    }

    #[test]
    fn test_rbf_is_normalized() {
        assert!(RBFKernel::default().is_normalized());
        assert_eq!(
            RBFKernel::new(0.25).unwrap().spec(),
            KernelSpec::Rbf { gamma: 0.25 }
        );
    }
}
