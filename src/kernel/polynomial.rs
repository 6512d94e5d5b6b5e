//! Polynomial Kernel Implementation
//!
//! The polynomial kernel is defined as:
//! K(x, y) = (γ * <x, y> + r)^d
//!
//! Where:
//! - γ (gamma): scaling factor for the dot product
//! - r (coef0): independent term in the polynomial
//! - d (degree): degree of the polynomial

use crate::core::{Result, SVMError, SparseVector};
use crate::kernel::{Kernel, KernelSpec};

/// Polynomial kernel with configurable degree, gamma, and coefficient
#[derive(Debug, Clone)]
pub struct PolynomialKernel {
    gamma: f64,
    coef0: f64,
    degree: u32,
}

impl PolynomialKernel {
    /// Creates a new polynomial kernel with the specified parameters
    ///
    /// # Arguments
    /// * `degree` - Degree of the polynomial (must be > 0)
    /// * `gamma` - Scaling factor for the dot product (must be > 0)
    /// * `coef0` - Independent term in the polynomial
    ///
    /// # Examples
    /// ```
    /// use dualsvm::kernel::PolynomialKernel;
    ///
    /// // Quadratic kernel: (x·y + 1)²
    /// let quad_kernel = PolynomialKernel::new(2, 1.0, 1.0).unwrap();
    /// assert_eq!(quad_kernel.degree(), 2);
    /// ```
    pub fn new(degree: u32, gamma: f64, coef0: f64) -> Result<Self> {
        if degree == 0 {
            return Err(SVMError::InvalidKernel(
                "Polynomial degree must be positive".to_string(),
            ));
        }
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

        Ok(Self {
            gamma,
            coef0,
            degree,
        })
    }

    /// Creates a quadratic kernel: (γ * <x,y> + 1)²
    pub fn quadratic(gamma: f64) -> Result<Self> {
        Self::new(2, gamma, 1.0)
    }

    /// Creates a cubic kernel: (γ * <x,y> + 1)³
    pub fn cubic(gamma: f64) -> Result<Self> {
        Self::new(3, gamma, 1.0)
    }

    pub fn gamma(&self) -> f64 {
        self.gamma
    }

    pub fn coef0(&self) -> f64 {
        self.coef0
    }

    pub fn degree(&self) -> u32 {
        self.degree
    }
}

impl Kernel for PolynomialKernel {
    fn compute(&self, x: &SparseVector, y: &SparseVector) -> f64 {
        let kernel_value = self.gamma * x.dot(y) + self.coef0;

        // Negative bases are cut to zero so even and odd degrees agree in sign
        if kernel_value <= 0.0 {
            0.0
        } else {
            kernel_value.powi(self.degree as i32)
        }
    }

    fn spec(&self) -> KernelSpec {
        KernelSpec::Polynomial {
            degree: self.degree,
            gamma: self.gamma,
            coef0: self.coef0,
        }
    }
}
