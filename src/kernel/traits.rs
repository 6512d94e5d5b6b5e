//! Kernel trait definition

use crate::core::SparseVector;
use crate::kernel::KernelSpec;
use std::fmt::Debug;
use std::sync::Arc;

/// Kernel function trait
///
/// A kernel function K(x, y) must satisfy Mercer's condition to be valid for SVM.
/// Implementations validate their parameters at construction time, so
/// `compute` always returns a finite value for finite inputs.
pub trait Kernel: Send + Sync + Debug {
    /// Compute kernel value K(x, y)
    fn compute(&self, x: &SparseVector, y: &SparseVector) -> f64;

    /// Optional: compute kernel value using precomputed squared norms
    /// This can be more efficient for some kernels (e.g., RBF)
    fn compute_with_norms(
        &self,
        x: &SparseVector,
        y: &SparseVector,
        x_norm_sq: f64,
        y_norm_sq: f64,
    ) -> f64 {
        let _ = (x_norm_sq, y_norm_sq);
        self.compute(x, y)
    }

    /// True when K(x, x) == 1 for every x
    fn is_normalized(&self) -> bool {
        false
    }

    /// Serializable description of this kernel
    fn spec(&self) -> KernelSpec;
}

impl<K: Kernel + ?Sized> Kernel for Arc<K> {
    fn compute(&self, x: &SparseVector, y: &SparseVector) -> f64 {
        (**self).compute(x, y)
    }

    fn compute_with_norms(
        &self,
        x: &SparseVector,
        y: &SparseVector,
        x_norm_sq: f64,
        y_norm_sq: f64,
    ) -> f64 {
        (**self).compute_with_norms(x, y, x_norm_sq, y_norm_sq)
    }

    fn is_normalized(&self) -> bool {
        (**self).is_normalized()
    }

    fn spec(&self) -> KernelSpec {
        (**self).spec()
    }
}
