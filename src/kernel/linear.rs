//! Linear kernel implementation

use crate::core::SparseVector;
use crate::kernel::{Kernel, KernelSpec};

/// Linear kernel: K(x, y) = x^T * y
///
/// This is the simplest kernel function, computing the dot product between two vectors.
/// For sparse vectors, this is computed efficiently by iterating through non-zero elements.
#[derive(Debug, Clone, Copy, Default)]
pub struct LinearKernel;

impl LinearKernel {
    /// Create a new linear kernel
    pub fn new() -> Self {
        Self
    }
}

impl Kernel for LinearKernel {
    fn compute(&self, x: &SparseVector, y: &SparseVector) -> f64 {
        x.dot(y)
    }

    fn spec(&self) -> KernelSpec {
        KernelSpec::Linear
    }
}
